use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::ast::{BuiltinFn, Pair, Value};
use crate::builtinops::{Arity, get_builtin_ops};
use crate::specialforms::find_special_form;

struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Environment>,
}

/// Environment for variable bindings
///
/// A cheap, cloneable handle to one frame of the environment chain. Clones share
/// the frame, so a `define` through one handle is visible through every other
/// handle, including the ones captured by closures.
#[derive(Clone)]
pub struct Environment(Rc<Frame>);

impl Environment {
    /// An empty root environment, without builtins
    pub fn new() -> Self {
        Environment(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// A root environment holding every builtin procedure
    pub fn create_global() -> Self {
        let env = Environment::new();
        for op in get_builtin_ops() {
            env.define(op.scheme_id, op.to_value());
        }
        debug!(builtins = get_builtin_ops().len(), "created global environment");
        env
    }

    /// A new frame whose parent is `self`, binding `names[i]` to `values[i]`
    ///
    /// Callers check that the lengths agree; extra names or values are ignored.
    pub fn create_child(&self, names: &[String], values: Vec<Value>) -> Self {
        let bindings = names.iter().cloned().zip(values).collect();
        Environment(Rc::new(Frame {
            bindings: RefCell::new(bindings),
            parent: Some(self.clone()),
        }))
    }

    /// Find the innermost binding of `name`
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            frame = frame.0.parent.as_ref()?;
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    /// Bind `name` in this frame only, shadowing any outer binding
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Rebind `name` in the innermost frame that already binds it
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut frame = self;
        loop {
            if let Some(slot) = frame.0.bindings.borrow_mut().get_mut(name) {
                *slot = value;
                return Ok(());
            }
            match &frame.0.parent {
                Some(parent) => frame = parent,
                None => return Err(Error::UnboundVariable(name.to_owned())),
            }
        }
    }

    /// Register a custom builtin function in this environment.
    ///
    /// The function follows the same calling convention as the bundled builtins
    /// and its argument count is checked against `arity` before every call.
    ///
    /// # Example
    /// ```
    /// use minischeme::builtinops::Arity;
    /// use minischeme::evaluator::{Environment, create_global_env};
    /// use minischeme::ast::Value;
    /// use minischeme::Error;
    ///
    /// fn answer(_args: &[Value], _env: &Environment) -> Result<Value, Error> {
    ///     Ok(Value::Number(42.0))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("answer", Arity::Exact(0), answer);
    /// // Now (answer) can be called from evaluated expressions
    /// ```
    pub fn register_builtin_function(&self, name: &str, arity: Arity, func: BuiltinFn) {
        self.define(name, Value::builtin(name, arity, func));
    }

    /// Get all bindings in this environment and its parents
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        // Start with parent bindings (so they can be overridden by local bindings)
        if let Some(parent) = &self.0.parent {
            bindings.extend(parent.get_all_bindings());
        }

        // Add/override with local bindings
        for (name, value) in self.0.bindings.borrow().iter() {
            bindings.insert(name.clone(), value.clone());
        }

        // Convert to sorted vector
        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// True when both handles refer to the same frame
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.0.bindings.borrow().len())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}

/// Create a global environment with built-in functions
pub fn create_global_env() -> Environment {
    Environment::create_global()
}

thread_local! {
    static EVAL_DEPTH: Cell<usize> = const { Cell::new(0) };
    static EVAL_DEPTH_LIMIT: Cell<usize> = const { Cell::new(MAX_EVAL_DEPTH) };
}

/// Set the evaluation depth limit for the current thread, returning the old one
pub fn set_max_eval_depth(limit: usize) -> usize {
    EVAL_DEPTH_LIMIT.with(|cell| cell.replace(limit))
}

/// The evaluation depth limit of the current thread
pub fn max_eval_depth() -> usize {
    EVAL_DEPTH_LIMIT.with(Cell::get)
}

/// One level of `eval` nesting; released on drop, including on error paths
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<Self, Error> {
        let limit = max_eval_depth();
        EVAL_DEPTH.with(|depth| {
            if depth.get() >= limit {
                return Err(Error::RecursionLimit(limit));
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        EVAL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Evaluate an S-expression (public API)
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    let _guard = DepthGuard::enter()?;
    match expr {
        Value::Bool(_)
        | Value::Number(_)
        | Value::String(_)
        | Value::BuiltinFunction { .. }
        | Value::Function(_) => Ok(expr.clone()),

        // The empty list is not self-evaluating
        Value::Nil => Err(Error::EvalNil),

        // Variable lookup
        Value::Symbol(name) => env.lookup(name),

        // Special form or procedure call
        Value::Pair(pair) => eval_pair(pair, env).map_err(|err| add_context(err, expr)),
    }
}

const CONTEXT_MARKER: &str = "\n  Context: while evaluating: ";

/// Helper function to add expression context to errors
///
/// Only the innermost failing form is recorded.
fn add_context(error: Error, expr: &Value) -> Error {
    match error {
        Error::EvalError(msg) if !msg.contains(CONTEXT_MARKER) => {
            Error::EvalError(format!("{msg}{CONTEXT_MARKER}{expr}"))
        }
        Error::TypeError(msg) if !msg.contains(CONTEXT_MARKER) => {
            Error::TypeError(format!("{msg}{CONTEXT_MARKER}{expr}"))
        }
        // Other kinds carry their own context
        other => other,
    }
}

fn eval_pair(pair: &Pair, env: &Environment) -> Result<Value, Error> {
    let head = pair.car();
    let operands = pair.cdr();

    // Keywords are resolved before any operand is evaluated
    if let Some(keyword) = head.as_symbol()
        && let Some(form) = find_special_form(keyword)
    {
        trace!(form = keyword, "dispatching special form");
        return form.invoke(&operands, env);
    }

    let procedure = eval(&head, env)?;
    let args = eval_sequence(&operands, env)?;
    apply(&procedure, &args, env)
}

/// Evaluate every element of a proper operand list, left to right
pub fn eval_sequence(operands: &Value, env: &Environment) -> Result<Vec<Value>, Error> {
    let mut results = Vec::new();
    let mut current = operands.clone();
    loop {
        match current {
            Value::Nil => return Ok(results),
            Value::Pair(pair) => {
                results.push(eval(&pair.car(), env)?);
                current = pair.cdr();
            }
            _ => {
                return Err(Error::SyntaxError(format!(
                    "improper argument list: {operands}"
                )));
            }
        }
    }
}

/// Evaluate body expressions in order, returning the last result (Nil if empty)
pub fn eval_body(body: &[Value], env: &Environment) -> Result<Value, Error> {
    let mut result = Value::Nil;
    for expr in body {
        result = eval(expr, env)?;
    }
    Ok(result)
}

/// Apply a procedure to already-evaluated arguments
///
/// `env` is the caller's environment; builtins such as `map` and `eval` use it
/// to re-enter the evaluator. Closures run in a child of their captured
/// environment instead.
pub fn apply(procedure: &Value, args: &[Value], env: &Environment) -> Result<Value, Error> {
    match procedure {
        Value::BuiltinFunction { func, arity, .. } => {
            arity.validate(args.len())?;
            func(args, env)
        }
        Value::Function(lambda) => {
            if lambda.params.len() != args.len() {
                return Err(Error::arity_error(
                    Arity::Exact(lambda.params.len()),
                    args.len(),
                ));
            }
            trace!(params = ?lambda.params, "applying closure");
            let call_env = lambda.env.create_child(&lambda.params, args.to_vec());
            eval_body(&lambda.body, &call_env)
        }
        other => Err(Error::NotCallable(other.to_string())),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod environment_tests {
    use super::*;
    use crate::ast::val;

    #[test]
    fn test_lookup_walks_parent_chain() {
        let root = Environment::new();
        root.define("x", val(1));
        let child = root.create_child(&["y".to_owned()], vec![val(2)]);
        let grandchild = child.create_child(&[], vec![]);

        assert_eq!(grandchild.lookup("x").unwrap(), val(1));
        assert_eq!(grandchild.lookup("y").unwrap(), val(2));
        assert_eq!(
            grandchild.lookup("z"),
            Err(Error::UnboundVariable("z".to_owned()))
        );
        assert!(root.get("y").is_none());
    }

    #[test]
    fn test_define_shadows_without_touching_parent() {
        let root = Environment::new();
        root.define("x", val(1));
        let child = root.create_child(&[], vec![]);
        child.define("x", val(2));

        assert_eq!(child.lookup("x").unwrap(), val(2));
        assert_eq!(root.lookup("x").unwrap(), val(1));
    }

    #[test]
    fn test_set_updates_owning_frame() {
        let root = Environment::new();
        root.define("x", val(1));
        let child = root.create_child(&[], vec![]);

        child.set("x", val(5)).unwrap();
        assert_eq!(root.lookup("x").unwrap(), val(5));
        assert!(child.0.bindings.borrow().is_empty());
        assert_eq!(
            child.set("missing", val(0)),
            Err(Error::UnboundVariable("missing".to_owned()))
        );
    }

    #[test]
    fn test_clones_share_frame() {
        let env = Environment::new();
        let alias = env.clone();
        alias.define("shared", val(true));
        assert!(env.ptr_eq(&alias));
        assert_eq!(env.lookup("shared").unwrap(), val(true));
        assert!(!env.ptr_eq(&Environment::new()));
    }

    #[test]
    fn test_get_all_bindings_sorted_and_shadowed() {
        let root = Environment::new();
        root.define("b", val(1));
        root.define("a", val(2));
        let child = root.create_child(&["b".to_owned()], vec![val(3)]);

        let bindings = child.get_all_bindings();
        let names: Vec<_> = bindings.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(bindings[1].1, val(3));
    }

    #[test]
    fn test_global_env_holds_builtins() {
        let env = create_global_env();
        for op in get_builtin_ops() {
            let bound = env.lookup(op.scheme_id).unwrap();
            assert!(bound.is_procedure(), "{} should be a procedure", op.scheme_id);
        }
        // Special forms are not bindings
        assert!(env.get("if").is_none());
        assert!(env.get("define").is_none());
    }

    #[test]
    fn test_eval_atoms() {
        let env = create_global_env();
        assert_eq!(eval(&val(4), &env).unwrap(), val(4));
        assert_eq!(eval(&val("s"), &env).unwrap(), val("s"));
        assert_eq!(eval(&Value::Nil, &env), Err(Error::EvalNil));
        assert_eq!(
            eval(&Value::symbol("nope"), &env),
            Err(Error::UnboundVariable("nope".to_owned()))
        );
    }

    #[test]
    fn test_apply_non_procedure() {
        let env = Environment::new();
        assert!(matches!(
            apply(&val(5), &[], &env),
            Err(Error::NotCallable(_))
        ));
    }

    #[test]
    fn test_depth_guard_is_released() {
        let env = create_global_env();
        let before = EVAL_DEPTH.with(Cell::get);
        let _ = eval(&Value::list([Value::symbol("car"), val(1)]), &env);
        assert_eq!(EVAL_DEPTH.with(Cell::get), before);
    }
}
