//! Special forms.
//!
//! A special form receives its operands unevaluated and decides for itself
//! which of them to evaluate, in what order and how often. The evaluator
//! consults [`find_special_form`] before evaluating anything in a combination,
//! so keywords cannot be rebound by user definitions.
//!
//! | keyword | operands |
//! |---|---|
//! | `quote` | exactly 1 |
//! | `quasiquote` | exactly 1 |
//! | `unquote` | only valid inside `quasiquote` |
//! | `if` | 2 or 3 |
//! | `and`, `or`, `begin` | any number |
//! | `lambda`, `let` | parameter/binding list plus a non-empty body |
//! | `define` | `name expr` or `(name params...) body...` |
//! | `set!` | exactly 2 |
//! | `cond` | at least 1 clause |

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

use tracing::debug;

use crate::Error;
use crate::ast::{Lambda, Value};
use crate::builtinops::Arity;
use crate::evaluator::{Environment, eval, eval_body};

/// Handler signature: unevaluated operands plus the current environment
pub type SpecialFormFn = fn(&[Value], &Environment) -> Result<Value, Error>;

/// Definition of a special form
pub struct SpecialForm {
    pub keyword: &'static str,
    pub handler: SpecialFormFn,
    /// Operand count, checked before the handler runs
    pub arity: Arity,
}

impl SpecialForm {
    /// Run the handler on the cdr of a combination
    pub fn invoke(&self, operands: &Value, env: &Environment) -> Result<Value, Error> {
        let args = operands.to_vec().map_err(|_| {
            Error::SyntaxError(format!(
                "{}: operands must form a proper list, got {operands}",
                self.keyword
            ))
        })?;

        if !self.arity.accepts(args.len()) {
            return Err(Error::arity_error_with_expr(
                self.arity,
                args.len(),
                form_text(self.keyword, &args),
            ));
        }

        (self.handler)(&args, env)
    }
}

/// Reconstruct the text of a form for error messages
fn form_text(keyword: &str, args: &[Value]) -> String {
    Value::cons(Value::symbol(keyword), Value::list(args.iter().cloned())).to_string()
}

/// Evaluate quote special form
fn eval_quote(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

/// Evaluate quasiquote special form
///
/// Nested `quasiquote` forms are traversed like any other data, so their
/// `unquote`s are evaluated at the outer level as well.
fn eval_quasiquote(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [template] => expand_quasiquote(template, env),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn is_unquote_form(value: &Value) -> bool {
    value
        .as_pair()
        .is_some_and(|pair| pair.car().as_symbol() == Some("unquote"))
}

fn expand_quasiquote(template: &Value, env: &Environment) -> Result<Value, Error> {
    let mut items = Vec::new();
    let mut current = template.clone();

    // Recurse into cars, iterate along cdrs
    while let Value::Pair(pair) = &current
        && !is_unquote_form(&current)
    {
        items.push(expand_quasiquote(&pair.car(), env)?);
        let next = pair.cdr();
        current = next;
    }

    let tail = if is_unquote_form(&current) {
        eval_unquoted(&current, env)?
    } else {
        current
    };
    Ok(Value::list_with_tail(items, tail))
}

/// Evaluate the operand of an `(unquote expr)` form
fn eval_unquoted(form: &Value, env: &Environment) -> Result<Value, Error> {
    let operands = form
        .as_pair()
        .map(|pair| pair.cdr())
        .unwrap_or(Value::Nil)
        .to_vec()
        .map_err(|_| Error::SyntaxError(format!("malformed unquote: {form}")))?;

    match operands.as_slice() {
        [expr] => eval(expr, env),
        _ => Err(Error::arity_error_with_expr(
            Arity::Exact(1),
            operands.len(),
            form.to_string(),
        )),
    }
}

/// `unquote` outside of `quasiquote`
fn eval_unquote(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    Err(Error::SyntaxError(format!(
        "unquote outside of quasiquote: {}",
        form_text("unquote", args)
    )))
}

/// Evaluate if special form
fn eval_if(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [test, consequent] => {
            if eval(test, env)?.is_false() {
                Ok(Value::Nil)
            } else {
                eval(consequent, env)
            }
        }
        [test, consequent, alternative] => {
            if eval(test, env)?.is_false() {
                eval(alternative, env)
            } else {
                eval(consequent, env)
            }
        }
        _ => Err(Error::arity_error(Arity::Range(2, 3), args.len())),
    }
}

/// `#t` when empty, else the first false result or the last result
fn eval_and(args: &[Value], env: &Environment) -> Result<Value, Error> {
    let mut result = Value::Bool(true);
    for arg in args {
        result = eval(arg, env)?;
        if result.is_false() {
            break;
        }
    }
    Ok(result)
}

/// The first non-false result, or `#f`
fn eval_or(args: &[Value], env: &Environment) -> Result<Value, Error> {
    for arg in args {
        let result = eval(arg, env)?;
        if !result.is_false() {
            return Ok(result);
        }
    }
    Ok(Value::Bool(false))
}

/// Extract parameter names from a proper list of distinct symbols
fn parse_params(list: &Value) -> Result<Vec<String>, Error> {
    let items = list.to_vec().map_err(|_| {
        Error::SyntaxError(format!("parameter list must be a proper list, got {list}"))
    })?;

    let mut params: Vec<String> = Vec::with_capacity(items.len());
    for item in &items {
        match item {
            Value::Symbol(name) => {
                if params.iter().any(|p| p == &**name) {
                    return Err(Error::SyntaxError(format!(
                        "duplicate parameter name: {name}"
                    )));
                }
                params.push(name.to_string());
            }
            _ => {
                return Err(Error::SyntaxError(format!(
                    "parameters must be symbols, got {item}"
                )));
            }
        }
    }
    Ok(params)
}

fn make_lambda(params: &Value, body: &[Value], env: &Environment) -> Result<Value, Error> {
    Ok(Value::Function(Rc::new(Lambda {
        params: parse_params(params)?,
        body: body.to_vec(),
        env: env.clone(),
    })))
}

/// Evaluate lambda special form
fn eval_lambda(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [params, body @ ..] if !body.is_empty() => make_lambda(params, body, env),
        _ => Err(Error::arity_error_with_expr(
            Arity::AtLeast(2),
            args.len(),
            form_text("lambda", args),
        )),
    }
}

/// Evaluate define special form
fn eval_define(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            debug!(name = %name, "define");
            env.define(name.to_string(), value);
            Ok(Value::Nil)
        }
        [Value::Symbol(_), ..] => Err(Error::arity_error_with_expr(
            Arity::Exact(2),
            args.len(),
            form_text("define", args),
        )),
        // (define (name params...) body...)
        [Value::Pair(signature), body @ ..] if !body.is_empty() => {
            let name = signature.car();
            let Some(name) = name.as_symbol() else {
                return Err(Error::SyntaxError(format!(
                    "define: procedure name must be a symbol, got {name}"
                )));
            };
            let procedure = make_lambda(&signature.cdr(), body, env)?;
            debug!(name, "define procedure");
            env.define(name, procedure);
            Ok(Value::Nil)
        }
        [Value::Pair(_), ..] | [] => Err(Error::arity_error_with_expr(
            Arity::AtLeast(2),
            args.len(),
            form_text("define", args),
        )),
        [other, ..] => Err(Error::SyntaxError(format!(
            "define: expected a symbol or (name params...), got {other}"
        ))),
    }
}

/// Evaluate set! special form
fn eval_set(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            env.set(name, value)?;
            Ok(Value::Nil)
        }
        [other, _] => Err(Error::SyntaxError(format!(
            "set!: expected a symbol, got {other}"
        ))),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

/// Evaluate cond special form
fn eval_cond(clauses: &[Value], env: &Environment) -> Result<Value, Error> {
    for (i, clause) in clauses.iter().enumerate() {
        let parts = match clause.to_vec() {
            Ok(parts) if !parts.is_empty() => parts,
            _ => {
                return Err(Error::SyntaxError(format!(
                    "cond: clause must be a non-empty list, got {clause}"
                )));
            }
        };
        let (test, body) = parts.split_at(1);

        let test_value = if test[0].as_symbol() == Some("else") {
            if i + 1 != clauses.len() {
                return Err(Error::SyntaxError(
                    "cond: else clause must be last".to_owned(),
                ));
            }
            if body.is_empty() {
                return Err(Error::arity_error_with_expr(
                    Arity::AtLeast(1),
                    0,
                    clause.to_string(),
                ));
            }
            Value::Bool(true)
        } else {
            eval(&test[0], env)?
        };

        if !test_value.is_false() {
            return if body.is_empty() {
                Ok(test_value)
            } else {
                eval_body(body, env)
            };
        }
    }

    Err(Error::EvalError("cond: no clause matched".to_owned()))
}

/// Evaluate begin special form
fn eval_begin(args: &[Value], env: &Environment) -> Result<Value, Error> {
    eval_body(args, env)
}

/// Evaluate let special form
///
/// Every initializer is evaluated in the enclosing environment before any
/// name is bound, then the body runs in a fresh child frame.
fn eval_let(args: &[Value], env: &Environment) -> Result<Value, Error> {
    let [bindings, body @ ..] = args else {
        return Err(Error::arity_error(Arity::AtLeast(2), args.len()));
    };
    if body.is_empty() {
        return Err(Error::arity_error_with_expr(
            Arity::AtLeast(2),
            args.len(),
            form_text("let", args),
        ));
    }

    let entries = bindings.to_vec().map_err(|_| {
        Error::SyntaxError(format!("let: bindings must be a list, got {bindings}"))
    })?;

    let mut names: Vec<String> = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());
    for entry in &entries {
        match entry.to_vec().as_deref() {
            Ok([Value::Symbol(name), expr]) => {
                if names.iter().any(|n| n == &**name) {
                    return Err(Error::SyntaxError(format!(
                        "let: duplicate binding for {name}"
                    )));
                }
                names.push(name.to_string());
                values.push(eval(expr, env)?);
            }
            _ => {
                return Err(Error::SyntaxError(format!(
                    "let: binding must have the form (name value), got {entry}"
                )));
            }
        }
    }

    eval_body(body, &env.create_child(&names, values))
}

/// Global registry of all special forms.
static SPECIAL_FORMS: &[SpecialForm] = &[
    SpecialForm { keyword: "quote", handler: eval_quote, arity: Arity::Exact(1) },
    SpecialForm { keyword: "quasiquote", handler: eval_quasiquote, arity: Arity::Exact(1) },
    SpecialForm { keyword: "unquote", handler: eval_unquote, arity: Arity::Any },
    SpecialForm { keyword: "if", handler: eval_if, arity: Arity::Range(2, 3) },
    SpecialForm { keyword: "and", handler: eval_and, arity: Arity::Any },
    SpecialForm { keyword: "or", handler: eval_or, arity: Arity::Any },
    SpecialForm { keyword: "lambda", handler: eval_lambda, arity: Arity::AtLeast(2) },
    SpecialForm { keyword: "define", handler: eval_define, arity: Arity::AtLeast(2) },
    SpecialForm { keyword: "set!", handler: eval_set, arity: Arity::Exact(2) },
    SpecialForm { keyword: "cond", handler: eval_cond, arity: Arity::AtLeast(1) },
    SpecialForm { keyword: "begin", handler: eval_begin, arity: Arity::Any },
    SpecialForm { keyword: "let", handler: eval_let, arity: Arity::AtLeast(2) },
];

static SPECIAL_FORM_TABLE: LazyLock<HashMap<&'static str, &'static SpecialForm>> =
    LazyLock::new(|| SPECIAL_FORMS.iter().map(|form| (form.keyword, form)).collect());

/// Find a special form by its keyword
pub fn find_special_form(keyword: &str) -> Option<&'static SpecialForm> {
    SPECIAL_FORM_TABLE.get(keyword).copied()
}

/// Every special-form keyword, in table order
pub fn special_form_keywords() -> impl Iterator<Item = &'static str> {
    SPECIAL_FORMS.iter().map(|form| form.keyword)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod registry_tests {
    use super::*;
    use crate::builtinops::find_scheme_op;

    #[test]
    fn test_special_form_table() {
        assert_eq!(find_special_form("if").unwrap().arity, Arity::Range(2, 3));
        assert!(find_special_form("car").is_none());
        assert_eq!(special_form_keywords().count(), SPECIAL_FORM_TABLE.len());

        // Keywords and builtins never overlap
        for keyword in special_form_keywords() {
            assert!(find_scheme_op(keyword).is_none(), "{keyword} is also a builtin");
        }
    }

    #[test]
    fn test_form_text() {
        assert_eq!(
            form_text("if", &[Value::Bool(true), Value::Number(1.0)]),
            "(if #t 1)"
        );
        assert_eq!(form_text("begin", &[]), "(begin)");
    }
}
