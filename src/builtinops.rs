//! Built-in procedure registry.
//!
//! Every builtin is a plain function with the uniform calling convention
//! [`BuiltinFn`]: it receives its already-evaluated arguments plus the caller's
//! environment and returns a value or an [`Error`].
//!
//! ```scheme
//! (+ 1 2 3)              ; arithmetic
//! (equal? '(1 2) '(1 2)) ; structural equality
//! (map car '((1) (2)))   ; higher-order procedures re-enter the evaluator
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions** (this module): evaluate all arguments before application
//! - **Special Forms** (`specialforms`): control evaluation of their operands
//!
//! ## Error Handling
//!
//! - **Arity**: each registry entry declares an [`Arity`] that `apply` validates
//!   before the call, so a builtin never sees a wrong argument count
//! - **Types**: operations reject operands of the wrong variant with `TypeError`
//! - **Division**: dividing by zero fails with `DivisionByZero`
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the signature `fn(&[Value], &Environment) -> Result<Value, Error>`
//! 2. **Add it to BUILTIN_OPS** with its Scheme identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::{BuiltinFn, NumberType, Pair, Value, format_number};
use crate::evaluator::{self, Environment};

/// Number of arguments a procedure or special form accepts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::Any => true,
        }
    }

    /// Check if the given number of arguments is valid
    pub fn validate(&self, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(*self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "between {min} and {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Clone, Copy)]
pub struct BuiltinOp {
    /// The Scheme identifier for this operation
    pub scheme_id: &'static str,
    /// The implementation
    pub func: BuiltinFn,
    /// Expected number of arguments
    pub arity: Arity,
}

impl BuiltinOp {
    /// The procedure value bound to `scheme_id` in the global environment
    pub fn to_value(&self) -> Value {
        Value::builtin(self.scheme_id, self.arity, self.func)
    }
}

//
// Argument helpers
//

fn number_arg(op: &str, value: &Value) -> Result<NumberType, Error> {
    value.as_number().ok_or_else(|| {
        Error::TypeError(format!(
            "{op}: expected number, got {} {value}",
            value.type_name()
        ))
    })
}

fn integer_arg(op: &str, value: &Value) -> Result<NumberType, Error> {
    let n = number_arg(op, value)?;
    if n.fract() == 0.0 {
        Ok(n)
    } else {
        Err(Error::TypeError(format!("{op}: expected integer, got {value}")))
    }
}

fn pair_arg<'a>(op: &str, value: &'a Value) -> Result<&'a Rc<Pair>, Error> {
    value
        .as_pair()
        .ok_or_else(|| Error::TypeError(format!("{op}: expected pair, got {value}")))
}

fn list_arg(op: &str, value: &Value) -> Result<Vec<Value>, Error> {
    value
        .to_vec()
        .map_err(|_| Error::TypeError(format!("{op}: expected list, got {value}")))
}

fn string_arg<'a>(op: &str, value: &'a Value) -> Result<&'a str, Error> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(Error::TypeError(format!("{op}: expected string, got {value}"))),
    }
}

fn numbers<'a>(op: &'a str, args: &'a [Value]) -> impl Iterator<Item = Result<NumberType, Error>> + 'a {
    args.iter().map(move |arg| number_arg(op, arg))
}

//
// Arithmetic
//

fn builtin_add(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    let mut sum = 0.0;
    for n in numbers("+", args) {
        sum += n?;
    }
    Ok(Value::Number(sum))
}

fn builtin_sub(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [single] => Ok(Value::Number(-number_arg("-", single)?)),
        [first, rest @ ..] => {
            let mut result = number_arg("-", first)?;
            for n in numbers("-", rest) {
                result -= n?;
            }
            Ok(Value::Number(result))
        }
        [] => Err(Error::arity_error(Arity::AtLeast(1), 0)),
    }
}

fn builtin_mul(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    let mut product = 1.0;
    for n in numbers("*", args) {
        product *= n?;
    }
    Ok(Value::Number(product))
}

fn builtin_div(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    let (mut result, divisors) = match args {
        [single] => (1.0, std::slice::from_ref(single)),
        [first, rest @ ..] => (number_arg("/", first)?, rest),
        [] => return Err(Error::arity_error(Arity::AtLeast(1), 0)),
    };
    for n in numbers("/", divisors) {
        let n = n?;
        if n == 0.0 {
            return Err(Error::DivisionByZero);
        }
        result /= n;
    }
    Ok(Value::Number(result))
}

fn builtin_abs(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [x] => Ok(Value::Number(number_arg("abs", x)?.abs())),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

// Integer division family; results keep the sign conventions of R7RS
macro_rules! integer_division {
    ($name:ident, $op_str:expr, |$a:ident, $b:ident| $body:expr) => {
        fn $name(args: &[Value], _env: &Environment) -> Result<Value, Error> {
            match args {
                [x, y] => {
                    let $a = integer_arg($op_str, x)?;
                    let $b = integer_arg($op_str, y)?;
                    if $b == 0.0 {
                        return Err(Error::DivisionByZero);
                    }
                    Ok(Value::Number($body))
                }
                _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
            }
        }
    };
}

integer_division!(builtin_quotient, "quotient", |a, b| (a / b).trunc());
integer_division!(builtin_remainder, "remainder", |a, b| a % b);
integer_division!(builtin_modulo, "modulo", |a, b| ((a % b) + b) % b);

fn builtin_expt(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [base, exponent] => Ok(Value::Number(
            number_arg("expt", base)?.powf(number_arg("expt", exponent)?),
        )),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

macro_rules! numeric_extremum {
    ($name:ident, $op_str:expr, $method:ident) => {
        fn $name(args: &[Value], _env: &Environment) -> Result<Value, Error> {
            let mut iter = numbers($op_str, args);
            let Some(first) = iter.next() else {
                return Err(Error::arity_error(Arity::AtLeast(1), 0));
            };
            let mut result = first?;
            for n in iter {
                result = result.$method(n?);
            }
            Ok(Value::Number(result))
        }
    };
}

numeric_extremum!(builtin_max, "max", max);
numeric_extremum!(builtin_min, "min", min);

// Macro to generate chained numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value], _env: &Environment) -> Result<Value, Error> {
            if args.len() < 2 {
                return Err(Error::arity_error(Arity::AtLeast(2), args.len()));
            }

            // Type-check everything first so `(< 2 1 "x")` is still an error
            let values = numbers($op_str, args).collect::<Result<Vec<_>, _>>()?;

            // Chain comparisons: all adjacent pairs must satisfy the comparison
            Ok(Value::Bool(values.windows(2).all(|w| w[0] $op w[1])))
        }
    };
}

numeric_comparison!(builtin_num_eq, ==, "=");
numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");
numeric_comparison!(builtin_le, <=, "<=");
numeric_comparison!(builtin_ge, >=, ">=");

//
// Predicates
//

macro_rules! type_predicate {
    ($name:ident, |$v:ident| $test:expr) => {
        fn $name(args: &[Value], _env: &Environment) -> Result<Value, Error> {
            match args {
                [$v] => Ok(Value::Bool($test)),
                _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
            }
        }
    };
}

type_predicate!(builtin_is_number, |v| matches!(v, Value::Number(_)));
type_predicate!(builtin_is_boolean, |v| matches!(v, Value::Bool(_)));
type_predicate!(builtin_is_string, |v| matches!(v, Value::String(_)));
type_predicate!(builtin_is_symbol, |v| matches!(v, Value::Symbol(_)));
type_predicate!(builtin_is_null, |v| v.is_nil());
type_predicate!(builtin_is_pair, |v| matches!(v, Value::Pair(_)));
type_predicate!(builtin_is_list, |v| v.is_list());
type_predicate!(builtin_is_procedure, |v| v.is_procedure());
type_predicate!(builtin_is_atom, |v| matches!(
    v,
    Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Symbol(_) | Value::Nil
));
type_predicate!(builtin_is_integer, |v| matches!(v, Value::Number(n) if n.fract() == 0.0));
type_predicate!(builtin_not, |v| v.is_false());

fn builtin_is_zero(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [x] => Ok(Value::Bool(number_arg("zero?", x)? == 0.0)),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

macro_rules! parity_predicate {
    ($name:ident, $op_str:expr, $remainder:expr) => {
        fn $name(args: &[Value], _env: &Environment) -> Result<Value, Error> {
            match args {
                [x] => Ok(Value::Bool(
                    (integer_arg($op_str, x)? % 2.0).abs() == $remainder,
                )),
                _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
            }
        }
    };
}

parity_predicate!(builtin_is_odd, "odd?", 1.0);
parity_predicate!(builtin_is_even, "even?", 0.0);

fn builtin_eq(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [a, b] => Ok(Value::Bool(a.is_eqv(b))),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

fn builtin_equal(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [a, b] => Ok(Value::Bool(a.is_equal(b))),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

//
// Pairs and lists
//

fn builtin_cons(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [car, cdr] => Ok(Value::cons(car.clone(), cdr.clone())),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

fn builtin_car(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [pair] => Ok(pair_arg("car", pair)?.car()),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_cdr(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [pair] => Ok(pair_arg("cdr", pair)?.cdr()),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_set_car(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [pair, value] => {
            pair_arg("set-car!", pair)?.set_car(value.clone());
            Ok(Value::Nil)
        }
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

fn builtin_set_cdr(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [pair, value] => {
            pair_arg("set-cdr!", pair)?.set_cdr(value.clone());
            Ok(Value::Nil)
        }
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

fn builtin_list(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    Ok(Value::list(args.iter().cloned()))
}

fn builtin_length(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [list] => Ok(Value::Number(list_arg("length", list)?.len() as NumberType)),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

/// All arguments but the last are copied; the last becomes the shared tail
fn builtin_append(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    let Some((last, init)) = args.split_last() else {
        return Ok(Value::Nil);
    };
    let mut items = Vec::new();
    for list in init {
        items.extend(list_arg("append", list)?);
    }
    Ok(Value::list_with_tail(items, last.clone()))
}

fn builtin_reverse(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [list] => Ok(Value::list(list_arg("reverse", list)?.into_iter().rev())),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_list_ref(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [list, index] => {
            let items = list_arg("list-ref", list)?;
            let k = integer_arg("list-ref", index)?;
            if k < 0.0 || k >= items.len() as NumberType {
                return Err(Error::EvalError(format!(
                    "list-ref: index {} out of range for list of length {}",
                    format_number(k),
                    items.len()
                )));
            }
            Ok(items[k as usize].clone())
        }
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

//
// Higher-order procedures (re-enter the evaluator)
//

fn builtin_apply(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [procedure, list] => evaluator::apply(procedure, &list_arg("apply", list)?, env),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

fn builtin_map(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [procedure, list] => {
            let results = list_arg("map", list)?
                .into_iter()
                .map(|item| evaluator::apply(procedure, &[item], env))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(results))
        }
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

fn builtin_filter(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [predicate, list] => {
            let mut kept = Vec::new();
            for item in list_arg("filter", list)? {
                if !evaluator::apply(predicate, std::slice::from_ref(&item), env)?.is_false() {
                    kept.push(item);
                }
            }
            Ok(Value::list(kept))
        }
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

/// Right fold without an initial value: `(reduce f '(a b c))` is `(f a (f b c))`
fn builtin_reduce(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [procedure, list] => {
            let mut items = list_arg("reduce", list)?;
            let Some(mut acc) = items.pop() else {
                return Err(Error::TypeError(
                    "reduce: expected a non-empty list".to_owned(),
                ));
            };
            for item in items.into_iter().rev() {
                acc = evaluator::apply(procedure, &[item, acc], env)?;
            }
            Ok(acc)
        }
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

fn builtin_eval(args: &[Value], env: &Environment) -> Result<Value, Error> {
    match args {
        [expr] => evaluator::eval(expr, env),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

//
// Strings and symbols
//

fn builtin_string_append(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    let mut result = String::new();
    for arg in args {
        result.push_str(string_arg("string-append", arg)?);
    }
    Ok(Value::from(result))
}

fn builtin_symbol_to_string(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name)] => Ok(Value::string(name)),
        [other] => Err(Error::TypeError(format!(
            "symbol->string: expected symbol, got {other}"
        ))),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_string_to_symbol(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [s] => Ok(Value::symbol(string_arg("string->symbol", s)?)),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_number_to_string(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [n] => Ok(Value::from(format_number(number_arg("number->string", n)?))),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

//
// Output and control
//

fn builtin_display(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [Value::String(s)] => print!("{s}"),
        [other] => print!("{other}"),
        _ => return Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
    Ok(Value::Nil)
}

fn builtin_newline(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [] => {
            println!();
            Ok(Value::Nil)
        }
        _ => Err(Error::arity_error(Arity::Exact(0), args.len())),
    }
}

/// Writes the external representation followed by a newline
fn builtin_print(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    match args {
        [value] => {
            println!("{value}");
            Ok(Value::Nil)
        }
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_error(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    let parts: Vec<String> = args
        .iter()
        .map(|value| match value {
            Value::String(s) => s.to_string(),
            _ => format!("{value}"),
        })
        .collect();

    let message = if parts.is_empty() {
        "Error".to_string()
    } else {
        parts.join(" ")
    };

    Err(Error::EvalError(message))
}

fn builtin_exit(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    let code = match args {
        [] => 0,
        [code] => integer_arg("exit", code)? as i32,
        _ => return Err(Error::arity_error(Arity::Range(0, 1), args.len())),
    };
    Err(Error::Exit(code))
}

/// Global registry of all built-in operations.
static BUILTIN_OPS: &[BuiltinOp] = &[
    // Arithmetic operations
    BuiltinOp { scheme_id: "+", func: builtin_add, arity: Arity::Any },
    BuiltinOp { scheme_id: "-", func: builtin_sub, arity: Arity::AtLeast(1) },
    BuiltinOp { scheme_id: "*", func: builtin_mul, arity: Arity::Any },
    BuiltinOp { scheme_id: "/", func: builtin_div, arity: Arity::AtLeast(1) },
    BuiltinOp { scheme_id: "abs", func: builtin_abs, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "quotient", func: builtin_quotient, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "remainder", func: builtin_remainder, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "modulo", func: builtin_modulo, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "expt", func: builtin_expt, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "max", func: builtin_max, arity: Arity::AtLeast(1) },
    BuiltinOp { scheme_id: "min", func: builtin_min, arity: Arity::AtLeast(1) },
    // Comparison operations
    BuiltinOp { scheme_id: "=", func: builtin_num_eq, arity: Arity::AtLeast(2) },
    BuiltinOp { scheme_id: "<", func: builtin_lt, arity: Arity::AtLeast(2) },
    BuiltinOp { scheme_id: ">", func: builtin_gt, arity: Arity::AtLeast(2) },
    BuiltinOp { scheme_id: "<=", func: builtin_le, arity: Arity::AtLeast(2) },
    BuiltinOp { scheme_id: ">=", func: builtin_ge, arity: Arity::AtLeast(2) },
    // Predicates
    BuiltinOp { scheme_id: "number?", func: builtin_is_number, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "boolean?", func: builtin_is_boolean, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "string?", func: builtin_is_string, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "symbol?", func: builtin_is_symbol, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "null?", func: builtin_is_null, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "pair?", func: builtin_is_pair, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "list?", func: builtin_is_list, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "procedure?", func: builtin_is_procedure, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "atom?", func: builtin_is_atom, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "integer?", func: builtin_is_integer, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "zero?", func: builtin_is_zero, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "odd?", func: builtin_is_odd, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "even?", func: builtin_is_even, arity: Arity::Exact(1) },
    // Equality and logic
    BuiltinOp { scheme_id: "eq?", func: builtin_eq, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "equal?", func: builtin_equal, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "not", func: builtin_not, arity: Arity::Exact(1) },
    // List operations
    BuiltinOp { scheme_id: "cons", func: builtin_cons, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "car", func: builtin_car, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "cdr", func: builtin_cdr, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "set-car!", func: builtin_set_car, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "set-cdr!", func: builtin_set_cdr, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "list", func: builtin_list, arity: Arity::Any },
    BuiltinOp { scheme_id: "length", func: builtin_length, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "append", func: builtin_append, arity: Arity::Any },
    BuiltinOp { scheme_id: "reverse", func: builtin_reverse, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "list-ref", func: builtin_list_ref, arity: Arity::Exact(2) },
    // Higher-order procedures
    BuiltinOp { scheme_id: "apply", func: builtin_apply, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "map", func: builtin_map, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "filter", func: builtin_filter, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "reduce", func: builtin_reduce, arity: Arity::Exact(2) },
    BuiltinOp { scheme_id: "eval", func: builtin_eval, arity: Arity::Exact(1) },
    // String operations
    BuiltinOp { scheme_id: "string-append", func: builtin_string_append, arity: Arity::Any },
    BuiltinOp { scheme_id: "symbol->string", func: builtin_symbol_to_string, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "string->symbol", func: builtin_string_to_symbol, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "number->string", func: builtin_number_to_string, arity: Arity::Exact(1) },
    // Output and control
    BuiltinOp { scheme_id: "display", func: builtin_display, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "newline", func: builtin_newline, arity: Arity::Exact(0) },
    BuiltinOp { scheme_id: "print", func: builtin_print, arity: Arity::Exact(1) },
    BuiltinOp { scheme_id: "error", func: builtin_error, arity: Arity::Any },
    BuiltinOp { scheme_id: "exit", func: builtin_exit, arity: Arity::Range(0, 1) },
];

/// Lazy static map from scheme_id to BuiltinOp (private - use find_scheme_op)
static BUILTIN_SCHEME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| BUILTIN_OPS.iter().map(|op| (op.scheme_id, op)).collect());

/// Get all builtin operations (for internal use by evaluator)
pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS
}

/// Find a builtin operation by its Scheme identifier
pub fn find_scheme_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_SCHEME.get(id).copied()
}
