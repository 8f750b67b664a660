//! This module defines the runtime value model of the interpreter. The main enum,
//! [`Value`], covers every datum a program can produce or consume: booleans, numbers,
//! strings, symbols, the empty list, cons pairs, builtin procedures and closures.
//! Parsed programs use the same type, so an expression tree is simply a `Value`.
//!
//! Lists are right-nested chains of [`Pair`]s terminated by [`Value::Nil`]. Pairs are
//! shared through `Rc` and their fields sit in `RefCell`s so that `set-car!` and
//! `set-cdr!` are visible through every reference to the pair.
//!
//! Ergonomic helpers such as [`val`], [`sym`] and [`nil`] are provided for building
//! trees in code and tests, together with `From` conversions for Rust literals,
//! arrays and vectors.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::builtinops::Arity;
use crate::evaluator::Environment;

/// Type alias for number values in interpreter
pub type NumberType = f64;

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$.%&:~^";

/// Check if a string is a valid symbol name
/// Valid: non-empty, not a lone ".", no leading digit, no "-digit"/"+digit"/".digit"
/// prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() || name == "." {
                return false;
            }

            if matches!(first_char, '-' | '+' | '.')
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// Calling convention shared by every builtin procedure.
///
/// The environment is the caller's, so procedures such as `map`, `apply` and
/// `eval` can re-enter the evaluator.
pub type BuiltinFn = fn(&[Value], &Environment) -> Result<Value, Error>;

/// A cons cell
pub struct Pair {
    car: RefCell<Value>,
    cdr: RefCell<Value>,
}

impl Pair {
    pub fn new(car: Value, cdr: Value) -> Self {
        Pair {
            car: RefCell::new(car),
            cdr: RefCell::new(cdr),
        }
    }

    pub fn car(&self) -> Value {
        self.car.borrow().clone()
    }

    pub fn cdr(&self) -> Value {
        self.cdr.borrow().clone()
    }

    pub fn set_car(&self, value: Value) {
        *self.car.borrow_mut() = value;
    }

    pub fn set_cdr(&self, value: Value) {
        *self.cdr.borrow_mut() = value;
    }
}

impl Drop for Pair {
    // Unlink the cdr chain iteratively so long lists don't overflow the stack
    fn drop(&mut self) {
        let mut next = std::mem::replace(self.cdr.get_mut(), Value::Nil);
        while let Value::Pair(rc) = next {
            match Rc::try_unwrap(rc) {
                Ok(mut pair) => next = std::mem::replace(pair.cdr.get_mut(), Value::Nil),
                Err(_) => break,
            }
        }
    }
}

/// A user-defined procedure: parameter names, body expressions and the
/// environment that was active where the `lambda` was evaluated.
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Vec<Value>,
    pub env: Environment,
}

/// Core value type of the interpreter
///
/// To build a tree, use the ergonomic helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for the empty list
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Value {
    /// Boolean values; only `#f` is false
    Bool(bool),
    /// Numbers (double precision)
    Number(NumberType),
    /// String literals; the allocation is the string's identity for `eq?`
    String(Rc<str>),
    /// Symbols (identifiers)
    Symbol(Rc<str>),
    /// The empty list
    Nil,
    /// Cons cells
    Pair(Rc<Pair>),
    /// Built-in procedures, compared by function identity
    BuiltinFunction {
        id: Rc<str>,
        func: BuiltinFn,
        arity: Arity,
    },
    /// User-defined procedures (closures), compared by identity
    Function(Rc<Lambda>),
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(Pair::new(car, cdr)))
    }

    /// Build a proper list from the given elements
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        Self::list_with_tail(items, Value::Nil)
    }

    /// Build a chain of pairs ending in `tail` (improper unless `tail` is a list)
    pub fn list_with_tail<I>(items: I, tail: Value) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    pub fn string(text: &str) -> Value {
        Value::String(Rc::from(text))
    }

    pub fn builtin(id: &str, arity: Arity, func: BuiltinFn) -> Value {
        Value::BuiltinFunction {
            id: Rc::from(id),
            func,
            arity,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// True only for `#f`
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn is_self_evaluating(&self) -> bool {
        match self {
            Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::BuiltinFunction { .. }
            | Value::Function(_) => true,
            Value::Symbol(_) | Value::Nil | Value::Pair(_) => false,
        }
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::BuiltinFunction { .. } | Value::Function(_))
    }

    /// A value is a list iff it is nil or a pair whose cdr is a list
    pub fn is_list(&self) -> bool {
        let mut current = self.clone();
        loop {
            match current {
                Value::Nil => return true,
                Value::Pair(pair) => current = pair.cdr(),
                _ => return false,
            }
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<NumberType> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<&Rc<Pair>> {
        match self {
            Value::Pair(pair) => Some(pair),
            _ => None,
        }
    }

    /// Collect the elements of a proper list
    pub fn to_vec(&self) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        let mut current = self.clone();
        loop {
            match current {
                Value::Nil => return Ok(items),
                Value::Pair(pair) => {
                    items.push(pair.car());
                    current = pair.cdr();
                }
                _ => {
                    return Err(Error::TypeError(format!(
                        "expected a proper list, got {self}"
                    )));
                }
            }
        }
    }

    /// Structural equality, as used by `equal?`
    ///
    /// Pairs compare recursively, atoms by value, procedures by identity.
    pub fn is_equal(&self, other: &Value) -> bool {
        let (mut left, mut right) = (self.clone(), other.clone());
        // Recurse into cars, iterate along cdrs
        loop {
            match (&left, &right) {
                (Value::Pair(a), Value::Pair(b)) => {
                    if Rc::ptr_eq(a, b) {
                        return true;
                    }
                    if !a.car().is_equal(&b.car()) {
                        return false;
                    }
                    let (next_left, next_right) = (a.cdr(), b.cdr());
                    left = next_left;
                    right = next_right;
                }
                (Value::String(a), Value::String(b)) => return a == b,
                _ => return left.is_eqv(&right),
            }
        }
    }

    /// Identity equality, as used by `eq?`
    ///
    /// Booleans, numbers, symbols and nil compare by value; strings, pairs and
    /// procedures compare by identity.
    pub fn is_eqv(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::BuiltinFunction { func: f1, .. }, Value::BuiltinFunction { func: f2, .. }) => {
                std::ptr::fn_addr_eq(*f1, *f2)
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Nil => "nil",
            Value::Pair(_) => "pair",
            Value::BuiltinFunction { .. } | Value::Function(_) => "procedure",
        }
    }
}

/// Format a number the way the printer shows it: integral values without a
/// decimal point, everything else in shortest round-trip form.
pub(crate) fn format_number(n: NumberType) -> String {
    // 2^53: beyond this not every integer is representable
    const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;
    if n.is_finite() && n.fract() == 0.0 && n.abs() < EXACT_LIMIT {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Nil => write!(f, "()"),
            Value::Pair(pair) => {
                write!(f, "({}", pair.car())?;
                let mut rest = pair.cdr();
                loop {
                    match rest {
                        Value::Nil => break,
                        Value::Pair(next) => {
                            write!(f, " {}", next.car())?;
                            rest = next.cdr();
                        }
                        tail => {
                            write!(f, " . {tail}")?;
                            break;
                        }
                    }
                }
                write!(f, ")")
            }
            Value::BuiltinFunction { id, .. } => write!(f, "#<procedure:{id}>"),
            Value::Function(_) => write!(f, "#<procedure>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Nil => write!(f, "Nil"),
            Value::Pair(_) => write!(f, "Pair{self}"),
            Value::BuiltinFunction { id, arity, .. } => {
                write!(f, "BuiltinFunction({id}, {arity})")
            }
            Value::Function(lambda) => {
                write!(f, "Function(params={:?}, body=[", lambda.params)?;
                for (i, expr) in lambda.body.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{expr}")?;
                }
                write!(f, "])")
            }
        }
    }
}

/// `==` on values is structural (`equal?`) equality
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

// Integer types that convert to f64 without loss
impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into))
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into))
    }
}

/// Helper function for creating symbols
#[cfg(test)]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::symbol(name.as_ref())
}

/// Helper function for creating Values from anything convertible
#[cfg(test)]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list
#[cfg(test)]
pub(crate) fn nil() -> Value {
    Value::Nil
}

#[cfg(test)]
mod helper_function_tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Number(42.0)),
            (val(-17), Value::Number(-17.0)),
            (val(2.5), Value::Number(2.5)),
            (val(255u8), Value::Number(255.0)),
            (val(4294967295u32), Value::Number(4294967295.0)),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::string("hello")),
            (sym("foo-bar?"), Value::symbol("foo-bar?")),
            (nil(), Value::Nil),
            (
                val([1, 2, 3]),
                Value::cons(
                    val(1),
                    Value::cons(val(2), Value::cons(val(3), Value::Nil)),
                ),
            ),
            (
                val(vec![sym("operation"), val(42), val("result")]),
                Value::list([sym("operation"), val(42), val("result")]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert!(
                actual.is_equal(expected),
                "Test case {} failed:\n  Expected: {:?}\n  Got: {:?}",
                i + 1,
                expected,
                actual
            );
        }
    }

    #[test]
    fn test_display() {
        let cases = vec![
            (val(true), "#t"),
            (val(false), "#f"),
            (val(42), "42"),
            (val(-3), "-3"),
            (val(-0.0), "0"),
            (val(2.5), "2.5"),
            (val(0.1), "0.1"),
            (val(1.5e-7), "0.00000015"),
            (val("a\"b\\c\nd"), r#""a\"b\\c\nd""#),
            (sym("hello"), "hello"),
            (nil(), "()"),
            (val([1, 2, 3]), "(1 2 3)"),
            (Value::cons(val(1), val(2)), "(1 . 2)"),
            (
                Value::list_with_tail([val(1), val(2)], val(3)),
                "(1 2 . 3)",
            ),
            (val(vec![val([1]), nil(), val("x")]), "((1) () \"x\")"),
        ];

        for (value, expected) in cases {
            assert_eq!(value.to_string(), expected, "display of {value:?}");
        }
    }

    #[test]
    fn test_is_list_and_to_vec() {
        assert!(nil().is_list());
        assert!(val([1, 2]).is_list());
        assert!(!Value::cons(val(1), val(2)).is_list());
        assert!(!val(1).is_list());

        assert_eq!(nil().to_vec().unwrap().len(), 0);
        let items = val([1, 2, 3]).to_vec().unwrap();
        assert_eq!(items, vec![val(1), val(2), val(3)]);

        let improper = Value::list_with_tail([val(1)], val(2));
        assert!(matches!(improper.to_vec(), Err(Error::TypeError(_))));
        assert!(matches!(sym("x").to_vec(), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_truthiness_and_self_evaluation() {
        assert!(val(false).is_false());
        assert!(!val(true).is_false());
        assert!(!nil().is_false());
        assert!(!val(0).is_false());

        assert!(val(1).is_self_evaluating());
        assert!(val("s").is_self_evaluating());
        assert!(val(true).is_self_evaluating());
        assert!(!sym("x").is_self_evaluating());
        assert!(!nil().is_self_evaluating());
        assert!(!val([1]).is_self_evaluating());
    }

    #[test]
    fn test_equality_rules() {
        // Structural equality
        assert!(val([1, 2]).is_equal(&val([1, 2])));
        assert!(!val([1, 2]).is_equal(&val([1, 3])));
        assert!(val("abc").is_equal(&val("abc")));
        assert!(!val(1).is_equal(&val("1")));
        assert!(!nil().is_equal(&val(false)));

        // Identity equality
        let s = val("abc");
        assert!(s.is_eqv(&s.clone()));
        assert!(!s.is_eqv(&val("abc")));
        let p = val([1]);
        assert!(p.is_eqv(&p.clone()));
        assert!(!p.is_eqv(&val([1])));
        assert!(sym("a").is_eqv(&sym("a")));
        assert!(val(2).is_eqv(&val(2.0)));
        assert!(nil().is_eqv(&nil()));
    }

    #[test]
    fn test_pair_mutation_is_shared() {
        let list = val([1, 2]);
        let alias = list.clone();
        list.as_pair().unwrap().set_car(val(10));
        assert_eq!(alias.to_string(), "(10 2)");
        alias.as_pair().unwrap().set_cdr(val(3));
        assert_eq!(list.to_string(), "(10 . 3)");
    }

    #[test]
    fn test_long_list_drop() {
        let long = Value::list((0..200_000).map(val));
        assert!(long.is_list());
        drop(long);
    }

    #[test]
    fn test_symbol_validity() {
        for name in ["x", "set-car!", "null?", "->", "+", "-", "...", "a.b", "<=?"] {
            assert!(is_valid_symbol(name), "{name} should be valid");
        }
        for name in ["", ".", "1x", "-1", "+2", ".5", "a b", "a(b"] {
            assert!(!is_valid_symbol(name), "{name} should be invalid");
        }
    }
}
