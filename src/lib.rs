//! minischeme - a tree-walking evaluator for a small Scheme-family language
//!
//! This crate evaluates S-expressions built from booleans, double-precision numbers,
//! strings, symbols, pairs and procedures. Programs are plain data: the parser hands
//! the evaluator a [`ast::Value`] tree and the evaluator walks it directly.
//!
//! ```scheme
//! (define (square x) (* x x))   ; procedure shorthand
//! (square 5)                    ; => 25
//! (let ((x 1) (y 2)) (+ x y))   ; => 3
//! `(1 ,(+ 1 1) 3)               ; => (1 2 3)
//! (cond ((> 1 2) 'no) (else 'yes))
//! ```
//!
//! ## Evaluation model
//!
//! - Only `#f` is false; the empty list `()` is a distinct, truthy value that may
//!   not be evaluated directly.
//! - Closures capture their defining [`evaluator::Environment`] by reference, so
//!   later definitions in that scope are visible to them.
//! - Special forms (`define`, `lambda`, `if`, `cond`, `let`, `and`, `or`, `begin`,
//!   `set!`, `quote`, `quasiquote`) are dispatched before any operand is evaluated.
//! - Evaluation is direct recursion. There is no tail-call elimination; the depth
//!   of nested evaluation is bounded by [`MAX_EVAL_DEPTH`] (adjustable at runtime
//!   with [`evaluator::set_max_eval_depth`]) so runaway recursion surfaces as
//!   [`Error::RecursionLimit`] rather than a crashed process.
//!
//! ## Modules
//!
//! - `ast`: the runtime value model
//! - `evaluator`: environments and the `eval`/`apply` pair
//! - `specialforms`: the keyword table and special-form handlers
//! - `builtinops`: builtin procedure registry and library
//! - `scheme`: S-expression parsing from text

use std::fmt;

use crate::builtinops::Arity;

/// Maximum parsing depth to prevent stack overflow attacks
/// This limits deeply nested lists and quote shorthands in the S-expression parser
pub const MAX_PARSE_DEPTH: usize = 128;

/// Default maximum evaluation depth
/// Every nested call of `eval` counts one level; a recursive procedure typically
/// consumes three levels per call. The default is sized for an ordinary main-thread
/// stack; hosts running on a larger stack can raise the limit with
/// [`evaluator::set_max_eval_depth`].
pub const MAX_EVAL_DEPTH: usize = 1024;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, context: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }

    /// Create a ParseError with context extracted from input at a given byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        // Show a little of what came before the error
        let context_start = input[..error_offset.min(input.len())]
            .char_indices()
            .rev()
            .nth(19)
            .map_or(0, |(i, _)| i);

        let context_str: String = input[context_start..].chars().take(MAX_CONTEXT).collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context))
    }

    /// True when more input could complete the expression
    pub fn is_incomplete(&self) -> bool {
        self.kind == ParseErrorKind::Incomplete
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
///
/// Every variant except [`Error::Exit`] is recoverable: a driver reports it and
/// keeps accepting input. Side effects performed before the error (for example
/// an earlier `define` in the same `begin`) are kept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}")]
    ParseError(ParseError),
    #[error("EvaluationError: {0}")]
    EvalError(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),
    #[error("{}", arity_message(.expected, .got, .expression))]
    ArityError {
        expected: Arity,
        got: usize,
        expression: Option<String>,
    },
    #[error("Evaluating nil is prohibited")]
    EvalNil,
    #[error("Not a procedure: {0}")]
    NotCallable(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Syntax error: {0}")]
    SyntaxError(String),
    #[error("Evaluation depth limit exceeded (max: {0})")]
    RecursionLimit(usize),
    #[error("exit requested with status {0}")]
    Exit(i32),
}

fn arity_message(expected: &Arity, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => format!("ArityError: expression {expr}: expected {expected} arguments, got {got}"),
        None => format!("ArityError: procedure expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: Arity, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// False only for conditions that must end the process
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Exit(_))
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::ParseError(err)
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod specialforms;

#[cfg(feature = "scheme")]
pub mod scheme;

pub use ast::Value;
pub use evaluator::{Environment, apply, create_global_env, eval};
