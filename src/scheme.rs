//! S-expression reader.
//!
//! Turns source text into [`Value`] trees: numbers, `#t`/`#f`, strings, symbols,
//! proper and dotted lists, the `'` `` ` `` `,` shorthands and `;` comments.
//! Parse failures are classified by [`ParseErrorKind`] so that an interactive
//! driver can tell unbalanced input (keep reading) from malformed input (report).

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    character::complete::{char, digit1, multispace1, one_of},
    combinator::{cut, opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::pair,
};

use crate::ast::{NumberType, SYMBOL_SPECIAL_CHARS, Value, is_valid_symbol};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters that may directly follow an atom
const DELIMITERS: &str = "()'`,;\"";

fn at_delimiter(input: &str) -> bool {
    input
        .chars()
        .next()
        .is_none_or(|c| c.is_whitespace() || DELIMITERS.contains(c))
}

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// A `;` comment up to (not including) the end of the line
fn parse_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(';'), take_till(|c| c == '\n'))).parse(input)
}

/// Skip any mix of whitespace and comments
fn skip_trivia(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, parse_comment)))).parse(input)
}

/// Parse a number: optional sign, digits, optional fraction and exponent
fn parse_number(input: &str) -> IResult<&str, Value> {
    let (remaining, number_str) = recognize((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;

    if !at_delimiter(remaining) {
        // e.g. `123abc`; symbol parsing rejects it as well
        return fail(input, ErrorKind::Digit);
    }

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((remaining, Value::Number(n))),
        Err(_) => fail(input, ErrorKind::Float),
    }
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> IResult<&str, Value> {
    let (remaining, b) = alt((
        value(Value::Bool(true), tag("#t")),
        value(Value::Bool(false), tag("#f")),
    ))
    .parse(input)?;

    if at_delimiter(remaining) {
        Ok((remaining, b))
    } else {
        fail(input, ErrorKind::Tag)
    }
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let mut symbol_chars =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c));

    let (remaining, candidate) = symbol_chars.parse(input)?;

    if is_valid_symbol(candidate) && at_delimiter(remaining) {
        Ok((remaining, Value::symbol(candidate)))
    } else {
        fail(input, ErrorKind::Alpha)
    }
}

/// Parse a string literal
///
/// Errors after the opening quote are failures: nothing else can match there.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut text = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Value::from(text))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(_) => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Escaped,
                        )));
                    }
                    None => {
                        // Backslash at end of input; more input may complete it
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            char_iter.as_str(),
                            ErrorKind::Escaped,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                text.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                // Reached end of input without finding closing quote
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// True when `input` starts with the dot of a dotted tail
fn at_dot(input: &str) -> bool {
    input
        .strip_prefix('.')
        .is_some_and(|rest| at_delimiter(rest))
}

/// Parse a proper or dotted list; `()` is nil
fn parse_list(input: &str, depth: usize) -> IResult<&str, Value> {
    let (mut input, _) = char('(').parse(input)?;
    let mut items = Vec::new();

    loop {
        let (rest, _) = skip_trivia(input)?;

        if let Some(rest) = rest.strip_prefix(')') {
            return Ok((rest, Value::list(items)));
        }

        if !items.is_empty() && at_dot(rest) {
            let (rest, tail) = cut(|i| parse_sexpr(i, depth + 1)).parse(&rest[1..])?;
            let (rest, _) = skip_trivia(rest)?;
            let (rest, _) = cut(char(')')).parse(rest)?;
            return Ok((rest, Value::list_with_tail(items, tail)));
        }

        // Once the list is open, a bad element is a hard failure
        let (rest, item) = cut(|i| parse_sexpr(i, depth + 1)).parse(rest)?;
        items.push(item);
        input = rest;
    }
}

/// Parse `'x`, `` `x `` and `,x` into `(quote x)`, `(quasiquote x)`, `(unquote x)`
fn parse_quote(input: &str, depth: usize) -> IResult<&str, Value> {
    let (input, prefix) = one_of("'`,").parse(input)?;
    let keyword = match prefix {
        '\'' => "quote",
        '`' => "quasiquote",
        _ => "unquote",
    };
    let (input, expr) = cut(|i| parse_sexpr(i, depth + 1)).parse(input)?;
    Ok((input, Value::list([Value::symbol(keyword), expr])))
}

/// Parse one S-expression, skipping leading whitespace and comments
fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    let (input, _) = skip_trivia(input)?;
    alt((
        |input| parse_quote(input, depth),
        |input| parse_list(input, depth),
        parse_number,
        parse_bool,
        parse_string,
        parse_symbol,
    ))
    .parse(input)
}

/// Only whitespace and comments remain
fn is_trivia(input: &str) -> bool {
    matches!(skip_trivia(input), Ok(("", _)))
}

/// Convert nom parsing errors to classified, user-friendly errors
fn to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            if e.code == ErrorKind::TooLarge {
                ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    input,
                    position,
                )
            } else if is_trivia(e.input) {
                ParseError::from_message(ParseErrorKind::Incomplete, "Unexpected end of input")
            } else {
                let near: String = e.input.chars().take(10).collect();
                ParseError::with_context(
                    ParseErrorKind::InvalidSyntax,
                    format!("Invalid syntax near '{near}' at position {position}"),
                    input,
                    position,
                )
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Parse exactly one S-expression from input.
///
/// Surrounding whitespace and comments are allowed; anything else after the
/// expression is a [`ParseErrorKind::TrailingContent`] error.
pub fn parse_scheme(input: &str) -> Result<Value, Error> {
    let (remaining, value) = parse_sexpr(input, 0).map_err(|e| to_parse_error(input, e))?;

    if is_trivia(remaining) {
        Ok(value)
    } else {
        let position = input.len() - remaining.len();
        Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input: '{}'", remaining.trim()),
            input,
            position,
        )
        .into())
    }
}

/// Parse every S-expression in input, in order
pub fn parse_program(input: &str) -> Result<Vec<Value>, Error> {
    let mut exprs = Vec::new();
    let mut remaining = input;

    while !is_trivia(remaining) {
        let (rest, expr) = parse_sexpr(remaining, 0).map_err(|e| to_parse_error(input, e))?;
        exprs.push(expr);
        remaining = rest;
    }

    Ok(exprs)
}
