#![cfg(feature = "scheme")]
#![expect(clippy::unwrap_used)] // test code OK

use std::thread;

use minischeme::ast::Value;
use minischeme::evaluator::{self, create_global_env};
use minischeme::scheme::parse_scheme;
use minischeme::{Error, eval};
use proptest::prelude::*;

fn run(input: &str) -> Result<Value, Error> {
    eval(&parse_scheme(input).unwrap(), &create_global_env())
}

/// Data that the printer and the reader agree on
fn datum() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<f64>()
            .prop_filter("finite", |n| n.is_finite())
            .prop_map(Value::Number),
        (-1_000_000i32..1_000_000).prop_map(Value::from),
        ".*".prop_map(Value::from),
        "[a-z][a-z0-9!?*<>=-]{0,8}".prop_map(|s| Value::symbol(&s)),
        Just(Value::Nil),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Value::list)
    })
}

proptest! {
    #[test]
    fn prop_print_then_parse_round_trips(value in datum()) {
        let printed = value.to_string();
        let reparsed = parse_scheme(&printed).unwrap();
        prop_assert!(reparsed.is_equal(&value), "{printed} reparsed as {reparsed}");
    }

    #[test]
    fn prop_quote_returns_operand_unchanged(value in datum()) {
        let quoted = Value::list([Value::symbol("quote"), value.clone()]);
        let result = eval(&quoted, &create_global_env()).unwrap();
        prop_assert!(result.is_equal(&value));
    }

    #[test]
    fn prop_integer_arithmetic_prints_without_decimal_point(
        a in -1_000_000i64..1_000_000,
        b in -1_000_000i64..1_000_000,
    ) {
        let sum = run(&format!("(+ {a} {b})")).unwrap();
        prop_assert_eq!(sum.to_string(), (a + b).to_string());
        let product = run(&format!("(* {a} {b})")).unwrap();
        prop_assert_eq!(product.to_string(), (a * b).to_string());
        let difference = run(&format!("(- {a} {b})")).unwrap();
        prop_assert_eq!(difference.to_string(), (a - b).to_string());
    }

    #[test]
    fn prop_division_matches_float_division(
        a in -1000.0f64..1000.0,
        b in prop_oneof![-1000.0f64..-0.001, 0.001f64..1000.0],
    ) {
        let quotient = run(&format!("(/ {a} {b})")).unwrap();
        prop_assert_eq!(quotient, Value::Number(a / b));
    }

    #[test]
    fn prop_if_evaluates_only_chosen_branch(test in any::<bool>(), a in any::<i32>()) {
        // The branch not taken would fail if it were evaluated
        let test_text = if test { "#t" } else { "#f" };
        let form = if test {
            format!("(if {test_text} {a} (error \"not taken\"))")
        } else {
            format!("(if {test_text} (error \"not taken\") {a})")
        };
        prop_assert_eq!(run(&form).unwrap(), Value::from(a));
    }
}

#[test]
fn test_short_circuit_never_reaches_error() {
    assert_eq!(run("(and #f (error \"boom\"))").unwrap(), Value::Bool(false));
    assert_eq!(run("(or #t (error \"boom\"))").unwrap(), Value::Bool(true));
    assert!(run("(and #t (error \"boom\"))").is_err());
}

#[test]
fn test_let_initializers_see_outer_scope_only() {
    assert_eq!(
        run("(let ((x 1) (y x)) y)"),
        Err(Error::UnboundVariable("x".to_owned()))
    );
}

#[test]
fn test_arity_errors_for_every_special_form() {
    for form in [
        "(quote)",
        "(quote 1 2)",
        "(quasiquote)",
        "(if #t)",
        "(if 1 2 3 4)",
        "(lambda (x))",
        "(define)",
        "(define x)",
        "(define x 1 2)",
        "(set! x)",
        "(cond)",
        "(let ((x 1)))",
    ] {
        assert!(
            matches!(run(form), Err(Error::ArityError { .. })),
            "{form} should be an arity error, got {:?}",
            run(form)
        );
    }
}

#[test]
fn test_arity_errors_for_builtins() {
    for form in ["(car)", "(cons 1)", "(not 1 2)", "(newline 1)", "(<)", "(-)", "(exit 1 2)"] {
        assert!(
            matches!(run(form), Err(Error::ArityError { .. })),
            "{form} should be an arity error"
        );
    }
}

/// Runs `f` on a thread whose stack can hold a deep evaluation
fn with_deep_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn test_deep_recursion_completes_with_raised_limit() {
    let result = with_deep_stack(|| {
        evaluator::set_max_eval_depth(50_000);
        let env = create_global_env();
        let define = parse_scheme("(define (count n) (if (= n 0) 0 (+ 1 (count (- n 1)))))");
        eval(&define.unwrap(), &env).unwrap();
        eval(&parse_scheme("(count 5000)").unwrap(), &env).map(|v| v.to_string())
    });
    assert_eq!(result.unwrap(), "5000");
}

#[test]
fn test_runaway_recursion_reports_limit() {
    let result = with_deep_stack(|| {
        let env = create_global_env();
        let define = parse_scheme("(define (forever n) (+ 1 (forever n)))");
        eval(&define.unwrap(), &env).unwrap();
        eval(&parse_scheme("(forever 0)").unwrap(), &env).map(|v| v.to_string())
    });
    assert_eq!(result, Err(Error::RecursionLimit(minischeme::MAX_EVAL_DEPTH)));
}
