#![cfg(feature = "scheme")]
#![expect(clippy::unwrap_used)] // test code OK

use minischeme::ast::Value;
use minischeme::evaluator::{Environment, create_global_env};
use minischeme::scheme::parse_program;
use minischeme::{Error, eval};

/// Evaluate every form of `source` in `env`, returning the last result
fn run_program(env: &Environment, source: &str) -> Result<Value, Error> {
    let mut result = Value::Nil;
    for expr in parse_program(source)? {
        result = eval(&expr, env)?;
    }
    Ok(result)
}

/// Evaluate a whole program in a fresh global environment and print the result
fn result_of(source: &str) -> String {
    match run_program(&create_global_env(), source) {
        Ok(value) => value.to_string(),
        Err(err) => panic!("program failed: {err}\n{source}"),
    }
}

#[test]
fn test_recursive_procedures() {
    let source = r"
        (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))
        (define (fib n) (cond ((< n 2) n) (else (+ (fib (- n 1)) (fib (- n 2))))))
        (list (fact 10) (fib 15))
    ";
    assert_eq!(result_of(source), "(3628800 610)");
}

#[test]
fn test_closures_share_state() {
    let source = r#"
        (define (make-account balance)
          (define (withdraw amount)
            (if (> amount balance)
                (error 'insufficient-funds)
                (begin (set! balance (- balance amount)) balance)))
          (define (deposit amount)
            (set! balance (+ balance amount))
            balance)
          (lambda (op amount)
            (cond ((eq? op 'withdraw) (withdraw amount))
                  ((eq? op 'deposit) (deposit amount))
                  (else (error "unknown op" op)))))
        (define acc (make-account 100))
        (acc 'withdraw 30)
        (acc 'deposit 5)
        (acc 'withdraw 0)
    "#;
    assert_eq!(result_of(source), "75");
}

#[test]
fn test_closure_observes_later_definitions() {
    let env = create_global_env();
    run_program(&env, "(define (read-y) y)").unwrap();
    assert_eq!(
        run_program(&env, "(read-y)"),
        Err(Error::UnboundVariable("y".to_owned()))
    );
    run_program(&env, "(define y 'late)").unwrap();
    assert_eq!(run_program(&env, "(read-y)").unwrap().to_string(), "late");
}

#[test]
fn test_list_library() {
    let cases = [
        ("(append '(1 2) '(3) '() '(4 5))", "(1 2 3 4 5)"),
        ("(reverse '(1 (2 3) 4))", "(4 (2 3) 1)"),
        ("(length '(a b c))", "3"),
        ("(list-ref '(a b c) 2)", "c"),
        ("(map (lambda (x) (* x x)) '(1 2 3 4))", "(1 4 9 16)"),
        ("(filter (lambda (x) (> x 2)) '(1 2 3 4))", "(3 4)"),
        ("(reduce + '(1 2 3 4 5))", "15"),
        ("(apply max '(3 9 2))", "9"),
        ("(cons 1 2)", "(1 . 2)"),
        ("(cons 1 '(2))", "(1 2)"),
        ("(car (cdr '(1 2 3)))", "2"),
        ("(list? '(1 2))", "#t"),
        ("(pair? '())", "#f"),
        ("(eval (list '+ 1 2))", "3"),
    ];
    for (source, expected) in cases {
        assert_eq!(result_of(source), expected, "{source}");
    }
}

#[test]
fn test_strings_and_symbols() {
    let cases = [
        ("(string-append \"foo\" \"bar\")", "\"foobar\""),
        ("(symbol->string 'abc)", "\"abc\""),
        ("(string->symbol \"xyz\")", "xyz"),
        ("(number->string 3.5)", "\"3.5\""),
        ("\"line\\nbreak\"", "\"line\\nbreak\""),
        ("(equal? \"ab\" (string-append \"a\" \"b\"))", "#t"),
    ];
    for (source, expected) in cases {
        assert_eq!(result_of(source), expected, "{source}");
    }
}

#[test]
fn test_number_formatting() {
    let cases = [
        ("(/ 1 2)", "0.5"),
        ("(/ 10 4)", "2.5"),
        ("(* 1.5 2)", "3"),
        ("(- 0.0)", "0"),
        ("(/ 1 3)", "0.3333333333333333"),
        ("(expt 2 60)", "1152921504606846976"),
        ("(quotient 17 5)", "3"),
    ];
    for (source, expected) in cases {
        assert_eq!(result_of(source), expected, "{source}");
    }
}

#[test]
fn test_quasiquote_templates() {
    let source = r"
        (define n 3)
        (define items '(a b))
        `(n is ,n (items ,items) sum ,(+ n 1) . ,n)
    ";
    assert_eq!(result_of(source), "(n is 3 (items (a b)) sum 4 . 3)");
}

#[test]
fn test_mutation_visible_through_aliases() {
    let source = r"
        (define a (list 1 2 3))
        (define b (cdr a))
        (set-car! b 20)
        (set-cdr! b '(30))
        a
    ";
    assert_eq!(result_of(source), "(1 20 30)");
}

#[test]
fn test_errors_keep_earlier_side_effects() {
    let env = create_global_env();
    let err = run_program(&env, "(define kept 1) (car 5) (define skipped 2)").unwrap_err();
    assert!(matches!(err, Error::TypeError(_)));
    assert_eq!(run_program(&env, "kept").unwrap().to_string(), "1");
    assert!(env.get("skipped").is_none());
    assert!(err.is_recoverable());
}

#[test]
fn test_exit_is_not_recoverable() {
    let env = create_global_env();
    let err = run_program(&env, "(exit 4)").unwrap_err();
    assert_eq!(err, Error::Exit(4));
    assert!(!err.is_recoverable());
}

#[test]
fn test_error_kinds_from_programs() {
    let env = create_global_env();
    let cases: [(&str, fn(&Error) -> bool); 7] = [
        ("()", |e| matches!(e, Error::EvalNil)),
        ("(1 2)", |e| matches!(e, Error::NotCallable(_))),
        ("(/ 1 0)", |e| matches!(e, Error::DivisionByZero)),
        ("(car '())", |e| matches!(e, Error::TypeError(_))),
        ("(cond (1 . 2))", |e| matches!(e, Error::SyntaxError(_))),
        ("nope", |e| matches!(e, Error::UnboundVariable(_))),
        ("(+ 1", |e| matches!(e, Error::ParseError(p) if p.is_incomplete())),
    ];
    for (source, check) in cases {
        let err = run_program(&env, source).unwrap_err();
        assert!(check(&err), "{source}: unexpected error {err:?}");
    }
}
