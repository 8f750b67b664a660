use std::fs;
use std::process;
use std::thread;

use minischeme::ast::Value;
use minischeme::evaluator::{self, Environment};
use minischeme::scheme::parse_program;
use minischeme::specialforms::special_form_keywords;
use minischeme::{Error, MAX_EVAL_DEPTH};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Evaluation recurses on the native stack, so it runs on a thread with room for it
const EVAL_STACK_SIZE: usize = 512 * 1024 * 1024;

/// Depth limit that fits in `EVAL_STACK_SIZE`
const DEFAULT_MAX_DEPTH: usize = 100_000;

const USAGE: &str = "\
Usage: minischeme [OPTIONS] [FILE]

Evaluates FILE, or starts an interactive session when no FILE is given.

Options:
  --max-depth N   Maximum evaluation depth (default: 100000)
  -h, --help      Show this help message

Set RUST_LOG (for example RUST_LOG=debug) to see interpreter tracing on stderr.";

#[derive(Debug, PartialEq)]
struct Options {
    file: Option<String>,
    max_depth: usize,
}

#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Run(Options),
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, String> {
    let mut file = None;
    let mut max_depth = DEFAULT_MAX_DEPTH;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--max-depth" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--max-depth requires a value".to_owned())?;
                max_depth = value
                    .parse()
                    .map_err(|_| format!("invalid --max-depth value: {value}"))?;
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("unknown option: {flag}"));
            }
            path => {
                if file.replace(path.to_owned()).is_some() {
                    return Err("only one FILE may be given".to_owned());
                }
            }
        }
    }

    Ok(Command::Run(Options { file, max_depth }))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            println!("{USAGE}");
            return;
        }
        Err(message) => {
            eprintln!("Error: {message}\n\n{USAGE}");
            process::exit(2);
        }
    };

    let spawned = thread::Builder::new()
        .name("minischeme-eval".to_owned())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(move || {
            evaluator::set_max_eval_depth(options.max_depth);
            match options.file {
                Some(path) => run_file(&path),
                None => run_repl(),
            }
        });

    let code = match spawned.map(thread::JoinHandle::join) {
        Ok(Ok(code)) => code,
        Ok(Err(panic_info)) => {
            eprintln!("The interpreter encountered an unexpected error and must exit.");

            if let Some(msg) = panic_info.downcast_ref::<&str>() {
                eprintln!("Error: {msg}");
            } else if let Some(msg) = panic_info.downcast_ref::<String>() {
                eprintln!("Error: {msg}");
            } else {
                eprintln!("Error: Unknown panic occurred");
            }
            1
        }
        Err(err) => {
            eprintln!("Error: could not start the evaluator thread: {err}");
            1
        }
    };

    process::exit(code);
}

/// Evaluate every form of a source file; returns the process exit status
fn run_file(path: &str) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error: cannot read {path}: {err}");
            return 1;
        }
    };

    let exprs = match parse_program(&source) {
        Ok(exprs) => exprs,
        Err(err) => {
            eprintln!("Error: {err}");
            return 1;
        }
    };
    debug!(path, forms = exprs.len(), "loaded program");

    let env = evaluator::create_global_env();
    for expr in &exprs {
        match evaluator::eval(expr, &env) {
            Ok(_) => {}
            Err(Error::Exit(code)) => return code,
            Err(err) => {
                eprintln!("Error: {err}");
                return 1;
            }
        }
    }
    0
}

/// Interactive loop; returns the process exit status
fn run_repl() -> i32 {
    println!("minischeme - a small Scheme-family interpreter");
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Error: could not initialize line editor: {err}");
            return 1;
        }
    };
    let env = evaluator::create_global_env();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { ">>> " } else { "... " };
        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    match line.trim() {
                        "" => continue,
                        ":help" => {
                            let _ = rl.add_history_entry(line.trim());
                            print_help();
                            continue;
                        }
                        ":env" => {
                            let _ = rl.add_history_entry(line.trim());
                            print_environment(&env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            return 0;
                        }
                        _ => {}
                    }
                }

                buffer.push_str(&line);
                buffer.push('\n');

                // Keep reading until the brackets balance
                let exprs = match parse_program(&buffer) {
                    Err(Error::ParseError(err)) if err.is_incomplete() => continue,
                    result => {
                        let _ = rl.add_history_entry(buffer.trim());
                        buffer.clear();
                        result
                    }
                };

                match exprs {
                    Ok(exprs) => {
                        if let Some(code) = eval_and_print(&exprs, &env) {
                            return code;
                        }
                    }
                    Err(err) => println!("Error: {err}"),
                }
            }

            // Ctrl+C abandons a partial expression
            Err(ReadlineError::Interrupted) if !buffer.is_empty() => buffer.clear(),

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                return 0;
            }
            Err(err) => {
                println!("Error: {err:?}");
                return 1;
            }
        }
    }
}

/// Evaluate forms in order, printing non-nil results; stops at the first error.
/// Returns the exit status if the program asked to exit.
fn eval_and_print(exprs: &[Value], env: &Environment) -> Option<i32> {
    for expr in exprs {
        match evaluator::eval(expr, env) {
            Ok(Value::Nil) => {}
            Ok(result) => println!("{result}"),
            Err(Error::Exit(code)) => return Some(code),
            Err(err) => {
                println!("Error: {err}");
                break;
            }
        }
    }
    None
}

fn print_help() {
    println!("minischeme commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!("  Ctrl+C     - Discard a partially entered expression");
    println!();
    println!("Special forms:");
    println!("  {}", special_form_keywords().collect::<Vec<_>>().join(" "));
    println!();
    println!("Examples:");
    println!("  (define (square x) (* x x))");
    println!("  (square 5)");
    println!("  (let ((x 1) (y 2)) (+ x y))");
    println!("  (map (lambda (n) (* n n)) '(1 2 3))");
    println!("  `(1 ,(+ 1 1) 3)");
    println!();
    println!(
        "Evaluation depth limit: {} (library default {MAX_EVAL_DEPTH})",
        evaluator::max_eval_depth()
    );
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::BuiltinFunction { .. } => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in procedures ({}):", builtins.len());
        // Print in columns for readability
        for row in builtins.chunks(4) {
            let line: String = row.iter().map(|name| format!("  {name:<15}")).collect();
            println!("{}", line.trim_end());
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
