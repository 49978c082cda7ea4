use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use minilisp::Batch;
use minilisp::builtinops::get_builtin_ops;
use minilisp::evaluator::Environment;
use minilisp::wire::{BatchRequest, handle_request_body};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// minilisp evaluates batches of parenthesized expressions such as
/// `(puts (concat "hello " "world"))`.
///
/// By default a JSON request body `{"expressions": [...]}` is read from
/// stdin and the response `{"output": [...]}` is written to stdout.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Read the JSON request body from this file ("-" for stdin)
    #[arg(short, long, conflicts_with = "repl")]
    file: Option<PathBuf>,

    /// Start an interactive session; every line joins one batch
    #[arg(short, long)]
    repl: bool,

    /// Pretty-print the JSON response
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let result = if args.repl {
        run_repl()
    } else {
        run_request(args.file.as_ref(), args.pretty)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn read_body(file: Option<&PathBuf>) -> Result<String, String> {
    match file {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path).map_err(|e| {
            format!(
                "Failed to read the request file '{}': {e}",
                path.display()
            )
        }),
        _ => {
            let mut body = String::new();
            io::stdin()
                .read_to_string(&mut body)
                .map_err(|e| format!("Failed to read the request from stdin: {e}"))?;
            Ok(body)
        }
    }
}

fn run_request(file: Option<&PathBuf>, pretty: bool) -> Result<(), String> {
    let body = read_body(file)?;

    let response = if pretty {
        serde_json::from_str::<BatchRequest>(&body)
            .and_then(|request| serde_json::to_string_pretty(&request.evaluate()))
    } else {
        handle_request_body(&body)
    };
    let response = response.map_err(|e| format!("Invalid request body: {e}"))?;

    println!("{response}");
    Ok(())
}

fn run_repl() -> Result<(), String> {
    println!("minilisp batch evaluator");
    println!("Enter expressions like: (add 1 2)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl =
        DefaultEditor::new().map_err(|e| format!("Could not initialize REPL: {e}"))?;
    let mut batch = Batch::new();

    loop {
        match rl.readline("minilisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(batch.environment());
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match batch.evaluate_line(line) {
                    Ok(new_lines) => {
                        for output in new_lines {
                            println!("{output}");
                        }
                    }
                    Err(e) => println!("{e} ({})", e.kind),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(format!("Error: {err:?}")),
        }
    }

    Ok(())
}

fn print_help() {
    println!("minilisp interactive session:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current variable bindings");
    println!("  :quit      - Exit the session");
    println!("  :exit      - Exit the session");
    println!("  Ctrl+C     - Exit the session");
    println!();
    println!("Every line is one expression of a single batch: variables set with");
    println!("(set \"name\" value) persist, and _ holds the previous line's result.");
    println!("A failing line is reported and leaves the session unchanged.");
    println!();

    println!("Built-in operations:");
    let mut col = 0;
    for op in get_builtin_ops() {
        print!("  {:<15}", op.name);
        col += 1;
        if col % 4 == 0 {
            println!();
        }
    }
    if col % 4 != 0 {
        println!();
    }
    println!();

    println!("Examples:");
    println!("  (puts (concat \"hello \" \"world\"))");
    println!("  (set \"x\" (divide 10 4))");
    println!("  (add x (multiply 2 3))");
    println!("  (str _)");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    for (name, value) in bindings {
        println!("  {name} = {value} ({})", value.type_name());
    }
}
