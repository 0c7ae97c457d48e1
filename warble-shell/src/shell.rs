//! The interactive REPL and the script runner.

use rustyline::{error::ReadlineError, history::MemHistory, Config, Editor};
use std::fs;
use warble::{Interp, Value, WarbleList};

/// Invokes an interactive REPL for the given interpreter, using `rustyline`
/// line editing.
///
/// Input accumulates across lines until it forms a syntactically complete
/// script (per [`Interp::complete`]), so braced bodies can span lines.
/// Non-empty results are printed and also recorded in numbered history
/// variables, so `$1`, `$2`, ... name earlier results.  Press `^D` (or `^C`
/// at an empty prompt) to leave the REPL.
pub fn repl(interp: &mut Interp) {
    let mut rl = match Editor::<(), MemHistory>::with_history(Config::default(), MemHistory::new())
    {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("cannot initialize line editor: {}", e);
            return;
        }
    };

    let mut buffer = String::new();
    let mut counter = 1i64;

    loop {
        let prompt = if buffer.is_empty() { "% " } else { "> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim().is_empty() {
                    continue;
                }
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);
                if !interp.complete(&buffer) {
                    continue;
                }

                let script = std::mem::take(&mut buffer);
                if let Err(e) = rl.add_history_entry(script.as_str()) {
                    eprintln!("history error: {}", e);
                }

                match interp.eval(&script) {
                    Ok(value) => {
                        // Traditionally, empty results are not printed.
                        if !value.is_empty() {
                            println!("${} = {}", counter, value);
                            let _ = interp.set_var(&counter.to_string(), value);
                            counter += 1;
                        }
                    }
                    Err(exception) => {
                        println!("ERROR: {}", exception.value());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                if buffer.is_empty() {
                    break;
                }
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("I/O error: {:?}", err);
                break;
            }
        }
    }
}

/// Executes a script file.  The remaining command-line arguments are passed
/// to the script as the `Argv` list.  Returns the process exit status.
pub fn script(interp: &mut Interp, path: &str, args: &[String]) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("cannot read file {}: {}", path, e);
            return 1;
        }
    };
    run_source(interp, &source, args)
}

/// Evaluates source text with `Argv` set from the given arguments.
pub fn run_source(interp: &mut Interp, source: &str, args: &[String]) -> i32 {
    let argv: WarbleList = args.iter().map(Value::from).collect();
    let _ = interp.set_var("Argv", Value::from(argv));

    match interp.eval(source) {
        Ok(_) => 0,
        Err(exception) => {
            eprintln!("{}", exception.value());
            1
        }
    }
}
