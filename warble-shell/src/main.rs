//! The warble shell: script runner and interactive REPL.

mod exec;
mod shell;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use warble::{test_counters, Interp, Value, WarbleHash};

/// warble is an interpreter for a small, string-oriented command language.
#[derive(Parser, Debug)]
#[command(name = "warble", version, about, long_about = None)]
struct Args {
    /// Immediate script to execute instead of a file or the REPL.
    #[arg(short = 'c', value_name = "SCRIPT")]
    command: Option<String>,

    /// Debug trace categories, each a single letter (e.g. -d pew).
    #[arg(short = 'd', value_name = "LETTERS", default_value = "")]
    debug: String,

    /// Print the must/mustfail summary at exit; fail on any failed test.
    #[arg(long)]
    test: bool,

    /// Script file to run; without one, an interactive prompt starts.
    script: Option<String>,

    /// Arguments passed to the script as the Argv list.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

/// Initializes tracing from `WARBLE_LOG` (falling back to `RUST_LOG`,
/// defaulting to `info`), writing to stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("WARBLE_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Mirrors the process environment into the `Env` global hash.
fn populate_env(interp: &mut Interp) {
    let mut env = WarbleHash::new();
    for (key, value) in std::env::vars() {
        env.insert(key, Value::from(value));
    }
    let _ = interp.set_var("Env", Value::from(env));
}

fn main() {
    init_tracing();
    let args = Args::parse();

    let mut interp = Interp::new();
    interp.set_debug_flags(&args.debug);
    populate_env(&mut interp);
    interp.register_unsafe("exec", exec::cmd_exec);

    let status = if let Some(source) = &args.command {
        // With -c, every positional argument goes to the script.
        let mut rest: Vec<String> = Vec::new();
        rest.extend(args.script.iter().cloned());
        rest.extend(args.args.iter().cloned());
        shell::run_source(&mut interp, source, &rest)
    } else if let Some(path) = &args.script {
        shell::script(&mut interp, path, &args.args)
    } else {
        shell::repl(&mut interp);
        0
    };

    let status = if args.test {
        let counters = test_counters();
        if counters.fails > 0 {
            eprintln!(
                "TEST FAILS: succeeds={} fails={}",
                counters.succeeds, counters.fails
            );
            1
        } else {
            eprintln!("Test done: succeeds={}", counters.succeeds);
            status
        }
    } else {
        status
    };

    std::process::exit(status);
}
