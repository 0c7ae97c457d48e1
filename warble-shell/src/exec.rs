//! The `exec` command: subprocess execution.
//!
//! This lives in the shell, not the interpreter library: subprocess
//! execution is privileged, so the shell grants it through
//! [`Interp::register_unsafe`].

use std::process::Command;
use warble::{check_args, warble_err, warble_ok, Interp, Value, WarbleResult};

/// # exec *command* ?*arg* ...?
///
/// Runs the command with the given arguments and returns its captured
/// standard output.  A non-zero exit reports the command's standard error.
pub fn cmd_exec(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "command ?arg ...?")?;

    let program = argv[1].as_str().into_owned();
    let args: Vec<String> = argv[2..]
        .iter()
        .map(|v| v.as_str().into_owned())
        .collect();

    let output = match Command::new(&program).args(&args).output() {
        Ok(output) => output,
        Err(e) => return warble_err!("cannot run command \"{}\": {}", program, e),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return warble_err!(
            "error in command \"{}\": {}",
            program,
            stderr.trim_end()
        );
    }
    warble_ok!(String::from_utf8_lossy(&output.stdout).into_owned())
}
