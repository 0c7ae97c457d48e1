//! Warble: an embeddable interpreter for a Tcl-6.7-style command language.
//!
//! Warble is a string-oriented, command-structured scripting language: every
//! syntactic construct — control flow, assignment, procedure definition — is
//! itself a command, and every value has a canonical string form.
//!
//! The [`Interp`] struct is the primary API for embedding warble into an
//! application; see [`interp`] for an overview.  The [`Value`] type
//! represents all warble values; see [`value`] for the data model.
//!
//! ```
//! use warble::Interp;
//!
//! let mut interp = Interp::new();
//! let answer = interp.eval("expr {6 * 7}").expect("evaluation failed");
//! assert_eq!(answer.as_str(), "42");
//! ```
//!
//! The `warble-shell` crate wraps this library in a REPL and script runner.

pub mod binary;
mod commands;
pub mod expr;
pub mod interp;
pub mod lexer;
pub mod list;
pub mod parser;
mod scope;
pub mod types;
pub mod value;

pub use crate::commands::{test_counters, TestCounters};
pub use crate::interp::Interp;
pub use crate::types::{
    CommandFunc, Exception, ResultCode, Subcommand, SubstFlags, WarbleFloat, WarbleHash,
    WarbleInt, WarbleList, WarbleResult,
};
pub use crate::value::Value;

use std::borrow::Cow;

/// Returns an `Ok` result.  With no arguments the value is empty; with one
/// argument the value is converted with `Value::from`; with a format string
/// and arguments the value is the formatted string.
#[macro_export]
macro_rules! warble_ok {
    () => {
        Ok($crate::Value::empty())
    };
    ($value:expr) => {
        Ok($crate::Value::from($value))
    };
    ($fmt:expr, $($arg:tt)+) => {
        Ok($crate::Value::from(format!($fmt, $($arg)+)))
    };
}

/// Returns an error result with a formatted message.
#[macro_export]
macro_rules! warble_err {
    ($value:expr) => {
        Err($crate::Exception::error($crate::Value::from($value)))
    };
    ($fmt:expr, $($arg:tt)+) => {
        Err($crate::Exception::error($crate::Value::from(format!($fmt, $($arg)+))))
    };
}

/// Checks a command's argument count against its signature.
///
/// `namec` is the number of leading words that name the command (2 for
/// ensemble subcommands), `min` and `max` bound the acceptable length of
/// `argv` (`max` 0 means unbounded), and `argsig` is the argument signature
/// for the error message.  An empty `argv` is the usage probe and is
/// answered with a `Usage` jump carrying `argsig`.
pub fn check_args(
    namec: usize,
    argv: &[Value],
    min: usize,
    max: usize,
    argsig: &str,
) -> Result<(), Exception> {
    if argv.is_empty() {
        return Err(Exception::usage(argsig));
    }
    if argv.len() >= min && (max == 0 || argv.len() <= max) {
        return Ok(());
    }

    let name = argv[..namec.min(argv.len())]
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<Cow<'_, str>>>()
        .join(" ");

    if argsig.is_empty() {
        warble_err!("wrong # args: should be \"{}\"", name)
    } else {
        warble_err!("wrong # args: should be \"{} {}\"", name, argsig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_args() {
        let argv = [Value::from("cmd"), Value::from("a")];

        assert!(check_args(1, &argv, 1, 2, "?value?").is_ok());
        assert!(check_args(1, &argv, 2, 2, "value").is_ok());
        assert!(check_args(1, &argv, 2, 0, "value ?value ...?").is_ok());

        let err = check_args(1, &argv, 3, 3, "a b").unwrap_err();
        assert_eq!(
            err.value().as_str(),
            "wrong # args: should be \"cmd a b\""
        );

        // The nil-argv probe answers with the usage signature.
        let err = check_args(1, &[], 1, 2, "?value?").unwrap_err();
        assert_eq!(err.code(), ResultCode::Usage);
        assert_eq!(err.value().as_str(), "?value?");
    }

    #[test]
    fn test_macros() {
        let ok: WarbleResult = warble_ok!();
        assert_eq!(ok, Ok(Value::empty()));
        let ok: WarbleResult = warble_ok!(3 as WarbleInt);
        assert_eq!(ok, Ok(Value::from(3)));
        let ok: WarbleResult = warble_ok!("{}-{}", 1, 2);
        assert_eq!(ok, Ok(Value::from("1-2")));

        let err: WarbleResult = warble_err!("bad {}", "news");
        match err {
            Err(e) => {
                assert!(e.is_error());
                assert_eq!(e.value().as_str(), "bad news");
            }
            Ok(_) => panic!("expected an error"),
        }
    }
}
