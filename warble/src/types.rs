//! Public types used throughout the crate.
//!
//! The two central types are [`Value`], the type of all warble values, and
//! [`Exception`], which represents every kind of exceptional return: errors,
//! `return`, `break`, `continue`, the usage probe, and the free integer codes
//! raised by `throw`.  Most functions that can fail return [`WarbleResult`],
//! i.e. `Result<Value, Exception>`.

use crate::interp::Interp;
use crate::value::Value;
use std::collections::BTreeMap;

/// The standard integer type for warble code.
pub type WarbleInt = i64;

/// The standard floating-point type for warble code.
pub type WarbleFloat = f64;

/// A list of values.
pub type WarbleList = Vec<Value>;

/// A hash value's backing map.  `BTreeMap` so that key enumeration is
/// lexicographic regardless of insertion order, which the language guarantees.
pub type WarbleHash = BTreeMap<String, Value>;

/// The result of evaluating warble code or calling a command.
pub type WarbleResult = Result<Value, Exception>;

/// A built-in command: a Rust function taking the interpreter and the argument
/// vector.  `argv[0]` is the command name; an empty `argv` is the usage probe,
/// to which the command must respond with a [`ResultCode::Usage`] jump.
pub type CommandFunc = fn(&mut Interp, &[Value]) -> WarbleResult;

/// Exception status codes.
///
/// `Break`, `Continue`, and `Return` are caught by loops and procedure calls
/// respectively; `Usage` answers the nil-argv probe; `Other` carries the free
/// integer codes raised by `throw`.  The numeric form, as reported by `catch`,
/// follows the Tcl convention: 1 error, 2 return, 3 break, 4 continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Error,
    Return,
    Break,
    Continue,
    Usage,
    Other(WarbleInt),
}

impl ResultCode {
    /// The numeric status, as stored by `catch`.
    pub fn as_int(self) -> WarbleInt {
        match self {
            ResultCode::Error => 1,
            ResultCode::Return => 2,
            ResultCode::Break => 3,
            ResultCode::Continue => 4,
            ResultCode::Usage => 5,
            ResultCode::Other(code) => code,
        }
    }

    /// The code `throw n` raises.  Codes that collide with the standard ones
    /// behave identically to them, so `throw 3` breaks out of a loop.
    pub fn from_int(code: WarbleInt) -> Self {
        match code {
            1 => ResultCode::Error,
            2 => ResultCode::Return,
            3 => ResultCode::Break,
            4 => ResultCode::Continue,
            5 => ResultCode::Usage,
            _ => ResultCode::Other(code),
        }
    }
}

/// An exceptional result: an error or a non-local control-flow jump, carrying
/// a status code and a payload value (the error message, the `return` result,
/// or the `throw` payload).
#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    code: ResultCode,
    value: Value,
}

impl Exception {
    /// Creates an error exception with the given message value.
    pub fn error(value: Value) -> Self {
        Self {
            code: ResultCode::Error,
            value,
        }
    }

    /// Creates a jump with an arbitrary status code and payload.
    pub fn jump(code: ResultCode, value: Value) -> Self {
        Self { code, value }
    }

    /// Creates the usage response to a nil-argv probe.
    pub fn usage(usage: &str) -> Self {
        Self {
            code: ResultCode::Usage,
            value: Value::from(usage),
        }
    }

    /// The exception's status code.
    pub fn code(&self) -> ResultCode {
        self.code
    }

    /// The exception's payload: the error message for errors, the result
    /// value for jumps.
    pub fn value(&self) -> Value {
        self.value.clone()
    }

    /// Whether this exception is an error (as opposed to a control jump).
    pub fn is_error(&self) -> bool {
        self.code == ResultCode::Error
    }

    /// Appends a line of context to an error's message.  Control jumps are
    /// left untouched.  Used to build the proc-call trace on the way out.
    pub fn annotate(&mut self, line: &str) {
        if self.is_error() {
            let mut msg = self.value.as_str().into_owned();
            msg.push('\n');
            msg.push_str(line);
            self.value = Value::from(msg);
        }
    }
}

/// An entry in an ensemble's subcommand table: the subcommand's name and the
/// function that implements it.
#[derive(Debug)]
pub struct Subcommand(pub &'static str, pub CommandFunc);

impl Subcommand {
    /// Looks up a subcommand by name.  An exact match wins; otherwise a
    /// unique prefix match wins; ambiguous or unknown names produce an error
    /// listing the options.
    pub fn find<'a>(subs: &'a [Subcommand], name: &str) -> Result<&'a Subcommand, Exception> {
        for sub in subs {
            if sub.0 == name {
                return Ok(sub);
            }
        }

        let mut found: Option<&Subcommand> = None;
        for sub in subs {
            if name.len() < sub.0.len() && sub.0.starts_with(name) {
                if found.is_some() {
                    return Err(Exception::error(Value::from(format!(
                        "ambiguous subcommand \"{}\": must be {}",
                        name,
                        Subcommand::list(subs)
                    ))));
                }
                found = Some(sub);
            }
        }

        found.ok_or_else(|| {
            Exception::error(Value::from(format!(
                "unknown subcommand \"{}\": must be {}",
                name,
                Subcommand::list(subs)
            )))
        })
    }

    fn list(subs: &[Subcommand]) -> String {
        let names: Vec<&str> = subs.iter().map(|sub| sub.0).collect();
        match names.split_last() {
            Some((last, rest)) if !rest.is_empty() => {
                format!("{}, or {}", rest.join(", "), last)
            }
            _ => names.join(", "),
        }
    }
}

/// Which substitution classes `subst` should skip.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstFlags {
    pub no_backslash: bool,
    pub no_square: bool,
    pub no_dollar: bool,
}

impl SubstFlags {
    /// Performs every substitution class.
    pub const ALL: SubstFlags = SubstFlags {
        no_backslash: false,
        no_square: false,
        no_dollar: false,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_round_trip() {
        for code in [1, 2, 3, 4, 5, 17, -3] {
            assert_eq!(ResultCode::from_int(code).as_int(), code);
        }
        assert_eq!(ResultCode::from_int(3), ResultCode::Break);
        assert_eq!(ResultCode::from_int(99), ResultCode::Other(99));
    }

    #[test]
    fn test_exception_annotate() {
        let mut ex = Exception::error(Value::from("oops"));
        ex.annotate("    in proc \"f\"");
        assert_eq!(ex.value().as_str(), "oops\n    in proc \"f\"");

        // Jumps are not annotated.
        let mut jump = Exception::jump(ResultCode::Break, Value::empty());
        jump.annotate("ignored");
        assert_eq!(jump.value().as_str(), "");
    }

    #[test]
    fn test_subcommand_find() {
        fn dummy(_: &mut Interp, _: &[Value]) -> WarbleResult {
            Ok(Value::empty())
        }
        let subs = [
            Subcommand("length", dummy),
            Subcommand("range", dummy),
            Subcommand("trim", dummy),
        ];

        assert_eq!(Subcommand::find(&subs, "length").map(|s| s.0), Ok("length"));
        assert_eq!(Subcommand::find(&subs, "len").map(|s| s.0), Ok("length"));
        assert_eq!(Subcommand::find(&subs, "t").map(|s| s.0), Ok("trim"));
        assert!(Subcommand::find(&subs, "zzz").is_err());
    }

    #[test]
    fn test_subcommand_ambiguous_prefix() {
        fn dummy(_: &mut Interp, _: &[Value]) -> WarbleResult {
            Ok(Value::empty())
        }
        let subs = [Subcommand("seconds", dummy), Subcommand("set", dummy)];
        let err = Subcommand::find(&subs, "se").unwrap_err();
        assert!(err.value().as_str().starts_with("ambiguous subcommand"));
    }
}
