//! List syntax: splitting a string into elements and joining elements back
//! into a string.
//!
//! Joining quotes each element with [`Value::list_element_string`]: braces
//! around anything containing whitespace, braces, or backslashes, with the
//! troublesome bytes octal-escaped.  Splitting reverses that exactly, so
//! `parse_list(list_to_string(v))` round-trips.

use crate::types::{Exception, WarbleList};
use crate::value::Value;

fn is_list_white(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b)
}

/// Joins values into the string form of a list.
pub fn list_to_string(list: &[Value]) -> String {
    let mut out = String::new();
    for (i, v) in list.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&v.list_element_string());
    }
    out
}

/// Splits a string into list elements.  Elements are braced (nesting, with
/// backslash escapes decoded), quoted, or bare words; whitespace separates.
pub fn parse_list(s: &str) -> Result<WarbleList, Exception> {
    let bytes = s.as_bytes();
    let mut list: WarbleList = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        if is_list_white(bytes[i]) {
            i += 1;
            continue;
        }

        let element = match bytes[i] {
            b'{' => parse_braced(s, &mut i)?,
            b'"' => parse_quoted(s, &mut i)?,
            _ => parse_bare(s, &mut i)?,
        };
        list.push(Value::from(element));
    }

    Ok(list)
}

fn parse_braced(s: &str, i: &mut usize) -> Result<String, Exception> {
    let bytes = s.as_bytes();
    let mut out = String::new();
    let mut depth = 1usize;
    *i += 1;

    while *i < bytes.len() {
        match bytes[*i] {
            b'\\' => out.push(take_escape(s, i)?),
            b'{' => {
                depth += 1;
                out.push('{');
                *i += 1;
            }
            b'}' => {
                depth -= 1;
                *i += 1;
                if depth == 0 {
                    return Ok(out);
                }
                out.push('}');
            }
            _ => push_byte(s, i, &mut out),
        }
    }

    Err(Exception::error(Value::from(
        "unmatched open brace in list",
    )))
}

fn parse_quoted(s: &str, i: &mut usize) -> Result<String, Exception> {
    let bytes = s.as_bytes();
    let mut out = String::new();
    *i += 1;

    while *i < bytes.len() {
        match bytes[*i] {
            b'"' => {
                *i += 1;
                return Ok(out);
            }
            b'\\' => out.push(take_escape(s, i)?),
            _ => push_byte(s, i, &mut out),
        }
    }

    Err(Exception::error(Value::from(
        "unmatched open quote in list",
    )))
}

fn parse_bare(s: &str, i: &mut usize) -> Result<String, Exception> {
    let bytes = s.as_bytes();
    let mut out = String::new();

    while *i < bytes.len() && !is_list_white(bytes[*i]) {
        match bytes[*i] {
            b'\\' => out.push(take_escape(s, i)?),
            _ => push_byte(s, i, &mut out),
        }
    }

    Ok(out)
}

/// Copies one character (possibly multi-byte) from `s` at byte offset `i`.
fn push_byte(s: &str, i: &mut usize, out: &mut String) {
    match s[*i..].chars().next() {
        Some(c) => {
            out.push(c);
            *i += c.len_utf8();
        }
        None => *i += 1,
    }
}

/// Decodes one backslash escape at byte offset `i`, mirroring the lexer's
/// escape table.
fn take_escape(s: &str, i: &mut usize) -> Result<char, Exception> {
    let bytes = s.as_bytes();
    let b = match bytes.get(*i + 1) {
        None => {
            return Err(Exception::error(Value::from(
                "backslash at end of list element",
            )))
        }
        Some(&b) => b,
    };

    let simple = |c: char, i: &mut usize| {
        *i += 2;
        Ok(c)
    };
    match b {
        b'a' => simple('\x07', i),
        b'b' => simple('\x08', i),
        b'f' => simple('\x0c', i),
        b'n' => simple('\n', i),
        b'r' => simple('\r', i),
        b't' => simple('\t', i),
        b'v' => simple('\x0b', i),
        b'\\' => simple('\\', i),
        b'0'..=b'7' => {
            let mut value = 0u32;
            let mut used = 0usize;
            while used < 3 {
                match bytes.get(*i + 1 + used) {
                    Some(&d @ b'0'..=b'7') => {
                        value = value * 8 + (d - b'0') as u32;
                        used += 1;
                    }
                    _ => break,
                }
            }
            *i += 1 + used;
            Ok(((value & 0xff) as u8) as char)
        }
        b'x' => {
            let mut value = 0u32;
            let mut used = 0usize;
            while used < 2 {
                match bytes.get(*i + 2 + used) {
                    Some(&d) if d.is_ascii_hexdigit() => {
                        value = value * 16 + (d as char).to_digit(16).unwrap_or(0);
                        used += 1;
                    }
                    _ => break,
                }
            }
            *i += 2 + used;
            Ok((value as u8) as char)
        }
        _ => match s[*i + 1..].chars().next() {
            Some(c) => {
                *i += 1 + c.len_utf8();
                Ok(c)
            }
            None => Err(Exception::error(Value::from(
                "backslash at end of list element",
            ))),
        },
    }
}
