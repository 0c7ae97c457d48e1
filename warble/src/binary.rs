//! The `binary` ensemble: byte-level packing, unpacking, and file I/O.
//!
//! Values are UTF-8 strings, so bytes are carried as code points in
//! U+0000..=U+00FF.  `explode`/`implode` and `format`/`scan` round-trip over
//! that range; file contents outside it are replaced on read.

use crate::check_args;
use crate::interp::Interp;
use crate::types::*;
use crate::value::Value;
use crate::{warble_err, warble_ok};
use std::fs;

const BINARY_SUBCOMMANDS: [Subcommand; 8] = [
    Subcommand("split", cmd_binary_split),
    Subcommand("join", cmd_binary_join),
    Subcommand("explode", cmd_binary_explode),
    Subcommand("implode", cmd_binary_implode),
    Subcommand("format", cmd_binary_format),
    Subcommand("scan", cmd_binary_scan),
    Subcommand("readfile", cmd_binary_readfile),
    Subcommand("writefile", cmd_binary_writefile),
];

/// # binary *subcommand* ?*arg* ...?
pub fn cmd_binary(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    interp.call_subcommand(argv, 1, &BINARY_SUBCOMMANDS)
}

/// # binary split *value* *size*
///
/// Splits a string into a list of chunks of at most `size` characters.
fn cmd_binary_split(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 4, 4, "value size")?;

    let size = argv[3].as_int()?;
    if size <= 0 {
        return warble_err!("binary split: size must be positive, not {}", size);
    }

    let s = argv[2].as_str().into_owned();
    let mut chunks: WarbleList = Vec::new();
    let mut rest = s.as_str();
    while !rest.is_empty() {
        let mut cut = rest.len();
        let mut count = 0;
        for (i, _) in rest.char_indices() {
            if count == size {
                cut = i;
                break;
            }
            count += 1;
        }
        chunks.push(Value::from(&rest[..cut]));
        rest = &rest[cut..];
    }
    Ok(Value::from(chunks))
}

/// # binary join ?*list* ...?
///
/// Concatenates the elements of each list argument.
fn cmd_binary_join(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 2, 0, "?list ...?")?;

    let mut out = String::new();
    for arg in &argv[2..] {
        for elem in arg.as_list()? {
            out.push_str(&elem.as_str());
        }
    }
    Ok(Value::from(out))
}

/// # binary explode *value*
///
/// One integer per character.
fn cmd_binary_explode(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "value")?;

    let codes: WarbleList = argv[2]
        .as_str()
        .chars()
        .map(|c| Value::from(c as WarbleInt))
        .collect();
    Ok(Value::from(codes))
}

/// # binary implode *list*
///
/// One character per integer.
fn cmd_binary_implode(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "list")?;

    let mut out = String::new();
    for elem in argv[2].as_list()? {
        let code = elem.as_int()?;
        match u32::try_from(code).ok().and_then(char::from_u32) {
            Some(c) => out.push(c),
            None => {
                return warble_err!("binary implode: {} is not a character code", code)
            }
        }
    }
    Ok(Value::from(out))
}

/// # binary format *formatString* ?*arg* ...?
///
/// `c` packs one byte, `S` a big-endian 16-bit value.
fn cmd_binary_format(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 0, "formatString ?arg ...?")?;

    let mut args = &argv[3..];
    let mut out = String::new();
    for c in argv[2].as_str().chars() {
        let arg = match args.first() {
            Some(arg) => arg,
            None => return warble_err!("binary format: not enough arguments"),
        };
        match c {
            'c' => {
                let x = arg.as_int()? as u64;
                out.push((x & 0xff) as u8 as char);
                args = &args[1..];
            }
            'S' => {
                let x = arg.as_int()? as u64;
                out.push(((x >> 8) & 0xff) as u8 as char);
                out.push((x & 0xff) as u8 as char);
                args = &args[1..];
            }
            _ => return warble_err!("bad format character \"{}\" in binary format", c),
        }
    }
    Ok(Value::from(out))
}

/// # binary scan *value* *formatString* ?*varName* ...?
///
/// The inverse of `binary format`: `c` unpacks one byte, `S` a big-endian
/// 16-bit value, each into the next variable.
fn cmd_binary_scan(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 4, 0, "value formatString ?varName ...?")?;

    let data = argv[2].as_str().into_owned();
    let mut bytes = data.chars().map(|c| c as u32);
    let mut vars = &argv[4..];

    let mut next_byte = |what: char| -> Result<WarbleInt, Exception> {
        match bytes.next() {
            Some(code) if code <= 0xff => Ok(code as WarbleInt),
            Some(_) => warble_err!("binary scan: data is not byte-valued"),
            None => warble_err!("binary scan: out of data for \"{}\"", what),
        }
    };

    for c in argv[3].as_str().chars() {
        let var = match vars.first() {
            Some(var) => var,
            None => return warble_err!("binary scan: not enough variable names"),
        };
        match c {
            'c' => {
                let b = next_byte('c')?;
                interp.set_var(&var.as_str(), Value::from(b))?;
                vars = &vars[1..];
            }
            'S' => {
                let hi = next_byte('S')?;
                let lo = next_byte('S')?;
                interp.set_var(&var.as_str(), Value::from((hi << 8) | lo))?;
                vars = &vars[1..];
            }
            _ => return warble_err!("bad format character \"{}\" in binary scan", c),
        }
    }
    Ok(Value::empty())
}

/// # binary readfile *fileName* ?*offset*? ?*size*?
fn cmd_binary_readfile(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 5, "fileName ?offset? ?size?")?;

    let name = argv[2].as_str().into_owned();
    let contents = match fs::read(&name) {
        Ok(bytes) => bytes,
        Err(e) => return warble_err!("binary readfile: cannot read file \"{}\": {}", name, e),
    };

    let mut slice = &contents[..];
    if let Some(offset) = argv.get(3) {
        let offset = (offset.as_int()?.max(0) as usize).min(slice.len());
        slice = &slice[offset..];
    }
    if let Some(size) = argv.get(4) {
        let size = (size.as_int()?.max(0) as usize).min(slice.len());
        slice = &slice[..size];
    }
    Ok(Value::from(String::from_utf8_lossy(slice).into_owned()))
}

/// # binary writefile *fileName* *contents*
fn cmd_binary_writefile(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 4, 4, "fileName contents")?;

    let name = argv[2].as_str().into_owned();
    if let Err(e) = fs::write(&name, argv[3].as_str().as_bytes()) {
        return warble_err!("binary writefile: cannot write file \"{}\": {}", name, e);
    }
    Ok(Value::empty())
}
