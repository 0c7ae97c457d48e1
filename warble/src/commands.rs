//! The built-in command set.
//!
//! Every command is a [`CommandFunc`]: a Rust function taking the
//! interpreter and the argument vector.  Command functions begin with a
//! [`check_args`] call, which both validates the argument count and answers
//! the nil-argv usage probe sent by the `usage` command.
//!
//! The safe commands live in a process-wide table built once on first use;
//! parsed words bind directly against this table, which is why the built-ins
//! cannot be renamed or shadowed.  Privileged commands (like the shell's
//! `exec`) are instead registered per-interpreter with
//! [`Interp::register_unsafe`].

use crate::binary;
use crate::check_args;
use crate::interp::{key_not_found, Interp, Procedure};
use crate::types::*;
use crate::value::Value;
use crate::{warble_err, warble_ok};
use chrono::{Local, Utc};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

/// The safe built-in registry: commands that sandboxed evaluation may call.
static SAFE_COMMANDS: &[(&str, CommandFunc)] = &[
    ("append", cmd_append),
    ("array", cmd_array),
    ("binary", binary::cmd_binary),
    ("break", cmd_break),
    ("case", cmd_case),
    ("catch", cmd_catch),
    ("clock", cmd_clock),
    ("concat", cmd_concat),
    ("continue", cmd_continue),
    ("echo", cmd_echo),
    ("error", cmd_error),
    ("eval", cmd_eval),
    ("expr", cmd_expr),
    ("for", cmd_for),
    ("foreach", cmd_foreach),
    ("format", cmd_format),
    ("global", cmd_global),
    ("go", cmd_go),
    ("hash", cmd_hash),
    ("hdel", cmd_hdel),
    ("hget", cmd_hget),
    ("hkeys", cmd_hkeys),
    ("hset", cmd_hset),
    ("if", cmd_if),
    ("incr", cmd_incr),
    ("info", cmd_info),
    ("join", cmd_join),
    ("lappend", cmd_lappend),
    ("lindex", cmd_lindex),
    ("list", cmd_list),
    ("llength", cmd_llength),
    ("log", cmd_log),
    ("lrange", cmd_lrange),
    ("lreverse", cmd_lreverse),
    ("lsort", cmd_lsort),
    ("macro", cmd_macro),
    ("must", cmd_must),
    ("mustfail", cmd_mustfail),
    ("proc", cmd_proc),
    ("return", cmd_return),
    ("say", cmd_say),
    ("scan", cmd_scan),
    ("set", cmd_set),
    ("split", cmd_split),
    ("string", cmd_string),
    ("subst", cmd_subst),
    ("throw", cmd_throw),
    ("time", cmd_time),
    ("uplevel", cmd_uplevel),
    ("upvar", cmd_upvar),
    ("usage", cmd_usage),
    ("while", cmd_while),
];

fn safe_table() -> &'static HashMap<&'static str, CommandFunc> {
    static TABLE: OnceLock<HashMap<&'static str, CommandFunc>> = OnceLock::new();
    TABLE.get_or_init(|| SAFE_COMMANDS.iter().copied().collect())
}

/// Looks up a safe built-in by name.  Parsed words use this to bind their
/// command slot at parse time.
pub(crate) fn find_safe(name: &str) -> Option<CommandFunc> {
    safe_table().get(name).copied()
}

pub(crate) fn safe_names() -> Vec<&'static str> {
    SAFE_COMMANDS.iter().map(|(name, _)| *name).collect()
}

//--------------------------------------------------------------------------
// Test counters
//
// `must` and `mustfail` tally into a process-wide counter pair; `go` threads
// race it, hence the mutex.

/// The process-wide pass/fail tally maintained by `must` and `mustfail`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounters {
    pub succeeds: u64,
    pub fails: u64,
}

static TEST_COUNTERS: Mutex<TestCounters> = Mutex::new(TestCounters {
    succeeds: 0,
    fails: 0,
});

/// A snapshot of the test counters, for the shell's `--test` summary.
pub fn test_counters() -> TestCounters {
    match TEST_COUNTERS.lock() {
        Ok(counters) => *counters,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn count_test(passed: bool) {
    let mut counters = match TEST_COUNTERS.lock() {
        Ok(counters) => counters,
        Err(poisoned) => poisoned.into_inner(),
    };
    if passed {
        counters.succeeds += 1;
    } else {
        counters.fails += 1;
    }
}

//--------------------------------------------------------------------------
// Control flow

/// # if *condition* *thenScript* ?else *elseScript*?
pub fn cmd_if(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 5, "condition thenScript ?else elseScript?")?;

    let else_script = match argv.len() {
        3 => None,
        5 => {
            if argv[3].as_str() != "else" {
                return warble_err!("expected \"else\" but got \"{}\"", argv[3]);
            }
            Some(&argv[4])
        }
        _ => return warble_err!("wrong # args: should be \"if condition thenScript ?else elseScript?\""),
    };

    if interp.expr_bool(&argv[1])? {
        interp.eval_value(&argv[2])
    } else if let Some(script) = else_script {
        interp.eval_value(script)
    } else {
        Ok(Value::empty())
    }
}

/// # case *string* ?in? *patList body* ?*patList body* ...?
///
/// Each pattern list is matched with glob rules; a lone `default` pattern
/// provides the fallback body.  The pattern/body pairs may also be given as
/// a single braced list.
pub fn cmd_case(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 0, "string ?in? patList body ?patList body ...?")?;

    let topic = argv[1].as_str().into_owned();
    let mut rest: WarbleList = argv[2..].to_vec();

    if rest.first().map(|v| v.as_str() == "in").unwrap_or(false) {
        rest.remove(0);
    }
    if rest.len() == 1 {
        rest = rest[0].as_list()?;
    }
    if rest.len() % 2 != 0 {
        return warble_err!("extra pattern with no body in \"case\"");
    }

    let mut default_body: Option<Value> = None;
    for pair in rest.chunks(2) {
        let patterns = pair[0].as_list()?;
        if patterns.len() == 1 && patterns[0].as_str() == "default" {
            default_body = Some(pair[1].clone());
            continue;
        }
        for pattern in &patterns {
            if string_match(&pattern.as_str(), &topic) {
                return interp.eval_value(&pair[1]);
            }
        }
    }

    match default_body {
        Some(body) => interp.eval_value(&body),
        None => Ok(Value::empty()),
    }
}

/// # while *test* *body*
pub fn cmd_while(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 3, "test body")?;

    loop {
        if !interp.expr_bool(&argv[1])? {
            break;
        }
        match interp.eval_value(&argv[2]) {
            Ok(_) => {}
            Err(e) => match e.code() {
                ResultCode::Break => break,
                ResultCode::Continue => continue,
                _ => return Err(e),
            },
        }
    }
    Ok(Value::empty())
}

/// # for *start* *test* *next* *body*
pub fn cmd_for(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 5, 5, "start test next body")?;

    interp.eval_value(&argv[1])?;
    loop {
        if !interp.expr_bool(&argv[2])? {
            break;
        }
        match interp.eval_value(&argv[4]) {
            Ok(_) => {}
            Err(e) => match e.code() {
                ResultCode::Break => break,
                // `continue` still runs the next script.
                ResultCode::Continue => {}
                _ => return Err(e),
            },
        }
        interp.eval_value(&argv[3])?;
    }
    Ok(Value::empty())
}

/// # foreach *varList* *list* *body*
///
/// With several loop variables, each pass consumes one element per variable.
pub fn cmd_foreach(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 4, 4, "varList list body")?;

    let vars = argv[1].as_list()?;
    if vars.is_empty() {
        return warble_err!("foreach variable list is empty");
    }
    let mut list = argv[2].clone();

    'outer: loop {
        for var in &vars {
            match list.head_tail()? {
                None => break 'outer,
                Some((head, tail)) => {
                    list = tail;
                    interp.set_var(&var.as_str(), head)?;
                }
            }
        }
        match interp.eval_value(&argv[3]) {
            Ok(_) => {}
            Err(e) => match e.code() {
                ResultCode::Break => break,
                ResultCode::Continue => continue,
                _ => return Err(e),
            },
        }
    }
    Ok(Value::empty())
}

/// # catch *script* ?*varName*?
///
/// Evaluates the script, catching every error and jump.  Returns the
/// numeric status (0 on normal completion) and stores the result or error
/// message in the variable if one is named.
pub fn cmd_catch(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 3, "script ?varName?")?;

    match interp.eval_value(&argv[1]) {
        Ok(value) => {
            if let Some(var) = argv.get(2) {
                interp.set_var(&var.as_str(), value)?;
            }
            warble_ok!(0 as WarbleInt)
        }
        Err(exception) => {
            if let Some(var) = argv.get(2) {
                interp.set_var(&var.as_str(), exception.value())?;
            }
            warble_ok!(exception.code().as_int())
        }
    }
}

/// # return ?*value* ...?
///
/// Several values return as a list.
pub fn cmd_return(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 1, 0, "?value ...?")?;

    let value = match argv.len() {
        1 => Value::empty(),
        2 => argv[1].clone(),
        _ => Value::from(&argv[1..]),
    };
    Err(Exception::jump(ResultCode::Return, value))
}

/// # break
pub fn cmd_break(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 1, 1, "")?;
    Err(Exception::jump(ResultCode::Break, Value::empty()))
}

/// # continue
pub fn cmd_continue(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 1, 1, "")?;
    Err(Exception::jump(ResultCode::Continue, Value::empty()))
}

/// # error *message*
pub fn cmd_error(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 2, "message")?;
    Err(Exception::error(argv[1].clone()))
}

/// # throw *code* *result*
///
/// Raises a jump with an arbitrary integer status; `catch` reports the
/// code.  `return` cannot carry strange codes here, so this command does.
pub fn cmd_throw(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 3, "code result")?;
    let code = argv[1].as_int()?;
    Err(Exception::jump(ResultCode::from_int(code), argv[2].clone()))
}

//--------------------------------------------------------------------------
// Procedures and macros

/// # proc *name* *params* *body*
///
/// Params are names, or `{name default}` pairs; a trailing `args` takes the
/// remaining actuals as a list.  Procs may not shadow built-ins, existing
/// commands, or macros.
pub fn cmd_proc(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 4, 4, "name params body")?;

    let name = argv[1].as_str().into_owned();
    if find_safe(&name).is_some() {
        return warble_err!("cannot redefine the built-in command \"{}\"", name);
    }
    if interp.is_registered(&name) {
        return warble_err!("a command named \"{}\" already exists", name);
    }
    if interp.find_macro(&name).is_some() {
        return warble_err!("a macro named \"{}\" already exists", name);
    }

    let mut formals: Vec<(String, Option<Value>)> = Vec::new();
    for spec in &argv[2].as_list()? {
        let fields = spec.as_list()?;
        match fields.as_slice() {
            [n] => formals.push((n.as_str().into_owned(), None)),
            [n, default] => formals.push((n.as_str().into_owned(), Some(default.clone()))),
            _ => {
                return warble_err!(
                    "too many fields in parameter specifier \"{}\"",
                    spec
                )
            }
        }
    }

    let body = interp.compile(&argv[3].as_str(), false)?;
    interp.add_proc(&name, Procedure::new(formals, Rc::new(body)));
    Ok(Value::empty())
}

/// # macro *name* *params* *body*
///
/// Macros rewrite at expansion time; see the parser module.  Literal
/// definitions already took effect during expansion; this command is the
/// runtime path for computed names or bodies.
pub fn cmd_macro(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 4, 4, "name params body")?;
    interp.define_macro(&argv[1].as_str(), &argv[2], &argv[3])?;
    Ok(Value::empty())
}

//--------------------------------------------------------------------------
// Variables

/// # set *varName* ?*newValue*?
///
/// A `name(key)` target reads or writes a key of a hash variable, creating
/// the hash on first write.
pub fn cmd_set(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 3, "varName ?newValue?")?;

    let target = argv[1].as_str().into_owned();
    if target.is_empty() {
        return warble_err!("variable name is empty");
    }

    if let Some(stripped) = target.strip_suffix(')') {
        let open = match stripped.find('(') {
            Some(i) => i,
            None => {
                return warble_err!(
                    "variable name \"{}\" ends with \")\" but has no \"(\"",
                    target
                )
            }
        };
        if open == 0 {
            return warble_err!("variable name \"{}\" is empty before \"(\"", target);
        }
        let name = &stripped[..open];
        let key = &stripped[open + 1..];

        if argv.len() == 2 {
            let var = interp.get_var(name)?;
            return var.get_at(key)?.ok_or_else(|| key_not_found(name, key));
        }
        if !interp.has_var(name) {
            interp.set_var(name, Value::from(WarbleHash::new()))?;
        }
        let var = interp.get_var(name)?;
        var.put_at(argv[2].clone(), key)?;
        return Ok(argv[2].clone());
    }

    if argv.len() == 2 {
        interp.get_var(&target)
    } else {
        interp.set_var_return(&target, argv[2].clone())
    }
}

/// # global *varName* ?*varName* ...?
///
/// Shorthand for `upvar #0 name name` on each name.
pub fn cmd_global(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "varName ?varName ...?")?;

    for arg in &argv[1..] {
        let name = arg.as_str();
        interp.link_var(&name, 0, &name);
    }
    Ok(Value::empty())
}

/// # upvar *level* *otherVar* *localVar*
///
/// `#0` targets the global frame; an integer walks that many frames up the
/// call chain.
pub fn cmd_upvar(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 4, 4, "level otherVar localVar")?;

    let level = parse_level(interp, &argv[1])?;
    interp.link_var(&argv[3].as_str(), level, &argv[2].as_str());
    Ok(Value::empty())
}

fn parse_level(interp: &Interp, spec: &Value) -> Result<usize, Exception> {
    if spec.as_str() == "#0" {
        return Ok(0);
    }
    let count = spec.as_int()?;
    if count < 0 {
        return warble_err!("bad level \"{}\"", spec);
    }
    Ok(interp.frame_level_up(count as usize))
}

/// # incr *varName* ?*increment*?
///
/// An absent variable is initialized to zero first.
pub fn cmd_incr(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 3, "varName ?increment?")?;

    let name = argv[1].as_str().into_owned();
    let delta = match argv.get(2) {
        Some(v) => v.clone(),
        None => Value::from(1 as WarbleInt),
    };

    if !interp.has_var(&name) {
        interp.set_var(&name, Value::from(0 as WarbleInt))?;
    }
    let current = interp.get_var(&name)?;

    let sum = if current.is_quick_int() && delta.is_quick_int() {
        Value::from(current.as_int()?.wrapping_add(delta.as_int()?))
    } else {
        Value::from(current.as_float()? + delta.as_float()?)
    };
    interp.set_var_return(&name, sum)
}

/// # append *varName* ?*value* ...?
pub fn cmd_append(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "varName ?value ...?")?;

    let name = argv[1].as_str().into_owned();
    if !interp.has_var(&name) {
        interp.set_var(&name, Value::empty())?;
    }
    let current = interp.get_var(&name)?;
    if argv.len() == 2 {
        return Ok(current);
    }

    let mut out = current.as_str().into_owned();
    for value in &argv[2..] {
        out.push_str(&value.as_str());
    }
    interp.set_var_return(&name, Value::from(out))
}

/// # lappend *varName* ?*value* ...?
pub fn cmd_lappend(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "varName ?value ...?")?;

    let name = argv[1].as_str().into_owned();
    if !interp.has_var(&name) {
        interp.set_var(&name, Value::empty())?;
    }
    let mut list = interp.get_var(&name)?.as_list()?;
    list.extend(argv[2..].iter().cloned());
    interp.set_var_return(&name, Value::from(list))
}

//--------------------------------------------------------------------------
// Lists

/// # list ?*value* ...?
pub fn cmd_list(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 1, 0, "?value ...?")?;
    Ok(Value::from(&argv[1..]))
}

/// # llength *list*
pub fn cmd_llength(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 2, "list")?;
    warble_ok!(argv[1].as_list()?.len() as WarbleInt)
}

/// # lindex *list* *index*
///
/// The literal `end` names the last element.
pub fn cmd_lindex(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 3, "list index")?;

    let listv = argv[1].as_list()?;
    let index = list_index(&argv[2], listv.len())?;
    if index < 0 || index >= listv.len() as WarbleInt {
        return warble_err!("lindex: bad index: {}", argv[2]);
    }
    Ok(listv[index as usize].clone())
}

fn list_index(value: &Value, len: usize) -> Result<WarbleInt, Exception> {
    let s = value.as_str();
    if s == "end" {
        Ok(len as WarbleInt - 1)
    } else if s.starts_with("end-") {
        warble_err!("bad index \"{}\"", s)
    } else {
        value.as_int()
    }
}

/// # lrange *list* *first* *last*
///
/// Both ends are inclusive; `end` names the last element.
pub fn cmd_lrange(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 4, 4, "list first last")?;

    let listv = argv[1].as_list()?;
    let len = listv.len() as WarbleInt;
    let first = argv[2].as_int()?;
    let last = list_index(&argv[3], listv.len())?;

    // Exclusive upper bound.
    let end = last + 1;
    if first < 0 || first > len {
        return warble_err!("lrange: bad index: {}", first);
    }
    if end < 0 || end > len {
        return warble_err!("lrange: bad index: {}", argv[3]);
    }
    if end <= first {
        return Ok(Value::empty());
    }
    Ok(Value::from(&listv[first as usize..end as usize]))
}

/// # lreverse *list*
pub fn cmd_lreverse(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 2, "list")?;
    let mut listv = argv[1].as_list()?;
    listv.reverse();
    Ok(Value::from(listv))
}

/// # lsort ?*options*? *list*
///
/// A stable sort by string form; `-integer` and `-real` compare
/// numerically, `-decreasing` flips the order, and `-index N` keys each
/// element by its Nth sub-element.  Option names may be abbreviated.
pub fn cmd_lsort(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "?options? list")?;

    let listv = argv[argv.len() - 1].as_list()?;
    if listv.len() <= 1 {
        return Ok(argv[argv.len() - 1].clone());
    }

    enum Mode {
        Str,
        Int,
        Real,
    }
    let mut mode = Mode::Str;
    let mut descending = false;
    let mut index: WarbleInt = -1;

    let mut opts = &argv[1..argv.len() - 1];
    while let Some(opt) = opts.first() {
        let opt = opt.as_str();
        if opt.starts_with("-int") {
            mode = Mode::Int;
            opts = &opts[1..];
        } else if opt.starts_with("-r") {
            mode = Mode::Real;
            opts = &opts[1..];
        } else if opt.starts_with("-d") {
            descending = true;
            opts = &opts[1..];
        } else if opt.starts_with("-ind") && opts.len() > 1 {
            index = opts[1].as_int()?;
            opts = &opts[2..];
        } else {
            return warble_err!("lsort: bad option \"{}\"", opt);
        }
    }

    let keyed = |v: &Value| -> Result<Value, Exception> {
        if index < 0 {
            Ok(v.clone())
        } else {
            let sub = v.as_list()?;
            match sub.get(index as usize) {
                Some(elem) => Ok(elem.clone()),
                None => warble_err!("lsort: index {} out of range", index),
            }
        }
    };

    let sorted = match mode {
        Mode::Str => {
            let mut pairs: Vec<(String, Value)> = Vec::with_capacity(listv.len());
            for v in &listv {
                pairs.push((keyed(v)?.as_str().into_owned(), v.clone()));
            }
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            pairs
                .into_iter()
                .map(|(_, v)| v)
                .collect::<WarbleList>()
        }
        Mode::Int => {
            let mut pairs: Vec<(WarbleInt, Value)> = Vec::with_capacity(listv.len());
            for v in &listv {
                pairs.push((keyed(v)?.as_int()?, v.clone()));
            }
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            pairs
                .into_iter()
                .map(|(_, v)| v)
                .collect::<WarbleList>()
        }
        Mode::Real => {
            let mut pairs: Vec<(WarbleFloat, Value)> = Vec::with_capacity(listv.len());
            for v in &listv {
                pairs.push((keyed(v)?.as_float()?, v.clone()));
            }
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
            pairs
                .into_iter()
                .map(|(_, v)| v)
                .collect::<WarbleList>()
        }
    };

    let sorted = if descending {
        sorted.into_iter().rev().collect()
    } else {
        sorted
    };
    Ok(Value::from(sorted))
}

/// # concat ?*list* ...?
pub fn cmd_concat(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 1, 0, "?list ...?")?;

    let mut out: WarbleList = Vec::new();
    for v in &argv[1..] {
        out.extend(v.as_list()?);
    }
    Ok(Value::from(out))
}

/// # split *string* ?*splitChars*?
///
/// Without delimiters, splits on ASCII whitespace.  An empty input yields
/// the empty value, not a one-element list.
pub fn cmd_split(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 3, "string ?splitChars?")?;

    let s = argv[1].as_str();
    if s.is_empty() {
        return Ok(Value::empty());
    }
    let delims = match argv.get(2) {
        Some(d) if !d.is_empty() => d.as_str().into_owned(),
        _ => " \t\n\r".to_string(),
    };

    let mut out: WarbleList = Vec::new();
    let mut rest: &str = &s;
    loop {
        match rest.find(|c: char| delims.contains(c)) {
            None => {
                out.push(Value::from(rest));
                break;
            }
            Some(i) => {
                out.push(Value::from(&rest[..i]));
                let skip = rest[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                rest = &rest[i + skip..];
            }
        }
    }
    Ok(Value::from(out))
}

/// # join *list* ?*joinString*?
pub fn cmd_join(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 3, "list ?joinString?")?;

    let joiner = match argv.get(2) {
        Some(j) => j.as_str().into_owned(),
        None => " ".to_string(),
    };

    let mut out = String::new();
    for (i, v) in argv[1].as_list()?.iter().enumerate() {
        if i > 0 {
            out.push_str(&joiner);
        }
        out.push_str(&v.as_str());
    }
    Ok(Value::from(out))
}

//--------------------------------------------------------------------------
// Hashes

/// # hash ?*key* *value* ...?
///
/// A single argument is split as a key/value list.
pub fn cmd_hash(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 1, 0, "?key value ...?")?;

    let mut args: WarbleList = argv[1..].to_vec();
    if args.len() == 1 {
        args = args[0].as_list()?;
    }
    if args.len() % 2 != 0 {
        return warble_err!("hash cannot take an odd number of key and value items");
    }

    let mut h = WarbleHash::new();
    for pair in args.chunks(2) {
        h.insert(pair[0].as_str().into_owned(), pair[1].clone());
    }
    Ok(Value::from(h))
}

/// # hget *hash* *key*
pub fn cmd_hget(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 3, "hash key")?;

    let key = argv[2].as_str();
    match argv[1].get_at(&key)? {
        Some(value) => Ok(value),
        None => warble_err!("hash does not contain key \"{}\"", key),
    }
}

/// # hset *hash* *key* *value*
pub fn cmd_hset(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 4, 4, "hash key value")?;
    argv[1].put_at(argv[3].clone(), &argv[2].as_str())?;
    Ok(argv[3].clone())
}

/// # hdel *hash* *key*
pub fn cmd_hdel(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 3, "hash key")?;
    argv[1]
        .as_hash()?
        .borrow_mut()
        .remove(&*argv[2].as_str());
    Ok(Value::empty())
}

/// # hkeys *hash*
pub fn cmd_hkeys(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 2, "hash")?;

    let hash = argv[1].as_hash()?;
    let keys: WarbleList = hash
        .borrow()
        .keys()
        .map(|k| Value::from(k.as_str()))
        .collect();
    Ok(Value::from(keys))
}

//--------------------------------------------------------------------------
// Evaluation commands

/// # eval *arg* ?*arg* ...?
pub fn cmd_eval(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "arg ?arg ...?")?;
    eval_or_apply(interp, &argv[1..])
}

/// # uplevel *level* *arg* ?*arg* ...?
pub fn cmd_uplevel(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 0, "level arg ?arg ...?")?;

    let level = parse_level(interp, &argv[1])?;
    let rest: WarbleList = argv[2..].to_vec();
    interp.with_frame_level(level, |ip| eval_or_apply(ip, &rest))
}

/// # go *arg* ?*arg* ...?
///
/// Launches an independent evaluation on a new thread.  The thread gets its
/// own interpreter seeded with a snapshot of the caller's global scalars;
/// only the test counters are truly shared.
pub fn cmd_go(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "arg ?arg ...?")?;

    let mut script = String::new();
    for v in &argv[1..] {
        script.push_str(&v.as_str());
        script.push(' ');
    }
    let globals = interp.global_snapshot();

    std::thread::spawn(move || {
        let mut interp = Interp::new();
        for (name, value) in globals {
            let _ = interp.set_var(&name, Value::from(value));
        }
        if let Err(e) = interp.eval(&script) {
            tracing::warn!(target: "warble::go", error = %e.value(), "detached task failed");
        }
    });
    Ok(Value::empty())
}

/// Applies pre-parsed lists directly, or falls back to joining the
/// arguments into a script and evaluating it.  Shared by `eval`, `uplevel`,
/// and `go`.
fn eval_or_apply(interp: &mut Interp, lists: &[Value]) -> WarbleResult {
    if lists.iter().all(Value::is_preserved_by_list) {
        let mut cat: WarbleList = Vec::new();
        for v in lists {
            cat.extend(v.as_list()?);
        }
        if cat.is_empty() {
            return Ok(Value::empty());
        }
        return interp.apply(&cat);
    }

    let mut script = String::new();
    for v in lists {
        script.push_str(&v.as_str());
        script.push(' ');
    }
    interp.eval_value(&Value::from(script))
}

/// # expr *expression* ?*expression* ...?
///
/// Several arguments are joined with spaces first.
pub fn cmd_expr(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "expression ?expression ...?")?;

    if argv.len() == 2 {
        return interp.expr(&argv[1]);
    }
    let joined = argv[1..]
        .iter()
        .map(|v| v.as_str().into_owned())
        .collect::<Vec<String>>()
        .join(" ");
    interp.expr(&Value::from(joined))
}

/// # subst ?*flags*? *string*
///
/// Flags are matched with glob rules: `-nob*`, `-noc*`, `-nov*`.
pub fn cmd_subst(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(
        1,
        argv,
        2,
        0,
        "?-nobackslashes? ?-nocommands? ?-novariables? string",
    )?;

    let mut flags = SubstFlags::default();
    let mut args = &argv[1..];
    while args.len() > 1 {
        let opt = args[0].as_str().into_owned();
        if string_match("-nob*", &opt) {
            flags.no_backslash = true;
        } else if string_match("-noc*", &opt) {
            flags.no_square = true;
        } else if string_match("-nov*", &opt) {
            flags.no_dollar = true;
        } else {
            return warble_err!(
                "bad option \"{}\": must be -nobackslashes, -nocommands, or -novariables",
                opt
            );
        }
        args = &args[1..];
    }
    interp.subst(&args[0].as_str(), flags)
}

//--------------------------------------------------------------------------
// Output and diagnostics

/// # echo ?*arg* ...?
pub fn cmd_echo(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 1, 0, "?arg ...?")?;

    let line = argv[1..]
        .iter()
        .map(|v| v.as_str().into_owned())
        .collect::<Vec<String>>()
        .join(" ");
    println!("{}", line);
    Ok(Value::empty())
}

/// # say ?*arg* ...?
///
/// Emits the arguments as a trace event and, like `list`, returns them.
pub fn cmd_say(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 1, 0, "?arg ...?")?;

    let line = argv[1..]
        .iter()
        .map(|v| v.as_str().into_owned())
        .collect::<Vec<String>>()
        .join(" ");
    tracing::info!(target: "warble::say", "{}", line);
    Ok(Value::from(&argv[1..]))
}

/// # log *level* *message*
///
/// Levels are `0`..`9` (quietest first), `p` (log then raise an error), and
/// `f` (log then exit the process with code 13).  The message undergoes
/// full substitution; a message that fails to substitute is logged as-is
/// with a note.
pub fn cmd_log(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 3, "level message")?;

    let level = argv[1].as_str().into_owned();
    let message = subst_or_orig(interp, &argv[2].as_str());
    let name = interp.log_name().to_string();

    let b = match level.as_bytes() {
        [b] => *b,
        _ => {
            return warble_err!(
                "log level should be 'p', 'f', or in '0'..'9' but is \"{}\"",
                level
            )
        }
    };

    match b {
        b'p' => {
            tracing::error!(target: "warble::script", log = %name, "{}", message);
            warble_err!("log p: {}", message)
        }
        b'f' => {
            tracing::error!(target: "warble::script", log = %name, "{}", message);
            eprintln!("{}: exiting after fatal log message", name);
            std::process::exit(13);
        }
        b'0' | b'1' => {
            tracing::error!(target: "warble::script", log = %name, "{}", message);
            Ok(Value::empty())
        }
        b'2' | b'3' => {
            tracing::warn!(target: "warble::script", log = %name, "{}", message);
            Ok(Value::empty())
        }
        b'4' | b'5' => {
            tracing::info!(target: "warble::script", log = %name, "{}", message);
            Ok(Value::empty())
        }
        b'6' | b'7' => {
            tracing::debug!(target: "warble::script", log = %name, "{}", message);
            Ok(Value::empty())
        }
        b'8' | b'9' => {
            tracing::trace!(target: "warble::script", log = %name, "{}", message);
            Ok(Value::empty())
        }
        _ => warble_err!(
            "log level should be 'p', 'f', or in '0'..'9' but is \"{}\"",
            level
        ),
    }
}

fn subst_or_orig(interp: &mut Interp, s: &str) -> String {
    match interp.subst(s, SubstFlags::ALL) {
        Ok(value) => value.as_str().into_owned(),
        Err(_) => format!("ERROR ignored while substituting log message: {}", s),
    }
}

/// # usage *cmdName*
///
/// Sends the nil-argv probe to the command and reports the usage string it
/// answers with.
pub fn cmd_usage(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 2, "cmdName")?;

    let name = argv[1].as_str().into_owned();
    match interp.probe_usage(&name) {
        Some(usage) => warble_ok!("*** Usage:  {} {}", name, usage),
        None => warble_err!("no usage found for command \"{}\"", name),
    }
}

/// # time *script* ?*count*?
pub fn cmd_time(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 3, "script ?count?")?;

    let count = match argv.get(2) {
        Some(v) => v.as_int()?.max(0),
        None => 1,
    };

    let start = Instant::now();
    for _ in 0..count {
        interp.eval_value(&argv[1])?;
    }
    let nanos = start.elapsed().as_nanos() as f64;
    warble_ok!(
        "{:.6} microseconds per iteration",
        nanos / 1000.0 / count.max(1) as f64
    )
}

/// # must *expected* *actual* ?*comment* ...?
///
/// The test workhorse: both sides must have equal string forms.  Tallies
/// into the process-wide counters either way.
pub fn cmd_must(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 0, "expected actual ?comment ...?")?;

    let x = argv[1].as_str().into_owned();
    let y = argv[2].as_str().into_owned();
    if x == y {
        count_test(true);
        return Ok(Value::empty());
    }

    count_test(false);
    let mut msg = format!("FAILED: must: x=<{}> y=<{}>", x, y);
    for extra in &argv[3..] {
        msg.push_str(" ;; ");
        msg.push_str(&subst_or_orig(interp, &extra.as_str()));
    }
    Err(Exception::error(Value::from(msg)))
}

/// # mustfail *script*
pub fn cmd_mustfail(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 2, "script")?;

    match interp.eval_value(&argv[1]) {
        Err(_) => {
            count_test(true);
            Ok(Value::empty())
        }
        Ok(_) => {
            count_test(false);
            warble_err!("mustfail: script did not fail: {}", argv[1])
        }
    }
}

//--------------------------------------------------------------------------
// Formatting

/// # format *formatString* ?*arg* ...?
pub fn cmd_format(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 2, 0, "formatString ?arg ...?")?;
    let out = format_values(&argv[1].as_str(), &argv[2..])?;
    Ok(Value::from(out))
}

/// # scan *string* *format* ?*varName* ...?
///
/// Returns the number of conversions performed and assigned.
pub fn cmd_scan(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(1, argv, 3, 0, "string format ?varName ...?")?;

    let parsed = scan_values(&argv[1].as_str(), &argv[2].as_str())?;
    let vars = &argv[3..];
    let n = parsed.len().min(vars.len());
    for (var, value) in vars.iter().zip(parsed.into_iter()) {
        interp.set_var(&var.as_str(), value)?;
    }
    warble_ok!(n as WarbleInt)
}

fn format_values(fmt: &str, args: &[Value]) -> Result<String, Exception> {
    let bytes = fmt.as_bytes();
    let mut out = String::new();
    let mut i = 0usize;
    let mut argi = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            match fmt[i..].chars().next() {
                Some(c) => {
                    out.push(c);
                    i += c.len_utf8();
                }
                None => break,
            }
            continue;
        }
        i += 1;
        if bytes.get(i) == Some(&b'%') {
            out.push('%');
            i += 1;
            continue;
        }

        let mut left = false;
        let mut zero = false;
        let mut plus = false;
        let mut space = false;
        while let Some(&b) = bytes.get(i) {
            match b {
                b'-' => left = true,
                b'0' => zero = true,
                b'+' => plus = true,
                b' ' => space = true,
                _ => break,
            }
            i += 1;
        }

        let mut width = 0usize;
        while let Some(&b) = bytes.get(i) {
            if !b.is_ascii_digit() {
                break;
            }
            width = width * 10 + (b - b'0') as usize;
            i += 1;
        }

        let mut precision: Option<usize> = None;
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            let mut p = 0usize;
            while let Some(&b) = bytes.get(i) {
                if !b.is_ascii_digit() {
                    break;
                }
                p = p * 10 + (b - b'0') as usize;
                i += 1;
            }
            precision = Some(p);
        }

        let verb = match bytes.get(i) {
            Some(&b) => b,
            None => {
                return Err(Exception::error(Value::from(
                    "format string ended in the middle of a field specifier",
                )))
            }
        };
        i += 1;

        let arg = match args.get(argi) {
            Some(v) => v,
            None => {
                return Err(Exception::error(Value::from(
                    "not enough arguments for format string",
                )))
            }
        };
        argi += 1;

        let (body, numeric) = match verb {
            b'd' | b'i' => (format_signed(arg.as_int()?, plus, space), true),
            b'o' => (format_radix(arg.as_int()?, 8, false), true),
            b'x' => (format_radix(arg.as_int()?, 16, false), true),
            b'X' => (format_radix(arg.as_int()?, 16, true), true),
            b'c' => (
                char::from_u32(arg.as_int()? as u32)
                    .unwrap_or('\u{fffd}')
                    .to_string(),
                false,
            ),
            b's' => {
                let s = arg.as_str().into_owned();
                let s = match precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s,
                };
                (s, false)
            }
            b'q' => (format!("{:?}", arg.as_str()), false),
            b'f' | b'F' => (
                format!("{:.*}", precision.unwrap_or(6), arg.as_float()?),
                true,
            ),
            b'e' => (format_exp(arg.as_float()?, precision.unwrap_or(6), false), true),
            b'E' => (format_exp(arg.as_float()?, precision.unwrap_or(6), true), true),
            b'g' | b'G' => (crate::value::format_float(arg.as_float()?), true),
            _ => {
                return Err(Exception::error(Value::from(format!(
                    "bad field specifier \"{}\"",
                    verb as char
                ))))
            }
        };

        out.push_str(&pad_field(&body, width, left, zero && numeric));
    }

    if argi != args.len() {
        return Err(Exception::error(Value::from(
            "too many arguments for format string",
        )));
    }
    Ok(out)
}

fn format_signed(n: WarbleInt, plus: bool, space: bool) -> String {
    if n >= 0 {
        if plus {
            format!("+{}", n)
        } else if space {
            format!(" {}", n)
        } else {
            n.to_string()
        }
    } else {
        n.to_string()
    }
}

fn format_radix(n: WarbleInt, radix: u32, upper: bool) -> String {
    let magnitude = n.unsigned_abs();
    let body = match (radix, upper) {
        (8, _) => format!("{:o}", magnitude),
        (16, true) => format!("{:X}", magnitude),
        _ => format!("{:x}", magnitude),
    };
    if n < 0 {
        format!("-{}", body)
    } else {
        body
    }
}

fn format_exp(f: WarbleFloat, precision: usize, upper: bool) -> String {
    let sci = format!("{:.*e}", precision, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some(pair) => pair,
        None => (sci.as_str(), "0"),
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let e = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.unsigned_abs())
}

fn pad_field(body: &str, width: usize, left: bool, zero: bool) -> String {
    let len = body.chars().count();
    if len >= width {
        return body.to_string();
    }
    let fill = width - len;
    if left {
        format!("{}{}", body, " ".repeat(fill))
    } else if zero {
        // Zeros go after any sign.
        let (sign, digits) = match body.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", body),
        };
        format!("{}{}{}", sign, "0".repeat(fill), digits)
    } else {
        format!("{}{}", " ".repeat(fill), body)
    }
}

fn scan_values(input: &str, fmt: &str) -> Result<WarbleList, Exception> {
    let inb = input.as_bytes();
    let fb = fmt.as_bytes();
    let mut ii = 0usize;
    let mut fi = 0usize;
    let mut out: WarbleList = Vec::new();

    'scan: while fi < fb.len() {
        let fc = fb[fi];
        if fc.is_ascii_whitespace() {
            fi += 1;
            while ii < inb.len() && inb[ii].is_ascii_whitespace() {
                ii += 1;
            }
            continue;
        }
        if fc != b'%' {
            if ii < inb.len() && inb[ii] == fc {
                ii += 1;
                fi += 1;
                continue;
            }
            break;
        }

        fi += 1;
        let verb = match fb.get(fi) {
            Some(&b) => b,
            None => break,
        };
        fi += 1;

        if verb == b'%' {
            if ii < inb.len() && inb[ii] == b'%' {
                ii += 1;
                continue;
            }
            break;
        }

        if verb != b'c' {
            while ii < inb.len() && inb[ii].is_ascii_whitespace() {
                ii += 1;
            }
        }

        match verb {
            b'd' => {
                let start = ii;
                if matches!(inb.get(ii), Some(b'+' | b'-')) {
                    ii += 1;
                }
                while ii < inb.len() && inb[ii].is_ascii_digit() {
                    ii += 1;
                }
                match input[start..ii].parse::<WarbleInt>() {
                    Ok(n) => out.push(Value::from(n)),
                    Err(_) => break 'scan,
                }
            }
            b'o' => {
                let start = ii;
                while ii < inb.len() && (b'0'..=b'7').contains(&inb[ii]) {
                    ii += 1;
                }
                match WarbleInt::from_str_radix(&input[start..ii], 8) {
                    Ok(n) => out.push(Value::from(n)),
                    Err(_) => break 'scan,
                }
            }
            b'x' => {
                let start = ii;
                while ii < inb.len() && inb[ii].is_ascii_hexdigit() {
                    ii += 1;
                }
                match WarbleInt::from_str_radix(&input[start..ii], 16) {
                    Ok(n) => out.push(Value::from(n)),
                    Err(_) => break 'scan,
                }
            }
            b'e' | b'f' | b'g' => {
                let start = ii;
                if matches!(inb.get(ii), Some(b'+' | b'-')) {
                    ii += 1;
                }
                while ii < inb.len()
                    && (inb[ii].is_ascii_digit()
                        || matches!(inb[ii], b'.' | b'e' | b'E' | b'+' | b'-'))
                {
                    ii += 1;
                }
                match input[start..ii].parse::<WarbleFloat>() {
                    Ok(f) => out.push(Value::from(f)),
                    Err(_) => break 'scan,
                }
            }
            b's' => {
                let start = ii;
                while ii < inb.len() && !inb[ii].is_ascii_whitespace() {
                    ii += 1;
                }
                if ii == start {
                    break 'scan;
                }
                out.push(Value::from(&input[start..ii]));
            }
            b'c' => match input[ii..].chars().next() {
                Some(c) => {
                    ii += c.len_utf8();
                    out.push(Value::from(c.to_string()));
                }
                None => break 'scan,
            },
            _ => {
                return Err(Exception::error(Value::from(format!(
                    "bad scan field specifier \"{}\"",
                    verb as char
                ))))
            }
        }
    }

    Ok(out)
}

//--------------------------------------------------------------------------
// Glob matching

/// Glob match: `*`, `?`, `[class]` with ranges, and `\` escapes.
pub(crate) fn string_match(pattern: &str, s: &str) -> bool {
    match_glob(pattern.as_bytes(), s.as_bytes())
}

fn match_glob(p: &[u8], s: &[u8]) -> bool {
    let mut pi = 0usize;
    let mut si = 0usize;

    while pi < p.len() {
        let pc = p[pi];

        if pc == b'*' {
            // Collapse runs of stars; a trailing star matches everything.
            while pi < p.len() && p[pi] == b'*' {
                pi += 1;
            }
            if pi == p.len() {
                return true;
            }
            while si <= s.len() {
                if match_glob(&p[pi..], &s[si..]) {
                    return true;
                }
                si += 1;
            }
            return false;
        }

        if pc == b'?' {
            if si >= s.len() {
                return false;
            }
            pi += 1;
            si += 1;
            continue;
        }

        if si >= s.len() {
            return false;
        }
        let c = s[si];

        if pc == b'[' {
            pi += 1;
            let mut matched = false;
            let mut closed = false;
            while pi < p.len() {
                if p[pi] == b']' {
                    closed = true;
                    pi += 1;
                    break;
                }
                let start = p[pi];
                if pi + 2 < p.len() && p[pi + 1] == b'-' && p[pi + 2] != b']' {
                    let end = p[pi + 2];
                    if (start <= c && c <= end) || (end <= c && c <= start) {
                        matched = true;
                    }
                    pi += 3;
                } else {
                    if start == c {
                        matched = true;
                    }
                    pi += 1;
                }
            }
            if !closed || !matched {
                return false;
            }
            si += 1;
            continue;
        }

        // A backslash forces an exact match on the following byte.
        let pc = if pc == b'\\' {
            pi += 1;
            match p.get(pi) {
                Some(&b) => b,
                None => return false,
            }
        } else {
            pc
        };

        if pc != c {
            return false;
        }
        pi += 1;
        si += 1;
    }

    si == s.len()
}

//--------------------------------------------------------------------------
// The string ensemble

const STRING_SUBCOMMANDS: [Subcommand; 7] = [
    Subcommand("length", cmd_string_length),
    Subcommand("range", cmd_string_range),
    Subcommand("slice", cmd_string_slice),
    Subcommand("first", cmd_string_first),
    Subcommand("index", cmd_string_index),
    Subcommand("match", cmd_string_match),
    Subcommand("trim", cmd_string_trim),
];

/// # string *subcommand* ?*arg* ...?
pub fn cmd_string(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    interp.call_subcommand(argv, 1, &STRING_SUBCOMMANDS)
}

fn cmd_string_length(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "string")?;
    warble_ok!(argv[2].as_str().len() as WarbleInt)
}

/// `string range` includes the character indexed by `last`; `end` or an
/// empty last index names the end of the string.
fn cmd_string_range(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 5, 5, "string first last")?;

    let s = argv[2].as_str().into_owned();
    let n = s.len() as WarbleInt;
    let first = argv[3].as_int()?;
    let last = if argv[4].is_empty() || argv[4].as_str() == "end" {
        n - 1
    } else {
        argv[4].as_int()?
    };

    match slicer(n, first, last, 1) {
        Some((low, high)) => Ok(Value::from(lossy_slice(&s, low, high))),
        None => Ok(Value::empty()),
    }
}

/// `string slice` follows half-open slice conventions: `last` is the first
/// index excluded.
fn cmd_string_slice(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 5, 5, "string first last")?;

    let s = argv[2].as_str().into_owned();
    let n = s.len() as WarbleInt;
    let first = argv[3].as_int()?;
    let last = if argv[4].is_empty() || argv[4].as_str() == "end" {
        n
    } else {
        argv[4].as_int()?
    };

    match slicer(n, first, last, 0) {
        Some((low, high)) => Ok(Value::from(lossy_slice(&s, low, high))),
        None => Ok(Value::empty()),
    }
}

/// Computes the byte range `[low, high)` for a slice request, clamping the
/// ends; a negative `last` counts back from the end.  `None` means the
/// request selects nothing.
fn slicer(length: WarbleInt, first: WarbleInt, last: WarbleInt, keep: WarbleInt) -> Option<(usize, usize)> {
    let first = first.max(0);
    if first > length {
        return None;
    }
    let mut last = last;
    if last < 0 {
        last += length - keep;
    }
    if last < first {
        return None;
    }
    if last > length - keep {
        last = length - keep;
    }
    Some((first as usize, (last + keep) as usize))
}

fn lossy_slice(s: &str, low: usize, high: usize) -> String {
    String::from_utf8_lossy(&s.as_bytes()[low..high]).into_owned()
}

fn cmd_string_first(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 4, 4, "needleString haystackString")?;

    let needle = argv[2].as_str();
    let haystack = argv[3].as_str();
    let index = match haystack.find(&*needle) {
        Some(i) => i as WarbleInt,
        None => -1,
    };
    warble_ok!(index)
}

fn cmd_string_index(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 4, 4, "string charIndex")?;

    let s = argv[2].as_str().into_owned();
    let i = argv[3].as_int()?;
    if i < 0 || i >= s.len() as WarbleInt {
        return Ok(Value::empty());
    }
    let i = i as usize;
    Ok(Value::from(lossy_slice(&s, i, i + 1)))
}

fn cmd_string_match(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 4, 4, "pattern string")?;
    warble_ok!(string_match(&argv[2].as_str(), &argv[3].as_str()))
}

fn cmd_string_trim(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "string")?;

    let s = argv[2].as_str().into_owned();
    let trimmed = s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b'));
    Ok(Value::from(trimmed))
}

//--------------------------------------------------------------------------
// The info ensemble

const INFO_SUBCOMMANDS: [Subcommand; 5] = [
    Subcommand("commands", cmd_info_commands),
    Subcommand("macros", cmd_info_macros),
    Subcommand("globals", cmd_info_globals),
    Subcommand("locals", cmd_info_locals),
    Subcommand("exists", cmd_info_exists),
];

/// # info *subcommand* ?*arg* ...?
pub fn cmd_info(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    interp.call_subcommand(argv, 1, &INFO_SUBCOMMANDS)
}

fn sorted_values(mut names: Vec<String>) -> Value {
    names.sort();
    Value::from(
        names
            .into_iter()
            .map(Value::from)
            .collect::<WarbleList>(),
    )
}

fn cmd_info_commands(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 2, 2, "")?;
    Ok(sorted_values(interp.command_names()))
}

fn cmd_info_macros(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 2, 2, "")?;
    Ok(sorted_values(interp.macro_names()))
}

fn cmd_info_globals(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 2, 2, "")?;
    Ok(sorted_values(interp.global_var_names()))
}

fn cmd_info_locals(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 2, 2, "")?;
    Ok(sorted_values(interp.local_var_names()))
}

fn cmd_info_exists(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "varName")?;

    let s = argv[2].as_str().into_owned();
    if let Some(stripped) = s.strip_suffix(')') {
        let open = match stripped.find('(') {
            Some(i) => i,
            None => return warble_err!("bad array-element syntax in \"{}\"", s),
        };
        let (name, key) = (&stripped[..open], &stripped[open + 1..]);
        if !interp.has_var(name) {
            return warble_ok!(false);
        }
        let var = interp.get_var(name)?;
        if !var.is_quick_hash() {
            return warble_ok!(false);
        }
        return warble_ok!(var.get_at(key)?.is_some());
    }
    warble_ok!(interp.has_var(&s))
}

//--------------------------------------------------------------------------
// The array ensemble
//
// Arrays are ordinary hash-valued variables, so these subcommands are a
// frame-level view over the hash operations.

const ARRAY_SUBCOMMANDS: [Subcommand; 5] = [
    Subcommand("set", cmd_array_set),
    Subcommand("get", cmd_array_get),
    Subcommand("size", cmd_array_size),
    Subcommand("exists", cmd_array_exists),
    Subcommand("names", cmd_array_names),
];

/// # array *subcommand* ?*arg* ...?
pub fn cmd_array(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    interp.call_subcommand(argv, 1, &ARRAY_SUBCOMMANDS)
}

fn cmd_array_set(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 4, 4, "arrayName list")?;

    let name = argv[2].as_str().into_owned();
    let pairs = argv[3].as_list()?;
    if pairs.len() % 2 != 0 {
        return warble_err!("list must have an even number of elements");
    }

    if !interp.has_var(&name) {
        interp.set_var(&name, Value::from(WarbleHash::new()))?;
    }
    let var = interp.get_var(&name)?;
    for pair in pairs.chunks(2) {
        var.put_at(pair[1].clone(), &pair[0].as_str())?;
    }
    Ok(var)
}

fn cmd_array_get(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "arrayName")?;

    let var = interp.get_var(&argv[2].as_str())?;
    var.as_hash()?;
    Ok(Value::from(var.as_list()?))
}

fn cmd_array_size(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "arrayName")?;

    let name = argv[2].as_str().into_owned();
    if !interp.has_var(&name) {
        return warble_ok!(0 as WarbleInt);
    }
    let size = interp.get_var(&name)?.as_hash()?.borrow().len();
    warble_ok!(size as WarbleInt)
}

fn cmd_array_exists(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "arrayName")?;

    let name = argv[2].as_str().into_owned();
    warble_ok!(interp.has_var(&name) && interp.get_var(&name)?.is_quick_hash())
}

fn cmd_array_names(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 3, "arrayName")?;

    let var = interp.get_var(&argv[2].as_str())?;
    let hash = var.as_hash()?;
    let keys: WarbleList = hash
        .borrow()
        .keys()
        .map(|k| Value::from(k.as_str()))
        .collect();
    Ok(Value::from(keys))
}

//--------------------------------------------------------------------------
// The clock ensemble

const CLOCK_SUBCOMMANDS: [Subcommand; 4] = [
    Subcommand("seconds", cmd_clock_seconds),
    Subcommand("milliseconds", cmd_clock_milliseconds),
    Subcommand("microseconds", cmd_clock_microseconds),
    Subcommand("format", cmd_clock_format),
];

/// # clock *subcommand* ?*arg* ...?
pub fn cmd_clock(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    interp.call_subcommand(argv, 1, &CLOCK_SUBCOMMANDS)
}

fn cmd_clock_seconds(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 2, 2, "")?;
    warble_ok!(Utc::now().timestamp())
}

fn cmd_clock_milliseconds(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 2, 2, "")?;
    warble_ok!(Utc::now().timestamp_millis())
}

fn cmd_clock_microseconds(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 2, 2, "")?;
    warble_ok!(Utc::now().timestamp_micros())
}

/// # clock format *seconds* ?-format *string*? ?-gmt *boolean*?
///
/// The format string uses strftime patterns; the default is the classic
/// Unix date layout.
fn cmd_clock_format(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
    check_args(2, argv, 3, 0, "seconds ?-format string? ?-gmt boolean?")?;

    let seconds = argv[2].as_float()?;
    let mut layout = "%a %b %e %H:%M:%S %Z %Y".to_string();
    let mut gmt = false;

    let mut rest = &argv[3..];
    while rest.len() >= 2 {
        match &*rest[0].as_str() {
            "-format" => layout = rest[1].as_str().into_owned(),
            "-gmt" => gmt = rest[1].as_bool()?,
            other => return warble_err!("bad option \"{}\" to clock format", other),
        }
        rest = &rest[2..];
    }
    if !rest.is_empty() {
        return warble_err!("odd number of option arguments to clock format");
    }

    let nanos = (seconds * 1e9) as i64;
    let when = match chrono::DateTime::from_timestamp(
        nanos.div_euclid(1_000_000_000),
        nanos.rem_euclid(1_000_000_000) as u32,
    ) {
        Some(dt) => dt,
        None => return warble_err!("clock value \"{}\" is out of range", argv[2]),
    };

    use std::fmt::Write as _;
    let mut out = String::new();
    let ok = if gmt {
        write!(out, "{}", when.format(&layout)).is_ok()
    } else {
        write!(out, "{}", when.with_timezone(&Local).format(&layout)).is_ok()
    };
    if !ok {
        return warble_err!("bad clock format string \"{}\"", layout);
    }
    Ok(Value::from(out))
}
