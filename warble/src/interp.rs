//! The warble interpreter.
//!
//! The [`Interp`] struct is the primary API for embedding warble into a Rust
//! application.  Given an `Interp`, the application may:
//!
//! * Evaluate scripts and expressions
//! * Check scripts for completeness
//! * Extend the language by registering new commands written in Rust
//! * Set and get warble variables
//!
//! # Interp is not Sync!
//!
//! The `Interp` (and the rest of warble) is intended for use in a single
//! thread.  It is safe to have `Interp`s in different threads, but use
//! `String` (or another `Sync` type) when passing data between them; in
//! particular, [`Value`] is not `Sync`.
//!
//! # Evaluating scripts
//!
//! Pass the script text to [`Interp::eval`].  The interpreter compiles it
//! into a command sequence, runs the macro-expansion pass, evaluates the
//! commands, and returns either the last command's value or an
//! [`Exception`].  Prefer [`Interp::eval_value`] when the script is already
//! held in a `Value`: the compiled form is cached on the value, so repeated
//! evaluation skips re-parsing.
//!
//! ```
//! use warble::Interp;
//!
//! let mut interp = Interp::new();
//! let four = interp.eval("expr {2 + 2}").expect("evaluation failed");
//! assert_eq!(four.as_str(), "4");
//! ```
//!
//! At the top level, `break` and `continue` jumps that escape the script are
//! converted to errors, and a `return` jump yields its payload as the
//! script's value.
//!
//! # Defining commands
//!
//! A command is a Rust function of type [`CommandFunc`] registered with
//! [`Interp::register_safe`] (or [`Interp::register_unsafe`] for commands a
//! sandboxed interpreter must not reach, like subprocess execution).  The
//! function receives the interpreter and the argument vector; `argv[0]` is
//! the command name.  Call [`check_args`](crate::check_args) first: it
//! produces the standard wrong-number-of-arguments error, and answers the
//! nil-argv usage probe that the `usage` command sends.
//!
//! ```
//! use warble::{check_args, warble_ok, Interp, Value, WarbleResult};
//!
//! fn cmd_square(interp: &mut Interp, argv: &[Value]) -> WarbleResult {
//!     check_args(1, argv, 2, 2, "intValue")?;
//!     let n = argv[1].as_int()?;
//!     warble_ok!(n * n)
//! }
//!
//! let mut interp = Interp::new();
//! interp.register_safe("square", cmd_square);
//! assert_eq!(interp.eval("square 5").unwrap().as_str(), "25");
//! ```
//!
//! # Variables
//!
//! [`Interp::set_var`] and [`Interp::get_var`] access variables in the
//! current scope — the global scope when called from the application level.
//! Hash-valued variables back the language's `name(key)` subscript syntax.

use crate::commands;
use crate::expr;
use crate::parser;
use crate::parser::{MacroDef, Part, Sequence, Word};
use crate::scope::FrameStack;
use crate::types::*;
use crate::value::Value;
use crate::{check_args, warble_err};
use indexmap::IndexMap;
use std::rc::Rc;

/// The warble interpreter.  See the module documentation for an overview.
pub struct Interp {
    // Registered commands: user procedures and embedder commands.  The safe
    // built-ins live in a process-wide table (see `commands`), which is also
    // what parsed words bind against.
    cmds: IndexMap<String, Rc<CommandDef>>,

    // Macros, consulted by the expansion pass.
    macros: IndexMap<String, Rc<MacroDef>>,

    // Privileged commands the embedder has granted.
    unsafes: IndexMap<String, CommandFunc>,

    // The variable scopes along the call stack.
    scopes: FrameStack,

    // Defines how deep evaluations may nest.
    recursion_limit: usize,

    // Current number of eval levels.
    num_levels: usize,

    // Byte-indexed trace categories, set from `-d` style flags.
    debug: [bool; 256],

    // Prefix for messages from the `log` command.
    log_name: String,
}

/// A command registered in the interpreter.
enum CommandDef {
    /// A command implemented as a Rust function.
    Native(CommandFunc),

    /// A warble procedure.
    Proc(Rc<Procedure>),
}

enum Lookup {
    Native(CommandFunc),
    Proc(Rc<Procedure>),
    Unknown,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    //----------------------------------------------------------------------
    // Constructor

    /// Creates a new interpreter.  The safe built-in command set is always
    /// reachable; privileged commands are added with
    /// [`register_unsafe`](Self::register_unsafe).
    pub fn new() -> Self {
        Self {
            cmds: IndexMap::new(),
            macros: IndexMap::new(),
            unsafes: IndexMap::new(),
            scopes: FrameStack::new(),
            recursion_limit: 1000,
            num_levels: 0,
            debug: [false; 256],
            log_name: "warble".to_string(),
        }
    }

    //----------------------------------------------------------------------
    // Script and expression evaluation

    /// Evaluates a script: compiles it to a command sequence, expands
    /// macros, and evaluates the commands in order.  Returns the last
    /// command's value, the payload of an explicit `return`, or the error
    /// raised by the script.
    pub fn eval(&mut self, script: &str) -> WarbleResult {
        let value = Value::from(script);
        self.eval_value(&value)
    }

    /// Evaluates the string form of a value as a script.  Equivalent to
    /// [`eval`](Self::eval), but the compiled sequence is cached on the
    /// value when possible, so repeated evaluation is cheap.
    pub fn eval_value(&mut self, value: &Value) -> WarbleResult {
        let top_level = self.num_levels == 0;
        let result = self.eval_value_inner(value, top_level);

        if !top_level {
            return result;
        }

        // At the top level, translate stray jumps.
        match result {
            Err(exception) => match exception.code() {
                ResultCode::Return => Ok(exception.value()),
                ResultCode::Error => Err(exception),
                ResultCode::Break => warble_err!("invoked \"break\" outside of a loop"),
                ResultCode::Continue => {
                    warble_err!("invoked \"continue\" outside of a loop")
                }
                ResultCode::Usage | ResultCode::Other(_) => {
                    Err(Exception::error(exception.value()))
                }
            },
            ok => ok,
        }
    }

    fn eval_value_inner(&mut self, value: &Value, define: bool) -> WarbleResult {
        // A parsed word: evaluate its cached sequence, compiling it on the
        // first use.
        if let Some(multi) = value.as_multi() {
            let cached = multi.seq.borrow().clone();
            let seq = match cached {
                Some(seq) => seq,
                None => {
                    let compiled = Rc::new(self.compile(multi.string(), define)?);
                    *multi.seq.borrow_mut() = Some(Rc::clone(&compiled));
                    compiled
                }
            };
            return self.eval_sequence(&seq);
        }

        // A list evaluates as a single pre-parsed command.
        if let Some(list) = value.as_list_rc() {
            let argv: WarbleList = (**list).clone();
            if argv.is_empty() {
                return Ok(Value::empty());
            }
            return self.apply(&argv);
        }

        let seq = self.compile(&value.as_str(), define)?;
        self.eval_sequence(&seq)
    }

    /// Compiles a script: parses it and runs the macro-expansion pass.
    /// When `define` is set, literal macro definitions take effect during
    /// expansion, so later commands in the same script can use them.
    pub(crate) fn compile(&mut self, src: &str, define: bool) -> Result<Sequence, Exception> {
        let seq = parser::parse(src)?;
        if self.debug_flag(b'p') {
            tracing::trace!(target: "warble::parse", src, "parsed sequence");
        }
        seq.expand_macros(self, src.len(), define)
    }

    /// Evaluates a compiled sequence, producing the last command's value.
    pub(crate) fn eval_sequence(&mut self, seq: &Sequence) -> WarbleResult {
        self.num_levels += 1;
        if self.num_levels > self.recursion_limit {
            self.num_levels -= 1;
            return warble_err!("too many nested evaluations (infinite loop?)");
        }
        if self.debug_flag(b'e') {
            tracing::trace!(target: "warble::eval", src = seq.src.as_str(), "eval sequence");
        }

        let mut result = Ok(Value::empty());
        for command in &seq.commands {
            result = self.eval_command(command);
            if result.is_err() {
                break;
            }
        }

        self.num_levels -= 1;
        result
    }

    /// Evaluates one command: computes the argument vector, splicing
    /// expand-words, then applies `argv[0]`.
    fn eval_command(&mut self, command: &parser::Command) -> WarbleResult {
        let mut argv: WarbleList = Vec::new();
        for word in &command.words {
            if word.expand {
                let value = self.eval_word(word)?;
                argv.extend(value.as_list()?);
            } else {
                argv.push(self.eval_word(word)?);
            }
        }

        if argv.is_empty() {
            return Ok(Value::empty());
        }
        if self.debug_flag(b'w') {
            tracing::trace!(target: "warble::eval", name = %argv[0], argc = argv.len(), "dispatch");
        }
        self.apply(&argv)
    }

    /// Applies `argv[0]` as a command.  A parsed word bound to a built-in
    /// dispatches directly; anything else is looked up by its string form in
    /// the command registries.
    pub fn apply(&mut self, argv: &[Value]) -> WarbleResult {
        if let Some(multi) = argv[0].as_multi() {
            if let Some(func) = multi.command {
                return func(self, argv);
            }
        }
        if argv[0].is_quick_hash() {
            return warble_err!("a hash cannot be applied as a command");
        }

        let name = argv[0].as_str().into_owned();
        match self.lookup(&name) {
            Lookup::Native(func) => func(self, argv),
            Lookup::Proc(proc) => proc.execute(self, argv),
            Lookup::Unknown => warble_err!("invalid command name \"{}\"", name),
        }
    }

    /// Evaluates a single word, producing a value.
    pub(crate) fn eval_word(&mut self, word: &Word) -> WarbleResult {
        match word.parts.as_slice() {
            [] => Ok(Value::empty()),
            [part] => match &word.multi {
                Some(multi) => Ok(multi.clone()),
                None => self.eval_part(part),
            },
            parts => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        // Avoid a value round trip for fixed pieces.
                        Part::Bare(v) => out.push_str(&v.as_str()),
                        _ => out.push_str(&self.eval_part(part)?.as_str()),
                    }
                }
                Ok(Value::from(out))
            }
        }
    }

    pub(crate) fn eval_part(&mut self, part: &Part) -> WarbleResult {
        match part {
            Part::Bare(value) => Ok(value.clone()),
            Part::Square(seq) => self.eval_sequence(seq),
            Part::Dollar1(name) => {
                self.scopes.get(name).ok_or_else(|| var_not_found(name))
            }
            Part::Dollar2(name, key_word) => {
                let var = self.scopes.get(name).ok_or_else(|| var_not_found(name))?;
                let key = self.eval_word(key_word)?;
                let key = key.as_str();
                var.get_at(&key)?.ok_or_else(|| key_not_found(name, &key))
            }
        }
    }

    /// Evaluates a value as an expression and returns the computed value.
    /// The compiled expression tree is cached on parsed words; numbers
    /// evaluate to themselves.
    pub fn expr(&mut self, value: &Value) -> WarbleResult {
        if let Some(multi) = value.as_multi() {
            let cached = multi.expr.borrow().clone();
            let compiled = match cached {
                Some(e) => e,
                None => {
                    let parsed = Rc::new(expr::parse(multi.string())?);
                    *multi.expr.borrow_mut() = Some(Rc::clone(&parsed));
                    parsed
                }
            };
            return expr::eval(self, &compiled);
        }
        if value.is_quick_number() && !value.is_quick_string() {
            return Ok(value.clone());
        }
        let parsed = expr::parse(&value.as_str())?;
        expr::eval(self, &parsed)
    }

    /// Evaluates a value as a boolean expression, as the control-flow
    /// commands do for their conditions.
    pub fn expr_bool(&mut self, value: &Value) -> Result<bool, Exception> {
        self.expr(value)?.as_bool()
    }

    /// Determines whether the script is syntactically complete: no
    /// unmatched braces, brackets, or quotes.  REPLs use this to decide
    /// whether to ask for another line of input.
    ///
    /// ```
    /// # use warble::Interp;
    /// let interp = Interp::new();
    /// assert!(interp.complete("set a [expr {1+1}]"));
    /// assert!(!interp.complete("set a [expr {1+1"));
    /// ```
    pub fn complete(&self, script: &str) -> bool {
        parser::parse(script).is_ok()
    }

    //----------------------------------------------------------------------
    // Substitution

    /// Performs backslash, command, and variable substitution on a string,
    /// as the `subst` command does.  Disabled classes are copied through
    /// verbatim, including the full extent of `[...]` and `$name(...)`.
    pub fn subst(&mut self, s: &str, flags: SubstFlags) -> WarbleResult {
        use crate::lexer::{decode_escape, Lex};

        let bytes = s.as_bytes();
        let mut out = String::new();
        let mut i = 0usize;

        while i < bytes.len() {
            match bytes[i] {
                b'\\' => {
                    if flags.no_backslash {
                        out.push('\\');
                        i += 1;
                        if let Some(c) = s[i..].chars().next() {
                            out.push(c);
                            i += c.len_utf8();
                        }
                    } else {
                        let (c, used) = decode_escape(s, i)?;
                        out.push(c);
                        i += used;
                    }
                }
                b'[' => {
                    let mut lex = Lex::new(&s[i..]);
                    let part = parser::parse_square(&mut lex)?;
                    let end = i + lex.pos + 1;
                    if flags.no_square {
                        out.push_str(&s[i..end]);
                    } else if let Part::Square(seq) = part {
                        out.push_str(&self.eval_sequence(&seq)?.as_str());
                    }
                    i = end;
                }
                b'$' => {
                    let mut lex = Lex::new(&s[i..]);
                    let part = parser::parse_dollar(&mut lex)?;
                    let end = i + lex.next;
                    if flags.no_dollar {
                        out.push_str(&s[i..end]);
                    } else {
                        out.push_str(&self.eval_part(&part)?.as_str());
                    }
                    i = end;
                }
                _ => match s[i..].chars().next() {
                    Some(c) => {
                        out.push(c);
                        i += c.len_utf8();
                    }
                    None => break,
                },
            }
        }

        Ok(Value::from(out))
    }

    //----------------------------------------------------------------------
    // Variable handling

    /// Retrieves the value of the named variable in the current scope, or
    /// an error if it is not defined.
    pub fn get_var(&self, name: &str) -> WarbleResult {
        self.scopes.get(name).ok_or_else(|| var_not_found(name))
    }

    /// Sets the value of the named variable in the current scope, creating
    /// it if necessary.
    pub fn set_var(&mut self, name: &str, value: Value) -> Result<(), Exception> {
        self.scopes.set(name, value)
    }

    /// Sets a variable and returns the assigned value, which is convenient
    /// for commands whose result is the assignment.
    pub fn set_var_return(&mut self, name: &str, value: Value) -> WarbleResult {
        self.set_var(name, value.clone())?;
        Ok(value)
    }

    /// Whether the named variable is defined in the current scope.
    pub fn has_var(&self, name: &str) -> bool {
        self.scopes.has(name)
    }

    /// The names of the variables in the current frame.
    pub fn local_var_names(&self) -> Vec<String> {
        self.scopes.local_names()
    }

    /// The names of the variables in the global frame.
    pub fn global_var_names(&self) -> Vec<String> {
        self.scopes.global_names()
    }

    /// Installs `local` in the current frame as an alias for `remote` in
    /// the frame at absolute `level`; the `upvar` and `global` mechanism.
    pub(crate) fn link_var(&mut self, local: &str, level: usize, remote: &str) {
        self.scopes.link(local, level, remote);
    }

    /// Walks `count` parents up the frame chain, saturating at the global
    /// frame.
    pub(crate) fn frame_level_up(&self, count: usize) -> usize {
        self.scopes.level_up(count)
    }

    /// Runs `body` with the current frame redirected to `level`, restoring
    /// the previous frame afterwards; the `uplevel` mechanism.
    pub(crate) fn with_frame_level<F>(&mut self, level: usize, body: F) -> WarbleResult
    where
        F: FnOnce(&mut Interp) -> WarbleResult,
    {
        let saved = self.scopes.current_level();
        self.scopes.set_current_level(level);
        let result = body(self);
        self.scopes.set_current_level(saved);
        result
    }

    /// Direct global cells as string pairs, for seeding the interpreter of
    /// a `go` thread.
    pub(crate) fn global_snapshot(&self) -> Vec<(String, String)> {
        self.scopes.global_snapshot()
    }

    //----------------------------------------------------------------------
    // Command definition and handling

    /// Registers a command that safe, sandboxed evaluation may call.
    pub fn register_safe(&mut self, name: &str, func: CommandFunc) {
        self.cmds
            .insert(name.to_string(), Rc::new(CommandDef::Native(func)));
    }

    /// Registers a privileged command, reachable only in this interpreter.
    pub fn register_unsafe(&mut self, name: &str, func: CommandFunc) {
        self.unsafes.insert(name.to_string(), func);
    }

    /// Whether a command with this name can be dispatched.
    pub fn has_command(&self, name: &str) -> bool {
        !matches!(self.lookup(name), Lookup::Unknown)
    }

    /// The names of every dispatchable command: registered commands, the
    /// safe built-ins, and granted unsafe commands.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cmds.keys().cloned().collect();
        names.extend(commands::safe_names().iter().map(|s| s.to_string()));
        names.extend(self.unsafes.keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    /// Whether the name is taken by a registered command or procedure (not
    /// counting built-ins).
    pub(crate) fn is_registered(&self, name: &str) -> bool {
        self.cmds.contains_key(name)
    }

    pub(crate) fn add_proc(&mut self, name: &str, proc: Procedure) {
        self.cmds
            .insert(name.to_string(), Rc::new(CommandDef::Proc(Rc::new(proc))));
    }

    fn lookup(&self, name: &str) -> Lookup {
        if let Some(def) = self.cmds.get(name) {
            return match &**def {
                CommandDef::Native(func) => Lookup::Native(*func),
                CommandDef::Proc(proc) => Lookup::Proc(Rc::clone(proc)),
            };
        }
        if let Some(func) = commands::find_safe(name) {
            return Lookup::Native(func);
        }
        if let Some(func) = self.unsafes.get(name) {
            return Lookup::Native(*func);
        }
        Lookup::Unknown
    }

    /// Sends the nil-argv usage probe to a command, returning its declared
    /// usage string if it answers.
    pub(crate) fn probe_usage(&mut self, name: &str) -> Option<String> {
        let probe = match self.lookup(name) {
            Lookup::Native(func) => func(self, &[]),
            Lookup::Proc(proc) => proc.execute(self, &[]),
            Lookup::Unknown => return None,
        };
        match probe {
            Err(e) if e.code() == ResultCode::Usage => Some(e.value().as_str().into_owned()),
            _ => None,
        }
    }

    /// Calls a subcommand of the current command, looking up `argv[subc]`
    /// in an ensemble's subcommand table.  An exact name match wins;
    /// otherwise a unique prefix matches; ambiguous or unknown names produce
    /// an error listing the options.
    pub fn call_subcommand(
        &mut self,
        argv: &[Value],
        subc: usize,
        subcommands: &[Subcommand],
    ) -> WarbleResult {
        check_args(subc, argv, subc + 1, 0, "subcommand ?arg ...?")?;
        let sub = Subcommand::find(subcommands, &argv[subc].as_str())?;
        (sub.1)(self, argv)
    }

    //----------------------------------------------------------------------
    // Macros

    pub(crate) fn find_macro(&self, name: &str) -> Option<Rc<MacroDef>> {
        self.macros.get(name).map(Rc::clone)
    }

    /// The names of the defined macros.
    pub fn macro_names(&self) -> Vec<String> {
        self.macros.keys().cloned().collect()
    }

    /// Defines a macro.  Macro and command namespaces are disjoint: a macro
    /// may not shadow a command, nor be redefined.
    pub(crate) fn define_macro(
        &mut self,
        name: &str,
        formals: &Value,
        body: &Value,
    ) -> Result<(), Exception> {
        if commands::find_safe(name).is_some() || self.is_registered(name) {
            return warble_err!("a command named \"{}\" already exists", name);
        }
        if self.macros.contains_key(name) {
            return warble_err!("a macro named \"{}\" already exists", name);
        }

        let formals: Vec<String> = formals
            .as_list()?
            .iter()
            .map(|v| v.as_str().into_owned())
            .collect();
        let body = self.compile(&body.as_str(), false)?;
        self.macros.insert(
            name.to_string(),
            Rc::new(MacroDef {
                formals,
                body: Rc::new(body),
            }),
        );
        Ok(())
    }

    //----------------------------------------------------------------------
    // Interpreter configuration

    /// The recursion limit: how deep evaluations may nest.  The default is
    /// 1000.
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }

    /// Enables the trace categories named by the given flag letters.
    pub fn set_debug_flags(&mut self, letters: &str) {
        for b in letters.bytes() {
            self.debug[b as usize] = true;
        }
    }

    pub fn debug_flag(&self, flag: u8) -> bool {
        self.debug[flag as usize]
    }

    /// The prefix used by the `log` command's messages.
    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    pub fn set_log_name(&mut self, name: &str) {
        self.log_name = name.to_string();
    }

    //----------------------------------------------------------------------
    // Frames (used by procedure calls)

    pub(crate) fn push_frame(&mut self, debug_name: &str) {
        self.scopes.push(debug_name);
    }

    pub(crate) fn pop_frame(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn set_local(&mut self, name: &str, value: Value) {
        self.scopes.set_local(name, value);
    }

    pub(crate) fn local_cells(&self) -> Vec<(String, Value)> {
        self.scopes.local_cells()
    }
}

pub(crate) fn var_not_found(name: &str) -> Exception {
    Exception::error(Value::from(format!(
        "variable \"{}\" does not exist",
        name
    )))
}

pub(crate) fn key_not_found(name: &str, key: &str) -> Exception {
    Exception::error(Value::from(format!(
        "no key \"{}\" in variable \"{}\"",
        key, name
    )))
}

//--------------------------------------------------------------------------
// Procedures

/// How a procedure is defined: formal parameters (with optional defaults)
/// and a compiled body.  The procedure does not know its own name; the name
/// lives in the command table and can differ from the defining call.
pub(crate) struct Procedure {
    formals: Vec<(String, Option<Value>)>,
    body: Rc<Sequence>,
    signature: String,
}

impl Procedure {
    pub(crate) fn new(formals: Vec<(String, Option<Value>)>, body: Rc<Sequence>) -> Self {
        let signature = Self::build_signature(&formals);
        Self {
            formals,
            body,
            signature,
        }
    }

    fn build_signature(formals: &[(String, Option<Value>)]) -> String {
        let mut parts: Vec<String> = Vec::new();
        for (i, (name, default)) in formals.iter().enumerate() {
            if name == "args" && i == formals.len() - 1 {
                parts.push("?arg ...?".to_string());
            } else if default.is_some() {
                parts.push(format!("?{}?", name));
            } else {
                parts.push(name.clone());
            }
        }
        parts.join(" ")
    }

    fn execute(&self, interp: &mut Interp, argv: &[Value]) -> WarbleResult {
        if argv.is_empty() {
            return Err(Exception::usage(&self.signature));
        }

        // FIRST, pair formals with actuals.  The trailing formal `args`
        // takes the rest of the actuals as a list; missing actuals fall
        // back to declared defaults.
        let mut bindings: Vec<(String, Value)> = Vec::new();
        let mut argi = 1;
        for (i, (name, default)) in self.formals.iter().enumerate() {
            if name == "args" && i == self.formals.len() - 1 {
                bindings.push((name.clone(), Value::from(&argv[argi..])));
                argi = argv.len();
                break;
            }
            if argi < argv.len() {
                bindings.push((name.clone(), argv[argi].clone()));
                argi += 1;
                continue;
            }
            match default {
                Some(value) => bindings.push((name.clone(), value.clone())),
                None => return self.wrong_num_args(&argv[0]),
            }
        }
        if argi != argv.len() {
            return self.wrong_num_args(&argv[0]);
        }

        // NEXT, evaluate the body in a fresh frame.
        let proc_name = argv[0].as_str().into_owned();
        interp.push_frame(&proc_name);
        for (name, value) in bindings {
            interp.set_local(&name, value);
        }

        let mut result = interp.eval_sequence(&self.body);

        // NEXT, decorate errors with the call context while the locals are
        // still in scope.
        if let Err(exception) = &mut result {
            if exception.is_error() {
                decorate_error(exception, interp, argv, &proc_name);
            }
        }

        interp.pop_frame();

        // NEXT, absorb the proc-level jumps.
        match result {
            Err(exception) => match exception.code() {
                ResultCode::Return => Ok(exception.value()),
                ResultCode::Break => Err(loop_escape("break", &proc_name)),
                ResultCode::Continue => Err(loop_escape("continue", &proc_name)),
                _ => Err(exception),
            },
            ok => ok,
        }
    }

    fn wrong_num_args(&self, name: &Value) -> WarbleResult {
        if self.signature.is_empty() {
            warble_err!("wrong # args: should be \"{}\"", name)
        } else {
            warble_err!("wrong # args: should be \"{} {}\"", name, self.signature)
        }
    }
}

fn loop_escape(kind: &str, proc_name: &str) -> Exception {
    let mut exception = Exception::error(Value::from(format!(
        "invoked \"{}\" outside of a loop",
        kind
    )));
    exception.annotate(&format!("    in proc \"{}\"", proc_name));
    exception
}

/// Appends the proc name and truncated argument and local snapshots to an
/// error, building the stack trace as the error unwinds.
fn decorate_error(exception: &mut Exception, interp: &Interp, argv: &[Value], proc_name: &str) {
    exception.annotate(&format!("    in proc \"{}\"", proc_name));
    for (i, arg) in argv[1..].iter().enumerate() {
        exception.annotate(&format!("        arg:{} = \"{}\"", i, clip(&arg.as_str())));
    }
    for (name, value) in interp.local_cells() {
        exception.annotate(&format!(
            "        local:{} = \"{}\"",
            name,
            clip(&value.as_str())
        ));
    }
}

fn clip(s: &str) -> String {
    if s.chars().count() <= 80 {
        s.to_string()
    } else {
        let head: String = s.chars().take(80).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval() {
        let mut interp = Interp::new();

        assert_eq!(interp.eval("set a 1"), Ok(Value::from("1")));
        assert!(ex_match(
            &interp.eval("error 2"),
            &Exception::error(Value::from("2"))
        ));
        assert_eq!(interp.eval("return 3"), Ok(Value::from("3")));
        assert!(ex_match(
            &interp.eval("break"),
            &Exception::error(Value::from("invoked \"break\" outside of a loop"))
        ));
        assert!(ex_match(
            &interp.eval("continue"),
            &Exception::error(Value::from("invoked \"continue\" outside of a loop"))
        ));
    }

    // Shows that the result matches the given exception in code and value.
    fn ex_match(result: &WarbleResult, expected: &Exception) -> bool {
        match result {
            Err(e) => e.code() == expected.code() && e.value() == expected.value(),
            Ok(_) => false,
        }
    }

    #[test]
    fn test_eval_value_caches_script() {
        let mut interp = Interp::new();
        let script = Value::multi("set a [expr {1 + 1}]");
        assert_eq!(interp.eval_value(&script), Ok(Value::from("2")));
        assert_eq!(interp.eval_value(&script), Ok(Value::from("2")));
    }

    #[test]
    fn test_unknown_command() {
        let mut interp = Interp::new();
        assert!(ex_match(
            &interp.eval("definitely-not-a-command"),
            &Exception::error(Value::from(
                "invalid command name \"definitely-not-a-command\""
            ))
        ));
    }

    #[test]
    fn test_register_safe() {
        fn cmd_double(_interp: &mut Interp, argv: &[Value]) -> WarbleResult {
            check_args(1, argv, 2, 2, "value")?;
            Ok(Value::from(argv[1].as_int()? * 2))
        }

        let mut interp = Interp::new();
        interp.register_safe("double", cmd_double);
        assert_eq!(interp.eval("double 21"), Ok(Value::from("42")));
        assert!(interp.has_command("double"));
    }

    #[test]
    fn test_register_unsafe_dispatches() {
        fn cmd_priv(_: &mut Interp, _: &[Value]) -> WarbleResult {
            Ok(Value::from("privileged"))
        }

        let mut interp = Interp::new();
        assert!(!interp.has_command("priv"));
        interp.register_unsafe("priv", cmd_priv);
        assert_eq!(interp.eval("priv"), Ok(Value::from("privileged")));
    }

    #[test]
    fn test_variables() {
        let mut interp = Interp::new();
        interp.set_var("a", Value::from(1)).unwrap();
        assert_eq!(interp.get_var("a"), Ok(Value::from(1)));
        assert!(interp.get_var("nope").is_err());
        assert!(interp.has_var("a"));
    }

    #[test]
    fn test_expr() {
        let mut interp = Interp::new();
        assert_eq!(interp.expr(&Value::from("1 + 2")), Ok(Value::from(3)));
        assert_eq!(interp.expr(&Value::from(7)), Ok(Value::from(7)));
        assert!(interp.expr(&Value::from("1 +")).is_err());
        assert_eq!(interp.expr_bool(&Value::from("1 < 2")), Ok(true));
    }

    #[test]
    fn test_complete() {
        let interp = Interp::new();
        assert!(interp.complete("abc"));
        assert!(interp.complete("a {bc} [def] \"ghi\" xyz"));
        assert!(!interp.complete("a {bc"));
        assert!(!interp.complete("a [bc"));
        assert!(!interp.complete("a \"bc"));
    }

    #[test]
    fn test_subst() {
        let mut interp = Interp::new();
        interp.set_var("x", Value::from(5)).unwrap();

        let all = interp.subst("a $x [expr {1 + 1}] \\t b", SubstFlags::ALL);
        assert_eq!(all, Ok(Value::from("a 5 2 \t b")));

        let flags = SubstFlags {
            no_dollar: true,
            ..SubstFlags::default()
        };
        assert_eq!(interp.subst("a $x b", flags), Ok(Value::from("a $x b")));

        let flags = SubstFlags {
            no_square: true,
            ..SubstFlags::default()
        };
        assert_eq!(
            interp.subst("a [list 1] b", flags),
            Ok(Value::from("a [list 1] b"))
        );

        let flags = SubstFlags {
            no_backslash: true,
            ..SubstFlags::default()
        };
        assert_eq!(interp.subst("a \\t b", flags), Ok(Value::from("a \\t b")));
    }

    #[test]
    fn test_recursion_limit() {
        let mut interp = Interp::new();
        assert_eq!(interp.recursion_limit(), 1000);
        interp.set_recursion_limit(100);
        assert_eq!(interp.recursion_limit(), 100);

        assert!(interp.eval("proc myproc {} { myproc }").is_ok());
        match interp.eval("myproc") {
            Err(e) => {
                assert!(e
                    .value()
                    .as_str()
                    .starts_with("too many nested evaluations"));
            }
            Ok(v) => panic!("expected recursion error, got {}", v),
        }
    }

    #[test]
    fn test_command_names_include_builtins() {
        let interp = Interp::new();
        let names = interp.command_names();
        assert!(names.iter().any(|n| n == "set"));
        assert!(names.iter().any(|n| n == "foreach"));
    }
}
