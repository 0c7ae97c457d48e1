//! The command-grammar parser and the macro expander.
//!
//! Parsing produces a [`Sequence`] of [`Command`]s of [`Word`]s of [`Part`]s:
//!
//! ```text
//! Sequence := ( Command )*
//! Command  := (Newline|Semicolon)* ( Word (WordSep Word)* )? Terminator
//! Word     := Curly | ExpandSquare | ExpandDollar | Square | Quote | Bare
//! ```
//!
//! A word of exactly one bare part caches a [`Multi`](crate::value::Multi)
//! value, so fixed words cost nothing to evaluate.  A word may instead be
//! flagged `expand`, in which case its list value is spliced into the
//! enclosing command's argument vector at evaluation time.
//!
//! Before its first evaluation a parsed sequence goes through the macro
//! expander ([`Sequence::expand_macros`]), which rewrites macro calls into
//! their bodies with formal parameters substituted, and re-attempts to
//! compile bare literals as nested sequences so that `eval` of a literal can
//! skip re-parsing.

use crate::interp::Interp;
use crate::lexer::{Lex, Tok};
use crate::types::*;
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// A macro: formal parameter names and a compiled body sequence.
#[derive(Debug)]
pub struct MacroDef {
    pub formals: Vec<String>,
    pub body: Rc<Sequence>,
}

/// A parsed script: a list of commands plus the source slice they were
/// parsed from.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub commands: Vec<Command>,
    pub src: String,
}

/// One command: a list of words.
#[derive(Debug, Clone)]
pub struct Command {
    pub words: Vec<Word>,
}

/// One word, composed of parts that may require substitution.  `multi` is
/// set when the word is a single bare part and its value is fixed.
#[derive(Debug, Clone)]
pub struct Word {
    pub parts: Vec<Part>,
    pub multi: Option<Value>,
    pub expand: bool,
}

/// One part of a word.
#[derive(Debug, Clone)]
pub enum Part {
    /// A literal, backslash escapes already decoded.
    Bare(Value),
    /// `$name`.
    Dollar1(String),
    /// `$name(key)`; the key is itself a word.
    Dollar2(String, Word),
    /// `[ ... ]`: a nested sequence evaluated in place.
    Square(Rc<Sequence>),
}

impl Word {
    fn bare(value: Value) -> Word {
        Word {
            parts: vec![Part::Bare(value.clone())],
            multi: Some(value),
            expand: false,
        }
    }

    fn of_part(part: Part) -> Word {
        Word {
            parts: vec![part],
            multi: None,
            expand: false,
        }
    }
}

fn parse_error(msg: impl Into<String>) -> Exception {
    Exception::error(Value::from(msg.into()))
}

/// Parses a script into a sequence.  No macro expansion is performed; use
/// [`Interp::compile`](crate::interp::Interp) for the full pipeline.
pub fn parse(src: &str) -> Result<Sequence, Exception> {
    let mut lex = Lex::new(src);
    let seq = parse_sequence(&mut lex)?;
    if lex.tok != Tok::End {
        return Err(parse_error(format!(
            "extra characters after close-bracket: \"{}\"",
            lex.current()
        )));
    }
    Ok(seq)
}

fn parse_sequence(lex: &mut Lex) -> Result<Sequence, Exception> {
    let begin = lex.pos;
    let mut commands = Vec::new();
    while let Some(cmd) = parse_command(lex)? {
        commands.push(cmd);
    }
    let src = lex.slice(begin, lex.pos).to_string();
    Ok(Sequence { commands, src })
}

/// Parses the next command, or `None` at a sequence boundary.  Leaves the
/// lexer at end-of-input, or on the close-bracket that ends an enclosing
/// square sequence.
fn parse_command(lex: &mut Lex) -> Result<Option<Command>, Exception> {
    'restart: loop {
        while matches!(lex.tok, Tok::Newline | Tok::Char(b';')) {
            lex.advance();
        }

        let mut words: Vec<Word> = Vec::new();

        while lex.tok != Tok::End {
            match lex.tok {
                Tok::Newline | Tok::Char(b';') => {
                    lex.advance();
                    break;
                }
                // Not part of the word: terminates the enclosing sequence.
                Tok::Char(b']') => break,
                Tok::Char(b'{') => {
                    let word = parse_curly(lex)?;
                    if !lex.followed_by_gap() {
                        return Err(parse_error("braces are not followed by end of word"));
                    }
                    words.push(word);
                    lex.advance();
                }
                Tok::ExpandSquare => {
                    let part = parse_square(lex)?;
                    if !lex.followed_by_gap() {
                        return Err(parse_error(
                            "expanding brackets are not followed by end of word",
                        ));
                    }
                    words.push(Word {
                        parts: vec![part],
                        multi: None,
                        expand: true,
                    });
                    lex.advance();
                }
                Tok::ExpandDollar => {
                    let part = parse_dollar(lex)?;
                    if !lex.followed_by_gap() {
                        return Err(parse_error(
                            "expanding substitution is not followed by end of word",
                        ));
                    }
                    words.push(Word {
                        parts: vec![part],
                        multi: None,
                        expand: true,
                    });
                    lex.advance();
                }
                Tok::Char(b'[') => {
                    let part = parse_square(lex)?;
                    words.push(Word::of_part(part));
                    lex.advance();
                }
                Tok::Char(b'"') => {
                    let word = parse_quote(lex)?;
                    words.push(word);
                    lex.advance();
                }
                // A comment, but only before the first word of a command.
                Tok::Char(b'#') if words.is_empty() => {
                    lex.skip_comment();
                    continue 'restart;
                }
                _ => words.push(parse_word(lex)?),
            }
        }

        return Ok(if words.is_empty() {
            None
        } else {
            Some(Command { words })
        });
    }
}

/// `{...}`: an opaque literal.  Leaves the lexer on the close brace.
pub(crate) fn parse_curly(lex: &mut Lex) -> Result<Word, Exception> {
    let contents = lex.advance_curly()?;
    lex.advance();
    Ok(Word::bare(Value::multi(&contents)))
}

/// `[...]`: a nested sequence.  Accepts the plain and expand forms; leaves
/// the lexer on the close bracket.
pub(crate) fn parse_square(lex: &mut Lex) -> Result<Part, Exception> {
    lex.advance();
    let begin = lex.pos;
    let mut commands = Vec::new();
    while let Some(cmd) = parse_command(lex)? {
        commands.push(cmd);
    }
    if lex.tok != Tok::Char(b']') {
        return Err(parse_error("missing close bracket"));
    }
    let src = lex.slice(begin, lex.pos).to_string();
    Ok(Part::Square(Rc::new(Sequence { commands, src })))
}

/// `"..."`: a substituted literal.  Leaves the lexer on the close quote.
pub(crate) fn parse_quote(lex: &mut Lex) -> Result<Word, Exception> {
    let mut parts: Vec<Part> = Vec::new();
    let mut buf: Vec<u8> = Vec::new();
    let mut closed = false;

    while let Some(c) = lex.peek_next() {
        match c {
            b'"' => {
                lex.advance();
                closed = true;
                break;
            }
            b'[' => {
                finish_bare(&mut parts, &mut buf);
                lex.advance();
                parts.push(parse_square(lex)?);
            }
            b']' => {
                return Err(parse_error("found close-bracket inside quoted string"));
            }
            b'$' => {
                finish_bare(&mut parts, &mut buf);
                lex.advance();
                parts.push(parse_dollar(lex)?);
            }
            b'\\' => push_char(&mut buf, lex.escape_at_next()?),
            _ => {
                buf.push(c);
                lex.stretch1();
            }
        }
    }

    if !closed {
        return Err(parse_error("missing close quote"));
    }
    finish_bare(&mut parts, &mut buf);
    Ok(Word {
        parts,
        multi: None,
        expand: false,
    })
}

/// A variable substitution after `$`.  Leaves the lexer just past the name,
/// or on the close parenthesis of a keyed reference.
pub(crate) fn parse_dollar(lex: &mut Lex) -> Result<Part, Exception> {
    lex.advance_if_alfanum();
    match lex.tok {
        Tok::AlfaNum
        | Tok::StrEq
        | Tok::StrNe
        | Tok::StrLt
        | Tok::StrLe
        | Tok::StrGt
        | Tok::StrGe => {}
        _ => return Err(parse_error("expected variable name after \"$\"")),
    }
    let name = lex.current().to_string();

    if lex.peek_next() == Some(b'(') {
        let key = parse_dollar_key(lex)?;
        Ok(Part::Dollar2(name, key))
    } else {
        Ok(Part::Dollar1(name))
    }
}

/// The key of `$name(key)`.  Dollar, square, and backslash substitutions
/// occur; whitespace and quotes are not special; terminates at `)`.
fn parse_dollar_key(lex: &mut Lex) -> Result<Word, Exception> {
    let mut parts: Vec<Part> = Vec::new();
    let mut buf: Vec<u8> = Vec::new();
    lex.stretch1(); // past the open parenthesis

    loop {
        match lex.peek_next() {
            None => return Err(parse_error("missing close parenthesis")),
            Some(b')') => break,
            Some(b'[') => {
                finish_bare(&mut parts, &mut buf);
                lex.advance();
                parts.push(parse_square(lex)?);
            }
            Some(b'$') => {
                finish_bare(&mut parts, &mut buf);
                lex.advance();
                parts.push(parse_dollar(lex)?);
            }
            Some(b'\\') => push_char(&mut buf, lex.escape_at_next()?),
            Some(c) => {
                buf.push(c);
                lex.stretch1();
            }
        }
    }

    lex.advance(); // focus on the close parenthesis
    finish_bare(&mut parts, &mut buf);
    Ok(Word {
        parts,
        multi: None,
        expand: false,
    })
}

/// A bare word: literal bytes plus interpolated dollar and square parts,
/// terminating at whitespace, a terminator, or a close-bracket.
fn parse_word(lex: &mut Lex) -> Result<Word, Exception> {
    let mut parts: Vec<Part> = Vec::new();
    let mut buf: Vec<u8> = Vec::new();

    while lex.tok != Tok::End {
        match lex.tok {
            Tok::Char(b'[') => {
                finish_bare(&mut parts, &mut buf);
                parts.push(parse_square(lex)?);
            }
            Tok::Char(b']') | Tok::Newline => break,
            Tok::Char(b'$') => {
                finish_bare(&mut parts, &mut buf);
                parts.push(parse_dollar(lex)?);
            }
            Tok::Char(b'"') => {
                return Err(parse_error("found double-quote inside word"));
            }
            Tok::Char(b'\\') => push_char(&mut buf, lex.escape_at_pos()?),
            _ => buf.extend_from_slice(lex.current().as_bytes()),
        }

        // A gap after the piece just consumed ends the word.
        match lex.peek_next() {
            Some(b' ' | b'\t' | b'\r' | 0x0b | b'\n' | b';') => {
                lex.advance();
                break;
            }
            _ => lex.advance(),
        }
    }

    finish_bare(&mut parts, &mut buf);
    let multi = match parts.as_slice() {
        [Part::Bare(v)] => Some(v.clone()),
        _ => None,
    };
    Ok(Word {
        parts,
        multi,
        expand: false,
    })
}

fn finish_bare(parts: &mut Vec<Part>, buf: &mut Vec<u8>) {
    if !buf.is_empty() {
        let s = String::from_utf8_lossy(buf).into_owned();
        parts.push(Part::Bare(Value::multi(&s)));
        buf.clear();
    }
}

fn push_char(buf: &mut Vec<u8>, c: char) {
    let mut tmp = [0u8; 4];
    buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
}

//--------------------------------------------------------------------------
// Macro expansion

/// Formal-parameter bindings: each formal maps to one actual word, except
/// `ARGS`, which maps to the whole trailing word vector.
type Params = HashMap<String, Vec<Word>>;

impl Sequence {
    /// Rewrites macro calls into their bodies and recompiles bare literals.
    /// `budget` bounds the length of bare strings that are speculatively
    /// compiled, which also bounds the expansion recursion.  When `define`
    /// is set, literal `macro` definitions take effect during expansion so
    /// that later commands in the same script can use them.
    pub(crate) fn expand_macros(
        &self,
        interp: &mut Interp,
        budget: usize,
        define: bool,
    ) -> Result<Sequence, Exception> {
        let mut commands = Vec::new();
        for cmd in &self.commands {
            commands.extend(cmd.expand_macros(interp, budget, define)?);
        }
        Ok(Sequence {
            commands,
            src: self.src.clone(),
        })
    }

    fn clone_and_subst(&self, params: &Params) -> Result<Sequence, Exception> {
        let mut commands = Vec::new();
        for cmd in &self.commands {
            commands.push(cmd.clone_and_subst(params)?);
        }
        Ok(Sequence {
            commands,
            src: self.src.clone(),
        })
    }
}

impl Command {
    fn expand_macros(
        &self,
        interp: &mut Interp,
        budget: usize,
        define: bool,
    ) -> Result<Vec<Command>, Exception> {
        if let Some(head) = self.words.first().and_then(|w| w.multi.clone()) {
            let name = head.as_str().into_owned();

            // A literal macro definition takes effect now, and the command is
            // consumed by the expansion.
            if define && name == "macro" && self.words.len() == 4 {
                if let (Some(mname), Some(formals), Some(body)) = (
                    self.words[1].multi.clone(),
                    self.words[2].multi.clone(),
                    self.words[3].multi.clone(),
                ) {
                    interp.define_macro(&mname.as_str(), &formals, &body)?;
                    return Ok(Vec::new());
                }
            }

            if let Some(mac) = interp.find_macro(&name) {
                // The budget shrinks with each nested expansion, so a macro
                // that rewrites to itself errors out instead of recursing
                // forever.
                if budget == 0 {
                    return Err(parse_error(format!(
                        "macro \"{}\" expands too deeply",
                        name
                    )));
                }
                let params = bind_macro_params(&mac, &name, &self.words)?;
                let body = mac.body.clone_and_subst(&params)?;
                let mut out = Vec::new();
                for cmd in &body.commands {
                    out.extend(cmd.expand_macros(interp, budget - 1, define)?);
                }
                return Ok(out);
            }
        }

        let mut words = Vec::new();
        for word in &self.words {
            words.push(word.expand_macros(interp, budget, define)?);
        }
        Ok(vec![Command { words }])
    }

    fn clone_and_subst(&self, params: &Params) -> Result<Command, Exception> {
        let mut words = Vec::new();
        for word in &self.words {
            words.extend(word.clone_and_subst(params)?);
        }
        Ok(Command { words })
    }
}

fn bind_macro_params(
    mac: &MacroDef,
    name: &str,
    words: &[Word],
) -> Result<Params, Exception> {
    let mut params = Params::new();
    let formals = &mac.formals;
    let actuals = &words[1..];

    let varargs = formals.last().map(String::as_str) == Some("ARGS");
    let fixed = if varargs {
        formals.len() - 1
    } else {
        formals.len()
    };

    if varargs {
        if actuals.len() < fixed {
            return Err(parse_error(format!(
                "too few args to macro \"{}\": got {}, wanted at least {}",
                name,
                actuals.len(),
                fixed
            )));
        }
    } else if actuals.len() != fixed {
        return Err(parse_error(format!(
            "wrong number of args to macro \"{}\": got {}, wanted {}",
            name,
            actuals.len(),
            fixed
        )));
    }

    for (i, formal) in formals[..fixed].iter().enumerate() {
        if formal == "ARGS" {
            return Err(parse_error(
                "a macro can take ARGS only as its last parameter",
            ));
        }
        params.insert(formal.clone(), vec![actuals[i].clone()]);
    }
    if varargs {
        params.insert("ARGS".to_string(), actuals[fixed..].to_vec());
    }
    Ok(params)
}

impl Word {
    fn expand_macros(
        &self,
        interp: &mut Interp,
        budget: usize,
        define: bool,
    ) -> Result<Word, Exception> {
        let mut parts = Vec::new();
        for part in &self.parts {
            parts.push(part.expand_macros(interp, budget, define)?);
        }
        let multi = match parts.as_slice() {
            [Part::Bare(v)] => Some(v.clone()),
            _ => None,
        };
        Ok(Word {
            parts,
            multi,
            expand: self.expand,
        })
    }

    fn clone_and_subst(&self, params: &Params) -> Result<Vec<Word>, Exception> {
        // `$ARGS` as a whole expand-word splices the trailing actuals.
        if self.expand {
            if let [Part::Dollar1(name)] = self.parts.as_slice() {
                if name == "ARGS" {
                    if let Some(words) = params.get("ARGS") {
                        return Ok(words.clone());
                    }
                }
            }
        }

        if let Some(multi) = &self.multi {
            // A fixed bare word.  Formals are still substituted textually,
            // so a braced macro body like { expr {$x + $x} } sees its
            // parameters.
            let s = multi.as_str();
            if s.contains('$') {
                let rewritten = subst_dumb_dollars(&s, params)?;
                if rewritten != *s {
                    let value = Value::multi(&rewritten);
                    return Ok(vec![Word {
                        parts: vec![Part::Bare(value.clone())],
                        multi: Some(value),
                        expand: self.expand,
                    }]);
                }
            }
            return Ok(vec![self.clone()]);
        }

        let mut parts = Vec::new();
        for part in &self.parts {
            parts.extend(part.clone_and_subst(params)?);
        }
        Ok(vec![Word {
            parts,
            multi: None,
            expand: self.expand,
        }])
    }

    /// Reconstructs the source text of a word, for textual substitution of
    /// macro actuals into bare literals.
    fn source(&self) -> String {
        let mut out = String::new();
        if self.expand {
            out.push_str("{*}");
        }
        for part in &self.parts {
            part.source(&mut out);
        }
        out
    }
}

impl Part {
    fn expand_macros(
        &self,
        interp: &mut Interp,
        budget: usize,
        define: bool,
    ) -> Result<Part, Exception> {
        Ok(match self {
            Part::Bare(v) => {
                let s = v.as_str().into_owned();
                if s.len() >= budget {
                    self.clone()
                } else {
                    // Speculatively compile the literal as a nested sequence
                    // so `eval` of it skips re-parsing.  Definitions are
                    // suppressed: this compile may never be evaluated.
                    let seq = interp.compile(&s, false).ok().map(Rc::new);
                    Part::Bare(Value::multi_precompiled(&s, seq))
                }
            }
            Part::Dollar1(_) => self.clone(),
            Part::Dollar2(name, word) => Part::Dollar2(
                name.clone(),
                word.expand_macros(interp, budget, define)?,
            ),
            Part::Square(seq) => {
                Part::Square(Rc::new(seq.expand_macros(interp, budget, define)?))
            }
        })
    }

    fn clone_and_subst(&self, params: &Params) -> Result<Vec<Part>, Exception> {
        Ok(match self {
            Part::Bare(_) => vec![self.clone()],
            Part::Dollar1(name) => {
                if name == "ARGS" {
                    return Err(parse_error(
                        "\"$ARGS\" cannot be used inside a word in a macro body",
                    ));
                }
                match params.get(name) {
                    Some(words) => words[0].parts.clone(),
                    None => vec![self.clone()],
                }
            }
            Part::Dollar2(name, word) => {
                let mut substituted = word.clone_and_subst(params)?;
                if substituted.len() != 1 {
                    return Err(parse_error(
                        "macro substitution produced a malformed key",
                    ));
                }
                vec![Part::Dollar2(name.clone(), substituted.remove(0))]
            }
            Part::Square(seq) => vec![Part::Square(Rc::new(seq.clone_and_subst(params)?))],
        })
    }

    fn source(&self, out: &mut String) {
        match self {
            Part::Bare(v) => out.push_str(&v.as_str()),
            Part::Dollar1(name) => {
                out.push('$');
                out.push_str(name);
            }
            Part::Dollar2(name, word) => {
                out.push('$');
                out.push_str(name);
                out.push('(');
                out.push_str(&word.source());
                out.push(')');
            }
            Part::Square(seq) => {
                out.push('[');
                out.push_str(&seq.src);
                out.push(']');
            }
        }
    }
}

/// Replaces `$name` occurrences in a bare string with the source text of the
/// bound actual.  `$ARGS` is an error here: it may appear only as a whole
/// expand-word.
fn subst_dumb_dollars(s: &str, params: &Params) -> Result<String, Exception> {
    let bytes = s.as_bytes();
    let mut out = String::new();
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] == b'$' {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                j += 1;
            }
            if j > i + 1 {
                let name = &s[i + 1..j];
                if name == "ARGS" {
                    return Err(parse_error(
                        "\"$ARGS\" cannot be used inside a word in a macro body",
                    ));
                }
                if let Some(words) = params.get(name) {
                    out.push_str(&words[0].source());
                    i = j;
                    continue;
                }
            }
        }
        match s[i..].chars().next() {
            Some(c) => {
                out.push(c);
                i += c.len_utf8();
            }
            None => break,
        }
    }
    Ok(out)
}
