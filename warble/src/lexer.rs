//! The lexer.
//!
//! [`Lex`] walks a byte buffer with two cursors: `pos` marks the start of the
//! current token and `next` one past it.  [`Lex::advance`] skips inline
//! whitespace (including backslash-newline) and recognizes the next token;
//! the parsers also reach below the token level with [`Lex::peek_next`] and
//! [`Lex::stretch1`] when assembling words byte by byte.
//!
//! Only ASCII bytes are classified; multi-byte UTF-8 sequences fall through
//! as ordinary word bytes.

use crate::types::Exception;
use crate::value::Value;

/// A token kind.  Single-byte punctuation carries its byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tok {
    /// End of input.
    End,
    /// A newline: a command terminator.
    Newline,
    /// A run of letters, digits, and underscores.
    AlfaNum,
    /// A number literal.
    Number,
    /// One byte of punctuation: `[ ] { } ( ) " $ # ; + - * / % & | ^ ~ ! ? : < > =` etc.
    Char(u8),
    NumEq,
    NumNe,
    NumLe,
    NumGe,
    BoolAnd,
    BoolOr,
    ShiftLeft,
    ShiftRight,
    /// The word `eq`, and friends: the string-comparison operators.
    StrEq,
    StrNe,
    StrLt,
    StrLe,
    StrGt,
    StrGe,
    /// `{*}[` — a square substitution expanded in place.
    ExpandSquare,
    /// `{*}$` — a dollar substitution expanded in place.
    ExpandDollar,
}

pub struct Lex<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pub pos: usize,
    pub next: usize,
    pub tok: Tok,
}

fn is_alfanum(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_inline_white(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | 0x0b)
}

impl<'a> Lex<'a> {
    pub fn new(src: &'a str) -> Lex<'a> {
        let mut lex = Lex {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            next: 0,
            tok: Tok::End,
        };
        lex.advance();
        lex
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// The text of the current token.
    pub fn current(&self) -> &'a str {
        &self.src[self.pos..self.next]
    }

    /// A slice of the source between two byte offsets.  The parser uses this
    /// to keep the source text of nested sequences for error reporting.
    pub fn slice(&self, from: usize, to: usize) -> &'a str {
        &self.src[from.min(self.src.len())..to.min(self.src.len())]
    }

    /// The raw byte at `next`, without advancing.
    pub fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.next).copied()
    }

    /// Consumes one raw byte.
    pub fn stretch1(&mut self) {
        self.next += 1;
    }

    /// Whether the current token is followed by a word gap: whitespace, a
    /// terminator, a close-bracket, or end of input.
    pub fn followed_by_gap(&self) -> bool {
        match self.peek_next() {
            None => true,
            Some(b) => matches!(b, b'\n' | b';' | b']' | b' ' | b'\t' | b'\r' | 0x0b),
        }
    }

    /// Skips inline whitespace and recognizes the next token.
    pub fn advance(&mut self) {
        let bytes = self.bytes;
        let mut i = self.next;

        // Inline whitespace; a backslash-newline pair counts as whitespace.
        loop {
            match bytes.get(i) {
                Some(&b) if is_inline_white(b) => i += 1,
                Some(b'\\') if bytes.get(i + 1) == Some(&b'\n') => i += 2,
                _ => break,
            }
        }

        self.pos = i;
        let b = match bytes.get(i) {
            None => {
                self.next = i;
                self.tok = Tok::End;
                return;
            }
            Some(&b) => b,
        };

        let (tok, len) = match b {
            b'\n' => (Tok::Newline, 1),
            b'0'..=b'9' => {
                self.next = i + self.scan_number(i);
                self.tok = Tok::Number;
                return;
            }
            _ if b.is_ascii_alphabetic() || b == b'_' => {
                let mut j = i + 1;
                while bytes.get(j).copied().is_some_and(is_alfanum) {
                    j += 1;
                }
                self.next = j;
                self.tok = match &self.src[i..j] {
                    "eq" => Tok::StrEq,
                    "ne" => Tok::StrNe,
                    "lt" => Tok::StrLt,
                    "le" => Tok::StrLe,
                    "gt" => Tok::StrGt,
                    "ge" => Tok::StrGe,
                    _ => Tok::AlfaNum,
                };
                return;
            }
            b'=' if bytes.get(i + 1) == Some(&b'=') => (Tok::NumEq, 2),
            b'!' if bytes.get(i + 1) == Some(&b'=') => (Tok::NumNe, 2),
            b'<' if bytes.get(i + 1) == Some(&b'=') => (Tok::NumLe, 2),
            b'>' if bytes.get(i + 1) == Some(&b'=') => (Tok::NumGe, 2),
            b'<' if bytes.get(i + 1) == Some(&b'<') => (Tok::ShiftLeft, 2),
            b'>' if bytes.get(i + 1) == Some(&b'>') => (Tok::ShiftRight, 2),
            b'&' if bytes.get(i + 1) == Some(&b'&') => (Tok::BoolAnd, 2),
            b'|' if bytes.get(i + 1) == Some(&b'|') => (Tok::BoolOr, 2),
            b'{' if self.src[i..].starts_with("{*}[") => (Tok::ExpandSquare, 4),
            b'{' if self.src[i..].starts_with("{*}$") => (Tok::ExpandDollar, 4),
            _ => (Tok::Char(b), 1),
        };

        self.tok = tok;
        self.next = i + len;
    }

    fn scan_number(&self, start: usize) -> usize {
        let bytes = self.bytes;
        let mut j = start;

        if self.src[start..].starts_with("0x") || self.src[start..].starts_with("0X") {
            j += 2;
            while bytes.get(j).copied().is_some_and(|b| b.is_ascii_hexdigit()) {
                j += 1;
            }
            return j - start;
        }

        while bytes.get(j).copied().is_some_and(|b| b.is_ascii_digit()) {
            j += 1;
        }
        if bytes.get(j) == Some(&b'.') && bytes.get(j + 1).copied().is_some_and(|b| b.is_ascii_digit()) {
            j += 1;
            while bytes.get(j).copied().is_some_and(|b| b.is_ascii_digit()) {
                j += 1;
            }
        }
        if matches!(bytes.get(j), Some(b'e' | b'E')) {
            let mut k = j + 1;
            if matches!(bytes.get(k), Some(b'+' | b'-')) {
                k += 1;
            }
            if bytes.get(k).copied().is_some_and(|b| b.is_ascii_digit()) {
                while bytes.get(k).copied().is_some_and(|b| b.is_ascii_digit()) {
                    k += 1;
                }
                j = k;
            }
        }
        j - start
    }

    /// Reads the run of name bytes immediately at `next`, without skipping
    /// whitespace first.  Used after `$`, where the name must be adjacent.
    pub fn advance_if_alfanum(&mut self) {
        let i = self.next;
        let mut j = i;
        while self.bytes.get(j).copied().is_some_and(is_alfanum) {
            j += 1;
        }
        self.pos = i;
        if j == i {
            self.tok = match self.bytes.get(i) {
                None => Tok::End,
                Some(&b) => Tok::Char(b),
            };
            return;
        }
        self.next = j;
        self.tok = match &self.src[i..j] {
            "eq" => Tok::StrEq,
            "ne" => Tok::StrNe,
            "lt" => Tok::StrLt,
            "le" => Tok::StrLe,
            "gt" => Tok::StrGt,
            "ge" => Tok::StrGe,
            _ => Tok::AlfaNum,
        };
    }

    /// Starting at an open brace, scans to the matching close brace and
    /// returns the contents.  A backslash protects the following byte from
    /// the nesting count and is kept literally, except that backslash-newline
    /// collapses to a single space.  Leaves `next` on the close brace.
    pub fn advance_curly(&mut self) -> Result<String, Exception> {
        debug_assert_eq!(self.tok, Tok::Char(b'{'));
        let bytes = self.bytes;
        let mut out: Vec<u8> = Vec::new();
        let mut depth = 1usize;
        let mut i = self.pos + 1;

        while let Some(&b) = bytes.get(i) {
            match b {
                b'\\' => match bytes.get(i + 1) {
                    Some(b'\n') => {
                        out.push(b' ');
                        i += 2;
                    }
                    Some(&c) => {
                        out.push(b'\\');
                        out.push(c);
                        i += 2;
                    }
                    None => {
                        out.push(b'\\');
                        i += 1;
                    }
                },
                b'{' => {
                    depth += 1;
                    out.push(b);
                    i += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.next = i;
                        return Ok(String::from_utf8_lossy(&out).into_owned());
                    }
                    out.push(b);
                    i += 1;
                }
                _ => {
                    out.push(b);
                    i += 1;
                }
            }
        }

        Err(Exception::error(Value::from("missing close brace")))
    }

    /// Decodes one backslash escape whose backslash is at `next`, advancing
    /// past it.  Returns the decoded byte as a code point in U+00..=U+FF
    /// (or the escaped character itself for unrecognized escapes).
    pub fn escape_at_next(&mut self) -> Result<char, Exception> {
        let (c, used) = decode_escape(self.src, self.next)?;
        self.next += used;
        Ok(c)
    }

    /// Decodes one backslash escape whose backslash is at `pos` (the current
    /// token), leaving `next` after it.  Word parsing lands here after the
    /// backslash has already been taken as a token.
    pub fn escape_at_pos(&mut self) -> Result<char, Exception> {
        self.next = self.pos;
        self.escape_at_next()
    }

    /// After a `#` at command start: consumes the rest of the line and
    /// recognizes the next token.
    pub fn skip_comment(&mut self) {
        while self
            .bytes
            .get(self.next)
            .is_some_and(|&b| b != b'\n')
        {
            self.next += 1;
        }
        self.advance();
    }
}

/// Decodes the backslash escape starting at `src[at]`, returning the decoded
/// character and the number of bytes consumed (including the backslash).
pub(crate) fn decode_escape(src: &str, at: usize) -> Result<(char, usize), Exception> {
    let bytes = src.as_bytes();
    debug_assert_eq!(bytes.get(at), Some(&b'\\'));

    let b = match bytes.get(at + 1) {
        None => {
            return Err(Exception::error(Value::from(
                "backslash at end of script",
            )))
        }
        Some(&b) => b,
    };

    let simple = |c: char| Ok((c, 2));
    match b {
        b'a' => simple('\x07'),
        b'b' => simple('\x08'),
        b'f' => simple('\x0c'),
        b'n' => simple('\n'),
        b'r' => simple('\r'),
        b't' => simple('\t'),
        b'v' => simple('\x0b'),
        b'\\' => simple('\\'),
        // A backslash-newline is whitespace; in substituted contexts it
        // collapses to a single space.
        b'\n' => simple(' '),
        b'0'..=b'7' => {
            let mut value = 0u32;
            let mut used = 0usize;
            while used < 3 {
                match bytes.get(at + 1 + used) {
                    Some(&d @ b'0'..=b'7') => {
                        value = value * 8 + (d - b'0') as u32;
                        used += 1;
                    }
                    _ => break,
                }
            }
            Ok((((value & 0xff) as u8) as char, 1 + used))
        }
        b'x' => {
            let mut value = 0u32;
            let mut used = 0usize;
            while used < 2 {
                match bytes.get(at + 2 + used) {
                    Some(&d) if d.is_ascii_hexdigit() => {
                        value = value * 16 + (d as char).to_digit(16).unwrap_or(0);
                        used += 1;
                    }
                    _ => break,
                }
            }
            if used == 0 {
                return Ok(('x', 2));
            }
            Ok(((value as u8) as char, 2 + used))
        }
        _ => {
            // Any other escaped character stands for itself; take the whole
            // UTF-8 character, not just its first byte.
            match src[at + 1..].chars().next() {
                Some(c) => Ok((c, 1 + c.len_utf8())),
                None => Err(Exception::error(Value::from(
                    "backslash at end of script",
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        let mut lex = Lex::new(src);
        let mut out = Vec::new();
        while lex.tok != Tok::End {
            out.push(lex.tok);
            lex.advance();
        }
        out
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            toks("abc 123 ;"),
            vec![Tok::AlfaNum, Tok::Number, Tok::Char(b';')]
        );
        assert_eq!(toks("a\nb"), vec![Tok::AlfaNum, Tok::Newline, Tok::AlfaNum]);
        assert_eq!(toks(""), vec![]);
        assert_eq!(toks("   \t"), vec![]);
    }

    #[test]
    fn test_two_byte_tokens() {
        assert_eq!(
            toks("== != <= >= && || << >>"),
            vec![
                Tok::NumEq,
                Tok::NumNe,
                Tok::NumLe,
                Tok::NumGe,
                Tok::BoolAnd,
                Tok::BoolOr,
                Tok::ShiftLeft,
                Tok::ShiftRight
            ]
        );
        assert_eq!(toks("< >"), vec![Tok::Char(b'<'), Tok::Char(b'>')]);
    }

    #[test]
    fn test_string_comparison_words() {
        assert_eq!(
            toks("eq ne lt le gt ge eqx"),
            vec![
                Tok::StrEq,
                Tok::StrNe,
                Tok::StrLt,
                Tok::StrLe,
                Tok::StrGt,
                Tok::StrGe,
                Tok::AlfaNum
            ]
        );
    }

    #[test]
    fn test_expand_prefixes() {
        assert_eq!(toks("{*}[")[0], Tok::ExpandSquare);
        assert_eq!(toks("{*}$x")[0], Tok::ExpandDollar);
        assert_eq!(toks("{a}")[0], Tok::Char(b'{'));
    }

    #[test]
    fn test_numbers() {
        let mut lex = Lex::new("3.14 0x1F 1e10");
        assert_eq!(lex.tok, Tok::Number);
        assert_eq!(lex.current(), "3.14");
        lex.advance();
        assert_eq!(lex.current(), "0x1F");
        lex.advance();
        assert_eq!(lex.current(), "1e10");
    }

    #[test]
    fn test_backslash_newline_is_whitespace() {
        assert_eq!(toks("a \\\n b"), vec![Tok::AlfaNum, Tok::AlfaNum]);
    }

    #[test]
    fn test_advance_curly() {
        let mut lex = Lex::new("{a {b} c} tail");
        let contents = lex.advance_curly().unwrap();
        assert_eq!(contents, "a {b} c");
        lex.advance();
        assert_eq!(lex.tok, Tok::Char(b'}'));

        // Backslashed braces do not nest but stay literal.
        let mut lex = Lex::new("{a\\{b}");
        assert_eq!(lex.advance_curly().unwrap(), "a\\{b");

        // Backslash-newline collapses to a space.
        let mut lex = Lex::new("{a\\\nb}");
        assert_eq!(lex.advance_curly().unwrap(), "a b");

        let mut lex = Lex::new("{unbalanced");
        assert!(lex.advance_curly().is_err());
    }

    #[test]
    fn test_escapes() {
        assert_eq!(decode_escape("\\n", 0).unwrap(), ('\n', 2));
        assert_eq!(decode_escape("\\t", 0).unwrap(), ('\t', 2));
        assert_eq!(decode_escape("\\101", 0).unwrap(), ('A', 4));
        assert_eq!(decode_escape("\\41", 0).unwrap(), ('!', 3));
        assert_eq!(decode_escape("\\x41", 0).unwrap(), ('A', 4));
        assert_eq!(decode_escape("\\$", 0).unwrap(), ('$', 2));
        assert_eq!(decode_escape("\\\n", 0).unwrap(), (' ', 2));
        assert!(decode_escape("\\", 0).is_err());
    }

    #[test]
    fn test_skip_comment() {
        let mut lex = Lex::new("# a comment\nword");
        assert_eq!(lex.tok, Tok::Char(b'#'));
        lex.skip_comment();
        assert_eq!(lex.tok, Tok::Newline);
        lex.advance();
        assert_eq!(lex.current(), "word");
    }
}
