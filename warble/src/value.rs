//! The warble value type.
//!
//! A [`Value`] is conceptually a string; operationally it is a tagged sum of
//! pre-computed representations.  The string form is authoritative: two values
//! with equal string forms behave identically under every protocol method,
//! and every cached alternate form is derivable from the string.
//!
//! `Value` is cheap to clone: every non-scalar representation is behind an
//! `Rc`.  Like the rest of the interpreter, values are meant for use within a
//! single thread and are not `Sync`.
//!
//! The [`Multi`] representation backs words parsed from source text.  It
//! carries the canonical string plus eagerly parsed integer, float, and list
//! forms, a flag telling whether the string survives a round trip through
//! list syntax unquoted, a bound built-in command when the string names one
//! (which is why built-ins cannot be renamed), and lazily compiled
//! command-sequence and expression trees memoized behind `RefCell`.

use crate::commands;
use crate::expr::Expr;
use crate::list;
use crate::parser::Sequence;
use crate::types::*;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A warble value.  See the module documentation.
#[derive(Clone)]
pub struct Value {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Int(WarbleInt),
    Float(WarbleFloat),
    String(Rc<str>),
    List(Rc<WarbleList>),
    Hash(Rc<RefCell<WarbleHash>>),
    Multi(Rc<Multi>),
}

/// A parsed word's value: a canonical string with cached interpretations.
pub struct Multi {
    string: Rc<str>,
    preserved: bool,
    int_rep: Option<WarbleInt>,
    float_rep: Option<WarbleFloat>,
    list_rep: Option<WarbleList>,
    pub(crate) seq: RefCell<Option<Rc<Sequence>>>,
    pub(crate) expr: RefCell<Option<Rc<Expr>>>,
    pub(crate) command: Option<CommandFunc>,
}

impl Multi {
    fn new(s: &str) -> Self {
        let preserved = is_preserved_string(s);
        let list_rep = if preserved {
            Some(vec![Value::from(s)])
        } else {
            list::parse_list(s).ok()
        };

        Self {
            string: Rc::from(s),
            preserved,
            int_rep: parse_int(s).ok(),
            float_rep: parse_float(s).ok(),
            list_rep,
            seq: RefCell::new(None),
            expr: RefCell::new(None),
            command: commands::find_safe(s),
        }
    }

    pub(crate) fn string(&self) -> &str {
        &self.string
    }
}

impl Value {
    /// The empty value.
    pub fn empty() -> Value {
        Value {
            repr: Repr::String(Rc::from("")),
        }
    }

    /// Creates a `Multi` value: a string with cached interpretations, as used
    /// for words parsed from source text.
    pub fn multi(s: &str) -> Value {
        Value {
            repr: Repr::Multi(Rc::new(Multi::new(s))),
        }
    }

    /// Creates a `Multi` value with its command-sequence cache pre-filled.
    /// The macro expander uses this to let `eval` of a bare literal skip
    /// re-parsing.
    pub(crate) fn multi_precompiled(s: &str, seq: Option<Rc<Sequence>>) -> Value {
        let multi = Multi::new(s);
        *multi.seq.borrow_mut() = seq;
        Value {
            repr: Repr::Multi(Rc::new(multi)),
        }
    }

    pub(crate) fn as_multi(&self) -> Option<&Rc<Multi>> {
        match &self.repr {
            Repr::Multi(multi) => Some(multi),
            _ => None,
        }
    }

    pub(crate) fn as_list_rc(&self) -> Option<&Rc<WarbleList>> {
        match &self.repr {
            Repr::List(list) => Some(list),
            _ => None,
        }
    }

    /// The canonical string form.  Borrows when the value already holds a
    /// string; builds the form otherwise.
    pub fn as_str(&self) -> Cow<'_, str> {
        match &self.repr {
            Repr::Int(i) => Cow::Owned(i.to_string()),
            Repr::Float(f) => Cow::Owned(format_float(*f)),
            Repr::String(s) => Cow::Borrowed(s),
            Repr::List(l) => Cow::Owned(list::list_to_string(l)),
            Repr::Hash(h) => Cow::Owned(list::list_to_string(&hash_pairs(&h.borrow()))),
            Repr::Multi(m) => Cow::Borrowed(&m.string),
        }
    }

    /// The value's form as one element of a list: brace-quoted when it
    /// contains whitespace, braces, or backslashes, with control bytes and
    /// brace-syntax bytes octal-escaped.
    pub fn list_element_string(&self) -> String {
        match &self.repr {
            // Numbers never need quoting.
            Repr::Int(i) => i.to_string(),
            Repr::Float(f) => format_float(*f),
            _ => to_list_element_string(&self.as_str()),
        }
    }

    /// Whether the value is a single inert word that list syntax preserves
    /// without quoting or re-parsing.
    pub fn is_preserved_by_list(&self) -> bool {
        match &self.repr {
            Repr::Int(_) | Repr::Float(_) | Repr::List(_) | Repr::Hash(_) => true,
            Repr::String(s) => is_preserved_string(s),
            Repr::Multi(m) => m.preserved,
        }
    }

    pub fn is_quick_string(&self) -> bool {
        matches!(&self.repr, Repr::String(_) | Repr::Multi(_))
    }

    pub fn is_quick_list(&self) -> bool {
        match &self.repr {
            Repr::List(_) => true,
            Repr::Multi(m) => m.list_rep.is_some(),
            _ => false,
        }
    }

    pub fn is_quick_hash(&self) -> bool {
        matches!(&self.repr, Repr::Hash(_))
    }

    pub fn is_quick_int(&self) -> bool {
        match &self.repr {
            Repr::Int(_) => true,
            Repr::Multi(m) => m.int_rep.is_some(),
            Repr::List(l) if l.len() == 1 => l[0].is_quick_int(),
            _ => false,
        }
    }

    pub fn is_quick_number(&self) -> bool {
        match &self.repr {
            Repr::Int(_) | Repr::Float(_) => true,
            Repr::Multi(m) => m.float_rep.is_some(),
            Repr::List(l) if l.len() == 1 => l[0].is_quick_number(),
            _ => false,
        }
    }

    /// Whether the string form is empty.
    pub fn is_empty(&self) -> bool {
        match &self.repr {
            Repr::Int(_) | Repr::Float(_) => false,
            Repr::String(s) => s.is_empty(),
            Repr::List(l) => l.is_empty(),
            Repr::Hash(h) => h.borrow().is_empty(),
            Repr::Multi(m) => m.string.is_empty(),
        }
    }

    /// The boolean interpretation: false for zero numbers, the literal
    /// strings `"0"` and `""`, and empty containers; true for other numbers,
    /// `"1"`, and non-empty containers.  Other strings are parsed as numbers.
    pub fn as_bool(&self) -> Result<bool, Exception> {
        match &self.repr {
            Repr::Int(i) => Ok(*i != 0),
            Repr::Float(f) => Ok(*f != 0.0),
            Repr::String(s) => string_to_bool(s),
            Repr::List(l) => match l.len() {
                0 => Ok(false),
                1 => l[0].as_bool(),
                _ => Err(type_error("boolean", &self.as_str())),
            },
            Repr::Hash(h) => Ok(!h.borrow().is_empty()),
            Repr::Multi(m) => match m.float_rep {
                Some(f) => Ok(f != 0.0),
                None => string_to_bool(&m.string),
            },
        }
    }

    /// The integer interpretation.  Strings parse as decimal, octal (leading
    /// `0`), or hex (leading `0x`); floats truncate.
    pub fn as_int(&self) -> Result<WarbleInt, Exception> {
        match &self.repr {
            Repr::Int(i) => Ok(*i),
            Repr::Float(f) => Ok(*f as WarbleInt),
            Repr::String(s) => parse_int(s),
            Repr::List(l) if l.len() == 1 => l[0].as_int(),
            Repr::Multi(m) => match (m.int_rep, m.float_rep) {
                (Some(i), _) => Ok(i),
                (None, Some(f)) => Ok(f as WarbleInt),
                (None, None) => parse_int(&m.string),
            },
            _ => Err(type_error("integer", &self.as_str())),
        }
    }

    /// The floating-point interpretation.
    pub fn as_float(&self) -> Result<WarbleFloat, Exception> {
        match &self.repr {
            Repr::Int(i) => Ok(*i as WarbleFloat),
            Repr::Float(f) => Ok(*f),
            Repr::String(s) => parse_float(s),
            Repr::List(l) if l.len() == 1 => l[0].as_float(),
            Repr::Multi(m) => match m.float_rep {
                Some(f) => Ok(f),
                None => parse_float(&m.string),
            },
            _ => Err(type_error("floating-point number", &self.as_str())),
        }
    }

    /// The unsigned 64-bit interpretation, used by the bitwise operators.
    /// Signed values reinterpret in two's complement.
    pub fn as_uint(&self) -> Result<u64, Exception> {
        match &self.repr {
            Repr::Int(i) => Ok(*i as u64),
            Repr::Float(f) => Ok(*f as u64),
            Repr::String(s) => parse_uint(s),
            Repr::List(l) if l.len() == 1 => l[0].as_uint(),
            Repr::Multi(m) => match (m.int_rep, m.float_rep) {
                (Some(i), _) => Ok(i as u64),
                (None, Some(f)) => Ok(f as u64),
                (None, None) => parse_uint(&m.string),
            },
            _ => Err(type_error("integer", &self.as_str())),
        }
    }

    /// The list view.  Numbers are singleton lists; strings parse as list
    /// syntax unless they are preserved words; hashes flatten to sorted
    /// key/value pairs.
    pub fn as_list(&self) -> Result<WarbleList, Exception> {
        match &self.repr {
            Repr::Int(_) | Repr::Float(_) => Ok(vec![self.clone()]),
            Repr::String(s) => {
                if is_preserved_string(s) {
                    Ok(vec![self.clone()])
                } else {
                    list::parse_list(s)
                }
            }
            Repr::List(l) => Ok((**l).clone()),
            Repr::Hash(h) => Ok(hash_pairs(&h.borrow())),
            Repr::Multi(m) => match &m.list_rep {
                Some(l) => Ok(l.clone()),
                None => list::parse_list(&m.string),
            },
        }
    }

    /// Splits the list view into its first element and the rest, or `None`
    /// for an empty list.
    pub fn head_tail(&self) -> Result<Option<(Value, Value)>, Exception> {
        let mut list = self.as_list()?;
        if list.is_empty() {
            return Ok(None);
        }
        let head = list.remove(0);
        Ok(Some((head, Value::from(list))))
    }

    /// The backing map of a hash value.  Fails for every other kind.
    pub fn as_hash(&self) -> Result<Rc<RefCell<WarbleHash>>, Exception> {
        match &self.repr {
            Repr::Hash(h) => Ok(Rc::clone(h)),
            _ => Err(type_error("hash", &self.as_str())),
        }
    }

    /// Reads a key from a hash value.
    pub fn get_at(&self, key: &str) -> Result<Option<Value>, Exception> {
        Ok(self.as_hash()?.borrow().get(key).cloned())
    }

    /// Writes a key into a hash value.  Hash contents are shared, so every
    /// holder of the hash observes the write.
    pub fn put_at(&self, value: Value, key: &str) -> Result<(), Exception> {
        self.as_hash()?.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

fn string_to_bool(s: &str) -> Result<bool, Exception> {
    match s {
        "" | "0" => Ok(false),
        "1" => Ok(true),
        _ => Ok(parse_float(s).map_err(|_| type_error("boolean", s))? != 0.0),
    }
}

fn type_error(wanted: &str, got: &str) -> Exception {
    Exception::error(Value::from(format!(
        "expected {} but got \"{}\"",
        wanted, got
    )))
}

/// Flattens a hash into `key value key value ...` with keys in lexicographic
/// order, which `BTreeMap` iteration provides.
fn hash_pairs(h: &WarbleHash) -> WarbleList {
    let mut pairs = Vec::with_capacity(2 * h.len());
    for (k, v) in h.iter() {
        pairs.push(Value::from(k.as_str()));
        pairs.push(v.clone());
    }
    pairs
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value[{}]", self.as_str())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Int(a), Repr::Int(b)) => a == b,
            (Repr::Float(a), Repr::Float(b)) => a == b,
            _ => self.as_str() == other.as_str(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value {
            repr: Repr::String(Rc::from(s)),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value {
            repr: Repr::String(Rc::from(s)),
        }
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::from(s.as_str())
    }
}

impl From<WarbleInt> for Value {
    fn from(i: WarbleInt) -> Self {
        Value {
            repr: Repr::Int(i),
        }
    }
}

impl From<WarbleFloat> for Value {
    fn from(f: WarbleFloat) -> Self {
        Value {
            repr: Repr::Float(f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from(if b { 1 } else { 0 } as WarbleInt)
    }
}

impl From<WarbleList> for Value {
    fn from(list: WarbleList) -> Self {
        Value {
            repr: Repr::List(Rc::new(list)),
        }
    }
}

impl From<&[Value]> for Value {
    fn from(list: &[Value]) -> Self {
        Value::from(list.to_vec())
    }
}

impl From<WarbleHash> for Value {
    fn from(h: WarbleHash) -> Self {
        Value {
            repr: Repr::Hash(Rc::new(RefCell::new(h))),
        }
    }
}

//--------------------------------------------------------------------------
// Number parsing and formatting

/// Parses an integer: decimal, octal with a leading `0`, or hex with a
/// leading `0x`/`0X`, with an optional sign.
pub(crate) fn parse_int(s: &str) -> Result<WarbleInt, Exception> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
    {
        WarbleInt::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        WarbleInt::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse()
    };

    match parsed {
        Ok(magnitude) => Ok(if neg {
            magnitude.wrapping_neg()
        } else {
            magnitude
        }),
        Err(_) => Err(type_error("integer", s)),
    }
}

/// Parses an unsigned integer with the same radix rules as [`parse_int`].
pub(crate) fn parse_uint(s: &str) -> Result<u64, Exception> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse()
    };

    parsed.map_err(|_| type_error("integer", s))
}

pub(crate) fn parse_float(s: &str) -> Result<WarbleFloat, Exception> {
    if s.is_empty() {
        return Err(type_error("floating-point number", s));
    }
    s.parse()
        .map_err(|_| type_error("floating-point number", s))
}

/// Formats a float with fifteen significant digits, trailing zeros stripped,
/// switching to scientific notation outside `1e-4 ..= 1e15`.
pub(crate) fn format_float(f: WarbleFloat) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return (if f > 0.0 { "+Inf" } else { "-Inf" }).to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }

    let sci = format!("{:.14e}", f.abs());
    let (mantissa, exp) = match sci.split_once('e') {
        Some(pair) => pair,
        None => (sci.as_str(), "0"),
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = digits.trim_end_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };

    let mut out = String::new();
    if f < 0.0 {
        out.push('-');
    }

    if !(-4..15).contains(&exp) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exp >= 0 { '+' } else { '-' });
        let magnitude = exp.unsigned_abs();
        if magnitude < 10 {
            out.push('0');
        }
        out.push_str(&magnitude.to_string());
    } else if exp >= 0 {
        let point = exp as usize + 1;
        if digits.len() > point {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        } else {
            out.push_str(digits);
            for _ in 0..(point - digits.len()) {
                out.push('0');
            }
        }
    } else {
        out.push_str("0.");
        for _ in 0..(-exp - 1) {
            out.push('0');
        }
        out.push_str(digits);
    }
    out
}

//--------------------------------------------------------------------------
// List-element quoting

/// Bytes that survive list syntax without quoting.  A string of these is a
/// single inert word.
fn is_inert_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'%'..=b'/' | b'0'..=b'9' | b':'..=b'@' | b'A'..=b'Z'
        | b'^' | b'_' | b'`' | b'a'..=b'z' | b'|' | b'~')
}

pub(crate) fn is_preserved_string(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_inert_byte)
}

fn needs_octal_escape(b: u8) -> bool {
    matches!(b, b'{' | b'}' | b'\\') || b < b' '
}

fn octal_escape(s: &str) -> String {
    if !s.bytes().any(needs_octal_escape) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 8);
    for b in s.bytes() {
        if needs_octal_escape(b) {
            out.push_str(&format!("\\{:03o}", b));
        } else {
            // Multi-byte UTF-8 sequences pass through untouched, so the
            // result remains valid UTF-8.
            out.push(b as char);
        }
    }
    out
}

pub(crate) fn to_list_element_string(s: &str) -> String {
    if s.is_empty() {
        return "{}".to_string();
    }
    if s.bytes()
        .any(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'{' | b'}' | b'\\'))
    {
        format!("{{{}}}", octal_escape(s))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(42.0), "42");
        assert_eq!(format_float(-42.0), "-42");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(1.1 + 2.2), "3.3");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1e-5), "1e-05");
        assert_eq!(format_float(1.25e-7), "1.25e-07");
        assert_eq!(format_float(123456.789), "123456.789");
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("0"), Ok(0));
        assert_eq!(parse_int("42"), Ok(42));
        assert_eq!(parse_int("-42"), Ok(-42));
        assert_eq!(parse_int("0x10"), Ok(16));
        assert_eq!(parse_int("0X10"), Ok(16));
        assert_eq!(parse_int("017"), Ok(15));
        assert_eq!(parse_int("-0x10"), Ok(-16));
        assert!(parse_int("").is_err());
        assert!(parse_int("abc").is_err());
        assert!(parse_int("099").is_err());
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(Value::from(5).as_str(), "5");
        assert_eq!(Value::from(2.5).as_str(), "2.5");
        assert_eq!(Value::empty().as_str(), "");

        let list = Value::from(vec![
            Value::from("a"),
            Value::from("b c"),
            Value::from(""),
        ]);
        assert_eq!(list.as_str(), "a {b c} {}");
    }

    #[test]
    fn test_list_element_string() {
        assert_eq!(Value::from("abc").list_element_string(), "abc");
        assert_eq!(Value::from("").list_element_string(), "{}");
        assert_eq!(Value::from("a b").list_element_string(), "{a b}");
        assert_eq!(Value::from("a{b").list_element_string(), "{a\\173b}");
        assert_eq!(Value::from("a\nb").list_element_string(), "{a\\012b}");
    }

    #[test]
    fn test_bool_protocol() {
        assert!(!Value::from(0).as_bool().unwrap());
        assert!(Value::from(3).as_bool().unwrap());
        assert!(!Value::from("0").as_bool().unwrap());
        assert!(Value::from("1").as_bool().unwrap());
        assert!(!Value::from("").as_bool().unwrap());
        assert!(Value::from("2.5").as_bool().unwrap());
        assert!(Value::from("nope").as_bool().is_err());
        assert!(!Value::from(WarbleList::new()).as_bool().unwrap());
    }

    #[test]
    fn test_int_protocol() {
        assert_eq!(Value::from("0x1F").as_int(), Ok(31));
        assert_eq!(Value::from(3.9).as_int(), Ok(3));
        assert_eq!(Value::multi("12").as_int(), Ok(12));
        assert!(Value::from("pear").as_int().is_err());
    }

    #[test]
    fn test_preserved_by_list() {
        assert!(Value::from("abc.def").is_preserved_by_list());
        assert!(Value::from("a=b").is_preserved_by_list());
        assert!(!Value::from("a b").is_preserved_by_list());
        assert!(!Value::from("").is_preserved_by_list());
        assert!(!Value::from("a{b}").is_preserved_by_list());
        assert!(!Value::from("a$b").is_preserved_by_list());
    }

    #[test]
    fn test_multi_caches() {
        let m = Value::multi("12");
        assert!(m.is_quick_int());
        assert!(m.is_quick_number());
        let m = Value::multi("1.5");
        assert!(!m.is_quick_int());
        assert!(m.is_quick_number());
        let m = Value::multi("pear");
        assert!(!m.is_quick_int());
        assert!(!m.is_quick_number());
        assert!(m.is_quick_string());
    }

    #[test]
    fn test_hash_protocol() {
        let mut h = WarbleHash::new();
        h.insert("b".to_string(), Value::from(2));
        h.insert("a".to_string(), Value::from(1));
        let v = Value::from(h);

        assert_eq!(v.as_str(), "a 1 b 2");
        assert_eq!(v.get_at("a").unwrap(), Some(Value::from(1)));
        assert_eq!(v.get_at("zzz").unwrap(), None);
        v.put_at(Value::from(3), "c").unwrap();
        assert_eq!(v.as_str(), "a 1 b 2 c 3");

        assert!(Value::from("x").as_hash().is_err());
        assert!(Value::from("x").put_at(Value::from(1), "k").is_err());
    }

    #[test]
    fn test_head_tail() {
        let v = Value::from("a b c");
        let (head, tail) = v.head_tail().unwrap().unwrap();
        assert_eq!(head.as_str(), "a");
        assert_eq!(tail.as_str(), "b c");
        assert_eq!(Value::empty().head_tail().unwrap(), None);
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::from(5), Value::from("5"));
        assert_eq!(Value::multi("abc"), Value::from("abc"));
        assert_ne!(Value::from("x"), Value::from("y"));
    }
}
