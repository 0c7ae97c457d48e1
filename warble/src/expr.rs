//! The expression grammar and evaluator, backing the `expr` command and the
//! conditions of `if`, `while`, and `for`.
//!
//! Precedence, lowest to highest: conditional `? :`, logical or `||`,
//! logical and `&&`, comparison (`== != < <= > >= eq ne lt le gt ge`),
//! additive (`+ - | ^`), multiplicative (`* / % & << >>`), unary (`! ~ -`),
//! primaries.  Binary operators associate to the right within a level.
//!
//! Integer arithmetic is preserved while both operands are quick ints; a
//! float operand promotes the result to float.  Integer arithmetic wraps in
//! two's complement.  Bitwise operators work on unsigned 64-bit values.
//! String comparisons take the string form of both sides.

use crate::interp::Interp;
use crate::lexer::{Lex, Tok};
use crate::parser;
use crate::parser::{Part, Word};
use crate::types::*;
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Expr {
    /// A primary: number, string, braced literal, square substitution,
    /// dollar substitution, or quoted string, held as a word.
    Prim(Word),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    BitNot,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    NumEq,
    NumNe,
    NumLt,
    NumLe,
    NumGt,
    NumGe,
    StrEq,
    StrNe,
    StrLt,
    StrLe,
    StrGt,
    StrGe,
}

fn expr_error(msg: impl Into<String>) -> Exception {
    Exception::error(Value::from(msg.into()))
}

/// Parses a whole string as an expression.
pub fn parse(src: &str) -> Result<Expr, Exception> {
    let mut lex = Lex::new(src);
    let expr = parse_top(&mut lex)?;
    if lex.tok != Tok::End {
        return Err(expr_error(format!(
            "extra tokens after expression: \"{}\"",
            lex.current()
        )));
    }
    Ok(expr)
}

fn parse_top(lex: &mut Lex) -> Result<Expr, Exception> {
    let cond = parse_disjunction(lex)?;
    if lex.tok != Tok::Char(b'?') {
        return Ok(cond);
    }
    lex.advance();
    let yes = parse_top(lex)?;
    if lex.tok != Tok::Char(b':') {
        return Err(expr_error("expected \":\" in conditional expression"));
    }
    lex.advance();
    let no = parse_top(lex)?;
    Ok(Expr::Cond(Box::new(cond), Box::new(yes), Box::new(no)))
}

fn parse_disjunction(lex: &mut Lex) -> Result<Expr, Exception> {
    let a = parse_conjunction(lex)?;
    if lex.tok != Tok::BoolOr {
        return Ok(a);
    }
    lex.advance();
    let b = parse_disjunction(lex)?;
    Ok(Expr::Binary(BinaryOp::Or, Box::new(a), Box::new(b)))
}

fn parse_conjunction(lex: &mut Lex) -> Result<Expr, Exception> {
    let a = parse_relation(lex)?;
    if lex.tok != Tok::BoolAnd {
        return Ok(a);
    }
    lex.advance();
    let b = parse_conjunction(lex)?;
    Ok(Expr::Binary(BinaryOp::And, Box::new(a), Box::new(b)))
}

fn parse_relation(lex: &mut Lex) -> Result<Expr, Exception> {
    let a = parse_sum(lex)?;
    let op = match lex.tok {
        Tok::NumEq => BinaryOp::NumEq,
        Tok::NumNe => BinaryOp::NumNe,
        Tok::Char(b'<') => BinaryOp::NumLt,
        Tok::NumLe => BinaryOp::NumLe,
        Tok::Char(b'>') => BinaryOp::NumGt,
        Tok::NumGe => BinaryOp::NumGe,
        Tok::StrEq => BinaryOp::StrEq,
        Tok::StrNe => BinaryOp::StrNe,
        Tok::StrLt => BinaryOp::StrLt,
        Tok::StrLe => BinaryOp::StrLe,
        Tok::StrGt => BinaryOp::StrGt,
        Tok::StrGe => BinaryOp::StrGe,
        _ => return Ok(a),
    };
    lex.advance();
    let b = parse_relation(lex)?;
    Ok(Expr::Binary(op, Box::new(a), Box::new(b)))
}

fn parse_sum(lex: &mut Lex) -> Result<Expr, Exception> {
    let a = parse_product(lex)?;
    let op = match lex.tok {
        Tok::Char(b'+') => BinaryOp::Add,
        Tok::Char(b'-') => BinaryOp::Sub,
        Tok::Char(b'|') => BinaryOp::BitOr,
        Tok::Char(b'^') => BinaryOp::BitXor,
        _ => return Ok(a),
    };
    lex.advance();
    let b = parse_sum(lex)?;
    Ok(Expr::Binary(op, Box::new(a), Box::new(b)))
}

fn parse_product(lex: &mut Lex) -> Result<Expr, Exception> {
    let a = parse_unary(lex)?;
    let op = match lex.tok {
        Tok::Char(b'*') => BinaryOp::Mul,
        Tok::Char(b'/') => BinaryOp::Div,
        Tok::Char(b'%') => BinaryOp::Mod,
        Tok::Char(b'&') => BinaryOp::BitAnd,
        Tok::ShiftLeft => BinaryOp::Shl,
        Tok::ShiftRight => BinaryOp::Shr,
        _ => return Ok(a),
    };
    lex.advance();
    let b = parse_product(lex)?;
    Ok(Expr::Binary(op, Box::new(a), Box::new(b)))
}

fn parse_unary(lex: &mut Lex) -> Result<Expr, Exception> {
    let op = match lex.tok {
        Tok::Char(b'!') => UnaryOp::Not,
        Tok::Char(b'~') => UnaryOp::BitNot,
        Tok::Char(b'-') => UnaryOp::Neg,
        _ => return parse_primary(lex),
    };
    lex.advance();
    let a = parse_unary(lex)?;
    Ok(Expr::Unary(op, Box::new(a)))
}

fn parse_primary(lex: &mut Lex) -> Result<Expr, Exception> {
    match lex.tok {
        Tok::Char(b'"') => {
            let word = parser::parse_quote(lex)?;
            lex.advance();
            Ok(Expr::Prim(word))
        }
        Tok::Char(b'[') => {
            let part = parser::parse_square(lex)?;
            lex.advance();
            Ok(Expr::Prim(word_of(part)))
        }
        Tok::Char(b'{') => {
            let word = parser::parse_curly(lex)?;
            lex.advance();
            Ok(Expr::Prim(word))
        }
        Tok::Number => {
            let value = Value::multi(lex.current());
            let word = Word {
                parts: vec![Part::Bare(value.clone())],
                multi: Some(value),
                expand: false,
            };
            lex.advance();
            Ok(Expr::Prim(word))
        }
        Tok::Char(b'$') => {
            let part = parser::parse_dollar(lex)?;
            lex.advance();
            Ok(Expr::Prim(word_of(part)))
        }
        Tok::Char(b'(') => {
            lex.advance();
            let inner = parse_top(lex)?;
            if lex.tok != Tok::Char(b')') {
                return Err(expr_error("expected \")\" in expression"));
            }
            lex.advance();
            Ok(inner)
        }
        _ => Err(expr_error(format!(
            "expected expression primitive but got \"{}\"",
            lex.current()
        ))),
    }
}

fn word_of(part: Part) -> Word {
    Word {
        parts: vec![part],
        multi: None,
        expand: false,
    }
}

//--------------------------------------------------------------------------
// Evaluation

pub(crate) fn eval(interp: &mut Interp, expr: &Expr) -> WarbleResult {
    match expr {
        Expr::Prim(word) => interp.eval_word(word),
        Expr::Unary(op, a) => eval_unary(interp, *op, a),
        Expr::Binary(op, a, b) => eval_binary(interp, *op, a, b),
        Expr::Cond(cond, yes, no) => {
            if eval(interp, cond)?.as_bool()? {
                eval(interp, yes)
            } else {
                eval(interp, no)
            }
        }
    }
}

fn eval_unary(interp: &mut Interp, op: UnaryOp, a: &Expr) -> WarbleResult {
    let v = eval(interp, a)?;
    match op {
        UnaryOp::Not => Ok(Value::from(!v.as_bool()?)),
        UnaryOp::BitNot => {
            let bits = !v.as_uint()?;
            Ok(Value::from(bits as WarbleInt))
        }
        UnaryOp::Neg => {
            if v.is_quick_int() {
                Ok(Value::from(v.as_int()?.wrapping_neg()))
            } else {
                Ok(Value::from(-v.as_float()?))
            }
        }
    }
}

fn eval_binary(interp: &mut Interp, op: BinaryOp, a: &Expr, b: &Expr) -> WarbleResult {
    // The logical operators short-circuit: the right side is only evaluated
    // when the left side does not decide.
    match op {
        BinaryOp::And => {
            if !eval(interp, a)?.as_bool()? {
                return Ok(Value::from(false));
            }
            return Ok(Value::from(eval(interp, b)?.as_bool()?));
        }
        BinaryOp::Or => {
            if eval(interp, a)?.as_bool()? {
                return Ok(Value::from(true));
            }
            return Ok(Value::from(eval(interp, b)?.as_bool()?));
        }
        _ => {}
    }

    let x = eval(interp, a)?;
    let y = eval(interp, b)?;

    match op {
        BinaryOp::Add => arith(&x, &y, WarbleInt::wrapping_add, |a, b| a + b),
        BinaryOp::Sub => arith(&x, &y, WarbleInt::wrapping_sub, |a, b| a - b),
        BinaryOp::Mul => arith(&x, &y, WarbleInt::wrapping_mul, |a, b| a * b),
        BinaryOp::Div => {
            if x.is_quick_int() && y.is_quick_int() {
                let d = y.as_int()?;
                if d == 0 {
                    return Err(expr_error("divide by zero"));
                }
                Ok(Value::from(x.as_int()?.wrapping_div(d)))
            } else {
                Ok(Value::from(x.as_float()? / y.as_float()?))
            }
        }
        BinaryOp::Mod => {
            let d = y.as_int()?;
            if d == 0 {
                return Err(expr_error("divide by zero"));
            }
            Ok(Value::from(x.as_int()?.wrapping_rem(d)))
        }
        BinaryOp::BitAnd => bits(&x, &y, |a, b| a & b),
        BinaryOp::BitOr => bits(&x, &y, |a, b| a | b),
        BinaryOp::BitXor => bits(&x, &y, |a, b| a ^ b),
        BinaryOp::Shl => bits(&x, &y, |a, b| if b >= 64 { 0 } else { a << b }),
        BinaryOp::Shr => bits(&x, &y, |a, b| if b >= 64 { 0 } else { a >> b }),
        BinaryOp::NumEq => cmp_num(&x, &y, |o| o == std::cmp::Ordering::Equal),
        BinaryOp::NumNe => cmp_num(&x, &y, |o| o != std::cmp::Ordering::Equal),
        BinaryOp::NumLt => cmp_num(&x, &y, |o| o == std::cmp::Ordering::Less),
        BinaryOp::NumLe => cmp_num(&x, &y, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::NumGt => cmp_num(&x, &y, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::NumGe => cmp_num(&x, &y, |o| o != std::cmp::Ordering::Less),
        BinaryOp::StrEq => Ok(Value::from(x.as_str() == y.as_str())),
        BinaryOp::StrNe => Ok(Value::from(x.as_str() != y.as_str())),
        BinaryOp::StrLt => Ok(Value::from(x.as_str() < y.as_str())),
        BinaryOp::StrLe => Ok(Value::from(x.as_str() <= y.as_str())),
        BinaryOp::StrGt => Ok(Value::from(x.as_str() > y.as_str())),
        BinaryOp::StrGe => Ok(Value::from(x.as_str() >= y.as_str())),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn arith(
    x: &Value,
    y: &Value,
    int_op: fn(WarbleInt, WarbleInt) -> WarbleInt,
    float_op: fn(WarbleFloat, WarbleFloat) -> WarbleFloat,
) -> WarbleResult {
    if x.is_quick_int() && y.is_quick_int() {
        Ok(Value::from(int_op(x.as_int()?, y.as_int()?)))
    } else {
        Ok(Value::from(float_op(x.as_float()?, y.as_float()?)))
    }
}

fn bits(x: &Value, y: &Value, op: fn(u64, u64) -> u64) -> WarbleResult {
    let bits = op(x.as_uint()?, y.as_uint()?);
    Ok(Value::from(bits as WarbleInt))
}

fn cmp_num(x: &Value, y: &Value, test: fn(std::cmp::Ordering) -> bool) -> WarbleResult {
    let a = x.as_float()?;
    let b = y.as_float()?;
    let ordering = a
        .partial_cmp(&b)
        .unwrap_or(std::cmp::Ordering::Greater);
    Ok(Value::from(test(ordering)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(src: &str) -> Expr {
        parse(src).unwrap()
    }

    #[test]
    fn test_parse_precedence() {
        // `1 + 2 * 3` groups the product under the sum.
        match shape("1 + 2 * 3") {
            Expr::Binary(BinaryOp::Add, _, b) => {
                assert!(matches!(*b, Expr::Binary(BinaryOp::Mul, _, _)));
            }
            other => panic!("unexpected shape: {:?}", other),
        }

        // Comparison binds looser than addition.
        assert!(matches!(
            shape("1 + 2 < 4"),
            Expr::Binary(BinaryOp::NumLt, _, _)
        ));

        // Conditional at the top.
        assert!(matches!(shape("1 ? 2 : 3"), Expr::Cond(_, _, _)));
    }

    #[test]
    fn test_parse_unary_and_parens() {
        assert!(matches!(shape("-3"), Expr::Unary(UnaryOp::Neg, _)));
        assert!(matches!(shape("!1"), Expr::Unary(UnaryOp::Not, _)));
        match shape("(1 + 2) * 3") {
            Expr::Binary(BinaryOp::Mul, a, _) => {
                assert!(matches!(*a, Expr::Binary(BinaryOp::Add, _, _)));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_parse_string_comparisons() {
        assert!(matches!(
            shape("{abc} lt {abd}"),
            Expr::Binary(BinaryOp::StrLt, _, _)
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("1 +").is_err());
        assert!(parse("(1").is_err());
        assert!(parse("1 ? 2").is_err());
    }
}
