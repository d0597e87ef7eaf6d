// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression evaluation with undefined-value propagation.
//!
//! Operands are evaluated directly from source text with a recursive
//! precedence-climbing parser. Values are signed integers; the sentinel
//! [`UNDEFINED`] marks symbols that have no address yet and propagates
//! through every operator, which is what makes forward references work
//! across passes.

use crate::core::error::{AsmError, ErrorKind};
use crate::core::text_utils::{is_bso_local, is_symbol_at, Cursor};

/// Sentinel for unresolved values, outside any legal 16-bit address.
pub const UNDEFINED: i32 = 0x00ff_0000;

/// Context for expression evaluation.
///
/// The assembler implements this on top of the symbol table, applying module
/// scope qualification and reference recording.
pub trait EvalContext {
    /// Value of a symbol, interning it as undefined on first mention.
    fn symbol_value(&mut self, raw: &str) -> Result<i32, AsmError>;

    /// Byte-span of a symbol (the `?` operator).
    fn symbol_bytes(&mut self, raw: &str) -> Result<i32, AsmError>;

    /// Current program counter (the `*` operand).
    fn program_counter(&self) -> i32;

    /// Whether `@nnn` octal literals are recognized (BSO mode).
    fn octal_literals(&self) -> bool {
        false
    }
}

/// Binary operators in priority order. Relational operators yield 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Mul,
    Div,
    Add,
    Sub,
    Shl,
    Shr,
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogAnd,
    LogOr,
}

/// Operator table: text, priority, operation. Two-character operators are
/// listed before their one-character prefixes so the longest match wins.
const BINOPS: &[(&str, u8, BinOp)] = &[
    ("*", 11, BinOp::Mul),
    ("/", 11, BinOp::Div),
    ("+", 10, BinOp::Add),
    ("-", 10, BinOp::Sub),
    ("<<", 9, BinOp::Shl),
    (">>", 9, BinOp::Shr),
    ("<=", 8, BinOp::Le),
    (">=", 8, BinOp::Ge),
    ("==", 7, BinOp::Eq),
    ("!=", 7, BinOp::Ne),
    ("&&", 3, BinOp::LogAnd),
    ("||", 2, BinOp::LogOr),
    ("<", 8, BinOp::Lt),
    (">", 8, BinOp::Gt),
    ("&", 6, BinOp::BitAnd),
    ("^", 5, BinOp::BitXor),
    ("|", 4, BinOp::BitOr),
];

fn apply_binary(op: BinOp, l: i32, r: i32) -> i32 {
    if l == UNDEFINED || r == UNDEFINED {
        return UNDEFINED;
    }
    match op {
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div => {
            if r == 0 {
                UNDEFINED
            } else {
                l.wrapping_div(r)
            }
        }
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Shl => l.wrapping_shl(r as u32 & 31),
        BinOp::Shr => l.wrapping_shr(r as u32 & 31),
        BinOp::Le => (l <= r) as i32,
        BinOp::Lt => (l < r) as i32,
        BinOp::Ge => (l >= r) as i32,
        BinOp::Gt => (l > r) as i32,
        BinOp::Eq => (l == r) as i32,
        BinOp::Ne => (l != r) as i32,
        BinOp::BitAnd => l & r,
        BinOp::BitXor => l ^ r,
        BinOp::BitOr => l | r,
        BinOp::LogAnd => ((l != 0) && (r != 0)) as i32,
        BinOp::LogOr => ((l != 0) || (r != 0)) as i32,
    }
}

/// Evaluate a complete operand expression.
pub fn eval_operand(cur: &mut Cursor, ctx: &mut dyn EvalContext) -> Result<i32, AsmError> {
    eval(cur, ctx, 0)
}

/// Evaluate an expression with precedence climbing: parse one unary term,
/// then fold in binary operators of higher priority than `prio`.
pub fn eval(cur: &mut Cursor, ctx: &mut dyn EvalContext, prio: u8) -> Result<i32, AsmError> {
    cur.skip_space();
    let mut value = eval_term(cur, ctx)?;

    loop {
        cur.skip_space();
        let rest = cur.rest();
        let Some(&(text, op_prio, op)) = BINOPS
            .iter()
            .find(|(text, _, _)| rest.starts_with(text))
        else {
            return Ok(value);
        };
        if op_prio <= prio {
            return Ok(value);
        }
        cur.advance(text.len());
        let rhs = eval(cur, ctx, op_prio)?;
        value = apply_binary(op, value, rhs);
    }
}

/// Priority used for the operand of a prefix operator.
const UNARY_PRIO: u8 = 12;

fn eval_term(cur: &mut Cursor, ctx: &mut dyn EvalContext) -> Result<i32, AsmError> {
    cur.skip_space();
    let c = cur.peek();
    match c {
        0 | b',' | b';' => Ok(UNDEFINED),
        b'(' | b'[' => {
            let close = if c == b'[' { b']' } else { b')' };
            cur.bump();
            let v = eval(cur, ctx, 0)?;
            cur.skip_space();
            if !cur.eat(close) {
                return Err(AsmError::new(
                    ErrorKind::Syntax,
                    format!("Missing closing {}", close as char),
                ));
            }
            Ok(v)
        }
        b'+' => {
            cur.bump();
            eval(cur, ctx, UNARY_PRIO)
        }
        b'-' => {
            cur.bump();
            Ok(apply_unary(eval(cur, ctx, UNARY_PRIO)?, i32::wrapping_neg))
        }
        b'!' => {
            cur.bump();
            Ok(apply_unary(eval(cur, ctx, UNARY_PRIO)?, |v| (v == 0) as i32))
        }
        b'~' => {
            cur.bump();
            Ok(apply_unary(eval(cur, ctx, UNARY_PRIO)?, |v| !v))
        }
        b'<' => {
            cur.bump();
            Ok(apply_unary(eval(cur, ctx, UNARY_PRIO)?, |v| v & 0xff))
        }
        b'>' => {
            cur.bump();
            Ok(apply_unary(eval(cur, ctx, UNARY_PRIO)?, |v| v >> 8))
        }
        b'*' => {
            cur.bump();
            Ok(ctx.program_counter())
        }
        b'$' => {
            cur.bump();
            eval_hex(cur)
        }
        b'%' => {
            cur.bump();
            Ok(eval_binary_literal(cur))
        }
        b'\'' => {
            cur.bump();
            eval_char(cur)
        }
        b'?' => {
            cur.bump();
            let name = take_symbol_text(cur);
            ctx.symbol_bytes(&name)
        }
        b'@' if ctx.octal_literals() && cur.peek_at(1).is_ascii_digit() => {
            cur.bump();
            eval_octal(cur)
        }
        _ if c.is_ascii_digit() && !is_bso_local(cur.rest().as_bytes(), 0) => eval_decimal(cur),
        _ if is_symbol_at(cur.rest().as_bytes(), 0) || is_bso_local(cur.rest().as_bytes(), 0) => {
            let name = take_symbol_text(cur);
            ctx.symbol_value(&name)
        }
        _ => Err(AsmError::new(ErrorKind::Syntax, "Illegal operand")),
    }
}

fn apply_unary(v: i32, op: impl Fn(i32) -> i32) -> i32 {
    if v == UNDEFINED {
        UNDEFINED
    } else {
        op(v)
    }
}

fn take_symbol_text(cur: &mut Cursor) -> String {
    if is_bso_local(cur.rest().as_bytes(), 0) {
        cur.take_bso_local().to_string()
    } else {
        cur.take_symbol().to_string()
    }
}

fn eval_decimal(cur: &mut Cursor) -> Result<i32, AsmError> {
    let mut v: i64 = 0;
    while cur.peek().is_ascii_digit() {
        v = v * 10 + i64::from(cur.bump() - b'0');
    }
    let trailing = cur.peek();
    if trailing.is_ascii_alphabetic() {
        let msg = if trailing.is_ascii_hexdigit() {
            "Wrong decimal constant or leading $ for hex missing"
        } else {
            "Illegal character in decimal constant"
        };
        return Err(AsmError::new(ErrorKind::Syntax, msg));
    }
    Ok(v as i32)
}

fn eval_hex(cur: &mut Cursor) -> Result<i32, AsmError> {
    let mut digits = 0;
    let mut v: i64 = 0;
    while cur.peek().is_ascii_hexdigit() {
        v = (v << 4) + i64::from((cur.bump() as char).to_digit(16).unwrap_or(0));
        digits += 1;
    }
    if digits == 0 {
        return Err(AsmError::new(ErrorKind::Syntax, "Missing hex digits after $"));
    }
    Ok(v as i32)
}

fn eval_octal(cur: &mut Cursor) -> Result<i32, AsmError> {
    let mut digits = 0;
    let mut v: i64 = 0;
    while matches!(cur.peek(), b'0'..=b'7') {
        v = (v << 3) + i64::from(cur.bump() - b'0');
        digits += 1;
    }
    if digits == 0 {
        return Err(AsmError::new(ErrorKind::Syntax, "Missing octal digits after @"));
    }
    Ok(v as i32)
}

/// Binary literal. `*` counts as 1 and `.` as 0 so bit patterns can be
/// written as sprites; embedded blanks are ignored.
fn eval_binary_literal(cur: &mut Cursor) -> i32 {
    let mut v: i32 = 0;
    loop {
        match cur.peek() {
            b'1' | b'*' => v = (v << 1) | 1,
            b'0' | b'.' => v <<= 1,
            b' ' => {}
            _ => return v,
        }
        cur.bump();
    }
}

/// Character literal with the Commodore quirk that a bare apostrophe at end
/// of operand means a blank (`LDA #'`).
fn eval_char(cur: &mut Cursor) -> Result<i32, AsmError> {
    let c = cur.peek();
    if c == 0 || c == b' ' {
        while cur.peek() != 0 {
            cur.bump();
        }
        return Ok(i32::from(b' '));
    }
    let v = if c == b'\\' {
        cur.bump();
        match cur.bump() {
            b'r' => 13,
            b'n' => 10,
            b'a' => 7,
            b'e' => 27,
            b'0' => 0,
            other => i32::from(other),
        }
    } else {
        cur.bump();
        i32::from(c)
    };
    if cur.peek() != b'\'' && cur.peek() != 0 {
        return Err(AsmError::new(
            ErrorKind::Syntax,
            "Missing ' delimiter after character operand",
        ));
    }
    cur.eat(b'\'');
    Ok(v)
}

/// Evaluation context backed by closures, for tests and CLI defines.
pub struct SimpleEvalContext<F>
where
    F: FnMut(&str) -> i32,
{
    lookup: F,
    pc: i32,
    octal: bool,
}

impl<F> SimpleEvalContext<F>
where
    F: FnMut(&str) -> i32,
{
    pub fn new(lookup: F) -> Self {
        Self {
            lookup,
            pc: UNDEFINED,
            octal: false,
        }
    }

    pub fn with_pc(lookup: F, pc: i32) -> Self {
        Self {
            lookup,
            pc,
            octal: false,
        }
    }
}

impl<F> EvalContext for SimpleEvalContext<F>
where
    F: FnMut(&str) -> i32,
{
    fn symbol_value(&mut self, raw: &str) -> Result<i32, AsmError> {
        Ok((self.lookup)(raw))
    }

    fn symbol_bytes(&mut self, _raw: &str) -> Result<i32, AsmError> {
        Ok(UNDEFINED)
    }

    fn program_counter(&self) -> i32 {
        self.pc
    }

    fn octal_literals(&self) -> bool {
        self.octal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(text: &str) -> i32 {
        let mut cur = Cursor::new(text);
        let mut ctx = SimpleEvalContext::new(|name: &str| match name {
            "TEN" => 10,
            "FWD" => UNDEFINED,
            _ => 0,
        });
        eval_operand(&mut cur, &mut ctx).expect("eval")
    }

    #[test]
    fn literals() {
        assert_eq!(eval_str("42"), 42);
        assert_eq!(eval_str("$ff"), 255);
        assert_eq!(eval_str("%1010"), 10);
        assert_eq!(eval_str("%*.*."), 10);
        assert_eq!(eval_str("'A'"), 65);
        assert_eq!(eval_str("'\\r'"), 13);
        assert_eq!(eval_str("'"), 32);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval_str("-3"), -3);
        assert_eq!(eval_str("!0"), 1);
        assert_eq!(eval_str("!5"), 0);
        assert_eq!(eval_str("~0"), -1);
        assert_eq!(eval_str("<$1234"), 0x34);
        assert_eq!(eval_str(">$1234"), 0x12);
    }

    #[test]
    fn binary_priorities() {
        assert_eq!(eval_str("2+3*4"), 14);
        assert_eq!(eval_str("[2+3]*4"), 20);
        assert_eq!(eval_str("(2+3)*4"), 20);
        assert_eq!(eval_str("1<<4|1"), 17);
        assert_eq!(eval_str("$10>>2"), 4);
        assert_eq!(eval_str("6&3"), 2);
        assert_eq!(eval_str("5^1"), 4);
    }

    #[test]
    fn relational_results_are_boolean() {
        assert_eq!(eval_str("3<4"), 1);
        assert_eq!(eval_str("4<=3"), 0);
        assert_eq!(eval_str("4==4"), 1);
        assert_eq!(eval_str("4!=4"), 0);
        assert_eq!(eval_str("1&&2"), 1);
        assert_eq!(eval_str("0||0"), 0);
    }

    #[test]
    fn symbols_and_undefined_propagation() {
        assert_eq!(eval_str("TEN*2"), 20);
        assert_eq!(eval_str("FWD+1"), UNDEFINED);
        assert_eq!(eval_str("1+FWD"), UNDEFINED);
        assert_eq!(eval_str("<FWD"), UNDEFINED);
        assert_eq!(eval_str("10/0"), UNDEFINED);
    }

    #[test]
    fn program_counter_operand() {
        let mut cur = Cursor::new("*+2");
        let mut ctx = SimpleEvalContext::with_pc(|_: &str| 0, 0x1000);
        assert_eq!(eval_operand(&mut cur, &mut ctx).unwrap(), 0x1002);
    }

    #[test]
    fn octal_requires_bso_mode() {
        let mut cur = Cursor::new("@20");
        let mut ctx = SimpleEvalContext::new(|_: &str| 0);
        ctx.octal = true;
        assert_eq!(eval_operand(&mut cur, &mut ctx).unwrap(), 16);
    }

    #[test]
    fn decimal_rejects_trailing_letters() {
        let mut cur = Cursor::new("12ab");
        let mut ctx = SimpleEvalContext::new(|_: &str| 0);
        let err = eval_operand(&mut cur, &mut ctx).unwrap_err();
        assert!(err.message().contains("leading $ for hex"));
    }

    #[test]
    fn stops_at_comma() {
        let mut cur = Cursor::new("4,X");
        let mut ctx = SimpleEvalContext::new(|_: &str| 0);
        assert_eq!(eval_operand(&mut cur, &mut ctx).unwrap(), 4);
        assert_eq!(cur.rest(), ",X");
    }
}
