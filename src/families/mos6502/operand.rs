// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Addressing-mode classification.
//!
//! The classifier inspects the structural markers of an operand (leading
//! `#`/`` ` ``, surrounding `(…)`/`[…]`, trailing `,X`/`,Y`/`,Z`) and leaves
//! the inner expression text untouched for the evaluator. Width selection
//! between zero page and absolute happens later in the encoder, once the
//! expression value is known.

use crate::core::error::{AsmError, ErrorKind};

/// Syntactic addressing mode of an operand. `Direct` covers both zero-page
/// and absolute; the encoder narrows it by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// `#expr`
    Immediate,
    /// `expr` (zero page or absolute)
    Direct,
    /// `expr,X`
    DirectX,
    /// `expr,Y`
    DirectY,
    /// `(expr,X)`
    IndirectX,
    /// `(expr),Y`
    IndirectY,
    /// `(expr,SP),Y` (45GS02 stack-relative)
    IndirectSpY,
    /// `(expr),Z` (45GS02)
    IndirectZ,
    /// `(expr)` - absolute indirect for JMP/JSR, `(zp),Z` otherwise
    Indirect,
    /// `[expr]` or `[expr],Z` - 32-bit indirect (45GS02)
    IndirectLong,
}

/// A classified operand: mode plus the untouched inner expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedOperand<'a> {
    pub mode: AddressMode,
    pub expr: &'a str,
    /// Backtick prefix forces a 16-bit operand encoding.
    pub force16: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexReg {
    X,
    Y,
    Z,
}

/// Split a trailing `,X` / `,Y` / `,Z` off the operand. Blanks around the
/// comma are tolerated; the register letter must be the final character so
/// that `(zp,X)` and plain symbols are left alone.
fn split_index_suffix(text: &str) -> (&str, Option<IndexReg>) {
    let trimmed = text.trim_end();
    let reg = match trimmed.as_bytes().last() {
        Some(b'X') | Some(b'x') => IndexReg::X,
        Some(b'Y') | Some(b'y') => IndexReg::Y,
        Some(b'Z') | Some(b'z') => IndexReg::Z,
        _ => return (text, None),
    };
    let head = trimmed[..trimmed.len() - 1].trim_end();
    match head.as_bytes().last() {
        Some(b',') => (&head[..head.len() - 1], Some(reg)),
        _ => (text, None),
    }
}

/// Strip one pair of surrounding brackets, if the operand has them.
fn strip_wrapped(text: &str, open: char, close: char) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// Strip a trailing `,SP` from the inner text of `(…),Y`, tolerating blanks
/// around the comma.
fn strip_sp_suffix(inner: &str) -> Option<&str> {
    let trimmed = inner.trim_end();
    if trimmed.len() < 3 || !trimmed[trimmed.len() - 2..].eq_ignore_ascii_case("SP") {
        return None;
    }
    let head = trimmed[..trimmed.len() - 2].trim_end();
    if head.ends_with(',') {
        Some(&head[..head.len() - 1])
    } else {
        None
    }
}

/// Strip a trailing `,X` from the inner text of `(…)`, tolerating blanks
/// around the comma.
fn strip_inner_x(inner: &str) -> Option<&str> {
    let trimmed = inner.trim_end();
    if !matches!(trimmed.as_bytes().last(), Some(b'X') | Some(b'x')) {
        return None;
    }
    let head = trimmed[..trimmed.len() - 1].trim_end();
    if head.ends_with(',') {
        Some(&head[..head.len() - 1])
    } else {
        None
    }
}

/// Classify an operand. The text must be trimmed and non-empty; comments
/// have already been stripped by the statement scanner.
pub fn classify(operand: &str) -> Result<ClassifiedOperand<'_>, AsmError> {
    let mut text = operand.trim();
    let mut force16 = false;

    if let Some(rest) = text.strip_prefix('#') {
        return Ok(ClassifiedOperand {
            mode: AddressMode::Immediate,
            expr: rest,
            force16: false,
        });
    }
    if let Some(rest) = text.strip_prefix('`') {
        force16 = true;
        text = rest.trim_start();
    }

    let (head, index) = split_index_suffix(text);

    if let Some(inner) = strip_wrapped(head, '[', ']') {
        return match index {
            None | Some(IndexReg::Z) => Ok(ClassifiedOperand {
                mode: AddressMode::IndirectLong,
                expr: inner,
                force16,
            }),
            _ => Err(AsmError::new(ErrorKind::Syntax, "illegal address mode")),
        };
    }

    if let Some(inner) = strip_wrapped(head, '(', ')') {
        return match index {
            Some(IndexReg::Y) => match strip_sp_suffix(inner) {
                Some(base) => Ok(ClassifiedOperand {
                    mode: AddressMode::IndirectSpY,
                    expr: base,
                    force16,
                }),
                None => Ok(ClassifiedOperand {
                    mode: AddressMode::IndirectY,
                    expr: inner,
                    force16,
                }),
            },
            Some(IndexReg::Z) => Ok(ClassifiedOperand {
                mode: AddressMode::IndirectZ,
                expr: inner,
                force16,
            }),
            Some(IndexReg::X) => Err(AsmError::new(ErrorKind::Syntax, "illegal address mode")),
            None => match strip_inner_x(inner) {
                Some(base) => Ok(ClassifiedOperand {
                    mode: AddressMode::IndirectX,
                    expr: base,
                    force16,
                }),
                None => Ok(ClassifiedOperand {
                    mode: AddressMode::Indirect,
                    expr: inner,
                    force16,
                }),
            },
        };
    }

    let (mode, expr) = match index {
        Some(IndexReg::X) => (AddressMode::DirectX, head),
        Some(IndexReg::Y) => (AddressMode::DirectY, head),
        Some(IndexReg::Z) => {
            return Err(AsmError::new(ErrorKind::Syntax, "illegal address mode"));
        }
        None => (AddressMode::Direct, text),
    };
    Ok(ClassifiedOperand {
        mode,
        expr,
        force16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_of(text: &str) -> AddressMode {
        classify(text).expect("classify").mode
    }

    #[test]
    fn immediate_and_direct() {
        assert_eq!(mode_of("#$42"), AddressMode::Immediate);
        assert_eq!(mode_of("$1234"), AddressMode::Direct);
        assert_eq!(mode_of("LABEL+2"), AddressMode::Direct);
    }

    #[test]
    fn indexed_forms() {
        assert_eq!(mode_of("$10,X"), AddressMode::DirectX);
        assert_eq!(mode_of("$1234 , y"), AddressMode::DirectY);
        assert_eq!(mode_of("TAB,x"), AddressMode::DirectX);
    }

    #[test]
    fn indirect_forms() {
        assert_eq!(mode_of("($10,X)"), AddressMode::IndirectX);
        assert_eq!(mode_of("($10),Y"), AddressMode::IndirectY);
        assert_eq!(mode_of("($10),Z"), AddressMode::IndirectZ);
        assert_eq!(mode_of("($1234)"), AddressMode::Indirect);
        assert_eq!(mode_of("[$10],Z"), AddressMode::IndirectLong);
        assert_eq!(mode_of("[$10]"), AddressMode::IndirectLong);
        assert_eq!(mode_of("($02,SP),Y"), AddressMode::IndirectSpY);
        // Blanks around the markers are tolerated.
        assert_eq!(mode_of("($10 , x)"), AddressMode::IndirectX);
        assert_eq!(mode_of("($02 , sp) , y"), AddressMode::IndirectSpY);
    }

    #[test]
    fn expression_text_is_preserved() {
        let op = classify("(VEC+2),Y").unwrap();
        assert_eq!(op.expr, "VEC+2");
        let op = classify("#>TARGET").unwrap();
        assert_eq!(op.expr, ">TARGET");
    }

    #[test]
    fn parenthesized_expressions_are_not_indirect_operands() {
        // A trailing arithmetic term keeps this a direct operand.
        assert_eq!(mode_of("($10+2)*4"), AddressMode::Direct);
    }

    #[test]
    fn force16_prefix() {
        let op = classify("`$12").unwrap();
        assert!(op.force16);
        assert_eq!(op.mode, AddressMode::Direct);
        assert_eq!(op.expr.trim(), "$12");
    }

    #[test]
    fn symbols_ending_in_register_letters_are_not_indexed() {
        assert_eq!(mode_of("MAXX"), AddressMode::Direct);
        assert_eq!(mode_of("VERY"), AddressMode::Direct);
    }

    #[test]
    fn commodore_style_missing_comma_is_rejected() {
        // `(addr)Y` without the comma is not accepted.
        let err = classify("($10)Y");
        assert!(err.is_err() || err.unwrap().mode == AddressMode::Direct);
    }

    #[test]
    fn trailing_z_without_parens_is_an_error() {
        assert!(classify("$10,Z").is_err());
    }
}
