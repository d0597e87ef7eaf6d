// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! MOS 6502 CPU family: CPU selection, mnemonic recognition, addressing
//! modes and the instruction tables.
//!
//! # Family Characteristics
//!
//! - 8-bit data bus, 16-bit address bus
//! - Registers: A (accumulator), X, Y, and on the 45GS02 Z plus the virtual
//!   32-bit Q register (A:X:Y:Z)
//! - Parenthesized operands select the indirect addressing modes
//!
//! The recognizer classifies a statement's mnemonic into one of a handful of
//! instruction shapes; operand classification is separate (see [`operand`]).

pub mod operand;
pub mod table;

use crate::core::text_utils::is_space;
use table::{SingleEntry, BIT_OPS, GENERIC, IMPLIED, LONG_BRANCH_BASES, QUAD, RELATIVE};

/// CPU types of the 6502 family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuType {
    /// Commodore, Atari, Apple, Acorn BBC
    Mos6502,
    /// Apple IIc
    Mos65SC02,
    /// Apple IIc, Apple IIe
    Mos65C02,
    /// Commodore C65, MEGA65
    Mos45GS02,
    /// Apple IIgs, C256 Foenix
    Mos65816,
}

impl CpuType {
    pub const NAMES: &'static [(&'static str, CpuType)] = &[
        ("6502", CpuType::Mos6502),
        ("65SC02", CpuType::Mos65SC02),
        ("65C02", CpuType::Mos65C02),
        ("45GS02", CpuType::Mos45GS02),
        ("65816", CpuType::Mos65816),
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, cpu)| *cpu == self)
            .map(|(name, _)| *name)
            .unwrap_or("6502")
    }

    /// Parse a CPU name as given to `.CPU`.
    #[must_use]
    pub fn parse(text: &str) -> Option<CpuType> {
        let text = text.trim();
        Self::NAMES
            .iter()
            .find(|(name, _)| {
                text.len() >= name.len() && text[..name.len()].eq_ignore_ascii_case(name)
            })
            .map(|(_, cpu)| *cpu)
    }

    fn bit(self) -> u8 {
        match self {
            CpuType::Mos6502 => 1,
            CpuType::Mos65SC02 => 2,
            CpuType::Mos65C02 => 4,
            CpuType::Mos45GS02 => 8,
            CpuType::Mos65816 => 16,
        }
    }

    /// Capability ordering used by the CPU gates (6502 < 65SC02 < 65C02 <
    /// 45GS02 < 65816).
    #[must_use]
    pub fn at_least(self, other: CpuType) -> bool {
        self.bit() >= other.bit()
    }
}

/// Set of CPUs an instruction is available on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSet(u8);

impl CpuSet {
    pub const ALL: CpuSet = CpuSet(0b1_1111);
    /// Everything after the NMOS 6502.
    pub const CMOS: CpuSet = CpuSet(0b1_1110);
    pub const M45GS02: CpuSet = CpuSet(0b0_1000);
    pub const M65816: CpuSet = CpuSet(0b1_0000);

    #[must_use]
    pub fn contains(self, cpu: CpuType) -> bool {
        self.0 & cpu.bit() != 0
    }
}

/// Instruction shape determined by the mnemonic (and operand presence).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    /// No operand bytes; `quad` selects the `42 42` prefix form.
    Implied { opcode: u8, quad: bool },
    /// Short relative branch.
    Relative { opcode: u8 },
    /// 3-byte relative branch with 16-bit displacement (45GS02).
    LongRelative { opcode: u8 },
    /// `BBRn`/`BBSn dp,target` with the bit number folded into the opcode.
    TestBitBranch { opcode: u8 },
    /// `RMBn`/`SMBn dp` with the bit number folded into the opcode.
    BitZeroPage { opcode: u8 },
    /// General-table instruction.
    Gen { index: usize },
    /// Q-register form of a general-table instruction (45GS02).
    Quad { index: usize },
}

/// A recognized instruction statement.
#[derive(Debug, Clone, Copy)]
pub struct Recognized {
    pub mnemonic: &'static str,
    pub kind: InstructionKind,
    /// Offset of the operand field within the statement text.
    pub operand_start: usize,
}

fn mne_matches(text: &str, mne: &str, len: usize) -> bool {
    text.len() >= len && text[..len].eq_ignore_ascii_case(&mne[..len.min(mne.len())])
}

fn find_single<'t>(
    table: &'t [SingleEntry],
    text: &str,
    cpu: CpuType,
) -> Option<&'t SingleEntry> {
    table
        .iter()
        .find(|entry| mne_matches(text, entry.mne, 3) && entry.cpus.contains(cpu))
}

/// Does an operand field follow? A bare `A` (or `Q` on the 45GS02) counts as
/// no operand: accumulator mode is encoded as implied.
fn operand_exists(text: &str, cpu: CpuType) -> bool {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let Some(&first) = bytes.first() else {
        return false;
    };
    if first == b';' {
        return false;
    }
    let acc = matches!(first, b'A' | b'a')
        || (matches!(first, b'Q' | b'q') && cpu == CpuType::Mos45GS02);
    if !acc {
        return true;
    }
    let rest = trimmed[1..].trim_start();
    !(rest.is_empty() || rest.starts_with(';'))
}

/// Is the operand the bare Q register?
fn is_qumulator(text: &str) -> bool {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    if !matches!(bytes.first(), Some(b'Q') | Some(b'q')) {
        return false;
    }
    !crate::core::text_utils::is_symbol_at(bytes, 1)
}

/// Recognize the mnemonic at the start of `text`. Returns `None` when the
/// statement is not an instruction of the selected CPU.
pub fn recognize(text: &str, cpu: CpuType) -> Option<Recognized> {
    let bytes = text.as_bytes();
    if bytes.len() < 3 {
        return None;
    }
    if !(bytes[0].is_ascii_alphabetic()
        && bytes[1].is_ascii_alphabetic()
        && bytes[2].is_ascii_alphabetic())
    {
        return None;
    }

    // Four-character bit instructions: RMB0-7, SMB0-7, BBR0-7, BBS0-7.
    if bytes.len() > 3
        && (b'0'..=b'7').contains(&bytes[3])
        && bytes.get(4).map_or(true, |&c| c <= b' ')
    {
        for (ix, entry) in BIT_OPS.iter().enumerate() {
            if mne_matches(text, entry.mne, 3) && entry.cpus.contains(cpu) {
                let bit = bytes[3] & 7;
                let opcode = entry.opc | (bit << 4);
                let kind = if ix > 1 {
                    InstructionKind::TestBitBranch { opcode }
                } else {
                    InstructionKind::BitZeroPage { opcode }
                };
                return Some(Recognized {
                    mnemonic: entry.mne,
                    kind,
                    operand_start: 4,
                });
            }
        }
    }

    // Q-register mnemonics with an operand field.
    if cpu == CpuType::Mos45GS02 && text.len() > 5 {
        for (ix, q) in QUAD.iter().enumerate() {
            let l = q.len();
            if mne_matches(text, q, l) && bytes.get(l).copied().is_some_and(is_space) {
                if !is_qumulator(&text[l..]) {
                    return Some(Recognized {
                        mnemonic: GENERIC[ix].mne,
                        kind: InstructionKind::Quad { index: ix },
                        operand_start: l,
                    });
                }
                break; // bare Q operand: fall through to the implied table
            }
        }
    }

    // Long branch instructions: L prefix on a short branch, and BSR.
    if cpu == CpuType::Mos45GS02 && matches!(bytes[0], b'L' | b'l') {
        for entry in RELATIVE.iter().take(LONG_BRANCH_BASES) {
            if mne_matches(&text[1..], entry.mne, 3) {
                return Some(Recognized {
                    mnemonic: entry.mne,
                    kind: InstructionKind::LongRelative {
                        opcode: entry.opc + 3,
                    },
                    operand_start: 4,
                });
            }
        }
    }
    if cpu == CpuType::Mos45GS02 && mne_matches(text, "BSR", 3) {
        return Some(Recognized {
            mnemonic: "BSR",
            kind: InstructionKind::LongRelative { opcode: 0x63 },
            operand_start: 3,
        });
    }

    // The character after the mnemonic must be blank; a Q suffix selects the
    // quad form of an implied instruction.
    let (ml, quad_suffix) =
        if cpu == CpuType::Mos45GS02 && matches!(bytes.get(3), Some(b'Q') | Some(b'q')) {
            if bytes.get(4).is_some_and(|&c| !is_space(c)) {
                return None;
            }
            (4usize, true)
        } else {
            if bytes.get(3).is_some_and(|&c| !is_space(c)) {
                return None;
            }
            (3usize, false)
        };
    let has_operand = operand_exists(&text[ml.min(text.len())..], cpu);

    if !has_operand {
        if let Some(entry) = find_single(IMPLIED, text, cpu) {
            return Some(Recognized {
                mnemonic: entry.mne,
                kind: InstructionKind::Implied {
                    opcode: entry.opc,
                    quad: quad_suffix,
                },
                operand_start: ml,
            });
        }
    }

    if !quad_suffix {
        if let Some(entry) = find_single(RELATIVE, text, cpu) {
            return Some(Recognized {
                mnemonic: entry.mne,
                kind: InstructionKind::Relative { opcode: entry.opc },
                operand_start: 3,
            });
        }

        for (ix, entry) in GENERIC.iter().enumerate() {
            if mne_matches(text, entry.mne, 3) && entry.cpus.contains(cpu) {
                return Some(Recognized {
                    mnemonic: entry.mne,
                    kind: InstructionKind::Gen { index: ix },
                    operand_start: 3,
                });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_names_parse() {
        assert_eq!(CpuType::parse("45GS02"), Some(CpuType::Mos45GS02));
        assert_eq!(CpuType::parse("65c02"), Some(CpuType::Mos65C02));
        assert_eq!(CpuType::parse("z80"), None);
    }

    #[test]
    fn capability_ordering() {
        assert!(CpuType::Mos45GS02.at_least(CpuType::Mos65SC02));
        assert!(!CpuType::Mos6502.at_least(CpuType::Mos65C02));
    }

    #[test]
    fn recognizes_implied_and_accumulator() {
        let r = recognize("RTS", CpuType::Mos6502).unwrap();
        assert_eq!(r.kind, InstructionKind::Implied { opcode: 0x60, quad: false });

        let r = recognize("ASL A", CpuType::Mos6502).unwrap();
        assert_eq!(r.kind, InstructionKind::Implied { opcode: 0x0a, quad: false });

        // With an operand ASL is a general-table instruction.
        let r = recognize("ASL $10", CpuType::Mos6502).unwrap();
        assert!(matches!(r.kind, InstructionKind::Gen { .. }));
    }

    #[test]
    fn bare_bit_is_a_two_byte_skip() {
        let r = recognize("BIT", CpuType::Mos6502).unwrap();
        assert_eq!(r.kind, InstructionKind::Implied { opcode: 0x2c, quad: false });
    }

    #[test]
    fn cpu_gates_mnemonics() {
        assert!(recognize("PHX", CpuType::Mos6502).is_none());
        assert!(recognize("PHX", CpuType::Mos65C02).is_some());
        assert!(recognize("INZ", CpuType::Mos65C02).is_none());
        assert!(recognize("INZ", CpuType::Mos45GS02).is_some());
    }

    #[test]
    fn recognizes_branches() {
        let r = recognize("BNE LOOP", CpuType::Mos6502).unwrap();
        assert_eq!(r.kind, InstructionKind::Relative { opcode: 0xd0 });

        let r = recognize("LBNE FAR", CpuType::Mos45GS02).unwrap();
        assert_eq!(r.kind, InstructionKind::LongRelative { opcode: 0xd3 });
        assert!(recognize("LBNE FAR", CpuType::Mos6502).is_none());

        let r = recognize("BSR SUB", CpuType::Mos45GS02).unwrap();
        assert_eq!(r.kind, InstructionKind::LongRelative { opcode: 0x63 });
    }

    #[test]
    fn recognizes_bit_ops() {
        let r = recognize("BBR3 $12,LOOP", CpuType::Mos45GS02).unwrap();
        assert_eq!(r.kind, InstructionKind::TestBitBranch { opcode: 0x3f });
        let r = recognize("SMB7 $12", CpuType::Mos45GS02).unwrap();
        assert_eq!(r.kind, InstructionKind::BitZeroPage { opcode: 0xf7 });
        assert!(recognize("BBR3 $12,LOOP", CpuType::Mos6502).is_none());
    }

    #[test]
    fn recognizes_quad_forms() {
        let r = recognize("LDQ $10", CpuType::Mos45GS02).unwrap();
        assert!(matches!(r.kind, InstructionKind::Quad { index: 5 }));
        assert_eq!(r.mnemonic, "LDA");

        // Bare Q operand means the implied quad form.
        let r = recognize("ASLQ Q", CpuType::Mos45GS02).unwrap();
        assert_eq!(r.kind, InstructionKind::Implied { opcode: 0x0a, quad: true });
        let r = recognize("NEG", CpuType::Mos45GS02).unwrap();
        assert_eq!(r.kind, InstructionKind::Implied { opcode: 0x42, quad: false });
    }

    #[test]
    fn rejects_non_instructions() {
        assert!(recognize("LOOP", CpuType::Mos6502).is_none());
        assert!(recognize("LDAX $10", CpuType::Mos6502).is_none());
        assert!(recognize("X", CpuType::Mos6502).is_none());
    }
}
