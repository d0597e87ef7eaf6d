// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Instruction encoding.
//!
//! The encoder turns a recognized mnemonic plus its classified operand into
//! the final byte sequence: opcode selection from the general table,
//! zero-page narrowing against the base-page register, relative displacement
//! computation with the short/long branch fixed point, and the 45GS02 quad
//! prefixes.

use super::Assembler;
use crate::core::error::{AsmError, ErrorKind};
use crate::core::expr::{self, UNDEFINED};
use crate::core::symbol_table::RefAttr;
use crate::core::text_utils::Cursor;
use crate::families::mos6502::operand::{classify, AddressMode};
use crate::families::mos6502::table::{GenEntry, OpColumn, GENERIC};
use crate::families::mos6502::{CpuType, InstructionKind, Recognized};

/// Extract the operand field of a statement: everything after the mnemonic
/// up to an unquoted `;`, trimmed.
fn extract_operand(stmt: &str, start: usize) -> String {
    let rest = &stmt[start.min(stmt.len())..];
    let mut out = String::new();
    let mut in_single = false;
    let mut in_double = false;
    for c in rest.chars() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => break,
            _ => {}
        }
        out.push(c);
    }
    out.trim().to_string()
}

/// Strip the redundant `,Z` suffix of quad-instruction operands
/// (`LDQ (dp),Z` is the same as `LDQ (dp)`).
fn strip_quad_z(operand: &str) -> &str {
    let trimmed = operand.trim_end();
    if trimmed.len() >= 2 && matches!(trimmed.as_bytes()[trimmed.len() - 1], b'Z' | b'z') {
        let head = trimmed[..trimmed.len() - 1].trim_end();
        if head.ends_with(',') {
            return &head[..head.len() - 1];
        }
    }
    operand
}

impl Assembler {
    pub(super) fn generate_code(&mut self, rec: Recognized, stmt: &str) -> Result<(), AsmError> {
        if !self.pc_is_set() {
            return Err(AsmError::new(
                ErrorKind::Semantic,
                "Undefined program counter (PC)",
            ));
        }
        let operand = extract_operand(stmt, rec.operand_start);
        self.current_attr = RefAttr::Plain;

        let bytes = match rec.kind {
            InstructionKind::Implied { opcode, quad } => {
                if quad {
                    vec![0x42, 0x42, opcode]
                } else {
                    vec![opcode]
                }
            }
            InstructionKind::Relative { opcode } => self.encode_branch(opcode, &operand)?,
            InstructionKind::LongRelative { opcode } => {
                self.encode_long_branch(opcode, &operand)?
            }
            InstructionKind::TestBitBranch { opcode } => {
                self.encode_bit_branch(opcode, &operand)?
            }
            InstructionKind::BitZeroPage { opcode } => self.encode_bit_zp(opcode, &operand)?,
            InstructionKind::Gen { index } => self.encode_general(index, &operand, false)?,
            InstructionKind::Quad { index } => self.encode_general(index, &operand, true)?,
        };

        if self.pc + bytes.len() as i32 > 0xffff {
            if self.final_pass {
                return Err(AsmError::new(
                    ErrorKind::Range,
                    "Program counter exceeds 64 KB",
                ));
            }
            return Ok(());
        }
        if self.final_pass {
            self.image.put_slice(self.pc as usize, &bytes);
            self.list_code(self.pc, &bytes, "");
        }
        self.pc += bytes.len() as i32;
        Ok(())
    }

    /// Short branch, with automatic promotion to a long branch on the
    /// 45GS02 when optimization is on. The chosen opcode is frozen into the
    /// image on every non-final pass; the final pass reads it back so the
    /// layout cannot flip once more after convergence.
    fn encode_branch(&mut self, opcode: u8, operand: &str) -> Result<Vec<u8>, AsmError> {
        let mut cur = Cursor::new(operand);
        let v = expr::eval_operand(&mut cur, self)?;
        let mut disp = if v == UNDEFINED {
            UNDEFINED
        } else {
            v - (self.pc + 2)
        };
        let mut opc = opcode;
        let mut long = false;

        if self.cfg.branch_opt && self.cpu == CpuType::Mos45GS02 {
            if disp == UNDEFINED || !(-128..=127).contains(&disp) {
                opc |= 3;
                long = true;
            }
            if self.final_pass {
                if v == UNDEFINED {
                    return Err(AsmError::new(
                        ErrorKind::Semantic,
                        "Branch to undefined label",
                    ));
                }
                opc = self.branch_image.get(self.pc as usize);
                long = opc & 3 == 3;
            } else {
                self.branch_image.put(self.pc as usize, opc);
                self.trace_msg(&format!(
                    "branch @{:04x} -> {}",
                    self.pc,
                    if long { "long" } else { "short" }
                ));
            }
        } else if self.final_pass {
            if v == UNDEFINED {
                return Err(AsmError::new(
                    ErrorKind::Semantic,
                    "Branch to undefined label",
                ));
            }
            if !(-128..=127).contains(&disp) {
                return Err(AsmError::new(
                    ErrorKind::Range,
                    format!("Branch too long ({disp})"),
                ));
            }
        }

        if disp == UNDEFINED {
            disp = 0;
        }
        if long {
            let d = disp & 0xffff;
            Ok(vec![opc, (d & 0xff) as u8, (d >> 8) as u8])
        } else {
            Ok(vec![opc, (disp & 0xff) as u8])
        }
    }

    /// `LBxx` / `BSR` - 16-bit displacement relative to pc+2.
    fn encode_long_branch(&mut self, opcode: u8, operand: &str) -> Result<Vec<u8>, AsmError> {
        let mut cur = Cursor::new(operand);
        let v = expr::eval_operand(&mut cur, self)?;
        if v == UNDEFINED && self.final_pass {
            return Err(AsmError::new(
                ErrorKind::Semantic,
                "Branch to undefined label",
            ));
        }
        let disp = if v == UNDEFINED {
            0
        } else {
            (v - self.pc - 2) & 0xffff
        };
        Ok(vec![opcode, (disp & 0xff) as u8, (disp >> 8) as u8])
    }

    /// `BBRn dp,target` / `BBSn dp,target`
    fn encode_bit_branch(&mut self, opcode: u8, operand: &str) -> Result<Vec<u8>, AsmError> {
        let mut cur = Cursor::new(operand);
        let dp = expr::eval_operand(&mut cur, self)?;
        let dp_adj = if dp == UNDEFINED {
            UNDEFINED
        } else {
            dp - (self.base_page << 8)
        };
        if self.final_pass && !(0..=255).contains(&dp_adj) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("Need direct page address, read ({dp_adj})"),
            ));
        }
        cur.skip_space();
        if !cur.eat(b',') {
            return Err(AsmError::new(ErrorKind::Syntax, "Need two arguments"));
        }
        let target = expr::eval_operand(&mut cur, self)?;
        if self.final_pass && target == UNDEFINED {
            return Err(AsmError::new(
                ErrorKind::Semantic,
                "Branch to undefined label",
            ));
        }
        let disp = if target == UNDEFINED {
            0
        } else {
            target - (self.pc + 3)
        };
        if self.final_pass && !(-128..=127).contains(&disp) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("Branch too long ({disp})"),
            ));
        }
        Ok(vec![opcode, (dp_adj & 0xff) as u8, (disp & 0xff) as u8])
    }

    /// `RMBn dp` / `SMBn dp`
    fn encode_bit_zp(&mut self, opcode: u8, operand: &str) -> Result<Vec<u8>, AsmError> {
        let mut cur = Cursor::new(operand);
        let v = expr::eval_operand(&mut cur, self)?;
        if v == UNDEFINED {
            if self.final_pass {
                return Err(AsmError::new(
                    ErrorKind::Semantic,
                    "Use of an undefined label",
                ));
            }
            return Ok(vec![opcode, 0]);
        }
        let w = v - (self.base_page << 8);
        if !(-128..=255).contains(&w) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("base page value out of range ({w})"),
            ));
        }
        Ok(vec![opcode, (w & 0xff) as u8])
    }

    // ------------------------------------------------------------------
    // general-table instructions

    fn cpu_error(&self) -> AsmError {
        AsmError::new(
            ErrorKind::Semantic,
            format!(
                "Illegal instruction or operand for CPU {}",
                self.cpu.name()
            ),
        )
    }

    fn mode_error(mnemonic: &str) -> AsmError {
        AsmError::with_param(ErrorKind::Syntax, "illegal address mode", mnemonic)
    }

    /// One operand byte for a direct-page mode: the high byte is dropped
    /// when it matches the base-page register, anything else outside a byte
    /// is a range error.
    fn dp_operand(&self, v: i32) -> Result<u8, AsmError> {
        if v == UNDEFINED {
            if self.final_pass {
                return Err(AsmError::new(
                    ErrorKind::Semantic,
                    "Use of an undefined label",
                ));
            }
            return Ok(0);
        }
        let mut x = v;
        if x >> 8 == self.base_page {
            x &= 0xff;
        }
        if self.final_pass && !(-128..=255).contains(&x) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("Not a byte value : {x}"),
            ));
        }
        Ok((x & 0xff) as u8)
    }

    fn abs_operand(&self, v: i32) -> Result<[u8; 2], AsmError> {
        if v == UNDEFINED {
            if self.final_pass {
                return Err(AsmError::new(
                    ErrorKind::Semantic,
                    "Use of an undefined label",
                ));
            }
            return Ok([0, 0]);
        }
        Ok([(v & 0xff) as u8, ((v >> 8) & 0xff) as u8])
    }

    fn encode_general(
        &mut self,
        index: usize,
        operand: &str,
        quad: bool,
    ) -> Result<Vec<u8>, AsmError> {
        let entry: &'static GenEntry = &GENERIC[index];
        if operand.is_empty() {
            return Err(AsmError::new(ErrorKind::Syntax, "Operand missing"));
        }
        let operand = if quad { strip_quad_z(operand) } else { operand };
        let cls = classify(operand)?;

        self.current_attr = match cls.mode {
            AddressMode::IndirectX => RefAttr::IndexedIndirect,
            AddressMode::IndirectY | AddressMode::IndirectSpY => RefAttr::IndirectIndexed,
            _ => RefAttr::Plain,
        };
        let mut cur = Cursor::new(cls.expr);
        let v = expr::eval_operand(&mut cur, self)?;
        cur.skip_space();
        if !cur.at_end() {
            let col = cur.pos();
            return Err(self.fail_at(
                col,
                AsmError::with_param(ErrorKind::Syntax, "Operand syntax error", cur.rest().trim()),
            ));
        }

        let w = if v == UNDEFINED {
            UNDEFINED
        } else {
            v - (self.base_page << 8)
        };
        let fits_dp = w != UNDEFINED && (0..256).contains(&w) && !cls.force16;

        if quad {
            return self.encode_quad(entry, &cls, v, w, fits_dp);
        }

        match cls.mode {
            AddressMode::Immediate => {
                if entry.mne == "BIT" && !self.cpu.at_least(CpuType::Mos65SC02) {
                    return Err(self.cpu_error());
                }
                let op = entry
                    .opcode(OpColumn::Imm)
                    .ok_or_else(|| Self::mode_error(entry.mne))?;
                if entry.mne == "PHW" {
                    let [lo, hi] = self.abs_operand(v)?;
                    return Ok(vec![op, lo, hi]);
                }
                if self.final_pass {
                    if v == UNDEFINED {
                        return Err(AsmError::new(
                            ErrorKind::Semantic,
                            "Use of an undefined label",
                        ));
                    }
                    if !(-128..=255).contains(&v) {
                        return Err(AsmError::new(
                            ErrorKind::Range,
                            format!("Immediate value out of range ({v})"),
                        ));
                    }
                }
                Ok(vec![op, (v & 0xff) as u8])
            }

            AddressMode::Direct => {
                let abs = entry.opcode(OpColumn::Abs);
                let dp = entry.opcode(OpColumn::Dp);
                match (abs, dp) {
                    (None, Some(op)) => {
                        // Only a direct-page form exists (ASR, DEW, INW).
                        if w != UNDEFINED && !(-128..=255).contains(&w) {
                            return Err(AsmError::new(
                                ErrorKind::Range,
                                format!("base page value out of range ({w})"),
                            ));
                        }
                        if w == UNDEFINED && self.final_pass {
                            return Err(AsmError::new(
                                ErrorKind::Semantic,
                                "Use of an undefined label",
                            ));
                        }
                        Ok(vec![op, (w & 0xff) as u8])
                    }
                    (Some(abs_op), dp_op) => {
                        if fits_dp {
                            if let Some(op) = dp_op {
                                return Ok(vec![op, (w & 0xff) as u8]);
                            }
                        }
                        let [lo, hi] = self.abs_operand(v)?;
                        Ok(vec![abs_op, lo, hi])
                    }
                    (None, None) => Err(Self::mode_error(entry.mne)),
                }
            }

            AddressMode::DirectX => {
                if entry.mne == "BIT" && !self.cpu.at_least(CpuType::Mos65SC02) {
                    return Err(self.cpu_error());
                }
                let absx = entry.opcode(OpColumn::AbsX);
                let dpx = entry.opcode(OpColumn::DpX);
                match (absx, dpx) {
                    (None, Some(op)) => {
                        let byte = self.dp_operand(v)?;
                        Ok(vec![op, byte])
                    }
                    (Some(absx_op), dpx_op) => {
                        if fits_dp {
                            if let Some(op) = dpx_op {
                                return Ok(vec![op, (w & 0xff) as u8]);
                            }
                        }
                        if entry.mne == "STY" && self.cpu != CpuType::Mos45GS02 {
                            return Err(self.cpu_error());
                        }
                        let [lo, hi] = self.abs_operand(v)?;
                        Ok(vec![absx_op, lo, hi])
                    }
                    (None, None) => Err(Self::mode_error(entry.mne)),
                }
            }

            AddressMode::DirectY => {
                let absy = entry
                    .opcode(OpColumn::AbsY)
                    .ok_or_else(|| Self::mode_error(entry.mne))?;
                // LDX/STX switch to the zero-page,Y encodings when they fit.
                if fits_dp && absy == 0xbe {
                    return Ok(vec![0xb6, (w & 0xff) as u8]);
                }
                if fits_dp && absy == 0x9b {
                    return Ok(vec![0x96, (w & 0xff) as u8]);
                }
                let [lo, hi] = self.abs_operand(v)?;
                Ok(vec![absy, lo, hi])
            }

            AddressMode::IndirectX => match entry.mne {
                "JMP" => {
                    if !self.cpu.at_least(CpuType::Mos65SC02) {
                        return Err(self.cpu_error());
                    }
                    let [lo, hi] = self.abs_operand(v)?;
                    Ok(vec![0x7c, lo, hi])
                }
                "JSR" => {
                    if !self.cpu.at_least(CpuType::Mos45GS02) {
                        return Err(self.cpu_error());
                    }
                    let op = if self.cpu == CpuType::Mos65816 { 0xfc } else { 0x23 };
                    let [lo, hi] = self.abs_operand(v)?;
                    Ok(vec![op, lo, hi])
                }
                _ => {
                    let op = entry
                        .opcode(OpColumn::IndX)
                        .ok_or_else(|| Self::mode_error(entry.mne))?;
                    let byte = self.dp_operand(v)?;
                    Ok(vec![op, byte])
                }
            },

            AddressMode::IndirectY => {
                let op = entry
                    .opcode(OpColumn::IndY)
                    .ok_or_else(|| Self::mode_error(entry.mne))?;
                let byte = self.dp_operand(v)?;
                Ok(vec![op, byte])
            }

            AddressMode::IndirectSpY => {
                if self.cpu != CpuType::Mos45GS02 {
                    return Err(self.cpu_error());
                }
                let op = match entry.mne {
                    "LDA" => 0xe2,
                    "STA" => 0x82,
                    _ => return Err(Self::mode_error(entry.mne)),
                };
                let byte = self.dp_operand(v)?;
                Ok(vec![op, byte])
            }

            AddressMode::IndirectZ => {
                if self.cpu != CpuType::Mos45GS02 {
                    return Err(self.cpu_error());
                }
                let op = entry
                    .opcode(OpColumn::IndZ)
                    .ok_or_else(|| Self::mode_error(entry.mne))?;
                let byte = self.dp_operand(v)?;
                Ok(vec![op, byte])
            }

            AddressMode::Indirect => match entry.mne {
                "JMP" => {
                    let [lo, hi] = self.abs_operand(v)?;
                    Ok(vec![0x6c, lo, hi])
                }
                "JSR" => {
                    if self.cpu != CpuType::Mos45GS02 {
                        return Err(self.cpu_error());
                    }
                    let [lo, hi] = self.abs_operand(v)?;
                    Ok(vec![0x22, lo, hi])
                }
                _ => {
                    // A bare (dp) is the zero-page indirect mode.
                    if !self.cpu.at_least(CpuType::Mos65SC02) {
                        return Err(self.cpu_error());
                    }
                    let op = entry
                        .opcode(OpColumn::IndZ)
                        .ok_or_else(|| Self::mode_error(entry.mne))?;
                    let byte = self.dp_operand(v)?;
                    Ok(vec![op, byte])
                }
            },

            AddressMode::IndirectLong => {
                if self.cpu != CpuType::Mos45GS02 {
                    return Err(self.cpu_error());
                }
                let op = entry
                    .opcode(OpColumn::IndZ)
                    .ok_or_else(|| Self::mode_error(entry.mne))?;
                let byte = self.dp_operand(v)?;
                Ok(vec![0xea, op, byte])
            }
        }
    }

    /// 45GS02 quad forms: base page, absolute, `(dp)` and `[dp]`.
    fn encode_quad(
        &mut self,
        entry: &'static GenEntry,
        cls: &crate::families::mos6502::operand::ClassifiedOperand<'_>,
        v: i32,
        w: i32,
        fits_dp: bool,
    ) -> Result<Vec<u8>, AsmError> {
        match cls.mode {
            AddressMode::Direct => {
                if fits_dp {
                    if let Some(op) = entry.opcode(OpColumn::Dp) {
                        return Ok(vec![0x42, 0x42, op, (w & 0xff) as u8]);
                    }
                }
                let op = entry
                    .opcode(OpColumn::Abs)
                    .ok_or_else(|| Self::mode_error(entry.mne))?;
                let [lo, hi] = self.abs_operand(v)?;
                Ok(vec![0x42, 0x42, op, lo, hi])
            }
            AddressMode::Indirect | AddressMode::IndirectZ => {
                let op = entry
                    .opcode(OpColumn::IndZ)
                    .ok_or_else(|| Self::mode_error(entry.mne))?;
                let byte = self.dp_operand(v)?;
                Ok(vec![0x42, 0x42, op, byte])
            }
            AddressMode::IndirectLong => {
                let op = entry
                    .opcode(OpColumn::IndZ)
                    .ok_or_else(|| Self::mode_error(entry.mne))?;
                let byte = self.dp_operand(v)?;
                Ok(vec![0x42, 0x42, 0xea, op, byte])
            }
            _ => Err(Self::mode_error(entry.mne)),
        }
    }
}
