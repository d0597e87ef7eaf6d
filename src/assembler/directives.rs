// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pseudo-op dispatch and directive handlers.
//!
//! Directive names match by prefix, case-insensitively, the way the original
//! dispatcher chains its comparisons; `.BYTE` therefore also accepts `.BYT`
//! and `.WORD` accepts `.WOR`.

use super::Assembler;
use crate::core::charset::{self, Charset};
use crate::core::error::{AsmError, ErrorKind};
use crate::core::expr::{self, UNDEFINED};
use crate::core::float::{self, MANTISSA_REAL, MANTISSA_REAL4};
use crate::core::source::SourceReader;
use crate::core::text_utils::Cursor;
use crate::families::mos6502::CpuType;

fn starts(text: &str, word: &str) -> bool {
    text.len() >= word.len() && text[..word.len()].eq_ignore_ascii_case(word)
}

fn skip_to_comma(cur: &mut Cursor) {
    loop {
        match cur.peek() {
            0 | b',' | b';' => return,
            _ => {
                cur.bump();
            }
        }
    }
}

impl Assembler {
    /// Try to interpret `body` (directive name without the `.`/`!` prefix)
    /// as a pseudo op. Returns whether it matched.
    pub(super) fn dispatch_pseudo(
        &mut self,
        body: &str,
        reader: &mut SourceReader,
    ) -> Result<bool, AsmError> {
        if starts(body, "WORD") {
            self.word_data(&body[4..], false)?;
        } else if starts(body, "BIGW") {
            self.word_data(&body[4..], true)?;
        } else if starts(body, "HEX4") {
            self.hex4_data(&body[4..])?;
        } else if starts(body, "DEC4") {
            self.dec4_data(&body[4..])?;
        } else if starts(body, "WOR") {
            self.word_data(&body[3..], false)?;
        } else if starts(body, "BYTE") {
            self.byte_data(&body[4..], Charset::Ascii)?;
        } else if starts(body, "BYT") {
            self.byte_data(&body[3..], Charset::Ascii)?;
        } else if starts(body, "PET") {
            self.byte_data(&body[3..], Charset::Petscii)?;
        } else if starts(body, "DISP") {
            self.byte_data(&body[4..], Charset::Screen)?;
        } else if starts(body, "BITS") {
            self.bit_data(&body[4..], true)?;
        } else if starts(body, "LITS") {
            self.bit_data(&body[4..], false)?;
        } else if starts(body, "QUAD") {
            self.quad_data(&body[4..])?;
        } else if starts(body, "REAL") {
            self.real_data(&body[4..])?;
        } else if starts(body, "FILL") {
            self.fill_data(&body[4..])?;
        } else if starts(body, "BSS") {
            self.bss_data(&body[3..])?;
        } else if starts(body, "STORE") {
            self.store_data(&body[5..])?;
        } else if starts(body, "CPU") {
            self.cpu_data(&body[3..])?;
        } else if starts(body, "BASE") {
            self.base_data(&body[4..])?;
        } else if starts(body, "CASE") {
            self.case_data(&body[4..])?;
        } else if starts(body, "ORG") {
            self.set_origin(&body[3..])?;
        } else if starts(body, "LOAD") {
            self.image.set_write_load_address();
        } else if starts(body, "INCLUDE") {
            self.include_file(&body[7..], reader)?;
        } else if starts(body, "SRC") {
            self.include_file(&body[3..], reader)?;
        } else if starts(body, "SIZE") {
            self.list_size_info();
        } else if starts(body, "SKI") || starts(body, "PAG") || starts(body, "NAM") {
            // Listing-control directives of other assemblers; accepted and
            // ignored.
        } else if starts(body, "SUBTTL") {
        } else if Self::keyword(body, "END") {
            reader.force_end();
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    pub(super) fn check_pc_overflow(&mut self) -> Result<(), AsmError> {
        if self.pc != UNDEFINED && self.pc > 0x10000 {
            return Err(AsmError::new(ErrorKind::Range, "Program counter overflow"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // program counter and BSS pointer

    /// `*= expr` - requires the `=`.
    pub(super) fn set_pc(&mut self, stmt: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(stmt);
        if !cur.seek_past(b'=') {
            return Err(AsmError::new(
                ErrorKind::Syntax,
                "Missing '=' in set pc * instruction",
            ));
        }
        let v = expr::eval_operand(&mut cur, self)?;
        self.apply_origin(v);
        Ok(())
    }

    /// `.ORG expr`
    fn set_origin(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let v = expr::eval_operand(&mut cur, self)?;
        self.apply_origin(v);
        Ok(())
    }

    fn apply_origin(&mut self, v: i32) {
        self.pc = v;
        if self.load_address == UNDEFINED {
            self.load_address = v;
        }
        self.trace_msg(&format!("PC = {:04x}", v & 0xffff));
        self.list_addr(self.pc);
    }

    /// `&= expr` - reposition the BSS pointer.
    pub(super) fn set_bss(&mut self, stmt: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(stmt);
        if !cur.seek_past(b'=') {
            return Err(AsmError::new(
                ErrorKind::Syntax,
                "Missing '=' in set BSS & instruction",
            ));
        }
        let v = expr::eval_operand(&mut cur, self)?;
        self.bss = v;
        self.trace_msg(&format!("BSS = {:04x}", v & 0xffff));
        self.list_addr(self.bss);
        Ok(())
    }

    // ------------------------------------------------------------------
    // data emission

    /// Emit collected data bytes: update byte-spans, write the image and the
    /// listing in the final pass, and advance the program counter.
    fn emit_data(&mut self, buf: &[u8], note: &str) -> Result<(), AsmError> {
        if !self.pc_is_set() {
            return Err(AsmError::new(
                ErrorKind::Semantic,
                "Undefined program counter (PC)",
            ));
        }
        self.symbols.set_bytes_at(self.pc, buf.len() as i32);
        if self.final_pass {
            self.image.put_slice(self.pc as usize, buf);
            self.list_code(self.pc, buf, note);
        }
        self.pc += buf.len() as i32;
        Ok(())
    }

    /// `.WORD list` / `.BIGW list` - 16-bit values.
    fn word_data(&mut self, rest: &str, bigendian: bool) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let mut buf = Vec::new();
        loop {
            cur.skip_space();
            if cur.at_end() {
                break;
            }
            let v = expr::eval_operand(&mut cur, self)?;
            if v == UNDEFINED && self.final_pass {
                return Err(AsmError::new(
                    ErrorKind::Semantic,
                    "Undefined symbol in WORD data",
                ));
            }
            let lo = (v & 0xff) as u8;
            let hi = ((v >> 8) & 0xff) as u8;
            if bigendian {
                buf.push(hi);
                buf.push(lo);
            } else {
                buf.push(lo);
                buf.push(hi);
            }
            skip_to_comma(&mut cur);
            if !cur.eat(b',') {
                break;
            }
        }
        if buf.is_empty() {
            return Err(AsmError::new(ErrorKind::Syntax, "Missing WORD data"));
        }
        self.emit_data(&buf, "")
    }

    /// `.BYTE` / `.BYT` / `.PET` / `.DISP` data lists.
    fn byte_data(&mut self, rest: &str, charset: Charset) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let mut buf = Vec::new();
        loop {
            cur.skip_space();
            if cur.at_end() {
                break;
            }
            let item = cur.rest().as_bytes();
            let first = item[0];

            // Packed and hashed three-character forms: <"XXX" >"XXX" #"XXX".
            if matches!(first, b'<' | b'>' | b'#')
                && item.len() >= 6
                && item[1] == b'"'
                && item[5] == b'"'
            {
                let chars = [item[2], item[3], item[4]];
                match first {
                    b'<' => buf.push(charset::pack_low(chars)),
                    b'>' => buf.push(charset::pack_high(chars)),
                    _ => {
                        let v = charset::hash_triple(chars);
                        buf.push((v & 0xff) as u8);
                        buf.push((v >> 8) as u8);
                    }
                }
                cur.advance(6);
            } else if first == b'"' || first == b'\'' {
                let segment = charset::scan_string(&mut cur)?;
                // In a plain .BYTE list, single-quoted strings are PETSCII.
                let effective = if charset == Charset::Ascii && first == b'\'' {
                    Charset::Petscii
                } else {
                    charset
                };
                buf.extend(segment.iter().map(|&b| charset::translate(effective, b)));
            } else {
                let v = expr::eval_operand(&mut cur, self)?;
                if v == UNDEFINED && self.final_pass {
                    return Err(AsmError::new(
                        ErrorKind::Semantic,
                        "Undefined symbol in BYTE data",
                    ));
                }
                buf.push((v & 0xff) as u8);
                // Large values spill their high byte, except for the < and >
                // half operators which are bytes by construction.
                if first != b'<' && first != b'>' && v != UNDEFINED && !(-127..=255).contains(&v) {
                    buf.push(((v >> 8) & 0xff) as u8);
                }
            }
            skip_to_comma(&mut cur);
            if !cur.eat(b',') {
                break;
            }
        }
        if buf.is_empty() {
            return Err(AsmError::new(ErrorKind::Syntax, "Missing byte data"));
        }
        self.emit_data(&buf, "")
    }

    /// `.HEX4 expr` - the value as four ASCII hex digits.
    fn hex4_data(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let v = expr::eval_operand(&mut cur, self)?;
        let text = format!("{:04X}", v & 0xffff);
        self.emit_data(text.as_bytes(), "")
    }

    /// `.DEC4 expr` - the value as four ASCII decimal characters.
    fn dec4_data(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let v = expr::eval_operand(&mut cur, self)?;
        let text = format!("{v:4}");
        let bytes: Vec<u8> = text.bytes().take(4).collect();
        self.emit_data(&bytes, "")
    }

    /// `.QUAD expr` - 32 bits, high byte first.
    fn quad_data(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let v = expr::eval_operand(&mut cur, self)?;
        let w = v as u32;
        let buf = [
            (w >> 24) as u8,
            (w >> 16) as u8,
            (w >> 8) as u8,
            w as u8,
        ];
        self.emit_data(&buf, "")
    }

    /// `.REAL` / `.REAL4` - CBM floating point.
    fn real_data(&mut self, rest: &str) -> Result<(), AsmError> {
        let (mantissa, rest) = match rest.strip_prefix('4') {
            Some(rest) => (MANTISSA_REAL4, rest),
            None => (MANTISSA_REAL, rest),
        };
        let mut cur = Cursor::new(rest);
        let bytes = float::parse_real(&mut cur, mantissa)?;
        let note = if self.final_pass {
            format!(" {:20.10}", float::decode_real(&bytes))
        } else {
            String::new()
        };
        self.emit_data(&bytes, &note)
    }

    /// `.FILL count (value)`
    fn fill_data(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let count = expr::eval_operand(&mut cur, self)?;
        if !(0..=32767).contains(&count) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("Illegal FILL multiplier {count}"),
            ));
        }
        if !cur.seek_past(b'(') {
            return Err(AsmError::new(
                ErrorKind::Syntax,
                "Missing '(' before FILL value",
            ));
        }
        let v = (expr::eval_operand(&mut cur, self)? & 0xff) as u8;
        let count = count as usize;
        let shown = count.min(3);
        let buf = vec![v; count];
        let note = format!(" ; {count} bytes");
        if !self.pc_is_set() {
            return Err(AsmError::new(
                ErrorKind::Semantic,
                "Undefined program counter (PC)",
            ));
        }
        self.symbols.set_bytes_at(self.pc, count as i32);
        if self.final_pass {
            self.image.put_slice(self.pc as usize, &buf);
            self.list_code(self.pc, &buf[..shown], &note);
        }
        self.pc += count as i32;
        Ok(())
    }

    /// `.BSS n` - advance the BSS pointer without emitting bytes.
    fn bss_data(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let n = expr::eval_operand(&mut cur, self)?;
        if !(1..=32767).contains(&n) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("Illegal BSS size {n}"),
            ));
        }
        self.list_addr(self.bss);
        self.bss += n;
        Ok(())
    }

    /// `.BITS` / `.LITS` - eight `*`/`.` cells packed into one byte,
    /// MSB-first for BITS and LSB-first for LITS.
    fn bit_data(&mut self, rest: &str, msb_first: bool) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let mut v: u8 = 0;
        for _ in 0..8 {
            cur.skip_space();
            let bit = match cur.bump() {
                b'*' => 1u8,
                b'.' => 0u8,
                _ => {
                    return Err(AsmError::new(
                        ErrorKind::Syntax,
                        "use only '*' for 1 and '.' for 0 in BITS statement",
                    ));
                }
            };
            if msb_first {
                v = (v << 1) | bit;
            } else {
                v = (v >> 1) | (bit << 7);
            }
        }
        self.emit_data(&[v], "")
    }

    /// `.STORE start,length,"file"` - queue a binary output region.
    fn store_data(&mut self, rest: &str) -> Result<(), AsmError> {
        if !self.final_pass {
            return Ok(());
        }
        let mut cur = Cursor::new(rest);
        let start = expr::eval_operand(&mut cur, self)?;
        if !(0..=0xffff).contains(&start) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("Illegal start address for STORE {start}"),
            ));
        }
        if !cur.seek_past(b',') {
            return Err(AsmError::new(
                ErrorKind::Syntax,
                "Missing ',' after start address",
            ));
        }
        let length = expr::eval_operand(&mut cur, self)?;
        if !(0..=0x10000).contains(&length) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("Illegal length for STORE {length}"),
            ));
        }
        if !cur.seek_past(b',') {
            return Err(AsmError::new(ErrorKind::Syntax, "Missing ',' after length"));
        }
        if !cur.seek_past(b'"') {
            return Err(AsmError::new(ErrorKind::Syntax, "Missing quote for filename"));
        }
        let mut filename = String::new();
        while cur.peek() != 0 && cur.peek() != b'"' {
            filename.push(cur.bump() as char);
        }
        self.trace_msg(&format!(
            "Storing {:04x} - {:04x} <{filename}>",
            start,
            start + length - 1
        ));
        self.image
            .add_store(start as usize, length as usize, &filename)?;
        self.list_plain();
        Ok(())
    }

    /// `.CPU name` - select the target CPU.
    fn cpu_data(&mut self, rest: &str) -> Result<(), AsmError> {
        match CpuType::parse(rest) {
            Some(cpu) => {
                self.cpu = cpu;
                self.trace_msg(&format!("new CPU: {}", cpu.name()));
                self.list_plain();
                Ok(())
            }
            None => Err(AsmError::with_param(
                ErrorKind::Semantic,
                "Unsupported CPU type",
                rest.trim(),
            )),
        }
    }

    /// `.BASE n` - set the base-page register.
    fn base_data(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        let v = expr::eval_operand(&mut cur, self)?;
        if !(0..=255).contains(&v) {
            return Err(AsmError::new(
                ErrorKind::Range,
                format!("Illegal base page value {v}"),
            ));
        }
        self.base_page = v;
        self.list_plain();
        Ok(())
    }

    /// `.CASE +` / `.CASE -` - toggle symbol case sensitivity.
    fn case_data(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        cur.skip_space();
        let ignore = match cur.bump() {
            b'+' => false,
            b'-' => true,
            _ => {
                return Err(AsmError::new(
                    ErrorKind::Syntax,
                    "Missing '+' or '-' after .CASE",
                ));
            }
        };
        self.symbols.set_ignore_case(ignore);
        self.macros.set_ignore_case(ignore);
        self.list_plain();
        Ok(())
    }

    /// `.INCLUDE "file"` / `!SRC "file"`
    fn include_file(&mut self, rest: &str, reader: &mut SourceReader) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        if !cur.seek_past(b'"') {
            return Err(AsmError::new(
                ErrorKind::Syntax,
                "Missing quoted filename after .INCLUDE",
            ));
        }
        let mut filename = String::new();
        while cur.peek() != 0 && cur.peek() != b'"' {
            filename.push(cur.bump() as char);
        }
        self.list_plain();
        reader.include(&filename)
    }

    /// `.SIZE` - annotate the listing with the size of the current module.
    pub(super) fn list_size_info(&mut self) {
        if self.final_pass {
            let size = self.pc - self.module_start;
            let note = match self.symbols.name_at(self.module_start) {
                Some(name) => format!(" [{name}] Size = {size} [${size:x}]"),
                None => format!(" Size = {size} [${size:x}]"),
            };
            if let Some(lst) = &mut self.lst {
                let _ = lst.code(self.line_no, self.pc, &[], &self.line, &note);
            }
        }
        self.listed = true;
    }
}
