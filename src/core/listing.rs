// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Listing file generation and the cross-reference report.
//!
//! Each listing line has the shape `[LINE] ADDR BYTES SOURCE`; the line
//! number column only appears with `-n`. Up to three generated bytes are
//! shown, padded so the source column always lines up.

use std::io::{self, Write};

use crate::core::symbol_table::{Symbol, SymbolTable};

pub struct ListingWriter<W: Write> {
    out: W,
    with_line_numbers: bool,
}

impl<W: Write> ListingWriter<W> {
    pub fn new(out: W, with_line_numbers: bool) -> Self {
        Self {
            out,
            with_line_numbers,
        }
    }

    fn line_no_column(&self, line_no: u32) -> String {
        if self.with_line_numbers {
            format!("{line_no:5} ")
        } else {
            String::new()
        }
    }

    /// A source line with no address and no bytes.
    pub fn plain(&mut self, line_no: u32, source: &str) -> io::Result<()> {
        writeln!(
            self.out,
            "{}              {source}",
            self.line_no_column(line_no)
        )
    }

    /// An empty source line.
    pub fn blank(&mut self, line_no: u32) -> io::Result<()> {
        writeln!(self.out, "{}", self.line_no_column(line_no))
    }

    /// A line annotated with an address or value but no bytes, such as a
    /// label definition, `.ORG` or a BSS reservation.
    pub fn addr(&mut self, line_no: u32, addr: i32, source: &str) -> io::Result<()> {
        writeln!(
            self.out,
            "{}{:04x}          {source}",
            self.line_no_column(line_no),
            addr & 0xffff
        )
    }

    /// A code or data line with generated bytes and an optional note.
    pub fn code(
        &mut self,
        line_no: u32,
        addr: i32,
        bytes: &[u8],
        source: &str,
        note: &str,
    ) -> io::Result<()> {
        let mut byte_cols = String::new();
        for ix in 0..3 {
            match bytes.get(ix) {
                Some(b) => byte_cols.push_str(&format!(" {b:02x}")),
                None => byte_cols.push_str("   "),
            }
        }
        writeln!(
            self.out,
            "{}{:04x}{byte_cols} {source}{note}",
            self.line_no_column(line_no),
            addr & 0xffff
        )
    }

    /// A line skipped by conditional assembly.
    pub fn skipped(&mut self, line_no: u32, source: &str) -> io::Result<()> {
        writeln!(
            self.out,
            "{}SKIP          {source}",
            self.line_no_column(line_no)
        )
    }

    /// A `#if` / `#ifdef` line with its outcome.
    pub fn conditional(&mut self, line_no: u32, skip: bool, source: &str) -> io::Result<()> {
        let verdict = if skip { "0001 FALSE   " } else { "0000 TRUE    " };
        writeln!(
            self.out,
            "{}{verdict} {source}",
            self.line_no_column(line_no)
        )
    }

    /// Marker emitted when an include file is closed.
    pub fn closed_include(&mut self, name: &str) -> io::Result<()> {
        writeln!(
            self.out,
            ";                       closed INCLUDE file {name}"
        )
    }

    /// Echo a diagnostic into the listing.
    pub fn diagnostic(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    /// The symbol tables at the end of the listing: all symbols by address,
    /// then reference-count tables for zero-page symbols and for the lower
    /// 16 KiB.
    pub fn symbol_tables(&mut self, table: &SymbolTable) -> io::Result<()> {
        writeln!(self.out, "\n\n{:5} Symbols", table.len())?;
        writeln!(self.out, "-------------")?;
        self.symbol_report(&table.sorted_by_address(), 0, 0xffff)?;
        self.symbol_report(&table.sorted_by_refs(), 0, 0xff)?;
        self.symbol_report(&table.sorted_by_refs(), 0, 0x4000)?;
        Ok(())
    }

    fn symbol_report(&mut self, symbols: &[&Symbol], lb: i32, ub: i32) -> io::Result<()> {
        for sym in symbols {
            if sym.paired || sym.address < lb || sym.address > ub {
                continue;
            }
            let name: String = sym.name.chars().take(30).collect();
            write!(self.out, "{name:<30} ${:04x}", sym.address & 0xffff)?;
            for (ix, r) in sym.refs.iter().enumerate() {
                if ix > 0 && ix % 5 == 0 {
                    write!(self.out, "\n{:36}", "")?;
                }
                write!(self.out, "{:6}", r.line)?;
                let marker = r.attr.marker();
                if marker != ' ' {
                    write!(self.out, "{marker}")?;
                }
            }
            writeln!(self.out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_table::{DefineMode, PassPhase, RefAttr};

    fn render<F>(with_line_numbers: bool, f: F) -> String
    where
        F: FnOnce(&mut ListingWriter<&mut Vec<u8>>),
    {
        let mut out = Vec::new();
        let mut writer = ListingWriter::new(&mut out, with_line_numbers);
        f(&mut writer);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn code_line_pads_byte_columns() {
        let text = render(false, |w| {
            w.code(1, 0x1000, &[0xa9, 0x42], "LDA #$42", "").unwrap();
        });
        assert_eq!(text, "1000 a9 42    LDA #$42\n");
    }

    #[test]
    fn code_line_shows_at_most_three_bytes() {
        let text = render(false, |w| {
            w.code(1, 0x1000, &[1, 2, 3, 4, 5], "   .byte 1,2,3,4,5", "")
                .unwrap();
        });
        assert!(text.starts_with("1000 01 02 03 "));
    }

    #[test]
    fn line_numbers_only_when_requested() {
        let text = render(true, |w| {
            w.plain(12, "; comment").unwrap();
        });
        assert_eq!(text, "   12               ; comment\n");
        let text = render(false, |w| {
            w.plain(12, "; comment").unwrap();
        });
        assert_eq!(text, "              ; comment\n");
    }

    #[test]
    fn symbol_report_includes_refs_and_markers() {
        let mut table = SymbolTable::new();
        table
            .define("PTR", 0xfb, DefineMode::Position, 3, PassPhase::First)
            .unwrap();
        table.value_of("PTR", 9, RefAttr::IndirectIndexed, true).unwrap();
        let text = render(false, |w| {
            w.symbol_tables(&table).unwrap();
        });
        assert!(text.contains("PTR"));
        assert!(text.contains("$00fb"));
        assert!(text.contains("9y"));
        assert!(text.contains("Symbols"));
    }
}
