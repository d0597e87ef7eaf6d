// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Multi-pass assembler - pass driver and statement dispatch.
//!
//! The whole assembler state lives in one [`Assembler`] value: program
//! counter, BSS pointer, symbol table, macro set, conditional stack, image
//! and output files. Passes run until the symbol addresses stop moving; the
//! following pass is the final one and is the only pass that emits image
//! bytes, listing lines and diagnostics.

pub mod cli;
mod directives;
mod encode;
#[cfg(test)]
mod tests;

use std::fs::File;
use std::io::{BufWriter, Write};

use clap::Parser;

use crate::core::conditional::ConditionalStack;
use crate::core::error::{
    AsmError, AsmRunError, AsmRunReport, Diagnostic, ErrorKind, RunStats, Severity,
};
use crate::core::expr::{self, EvalContext, UNDEFINED};
use crate::core::image::Image;
use crate::core::listing::ListingWriter;
use crate::core::macro_processor::{scan_arguments, MacroSet};
use crate::core::source::SourceReader;
use crate::core::symbol_table::{
    DefineError, DefineMode, DefineOutcome, PassPhase, RefAttr, SymbolTable,
};
use crate::core::text_utils::{
    is_bso_local, is_name_start, listing_prefix_len, split_comment, Cursor,
};
use crate::families::mos6502::{recognize, CpuType};

use cli::{validate_cli, Cli, Config};

pub use cli::VERSION;

/// Maximum number of passes before convergence is abandoned.
pub const MAX_PASSES: u32 = 20;
/// Abort the run after this many non-fatal errors.
pub const ERRMAX: u32 = 10;

/// Run the assembler with command-line arguments.
pub fn run() -> Result<AsmRunReport, AsmRunError> {
    let cli = Cli::parse();
    let config = validate_cli(&cli)?;
    run_with_config(config)
}

/// Run one complete assembly with a validated configuration.
pub fn run_with_config(cfg: Config) -> Result<AsmRunReport, AsmRunError> {
    let mut asm = Assembler::new(cfg)?;
    asm.apply_defines()?;
    asm.assemble()?;
    asm.finish()
}

/// Core assembler state.
pub(crate) struct Assembler {
    cfg: Config,
    symbols: SymbolTable,
    macros: MacroSet,
    image: Image,
    /// Shadow image holding the frozen branch opcodes. Kept separate so
    /// freeze writes from not-yet-converged passes cannot leak into the
    /// binary output.
    branch_image: Image,
    cond: ConditionalStack,
    diagnostics: Vec<Diagnostic>,

    // pass state
    pass: u32,
    final_pass: bool,
    pc: i32,
    bss: i32,
    base_page: i32,
    cpu: CpuType,
    scope: String,
    module_start: i32,
    label_changes: u32,
    pass_errors: u32,
    label_change_history: Vec<u32>,
    load_address: i32,
    source_lines_seen: u32,

    // line state
    line: String,
    line_no: u32,
    file: String,
    current_attr: RefAttr,
    listed: bool,
    suppress_pp: bool,
    err_col: Option<usize>,
    hard_stop: bool,

    // outputs
    lst: Option<ListingWriter<BufWriter<File>>>,
    pp: Option<BufWriter<File>>,
    trace: Option<BufWriter<File>>,
}

impl Assembler {
    pub(crate) fn new(cfg: Config) -> Result<Self, AsmRunError> {
        let lst_file = File::create(&cfg.list_path).map_err(|_| {
            AsmRunError::new(
                AsmError::with_param(ErrorKind::Io, "Error opening file for write", &cfg.list_path),
                Vec::new(),
                Vec::new(),
            )
        })?;
        let pp = if cfg.preprocess {
            let file = File::create(&cfg.pp_path).map_err(|_| {
                AsmRunError::new(
                    AsmError::with_param(
                        ErrorKind::Io,
                        "Error opening file for write",
                        &cfg.pp_path,
                    ),
                    Vec::new(),
                    Vec::new(),
                )
            })?;
            Some(BufWriter::new(file))
        } else {
            None
        };
        let trace = if cfg.debug {
            File::create("Debug.lst").ok().map(BufWriter::new)
        } else {
            None
        };

        let mut symbols = SymbolTable::new();
        symbols.set_ignore_case(cfg.ignore_case);
        let mut macros = MacroSet::new();
        macros.set_ignore_case(cfg.ignore_case);
        let initial_cpu = if cfg.bso_mode {
            CpuType::Mos45GS02
        } else {
            CpuType::Mos6502
        };

        Ok(Self {
            image: Image::new(cfg.fill_byte),
            branch_image: Image::new(0),
            lst: Some(ListingWriter::new(
                BufWriter::new(lst_file),
                cfg.with_line_numbers,
            )),
            pp,
            trace,
            symbols,
            macros,
            cond: ConditionalStack::new(),
            diagnostics: Vec::new(),
            pass: 0,
            final_pass: false,
            pc: -1,
            bss: 0,
            base_page: 0,
            cpu: initial_cpu,
            scope: String::new(),
            module_start: 0,
            label_changes: 0,
            pass_errors: 0,
            label_change_history: Vec::new(),
            load_address: UNDEFINED,
            source_lines_seen: 0,
            line: String::new(),
            line_no: 0,
            file: cfg.source_path.clone(),
            current_attr: RefAttr::Plain,
            listed: false,
            suppress_pp: false,
            err_col: None,
            hard_stop: false,
            cfg,
        })
    }

    // ------------------------------------------------------------------
    // small accessors shared with the directive and encoder submodules

    fn initial_cpu(&self) -> CpuType {
        if self.cfg.bso_mode {
            CpuType::Mos45GS02
        } else {
            CpuType::Mos6502
        }
    }

    fn phase(&self) -> PassPhase {
        if self.final_pass {
            PassPhase::Final
        } else if self.pass <= 1 {
            PassPhase::First
        } else {
            PassPhase::Intermediate
        }
    }

    fn pc_is_set(&self) -> bool {
        self.pc >= 0 && self.pc != UNDEFINED
    }

    /// Mark an error as run-aborting regardless of its kind.
    fn hard(&mut self, err: AsmError) -> AsmError {
        self.hard_stop = true;
        err
    }

    fn fail_at(&mut self, col: usize, err: AsmError) -> AsmError {
        self.err_col = Some(col);
        err
    }

    fn trace_msg(&mut self, text: &str) {
        if let Some(trace) = &mut self.trace {
            let _ = writeln!(trace, "{text}");
        }
    }

    // ------------------------------------------------------------------
    // listing helpers (final pass only)

    fn list_plain(&mut self) {
        if self.final_pass {
            if let Some(lst) = &mut self.lst {
                let _ = lst.plain(self.line_no, &self.line);
            }
        }
        self.listed = true;
    }

    fn list_blank(&mut self) {
        if self.final_pass {
            if let Some(lst) = &mut self.lst {
                let _ = lst.blank(self.line_no);
            }
        }
        self.listed = true;
    }

    fn list_addr(&mut self, addr: i32) {
        if self.final_pass {
            if let Some(lst) = &mut self.lst {
                let _ = lst.addr(self.line_no, addr, &self.line);
            }
        }
        self.listed = true;
    }

    fn list_code(&mut self, addr: i32, bytes: &[u8], note: &str) {
        if self.final_pass {
            if let Some(lst) = &mut self.lst {
                let _ = lst.code(self.line_no, addr, bytes, &self.line, note);
            }
        }
        self.listed = true;
    }

    fn list_skip(&mut self) {
        if self.final_pass {
            if let Some(lst) = &mut self.lst {
                let _ = lst.skipped(self.line_no, &self.line);
            }
        }
        self.listed = true;
    }

    fn list_cond(&mut self, skip: bool) {
        if self.final_pass {
            if let Some(lst) = &mut self.lst {
                let _ = lst.conditional(self.line_no, skip, &self.line);
            }
        }
        self.listed = true;
    }

    // ------------------------------------------------------------------
    // symbol scope handling

    /// Expand local identifiers with the active module scope: `nn$` BSO
    /// locals become `<scope>_nn$`, and names starting with `.` or `_`
    /// become `<scope>.name` / `<scope>_name`. With no module open the
    /// scope is empty and names pass through literally.
    fn qualify(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        let bytes = raw.as_bytes();
        if is_bso_local(bytes, 0) {
            if self.scope.is_empty() {
                return raw.to_string();
            }
            return format!("{}_{raw}", self.scope);
        }
        if !self.cfg.bso_mode
            && (bytes[0] == b'.' || bytes[0] == b'_')
            && !self.scope.is_empty()
        {
            return format!("{}{raw}", self.scope);
        }
        raw.to_string()
    }

    fn map_symbol_err(err: DefineError) -> AsmError {
        match err {
            DefineError::TableFull => AsmError::new(
                ErrorKind::Resource,
                format!(
                    "Too many labels (> {})",
                    crate::core::symbol_table::MAX_SYMBOLS
                ),
            ),
            DefineError::MultipleDefinition { name, prev, new } => AsmError::new(
                ErrorKind::Semantic,
                format!(
                    "Multiple label definition [{name}] value 1: {:04x}   value 2: {:04x}",
                    prev & 0xffff,
                    new & 0xffff
                ),
            ),
            DefineError::PhaseError { name, prev, new } => AsmError::new(
                ErrorKind::Convergence,
                format!(
                    "Phase error label [{name}] {:04x} -> {:04x}",
                    prev & 0xffff,
                    new & 0xffff
                ),
            ),
        }
    }

    // ------------------------------------------------------------------
    // CLI symbol definitions

    pub(crate) fn apply_defines(&mut self) -> Result<(), AsmRunError> {
        let defines = self.cfg.defines.clone();
        for def in &defines {
            let (name, value) = match def.split_once('=') {
                Some((name, text)) => {
                    let mut cur = Cursor::new(text);
                    let v = expr::eval_operand(&mut cur, self).map_err(|err| {
                        AsmRunError::new(err, Vec::new(), Vec::new())
                    })?;
                    (name.to_string(), v)
                }
                None => (def.clone(), 1),
            };
            self.symbols
                .define_locked(&name, value)
                .map_err(|err| AsmRunError::new(Self::map_symbol_err(err), Vec::new(), Vec::new()))?;
            self.trace_msg(&format!("CLI: {name} = ${value:04x} (locked)"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // pass driver

    fn begin_pass(&mut self, pass: u32, final_pass: bool) {
        self.pass = pass;
        self.final_pass = final_pass;
        self.pc = -1;
        self.bss = 0;
        self.base_page = 0;
        self.cpu = self.initial_cpu();
        // No module scope is open; local identifiers stay unqualified until
        // a MODULE directive (or a BSO column-one label) opens one.
        self.scope.clear();
        self.module_start = 0;
        self.label_changes = 0;
        self.pass_errors = 0;
        self.cond.clear();
        self.diagnostics.clear();
        self.line_no = 0;
        self.hard_stop = false;
        let pass = self.pass;
        self.trace_msg(&format!(
            "---- pass {pass}{} ----",
            if final_pass { " (final)" } else { "" }
        ));
    }

    pub(crate) fn assemble(&mut self) -> Result<(), AsmRunError> {
        let mut reader = SourceReader::open(&self.cfg.source_path)
            .map_err(|err| AsmRunError::new(err, Vec::new(), Vec::new()))?;

        let mut pass = 1;
        loop {
            self.begin_pass(pass, false);
            self.run_pass(&mut reader)?;
            self.label_change_history.push(self.label_changes);
            // Resolved forward references count as changes, so a pass with
            // zero changes really did reproduce the previous layout.
            if self.label_changes == 0 || pass >= MAX_PASSES - 1 {
                break;
            }
            pass += 1;
            reader
                .rewind()
                .map_err(|err| AsmRunError::new(err, Vec::new(), Vec::new()))?;
        }

        pass += 1;
        reader
            .rewind()
            .map_err(|err| AsmRunError::new(err, Vec::new(), Vec::new()))?;
        self.begin_pass(pass, true);
        self.run_pass(&mut reader)?;
        self.label_change_history.push(self.label_changes);
        self.source_lines_seen = reader.total_lines();
        Ok(())
    }

    fn run_pass(&mut self, reader: &mut SourceReader) -> Result<(), AsmRunError> {
        loop {
            let next = match reader.next_line() {
                Ok(next) => next,
                Err(err) => return Err(self.run_error(err)),
            };
            let Some(src) = next else { break };
            for name in reader.take_closed_files() {
                if self.final_pass {
                    if let Some(lst) = &mut self.lst {
                        let _ = lst.closed_include(&name);
                    }
                }
            }
            self.line_no = src.line_no;
            self.file = reader.current_file().to_string();

            if let Err(err) = self.process_line(&src.text, src.from_macro, reader) {
                self.report(err.clone());
                if err.kind().is_fatal() || self.hard_stop {
                    return Err(self.run_error(err));
                }
            }
            if self.pass_errors >= ERRMAX {
                let err = AsmError::new(
                    ErrorKind::Resource,
                    format!("Error count reached maximum of {ERRMAX}. Assembly stopped"),
                );
                return Err(self.run_error(err));
            }
        }

        if !self.cond.is_empty() {
            let depth = self.cond.depth();
            let err = AsmError::new(
                ErrorKind::UserTriggered,
                if depth == 1 {
                    "an #endif statement is missing".to_string()
                } else {
                    format!("{depth} #endif statements are missing")
                },
            );
            self.report(err.clone());
            return Err(self.run_error(err));
        }
        Ok(())
    }

    /// Record a continuable diagnostic: remember it, print it, echo it to
    /// the listing in the final pass.
    fn report(&mut self, err: AsmError) {
        let diag = Diagnostic::new(&self.file, self.line_no, Severity::Error, err)
            .with_column(self.err_col)
            .with_source(Some(self.line.clone()));
        println!("{}", diag.format_with_context(None));
        if self.final_pass {
            let text = diag.format_with_context(None);
            if let Some(lst) = &mut self.lst {
                let _ = lst.diagnostic(&text);
            }
        }
        self.diagnostics.push(diag);
        self.pass_errors += 1;
    }

    fn run_error(&mut self, err: AsmError) -> AsmRunError {
        AsmRunError::new(err, std::mem::take(&mut self.diagnostics), Vec::new())
    }

    // ------------------------------------------------------------------
    // line processing

    fn process_line(
        &mut self,
        raw: &str,
        from_macro: bool,
        reader: &mut SourceReader,
    ) -> Result<(), AsmError> {
        let prefix = listing_prefix_len(raw);
        let parse_text: &str = &raw[prefix..];
        self.line = if self.cfg.skip_hex {
            parse_text.to_string()
        } else {
            raw.to_string()
        };
        let _ = from_macro;
        self.listed = false;
        self.suppress_pp = false;
        self.err_col = None;
        self.current_attr = RefAttr::Plain;

        let result = self.process_code(parse_text, reader);

        if self.final_pass && !self.listed && result.is_ok() {
            // Catch-all so no line vanishes from the listing.
            self.list_plain();
        }
        if self.final_pass && !self.suppress_pp {
            if let Some(pp) = &mut self.pp {
                let _ = writeln!(pp, "{}", self.line);
            }
        }
        result
    }

    fn process_code(&mut self, text: &str, reader: &mut SourceReader) -> Result<(), AsmError> {
        let (code, _comment) = split_comment(text);
        let trimmed = code.trim_start();

        // Conditional assembly directives come first; they are also honored
        // inside skipped regions.
        if trimmed.starts_with('#') {
            self.suppress_pp = true;
            return self.check_condition(trimmed);
        }
        if self.cond.skipping() {
            self.suppress_pp = true;
            self.list_skip();
            return Ok(());
        }

        if Self::is_comment_line(trimmed) {
            if trimmed.is_empty() {
                self.list_blank();
            } else {
                self.list_plain();
            }
            return Ok(());
        }

        let mut stmt: &str = trimmed;
        if stmt.len() >= 6 && stmt[..6].eq_ignore_ascii_case("!ADDR ") {
            stmt = stmt[6..].trim_start();
        }

        if Self::keyword(stmt, "MODULE") {
            return self.parse_module(stmt[6..].trim_start());
        }
        if Self::keyword(stmt, "ENDMOD") {
            return self.parse_endmod();
        }

        let bytes = stmt.as_bytes();
        if !stmt.is_empty() && (is_name_start(bytes[0]) || is_bso_local(bytes, 0)) {
            if Self::keyword(stmt, "MACRO") {
                return self.record_macro(stmt[5..].trim_start(), reader);
            }
            if let Some(rec) = recognize(stmt, self.cpu) {
                return self.generate_code(rec, stmt);
            }
            if let Some(ix) = self.macros.find_call(stmt) {
                self.list_plain();
                return self.expand_call(stmt, ix, reader);
            }

            let at_col0 = code.len() == trimmed.len();
            let mut cur = Cursor::new(stmt);
            let val = self.define_label(&mut cur, at_col0)?;
            cur.skip_space();
            let rest = cur.rest();
            if !rest.is_empty() && !rest.starts_with(';') {
                if let Some(ix) = self.macros.find_call(rest) {
                    self.list_plain();
                    return self.expand_call(rest, ix, reader);
                }
                stmt = rest;
            } else {
                self.list_addr(val);
                return Ok(());
            }
        }

        if stmt.is_empty() {
            return Ok(());
        }
        match stmt.as_bytes()[0] {
            b'*' => return self.set_pc(stmt),
            b'&' => return self.set_bss(stmt),
            b',' => {
                return Err(self.fail_at(0, AsmError::new(ErrorKind::Syntax, "Syntax Error")));
            }
            b'.' | b'!' => {
                let body = &stmt[1..];
                if self.dispatch_pseudo(body, reader)? {
                    return self.check_pc_overflow();
                }
                return Err(AsmError::with_param(
                    ErrorKind::Syntax,
                    "Unknown pseudo op",
                    stmt,
                ));
            }
            _ => {}
        }

        // After a label, pseudo ops are accepted without the leading dot.
        if self.dispatch_pseudo(stmt, reader)? {
            return self.check_pc_overflow();
        }
        if let Some(rec) = recognize(stmt, self.cpu) {
            return self.generate_code(rec, stmt);
        }
        Ok(())
    }

    fn keyword(text: &str, word: &str) -> bool {
        text.len() >= word.len()
            && text[..word.len()].eq_ignore_ascii_case(word)
            && text[word.len()..]
                .as_bytes()
                .first()
                .map_or(true, |&c| c == b' ' || c == b'\t')
    }

    /// A line is a comment when it is empty, starts with `;`, or starts with
    /// `*` that is not a `*=` origin assignment.
    fn is_comment_line(trimmed: &str) -> bool {
        if trimmed.is_empty() || trimmed.starts_with(';') {
            return true;
        }
        if let Some(rest) = trimmed.strip_prefix('*') {
            return !rest.trim_start().starts_with('=');
        }
        false
    }

    // ------------------------------------------------------------------
    // conditional assembly

    fn check_condition(&mut self, trimmed: &str) -> Result<(), AsmError> {
        let rest = trimmed[1..].trim_start();

        if rest.len() >= 5 && rest[..5].eq_ignore_ascii_case("error") {
            if self.pass == 1 && !self.cond.skipping() {
                let message = rest[5..].trim();
                return Err(AsmError::new(ErrorKind::UserTriggered, message.to_string()));
            }
            self.list_plain();
            return Ok(());
        }

        let (is_ifdef, is_if) = (
            Self::keyword(rest, "ifdef"),
            Self::keyword(rest, "if") && !Self::keyword(rest, "ifdef"),
        );
        if is_ifdef || is_if {
            let expr_text = if is_ifdef { &rest[5..] } else { &rest[2..] };
            let mut cur = Cursor::new(expr_text);
            let v = expr::eval_operand(&mut cur, self)?;
            let skip = if is_ifdef {
                v == UNDEFINED
            } else {
                v == UNDEFINED || v == 0
            };
            self.cond.push(skip)?;
            self.trace_msg(&format!("#if level {} skip={skip}", self.cond.depth()));
            self.list_cond(skip);
            return Ok(());
        }

        if Self::keyword(rest, "else") {
            self.cond.flip()?;
            self.list_plain();
            return Ok(());
        }
        if Self::keyword(rest, "endif") {
            if let Err(err) = self.cond.pop() {
                return Err(self.hard(err));
            }
            self.list_plain();
            return Ok(());
        }

        // Unknown '#' line: leave it alone like any other unparsed text.
        self.list_plain();
        Ok(())
    }

    // ------------------------------------------------------------------
    // labels, modules, macros

    /// Define the label at the cursor: `NAME = expr`, `NAME .BSS n`, or a
    /// bare position label. Returns the value for the listing column.
    fn define_label(&mut self, cur: &mut Cursor, at_col0: bool) -> Result<i32, AsmError> {
        let raw = if is_bso_local(cur.rest().as_bytes(), 0) {
            cur.take_bso_local().to_string()
        } else {
            cur.take_symbol().to_string()
        };
        if raw.is_empty() {
            return Err(AsmError::new(ErrorKind::Syntax, "Missing label"));
        }

        // In BSO mode a global label in column one opens a new scope.
        if self.cfg.bso_mode && at_col0 && raw.as_bytes()[0].is_ascii_alphabetic() {
            self.scope = raw.clone();
            self.module_start = self.pc;
        }
        let name = self.qualify(&raw);

        cur.eat(b':');
        cur.skip_space();

        let phase = self.phase();
        let line_no = self.line_no;
        let (mode, value) = if cur.peek() == b'=' {
            cur.bump();
            let v = expr::eval_operand(cur, self)?;
            (DefineMode::Assign, v)
        } else if cur.rest().len() >= 4 && cur.rest()[..4].eq_ignore_ascii_case(".BSS") {
            cur.advance(4);
            let n = expr::eval_operand(cur, self)?;
            let here = self.bss;
            if n != UNDEFINED {
                self.bss += n;
            }
            (DefineMode::Bss, here)
        } else {
            if !self.pc_is_set() {
                // A position label needs a program counter; tolerated while
                // the origin is still undefined in early passes.
                if self.final_pass {
                    return Err(AsmError::new(
                        ErrorKind::Semantic,
                        "Undefined program counter (PC)",
                    ));
                }
            }
            (DefineMode::Position, self.pc)
        };

        match self.symbols.define(&name, value, mode, line_no, phase) {
            Ok(DefineOutcome::Changed) => {
                self.label_changes += 1;
                self.trace_msg(&format!("P{}: {name} -> ${:04x}", self.pass, value & 0xffff));
            }
            Ok(_) => {}
            Err(err @ DefineError::MultipleDefinition { .. }) => {
                // A genuine double definition poisons everything after it.
                let mapped = Self::map_symbol_err(err);
                return Err(self.hard(mapped));
            }
            Err(err) => return Err(Self::map_symbol_err(err)),
        }
        self.trace_msg(&format!("P{}: {{{name}}} = ${:04x}", self.pass, value & 0xffff));
        Ok(value)
    }

    fn parse_module(&mut self, rest: &str) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        cur.skip_space();
        let raw = cur.take_symbol().to_string();
        if raw.is_empty() {
            return Err(AsmError::new(ErrorKind::Syntax, "Missing module name"));
        }
        let phase = self.phase();
        match self
            .symbols
            .define(&raw, self.pc, DefineMode::Position, self.line_no, phase)
        {
            Ok(DefineOutcome::Changed) => self.label_changes += 1,
            Ok(_) => {}
            Err(err) => return Err(Self::map_symbol_err(err)),
        }
        self.module_start = self.pc;
        self.scope = raw;
        self.trace_msg(&format!("SCOPE: [{}]", self.scope));
        self.list_plain();
        Ok(())
    }

    fn parse_endmod(&mut self) -> Result<(), AsmError> {
        self.list_size_info();
        self.scope.clear();
        self.module_start = 0;
        Ok(())
    }

    fn record_macro(&mut self, rest: &str, reader: &mut SourceReader) -> Result<(), AsmError> {
        let mut cur = Cursor::new(rest);
        cur.skip_space();
        let name = cur.take_symbol().to_string();
        if name.is_empty() {
            return Err(AsmError::new(ErrorKind::Syntax, "Missing macro name"));
        }
        cur.skip_space();
        if !cur.eat(b'(') {
            return Err(AsmError::new(
                ErrorKind::Syntax,
                "Missing ( after macro name",
            ));
        }
        let params = scan_arguments(&mut cur)?;
        let slot = match self.macros.start(&name, params) {
            Ok(slot) => slot,
            Err(err) => return Err(self.hard(err)),
        };
        self.list_plain();

        loop {
            let line = match reader.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    return Err(AsmError::with_param(
                        ErrorKind::Syntax,
                        "Missing ENDMAC for macro",
                        &name,
                    ));
                }
                Err(err) => return Err(err),
            };
            self.line_no = line.line_no;
            let done = line.text.to_ascii_uppercase().contains("ENDMAC");
            if !done {
                if let Some(slot) = slot {
                    self.macros.capture_line(slot, &line.text);
                }
            }
            if self.final_pass {
                let text = line.text.clone();
                if let Some(lst) = &mut self.lst {
                    let _ = lst.plain(line.line_no, &text);
                }
                if let Some(pp) = &mut self.pp {
                    let _ = writeln!(pp, "{text}");
                }
            }
            if done {
                return Ok(());
            }
        }
    }

    fn expand_call(
        &mut self,
        text: &str,
        index: usize,
        reader: &mut SourceReader,
    ) -> Result<(), AsmError> {
        self.suppress_pp = true;
        let name_len = self
            .macros
            .get(index)
            .map(|def| def.name.len())
            .unwrap_or(0);
        let mut cur = Cursor::new(text);
        cur.advance(name_len);
        cur.skip_space();
        let args = if cur.eat(b'(') {
            scan_arguments(&mut cur)?
        } else {
            Vec::new()
        };
        let lines = match self.macros.expand(index, &args) {
            Ok(lines) => lines,
            Err(err) => return Err(self.hard(err)),
        };
        self.trace_msg(&format!(
            "Expanding [{}] pass {}",
            self.macros.get(index).map(|d| d.name.as_str()).unwrap_or(""),
            self.pass
        ));
        reader.push_macro_lines(lines);
        Ok(())
    }

    // ------------------------------------------------------------------
    // finishing

    pub(crate) fn finish(&mut self) -> Result<AsmRunReport, AsmRunError> {
        let error_count = self
            .diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Error)
            .count() as u32;

        if error_count > 0 {
            return Err(AsmRunError::new(
                AsmError::new(
                    ErrorKind::Semantic,
                    "Errors detected in source. No binary file created.",
                ),
                std::mem::take(&mut self.diagnostics),
                Vec::new(),
            ));
        }

        if let Err(err) = self.image.write_binaries() {
            return Err(self.run_error(err));
        }

        for sym in self.symbols.undefined() {
            println!("* Undefined   : {:<25}", sym.name);
        }
        self.symbols.pair_adjacent();
        if let Some(lst) = &mut self.lst {
            let _ = lst.symbol_tables(&self.symbols);
        }

        let stats = RunStats {
            total_lines: self.source_lines_seen,
            symbols: self.symbols.len(),
            macros: self.macros.len(),
            label_changes: self.label_change_history.clone(),
            errors: error_count,
        };
        println!("Source lines: {}", stats.total_lines);
        println!("Symbols     : {}", stats.symbols);
        println!("Macros      : {}", stats.macros);
        for (ix, &changes) in stats.label_changes.iter().enumerate() {
            if changes > 0 {
                println!("Pass {:3}    : {changes} label changes", ix + 1);
            }
        }

        Ok(AsmRunReport::new(
            std::mem::take(&mut self.diagnostics),
            Vec::new(),
            stats,
        ))
    }
}

impl EvalContext for Assembler {
    fn symbol_value(&mut self, raw: &str) -> Result<i32, AsmError> {
        let name = self.qualify(raw);
        let record = self.final_pass;
        self.symbols
            .value_of(&name, self.line_no, self.current_attr, record)
            .map_err(Self::map_symbol_err)
    }

    fn symbol_bytes(&mut self, raw: &str) -> Result<i32, AsmError> {
        let name = self.qualify(raw);
        let record = self.final_pass;
        self.symbols
            .bytes_of(&name, self.line_no, self.current_attr, record)
            .map_err(Self::map_symbol_err)
    }

    fn program_counter(&self) -> i32 {
        self.pc
    }

    fn octal_literals(&self) -> bool {
        self.cfg.bso_mode
    }
}
