// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Macro capture and parameterized expansion.
//!
//! `MACRO NAME(a,b,…)` captures the following lines up to `ENDMAC`. During
//! capture each textual occurrence of a formal parameter is replaced with a
//! positional token, so the stored body is a sequence of tagged segments
//! (`Text` / `Arg`). Expansion substitutes the call-site argument text and
//! hands the finished lines back to the pass driver.

use crate::core::error::{AsmError, ErrorKind};
use crate::core::text_utils::{is_bso_local, is_symbol_at, Cursor};

/// Maximum number of distinct macros.
pub const MAX_MACROS: usize = 64;
/// Maximum number of formal parameters per macro.
pub const MAX_PARAMS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Arg(usize),
}

#[derive(Debug, Clone, Default)]
pub struct MacroLine {
    segments: Vec<Segment>,
}

impl MacroLine {
    fn push_char(&mut self, c: char) {
        if let Some(Segment::Text(text)) = self.segments.last_mut() {
            text.push(c);
        } else {
            self.segments.push(Segment::Text(c.to_string()));
        }
    }

    fn push_arg(&mut self, index: usize) {
        self.segments.push(Segment::Arg(index));
    }

    /// Re-assemble the line with actual argument text substituted.
    fn expand(&self, args: &[String]) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Arg(ix) => {
                    if let Some(arg) = args.get(*ix) {
                        out.push_str(arg);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub params: Vec<String>,
    lines: Vec<MacroLine>,
}

#[derive(Debug, Default)]
pub struct MacroSet {
    macros: Vec<MacroDef>,
    ignore_case: bool,
}

impl MacroSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ignore_case(&mut self, ignore: bool) {
        self.ignore_case = ignore;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    fn names_equal(&self, a: &str, b: &str) -> bool {
        if self.ignore_case {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&MacroDef> {
        self.macros.get(index)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.macros
            .iter()
            .position(|m| self.names_equal(&m.name, name))
    }

    /// Check whether `text` starts with a macro call: the macro name followed
    /// by a non-symbol character.
    #[must_use]
    pub fn find_call(&self, text: &str) -> Option<usize> {
        let bytes = text.as_bytes();
        self.macros.iter().position(|m| {
            let l = m.name.len();
            text.len() >= l
                && self.names_equal(&text[..l], &m.name)
                && !is_symbol_at(bytes, l)
                && !is_bso_local(bytes, l)
        })
    }

    /// Start recording a macro. Returns `None` when the name already exists;
    /// the caller then skips the body (original redefinition behavior).
    pub fn start(&mut self, name: &str, params: Vec<String>) -> Result<Option<usize>, AsmError> {
        if self.index_of(name).is_some() {
            return Ok(None);
        }
        if self.macros.len() >= MAX_MACROS {
            return Err(AsmError::new(
                ErrorKind::Resource,
                format!("Too many macros (> {MAX_MACROS})"),
            ));
        }
        if params.len() > MAX_PARAMS {
            return Err(AsmError::new(
                ErrorKind::Resource,
                format!("More than {MAX_PARAMS} macro parameters"),
            ));
        }
        self.macros.push(MacroDef {
            name: name.to_string(),
            params,
            lines: Vec::new(),
        });
        Ok(Some(self.macros.len() - 1))
    }

    /// Record one body line, rewriting parameter occurrences into positional
    /// tokens. Matching is plain textual scan in parameter order, like the
    /// original capture loop.
    pub fn capture_line(&mut self, index: usize, raw: &str) {
        let ignore_case = self.ignore_case;
        let def = &mut self.macros[index];
        let mut line = MacroLine::default();
        let mut pos = 0usize;
        'outer: while pos < raw.len() {
            let rest = &raw[pos..];
            for (ix, param) in def.params.iter().enumerate() {
                if param.is_empty() {
                    continue;
                }
                let Some(head) = rest.get(..param.len()) else {
                    continue;
                };
                let matches = if ignore_case {
                    head.eq_ignore_ascii_case(param)
                } else {
                    head == param
                };
                if matches {
                    line.push_arg(ix);
                    pos += param.len();
                    continue 'outer;
                }
            }
            let Some(c) = rest.chars().next() else { break };
            line.push_char(c);
            pos += c.len_utf8();
        }
        def.lines.push(line);
    }

    /// Expand a macro with the given call arguments.
    pub fn expand(&self, index: usize, args: &[String]) -> Result<Vec<String>, AsmError> {
        let def = &self.macros[index];
        if args.len() != def.params.len() {
            return Err(AsmError::new(
                ErrorKind::Semantic,
                format!(
                    "Wrong # of arguments in [{}] called ({}) defined ({})",
                    def.name,
                    args.len(),
                    def.params.len()
                ),
            ));
        }
        Ok(def.lines.iter().map(|line| line.expand(args)).collect())
    }
}

/// Scan a `(a,b,…)` argument list. The cursor must sit just past the opening
/// parenthesis. Arguments are symbol-like tokens; an empty list is legal.
pub fn scan_arguments(cur: &mut Cursor) -> Result<Vec<String>, AsmError> {
    let mut args = Vec::new();
    loop {
        cur.skip_space();
        if cur.eat(b')') {
            return Ok(args);
        }
        if args.len() >= MAX_PARAMS {
            return Err(AsmError::new(
                ErrorKind::Resource,
                format!("More than {MAX_PARAMS} macro arguments"),
            ));
        }
        let arg = if is_bso_local(cur.rest().as_bytes(), 0) {
            cur.take_bso_local().to_string()
        } else {
            cur.take_symbol().to_string()
        };
        args.push(arg);
        cur.skip_space();
        if cur.eat(b')') {
            return Ok(args);
        }
        if !cur.eat(b',') {
            return Err(AsmError::new(
                ErrorKind::Syntax,
                format!("Syntax error in macro '{}'", cur.peek() as char),
            ));
        }
    }
}
