// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unrecognized token, missing delimiter, malformed number.
    Syntax,
    /// Undefined symbol in final pass, multiple definition, illegal mode.
    Semantic,
    /// Cannot open file, nesting too deep, table full.
    Resource,
    /// pc overflow, branch out of range, value does not fit.
    Range,
    /// Label addresses still changing on the final pass.
    Convergence,
    /// Raised by the `#error` directive.
    UserTriggered,
    Io,
    Cli,
}

impl ErrorKind {
    /// Errors of these kinds abort the run immediately instead of counting
    /// toward the `ERRMAX` limit.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::Resource | ErrorKind::Convergence | ErrorKind::UserTriggered | ErrorKind::Io
        )
    }
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: ErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    pub fn with_param(kind: ErrorKind, msg: &str, param: &str) -> Self {
        Self {
            kind,
            message: format!("{msg}: {param}"),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub(crate) file: String,
    pub(crate) line: u32,
    pub(crate) column: Option<usize>,
    pub(crate) severity: Severity,
    pub(crate) error: AsmError,
    pub(crate) source: Option<String>,
}

impl Diagnostic {
    pub fn new(file: &str, line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            file: file.to_string(),
            line,
            column: None,
            severity,
            error,
            source: None,
        }
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    /// Render the diagnostic with the offending line and a caret marker.
    pub fn format_with_context(&self, fallback_lines: Option<&[String]>) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        let mut out = format!("*** {sev} in file {} line {}:\n", self.file, self.line);

        let source = self.source.as_deref().or_else(|| {
            fallback_lines
                .and_then(|lines| lines.get(self.line.saturating_sub(1) as usize))
                .map(|s| s.as_str())
        });
        if let Some(src) = source {
            out.push_str(src);
            out.push('\n');
            if let Some(col) = self.column {
                out.push_str(&caret_line(col));
                out.push('\n');
            }
        }
        out.push_str(self.error.message());
        out
    }
}

/// Build the caret line pointing at a 0-based column.
pub fn caret_line(column: usize) -> String {
    let mut out = String::new();
    if column < 80 {
        for _ in 0..column {
            out.push(' ');
        }
    }
    out.push('^');
    out
}

/// Statistics of a completed assembly.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub total_lines: u32,
    pub symbols: usize,
    pub macros: usize,
    pub label_changes: Vec<u32>,
    pub errors: u32,
}

/// Report from a successful assembly run.
pub struct AsmRunReport {
    diagnostics: Vec<Diagnostic>,
    source_lines: Vec<String>,
    stats: RunStats,
}

impl AsmRunReport {
    pub fn new(diagnostics: Vec<Diagnostic>, source_lines: Vec<String>, stats: RunStats) -> Self {
        Self {
            diagnostics,
            source_lines,
            stats,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }
}

/// Error from a failed assembly run.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
    source_lines: Vec<String>,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>, source_lines: Vec<String>) -> Self {
        Self {
            error,
            diagnostics,
            source_lines,
        }
    }

    pub fn cli(msg: impl Into<String>) -> Self {
        Self::new(AsmError::new(ErrorKind::Cli, msg), Vec::new(), Vec::new())
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}
