// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source reading with nested includes and macro line injection.
//!
//! The reader yields one line at a time. `.INCLUDE` pushes a new file onto
//! the stack; end of file (or a forced `.END`) pops it and reading resumes in
//! the parent. Macro expansion pushes finished lines into a queue that is
//! drained before the file is read further; such lines do not advance the
//! source line number.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::core::error::{AsmError, ErrorKind};

/// Maximum include nesting depth.
pub const MAX_INCLUDES: usize = 100;

#[derive(Debug)]
struct Frame {
    reader: BufReader<File>,
    name: String,
    line_no: u32,
    forced_end: bool,
}

/// One line handed to the pass driver.
pub struct SourceLine {
    pub text: String,
    /// Line number within the current file (unchanged for macro lines).
    pub line_no: u32,
    pub from_macro: bool,
}

#[derive(Debug)]
pub struct SourceReader {
    root: String,
    stack: Vec<Frame>,
    macro_queue: VecDeque<String>,
    last_line_no: u32,
    total_lines: u32,
    closed_files: Vec<String>,
}

fn open_frame(path: &str) -> Result<Frame, AsmError> {
    let file = File::open(path).map_err(|_| {
        AsmError::with_param(ErrorKind::Resource, "Could not open source file", path)
    })?;
    Ok(Frame {
        reader: BufReader::new(file),
        name: path.to_string(),
        line_no: 0,
        forced_end: false,
    })
}

impl SourceReader {
    /// Open the root source file.
    pub fn open(path: &str) -> Result<Self, AsmError> {
        let frame = open_frame(path)?;
        Ok(Self {
            root: path.to_string(),
            stack: vec![frame],
            macro_queue: VecDeque::new(),
            last_line_no: 0,
            total_lines: 0,
            closed_files: Vec::new(),
        })
    }

    /// Restart from the beginning of the root file for the next pass.
    pub fn rewind(&mut self) -> Result<(), AsmError> {
        let frame = open_frame(&self.root)?;
        self.stack = vec![frame];
        self.macro_queue.clear();
        self.last_line_no = 0;
        self.total_lines = 0;
        self.closed_files.clear();
        Ok(())
    }

    /// Name of the file currently being read, for diagnostics.
    #[must_use]
    pub fn current_file(&self) -> &str {
        self.stack.last().map(|f| f.name.as_str()).unwrap_or(&self.root)
    }

    #[must_use]
    pub fn current_line(&self) -> u32 {
        self.last_line_no
    }

    #[must_use]
    pub fn total_lines(&self) -> u32 {
        self.total_lines
    }

    #[must_use]
    pub fn include_depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    /// Whether macro expansion lines are pending.
    #[must_use]
    pub fn in_macro(&self) -> bool {
        !self.macro_queue.is_empty()
    }

    /// Push an included file. The current position in the including file is
    /// kept on the stack and resumes after the include ends.
    pub fn include(&mut self, path: &str) -> Result<(), AsmError> {
        if self.stack.len() >= MAX_INCLUDES {
            return Err(AsmError::new(
                ErrorKind::Resource,
                format!("Too many includes nested ( >= {MAX_INCLUDES})"),
            ));
        }
        let frame = open_frame(path)?;
        self.stack.push(frame);
        Ok(())
    }

    /// Force end-of-file for the current file (`.END`).
    pub fn force_end(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.forced_end = true;
        }
    }

    /// Queue expanded macro lines ahead of the file input.
    pub fn push_macro_lines(&mut self, lines: Vec<String>) {
        for line in lines.into_iter().rev() {
            self.macro_queue.push_front(line);
        }
    }

    /// Names of include files closed since the last call, for the listing.
    pub fn take_closed_files(&mut self) -> Vec<String> {
        std::mem::take(&mut self.closed_files)
    }

    /// Fetch the next source line, or `None` at the end of the root file.
    pub fn next_line(&mut self) -> Result<Option<SourceLine>, AsmError> {
        if let Some(text) = self.macro_queue.pop_front() {
            return Ok(Some(SourceLine {
                text,
                line_no: self.last_line_no,
                from_macro: true,
            }));
        }

        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            if frame.forced_end {
                let Some(closed) = self.stack.pop() else {
                    return Ok(None);
                };
                if self.stack.is_empty() {
                    return Ok(None);
                }
                self.closed_files.push(closed.name);
                self.last_line_no = self.stack.last().map(|f| f.line_no).unwrap_or(0);
                continue;
            }

            let mut raw = Vec::new();
            let read = frame
                .reader
                .read_until(b'\n', &mut raw)
                .map_err(|err| AsmError::new(ErrorKind::Io, err.to_string()))?;
            if read == 0 {
                let Some(closed) = self.stack.pop() else {
                    return Ok(None);
                };
                if self.stack.is_empty() {
                    return Ok(None);
                }
                self.closed_files.push(closed.name);
                self.last_line_no = self.stack.last().map(|f| f.line_no).unwrap_or(0);
                continue;
            }

            while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
                raw.pop();
            }
            frame.line_no += 1;
            self.last_line_no = frame.line_no;
            self.total_lines += 1;
            return Ok(Some(SourceLine {
                text: String::from_utf8_lossy(&raw).into_owned(),
                line_no: frame.line_no,
                from_macro: false,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut dir = std::env::temp_dir();
        dir.push(format!("forge65-source-{}-{nanos}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn collect(reader: &mut SourceReader) -> Vec<(String, u32, bool)> {
        let mut out = Vec::new();
        while let Some(line) = reader.next_line().unwrap() {
            out.push((line.text, line.line_no, line.from_macro));
        }
        out
    }

    #[test]
    fn reads_lines_with_numbers() {
        let path = temp_file("main.asm", "one\ntwo\r\nthree");
        let mut reader = SourceReader::open(path.to_str().unwrap()).unwrap();
        let lines = collect(&mut reader);
        assert_eq!(
            lines,
            vec![
                ("one".to_string(), 1, false),
                ("two".to_string(), 2, false),
                ("three".to_string(), 3, false),
            ]
        );
    }

    #[test]
    fn include_resumes_parent() {
        let inc = temp_file("inc.asm", "inner\n");
        let main = temp_file("main.asm", "a\nb\n");
        let mut reader = SourceReader::open(main.to_str().unwrap()).unwrap();
        let first = reader.next_line().unwrap().unwrap();
        assert_eq!(first.text, "a");
        reader.include(inc.to_str().unwrap()).unwrap();
        let inner = reader.next_line().unwrap().unwrap();
        assert_eq!(inner.text, "inner");
        assert_eq!(inner.line_no, 1);
        let back = reader.next_line().unwrap().unwrap();
        assert_eq!(back.text, "b");
        assert_eq!(back.line_no, 2);
        assert_eq!(reader.take_closed_files().len(), 1);
    }

    #[test]
    fn macro_lines_keep_line_number() {
        let main = temp_file("main.asm", "call\nafter\n");
        let mut reader = SourceReader::open(main.to_str().unwrap()).unwrap();
        let call = reader.next_line().unwrap().unwrap();
        assert_eq!(call.line_no, 1);
        reader.push_macro_lines(vec!["ex1".to_string(), "ex2".to_string()]);
        let ex1 = reader.next_line().unwrap().unwrap();
        assert!(ex1.from_macro);
        assert_eq!(ex1.text, "ex1");
        assert_eq!(ex1.line_no, 1);
        let ex2 = reader.next_line().unwrap().unwrap();
        assert_eq!(ex2.text, "ex2");
        let after = reader.next_line().unwrap().unwrap();
        assert_eq!((after.text.as_str(), after.line_no), ("after", 2));
    }

    #[test]
    fn forced_end_stops_file() {
        let main = temp_file("main.asm", "a\nb\n");
        let mut reader = SourceReader::open(main.to_str().unwrap()).unwrap();
        reader.next_line().unwrap().unwrap();
        reader.force_end();
        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn rewind_restarts_root() {
        let main = temp_file("main.asm", "a\n");
        let mut reader = SourceReader::open(main.to_str().unwrap()).unwrap();
        assert_eq!(collect(&mut reader).len(), 1);
        reader.rewind().unwrap();
        assert_eq!(collect(&mut reader).len(), 1);
    }

    #[test]
    fn missing_file_is_a_resource_error() {
        let err = SourceReader::open("/nonexistent/forge65.asm").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }
}
