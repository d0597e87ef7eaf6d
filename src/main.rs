// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for forge65.

fn main() {
    match forge65::assembler::run() {
        Ok(report) => {
            for diag in report.diagnostics() {
                eprintln!("{}", diag.format_with_context(Some(report.source_lines())));
            }
        }
        Err(err) => {
            for diag in err.diagnostics() {
                eprintln!("{}", diag.format_with_context(Some(err.source_lines())));
            }
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
