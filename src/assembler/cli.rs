// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use clap::{ArgAction, Parser};

use crate::core::error::AsmRunError;

pub const VERSION: &str = "1.0";

const LONG_ABOUT: &str = "Cross-assembler for the 6502 family \
(6502, 65SC02, 65C02, 45GS02, 65816).

Assembles SOURCE into a listing file plus raw binary images written by the
.STORE directive. A missing extension defaults to .asm; the .src extension
switches on BSO compatibility mode (45GS02, case-insensitive symbols, branch
optimization, 0xFF fill byte, @octal constants).";

#[derive(Parser, Debug)]
#[command(
    name = "forge65",
    version = VERSION,
    about = "6502-family cross-assembler",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'x',
        long = "strip-hex",
        action = ArgAction::SetTrue,
        long_help = "Assemble a previously produced listing file: strip the leading hex columns from each input line."
    )]
    pub skip_hex: bool,
    #[arg(
        short = 'd',
        long = "debug",
        action = ArgAction::SetTrue,
        long_help = "Write a trace of parser, evaluator and symbol-table decisions to Debug.lst."
    )]
    pub debug: bool,
    #[arg(
        short = 'D',
        long = "define",
        value_name = "NAME[=VAL]",
        action = ArgAction::Append,
        long_help = "Define a locked symbol (repeatable). The symbol is immune to redefinition from the source. If VAL is omitted, defaults to 1."
    )]
    pub defines: Vec<String>,
    #[arg(
        short = 'i',
        long = "ignore-case",
        action = ArgAction::SetTrue,
        long_help = "Ignore case in symbols."
    )]
    pub ignore_case: bool,
    #[arg(
        short = 'n',
        long = "line-numbers",
        action = ArgAction::SetTrue,
        long_help = "Include source line numbers in the listing."
    )]
    pub with_line_numbers: bool,
    #[arg(
        short = 'p',
        long = "preprocess",
        action = ArgAction::SetTrue,
        long_help = "Write the preprocessed source (after conditional trimming and macro expansion) to <base>.pp."
    )]
    pub preprocess: bool,
    #[arg(
        short = 'b',
        long = "branch-opt",
        action = ArgAction::SetTrue,
        long_help = "Enable automatic short/long branch selection (45GS02)."
    )]
    pub branch_opt: bool,
    #[arg(value_name = "SOURCE")]
    pub source: String,
    #[arg(
        value_name = "LIST",
        long_help = "Listing output file. Defaults to the source base name with a .lst extension."
    )]
    pub list: Option<String>,
}

/// Validated configuration for one assembly run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source_path: String,
    pub list_path: String,
    pub pp_path: String,
    pub skip_hex: bool,
    pub debug: bool,
    pub ignore_case: bool,
    pub with_line_numbers: bool,
    pub preprocess: bool,
    pub branch_opt: bool,
    pub bso_mode: bool,
    pub fill_byte: u8,
    pub defines: Vec<String>,
}

/// Split a source name into base and extension; a missing extension
/// defaults to `.asm`.
fn split_source_name(source: &str) -> (String, String) {
    let bytes = source.as_bytes();
    if source.len() > 4 && bytes[source.len() - 4] == b'.' {
        (
            source[..source.len() - 4].to_string(),
            source[source.len() - 4..].to_string(),
        )
    } else {
        (source.to_string(), ".asm".to_string())
    }
}

/// Validate CLI arguments and derive the run configuration.
pub fn validate_cli(cli: &Cli) -> Result<Config, AsmRunError> {
    if cli.source.is_empty() {
        return Err(AsmRunError::cli("missing filename for assembler source file"));
    }
    let (base, ext) = split_source_name(&cli.source);
    let bso_mode = ext.eq_ignore_ascii_case(".src");

    for def in &cli.defines {
        let name = def.split('=').next().unwrap_or("");
        if name.is_empty() {
            return Err(AsmRunError::cli("empty symbol name in -D definition"));
        }
    }

    Ok(Config {
        source_path: format!("{base}{ext}"),
        list_path: cli
            .list
            .clone()
            .unwrap_or_else(|| format!("{base}.lst")),
        pp_path: format!("{base}.pp"),
        skip_hex: cli.skip_hex,
        debug: cli.debug,
        ignore_case: cli.ignore_case || bso_mode,
        with_line_numbers: cli.with_line_numbers,
        preprocess: cli.preprocess,
        branch_opt: cli.branch_opt || bso_mode,
        bso_mode,
        fill_byte: if bso_mode { 0xff } else { 0x00 },
        defines: cli.defines.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_flags_and_positionals() {
        let cli = Cli::parse_from([
            "forge65", "-x", "-d", "-i", "-n", "-p", "-b", "-D", "C64=1", "game.asm", "game.lst",
        ]);
        assert!(cli.skip_hex && cli.debug && cli.ignore_case);
        assert!(cli.with_line_numbers && cli.preprocess && cli.branch_opt);
        assert_eq!(cli.defines, vec!["C64=1".to_string()]);
        assert_eq!(cli.source, "game.asm");
        assert_eq!(cli.list.as_deref(), Some("game.lst"));
    }

    #[test]
    fn default_extension_and_listing_name() {
        let cli = Cli::parse_from(["forge65", "game"]);
        let cfg = validate_cli(&cli).unwrap();
        assert_eq!(cfg.source_path, "game.asm");
        assert_eq!(cfg.list_path, "game.lst");
        assert_eq!(cfg.pp_path, "game.pp");
        assert!(!cfg.bso_mode);
        assert_eq!(cfg.fill_byte, 0x00);
    }

    #[test]
    fn src_extension_selects_bso_mode() {
        let cli = Cli::parse_from(["forge65", "kernel.src"]);
        let cfg = validate_cli(&cli).unwrap();
        assert!(cfg.bso_mode);
        assert!(cfg.ignore_case);
        assert!(cfg.branch_opt);
        assert_eq!(cfg.fill_byte, 0xff);
        assert_eq!(cfg.source_path, "kernel.src");
        assert_eq!(cfg.list_path, "kernel.lst");
    }

    #[test]
    fn rejects_empty_define_names() {
        let cli = Cli::parse_from(["forge65", "-D", "=1", "game.asm"]);
        assert!(validate_cli(&cli).is_err());
    }
}
