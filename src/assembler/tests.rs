use super::cli::Config;
use super::Assembler;
use crate::core::error::ErrorKind;
use crate::core::expr::UNDEFINED;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("forge65-{label}-{}-{nanos}", process::id()));
    fs::create_dir_all(&dir).expect("Create temp dir");
    dir
}

fn config_for(dir: &PathBuf, source: &str) -> Config {
    let src_path = dir.join("main.asm");
    fs::write(&src_path, source).expect("Write test source");
    Config {
        source_path: src_path.to_string_lossy().to_string(),
        list_path: dir.join("main.lst").to_string_lossy().to_string(),
        pp_path: dir.join("main.pp").to_string_lossy().to_string(),
        skip_hex: false,
        debug: false,
        ignore_case: false,
        with_line_numbers: false,
        preprocess: false,
        branch_opt: false,
        bso_mode: false,
        fill_byte: 0x00,
        defines: Vec::new(),
    }
}

fn assemble_with(label: &str, source: &str, tweak: impl FnOnce(&mut Config)) -> Assembler {
    let dir = temp_dir(label);
    let mut cfg = config_for(&dir, source);
    tweak(&mut cfg);
    let mut asm = Assembler::new(cfg).expect("Create assembler");
    asm.apply_defines().expect("Apply defines");
    asm.assemble().expect("Assemble");
    assert!(
        asm.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        asm.diagnostics
            .iter()
            .map(|d| d.error().message().to_string())
            .collect::<Vec<_>>()
    );
    asm
}

fn assemble(label: &str, source: &str) -> Assembler {
    assemble_with(label, source, |_| {})
}

fn assemble_expect_error(label: &str, source: &str) -> String {
    let dir = temp_dir(label);
    let cfg = config_for(&dir, source);
    let mut asm = Assembler::new(cfg).expect("Create assembler");
    asm.apply_defines().expect("Apply defines");
    match asm.assemble() {
        Err(err) => err.to_string(),
        Ok(()) => {
            assert!(
                !asm.diagnostics.is_empty(),
                "expected an error for source:\n{source}"
            );
            asm.diagnostics[0].error().message().to_string()
        }
    }
}

fn image_bytes(asm: &Assembler, addr: usize, len: usize) -> Vec<u8> {
    (0..len).map(|ix| asm.image.get(addr + ix)).collect()
}

// ----------------------------------------------------------------------
// end-to-end scenarios

#[test]
fn basic_program_assembles() {
    let asm = assemble("basic", "*= $1000\n LDA #$42\n RTS\n");
    assert_eq!(image_bytes(&asm, 0x1000, 3), vec![0xa9, 0x42, 0x60]);
}

#[test]
fn backward_branch_offset() {
    let asm = assemble(
        "backward",
        "*= $C000\nLOOP LDX #0\nNEXT INX\n BNE NEXT\n RTS\n",
    );
    assert_eq!(
        image_bytes(&asm, 0xc000, 6),
        vec![0xa2, 0x00, 0xe8, 0xd0, 0xfd, 0x60]
    );
}

#[test]
fn macro_expansion_emits_substituted_code() {
    let source = "\
MACRO LDXY(W)
 LDX W
 LDY W+1
ENDMAC
*= $1000
 LDXY($C000)
";
    let asm = assemble("macro", source);
    assert_eq!(
        image_bytes(&asm, 0x1000, 6),
        vec![0xae, 0x00, 0xc0, 0xac, 0x01, 0xc0]
    );
}

#[test]
fn conditional_selects_true_branch() {
    let source = "\
FLAG = 1
*= $1000
#if FLAG
 .BYTE 1
#else
 .BYTE 2
#endif
";
    let asm = assemble("cond", source);
    assert_eq!(image_bytes(&asm, 0x1000, 1), vec![0x01]);
}

#[test]
fn forward_reference_resolves() {
    let asm = assemble(
        "forward",
        "*= $0800\n JMP END\n .BYTE 0,0\nEND RTS\n",
    );
    assert_eq!(
        image_bytes(&asm, 0x0800, 6),
        vec![0x4c, 0x05, 0x08, 0x00, 0x00, 0x60]
    );
    let sym = asm.symbols.get("END").expect("END defined");
    assert_eq!(sym.address, 0x0805);
}

#[test]
fn store_writes_binary_with_load_address() {
    let dir = temp_dir("store");
    let out_path = dir.join("out.bin");
    let source = format!(
        "*= $1000\n .LOAD\n LDA #$42\n RTS\n .STORE $1000,3,\"{}\"\n",
        out_path.to_string_lossy()
    );
    let cfg = config_for(&dir, &source);
    let mut asm = Assembler::new(cfg).expect("Create assembler");
    asm.apply_defines().expect("defines");
    asm.assemble().expect("assemble");
    asm.finish().expect("finish");
    let bytes = fs::read(&out_path).expect("read stored binary");
    assert_eq!(bytes, vec![0x00, 0x10, 0xa9, 0x42, 0x60]);
}

// ----------------------------------------------------------------------
// boundary cases

#[test]
fn branch_to_next_instruction_is_offset_zero() {
    let asm = assemble("branch-zero", "*= $1000\n BEQ NEXT\nNEXT RTS\n");
    assert_eq!(image_bytes(&asm, 0x1000, 3), vec![0xf0, 0x00, 0x60]);
}

#[test]
fn pc_overflow_is_reported() {
    let msg = assemble_expect_error("overflow", "*= $FFFD\n JMP $1000\n");
    assert!(msg.contains("64 KB"), "got: {msg}");
}

#[test]
fn zero_parameter_macro_call() {
    let source = "\
MACRO SYNC()
 NOP
ENDMAC
*= $1000
 SYNC()
";
    let asm = assemble("macro-zero", source);
    assert_eq!(image_bytes(&asm, 0x1000, 1), vec![0xea]);
}

#[test]
fn case_sensitivity_modes() {
    let asm = assemble("case-sens", "FOO = 1\nfoo = 2\n");
    assert_eq!(asm.symbols.get("FOO").unwrap().address, 1);
    assert_eq!(asm.symbols.get("foo").unwrap().address, 2);

    let asm = assemble_with("case-insens", "FOO = 1\n", |cfg| {
        cfg.ignore_case = true;
    });
    assert_eq!(asm.symbols.get("foo").unwrap().address, 1);
}

#[test]
fn wrong_macro_argument_count_is_fatal() {
    let source = "\
MACRO TWO(A,B)
 LDX A
ENDMAC
*= $1000
 TWO($10)
";
    let msg = assemble_expect_error("macro-argc", source);
    assert!(msg.contains("Wrong # of arguments"), "got: {msg}");
}

// ----------------------------------------------------------------------
// data directives

#[test]
fn word_and_bigw_endianness() {
    let asm = assemble(
        "words",
        "*= $2000\n .WORD $1234\n .BIGW $1234\n",
    );
    assert_eq!(
        image_bytes(&asm, 0x2000, 4),
        vec![0x34, 0x12, 0x12, 0x34]
    );
}

#[test]
fn byte_lists_with_strings_and_escapes() {
    let asm = assemble(
        "bytes",
        "*= $2000\n .BYTE 1, \"AB\", '\\r', $ff\n",
    );
    assert_eq!(
        image_bytes(&asm, 0x2000, 5),
        vec![0x01, 0x41, 0x42, 0x0d, 0xff]
    );
}

#[test]
fn petscii_and_screen_code_data() {
    let asm = assemble("pet", "*= $2000\n .PET \"Ab\"\n .DISP \"ab\"\n");
    // PETSCII: upper case sets bit 7, lower case folds to upper.
    assert_eq!(image_bytes(&asm, 0x2000, 2), vec![0xc1, 0x42]);
    // Screen codes: lower case letters map to 1..26.
    assert_eq!(image_bytes(&asm, 0x2002, 2), vec![0x01, 0x02]);
}

#[test]
fn byte_high_bit_marker() {
    let asm = assemble("hibit", "*= $2000\n .BYTE \"AB\"^\n");
    assert_eq!(image_bytes(&asm, 0x2000, 2), vec![0x41, 0xc2]);
}

#[test]
fn bits_and_lits_packing() {
    let asm = assemble("bits", "*= $2000\n .BITS **......\n .LITS **......\n");
    assert_eq!(image_bytes(&asm, 0x2000, 2), vec![0xc0, 0x03]);
}

#[test]
fn fill_emits_repeated_value() {
    let asm = assemble("fill", "*= $2000\n .FILL 4 ($AA)\n RTS\n");
    assert_eq!(
        image_bytes(&asm, 0x2000, 5),
        vec![0xaa, 0xaa, 0xaa, 0xaa, 0x60]
    );
}

#[test]
fn hex4_and_dec4_ascii_forms() {
    let asm = assemble("hex4", "*= $2000\n .HEX4 $BEEF\n .DEC4 42\n");
    assert_eq!(image_bytes(&asm, 0x2000, 4), b"BEEF".to_vec());
    assert_eq!(image_bytes(&asm, 0x2004, 4), b"  42".to_vec());
}

#[test]
fn quad_is_big_endian() {
    let asm = assemble("quad", "*= $2000\n .QUAD $11223344\n");
    assert_eq!(
        image_bytes(&asm, 0x2000, 4),
        vec![0x11, 0x22, 0x33, 0x44]
    );
}

#[test]
fn real_data_emits_packed_float() {
    let asm = assemble("real", "*= $2000\n .REAL 1\n .REAL4 1\n");
    assert_eq!(
        image_bytes(&asm, 0x2000, 5),
        vec![0x81, 0x00, 0x00, 0x00, 0x00]
    );
    assert_eq!(image_bytes(&asm, 0x2005, 4), vec![0x81, 0x00, 0x00, 0x00]);
}

#[test]
fn byte_span_feeds_length_operator() {
    let asm = assemble(
        "span",
        "*= $2000\nMSG .BYTE \"HELLO\"\n .BYTE ?MSG\n",
    );
    assert_eq!(image_bytes(&asm, 0x2005, 1), vec![5]);
}

#[test]
fn bss_reservations_never_touch_the_image() {
    let asm = assemble(
        "bss",
        "&= $0200\n*= $1000\nBUF .BSS 16\nPTR .BSS 2\n .WORD BUF,PTR\n",
    );
    assert_eq!(asm.symbols.get("BUF").unwrap().address, 0x0200);
    assert_eq!(asm.symbols.get("PTR").unwrap().address, 0x0210);
    // The reservation region keeps the fill value.
    assert_eq!(image_bytes(&asm, 0x0200, 2), vec![0, 0]);
    assert_eq!(
        image_bytes(&asm, 0x1000, 4),
        vec![0x00, 0x02, 0x10, 0x02]
    );
}

// ----------------------------------------------------------------------
// symbols, scopes, includes

#[test]
fn module_scope_qualifies_local_symbols() {
    let source = "\
*= $1000
MODULE Player
_init LDA #0
 JMP _init
ENDMOD
";
    let asm = assemble("scope", source);
    assert!(asm.symbols.get("Player_init").is_some());
    assert_eq!(
        image_bytes(&asm, 0x1000, 5),
        vec![0xa9, 0x00, 0x4c, 0x00, 0x10]
    );
}

#[test]
fn top_level_local_symbols_keep_their_names() {
    // With no MODULE open there is no scope to qualify with; a leading
    // underscore (or dot) name passes through literally.
    let asm = assemble(
        "toplevel-local",
        "*= $1000\n_tmp LDA #0\n JMP _tmp\n",
    );
    assert!(asm.symbols.get("_tmp").is_some());
    assert!(asm.symbols.get("Main_tmp").is_none());
    assert_eq!(
        image_bytes(&asm, 0x1000, 5),
        vec![0xa9, 0x00, 0x4c, 0x00, 0x10]
    );

    // Inside a module the same spelling is qualified, so the two names
    // refer to different symbols.
    let source = "\
*= $2000
_tmp = 1
MODULE Gfx
_tmp = 2
 .BYTE _tmp
ENDMOD
 .BYTE _tmp
";
    let asm = assemble("toplevel-local-vs-module", source);
    assert_eq!(asm.symbols.get("_tmp").unwrap().address, 1);
    assert_eq!(asm.symbols.get("Gfx_tmp").unwrap().address, 2);
    assert_eq!(image_bytes(&asm, 0x2000, 2), vec![2, 1]);
}

#[test]
fn locked_cli_symbol_wins_over_source() {
    let asm = assemble_with("locked", "C64 = 0\n*= $1000\n .BYTE C64\n", |cfg| {
        cfg.defines = vec!["C64=7".to_string()];
    });
    assert_eq!(image_bytes(&asm, 0x1000, 1), vec![7]);
}

#[test]
fn ifdef_skips_undefined_symbols() {
    let source = "\
*= $1000
#ifdef NEVER
 .BYTE 1
#endif
 .BYTE 2
";
    let asm = assemble("ifdef", source);
    assert_eq!(image_bytes(&asm, 0x1000, 1), vec![0x02]);
}

#[test]
fn error_directive_stops_pass_one() {
    let msg = assemble_expect_error(
        "hash-error",
        "#if 1\n#error this build is broken\n#endif\n",
    );
    assert!(msg.contains("this build is broken"), "got: {msg}");
}

#[test]
fn missing_endif_is_fatal() {
    let dir = temp_dir("endif");
    let cfg = config_for(&dir, "#if 1\n .BYTE 1\n");
    let mut asm = Assembler::new(cfg).expect("new");
    let err = asm.assemble().expect_err("missing #endif must fail");
    assert!(err.to_string().contains("#endif"), "got: {err}");
}

#[test]
fn include_files_are_read_in_place(){
    let dir = temp_dir("include");
    let inc_path = dir.join("inc.asm");
    fs::write(&inc_path, " .BYTE 1,2\n").expect("write include");
    let source = format!(
        "*= $1000\n .INCLUDE \"{}\"\n .BYTE 3\n",
        inc_path.to_string_lossy()
    );
    let cfg = config_for(&dir, &source);
    let mut asm = Assembler::new(cfg).expect("new");
    asm.assemble().expect("assemble");
    assert_eq!(image_bytes(&asm, 0x1000, 3), vec![1, 2, 3]);
}

#[test]
fn end_directive_stops_the_file() {
    let asm = assemble("end", "*= $1000\n .BYTE 1\n .END\n .BYTE 2\n");
    assert_eq!(image_bytes(&asm, 0x1000, 2), vec![1, 0]);
}

#[test]
fn undefined_symbol_in_final_pass_is_reported() {
    let msg = assemble_expect_error("undef", "*= $1000\n LDA MISSING\n");
    assert!(msg.contains("undefined"), "got: {msg}");
}

#[test]
fn double_definition_is_fatal_in_pass_one() {
    let dir = temp_dir("double");
    let cfg = config_for(&dir, "*= $1000\nL1 NOP\nL1 NOP\n");
    let mut asm = Assembler::new(cfg).expect("new");
    let err = asm.assemble().expect_err("double definition must fail");
    assert!(err.to_string().contains("Multiple label definition"), "got: {err}");
}

// ----------------------------------------------------------------------
// addressing modes and CPU gates

fn first_bytes(source: &str, addr: usize, len: usize, label: &str) -> Vec<u8> {
    let asm = assemble(label, source);
    image_bytes(&asm, addr, len)
}

#[test]
fn zero_page_narrowing() {
    assert_eq!(
        first_bytes("*= $1000\n LDA $12\n", 0x1000, 2, "zp"),
        vec![0xa5, 0x12]
    );
    assert_eq!(
        first_bytes("*= $1000\n LDA $1234\n", 0x1000, 3, "abs"),
        vec![0xad, 0x34, 0x12]
    );
    assert_eq!(
        first_bytes("*= $1000\n LDA $12,X\n", 0x1000, 2, "zpx"),
        vec![0xb5, 0x12]
    );
    assert_eq!(
        first_bytes("*= $1000\n STA $1234,Y\n", 0x1000, 3, "absy"),
        vec![0x99, 0x34, 0x12]
    );
}

#[test]
fn force16_prefix_keeps_absolute() {
    assert_eq!(
        first_bytes("*= $1000\n LDA `$12\n", 0x1000, 3, "force16"),
        vec![0xad, 0x12, 0x00]
    );
}

#[test]
fn indirect_modes_encode() {
    assert_eq!(
        first_bytes("*= $1000\n LDA ($12,X)\n", 0x1000, 2, "indx"),
        vec![0xa1, 0x12]
    );
    assert_eq!(
        first_bytes("*= $1000\n LDA ($12),Y\n", 0x1000, 2, "indy"),
        vec![0xb1, 0x12]
    );
    assert_eq!(
        first_bytes("*= $1000\n JMP ($1234)\n", 0x1000, 3, "jmpind"),
        vec![0x6c, 0x34, 0x12]
    );
}

#[test]
fn ldx_stx_switch_to_zero_page_y() {
    assert_eq!(
        first_bytes("*= $1000\n LDX $12,Y\n", 0x1000, 2, "ldxy"),
        vec![0xb6, 0x12]
    );
    assert_eq!(
        first_bytes("*= $1000\n STX $12,Y\n", 0x1000, 2, "stxy"),
        vec![0x96, 0x12]
    );
    assert_eq!(
        first_bytes("*= $1000\n LDX $1234,Y\n", 0x1000, 3, "ldxabsy"),
        vec![0xbe, 0x34, 0x12]
    );
}

#[test]
fn jmp_indexed_indirect_is_always_absolute() {
    assert_eq!(
        first_bytes("*= $1000\n .CPU 65C02\n JMP ($12,X)\n", 0x1000, 3, "jmpindx"),
        vec![0x7c, 0x12, 0x00]
    );
}

#[test]
fn stz_gating_per_cpu() {
    // On the plain 6502 STZ is not in the instruction set; the name falls
    // back to being a label, exactly like the original recognizer.
    let asm = assemble("stz6502", "*= $1000\n STZ $12\n RTS\n");
    assert!(asm.symbols.get("STZ").is_some());
    assert_eq!(image_bytes(&asm, 0x1000, 1), vec![0x60]);

    assert_eq!(
        first_bytes("*= $1000\n .CPU 65C02\n STZ $12\n", 0x1000, 2, "stz-c02"),
        vec![0x64, 0x12]
    );
    assert_eq!(
        first_bytes("*= $1000\n .CPU 65C02\n STZ $1234\n", 0x1000, 3, "stz-abs"),
        vec![0x9c, 0x34, 0x12]
    );
}

#[test]
fn bbr_encodes_bit_and_branch() {
    let asm = assemble(
        "bbr",
        "*= $1000\n .CPU 45GS02\n BBR3 $12,NEXT\nNEXT RTS\n",
    );
    assert_eq!(image_bytes(&asm, 0x1000, 4), vec![0x3f, 0x12, 0x00, 0x60]);
}

#[test]
fn quad_register_instructions() {
    let asm = assemble(
        "quadreg",
        "*= $1000\n .CPU 45GS02\n LDQ $12\n LDQ $1234\n LDQ ($12)\n LDQ [$12]\n ASLQ Q\n",
    );
    assert_eq!(image_bytes(&asm, 0x1000, 4), vec![0x42, 0x42, 0xa5, 0x12]);
    assert_eq!(
        image_bytes(&asm, 0x1004, 5),
        vec![0x42, 0x42, 0xad, 0x34, 0x12]
    );
    assert_eq!(image_bytes(&asm, 0x1009, 4), vec![0x42, 0x42, 0xb2, 0x12]);
    assert_eq!(
        image_bytes(&asm, 0x100d, 5),
        vec![0x42, 0x42, 0xea, 0xb2, 0x12]
    );
    assert_eq!(image_bytes(&asm, 0x1012, 3), vec![0x42, 0x42, 0x0a]);
}

#[test]
fn indirect_long_modes_on_45gs02() {
    let asm = assemble(
        "indlong",
        "*= $1000\n .CPU 45GS02\n LDA [$12],Z\n LDA ($12),Z\n",
    );
    assert_eq!(image_bytes(&asm, 0x1000, 3), vec![0xea, 0xb2, 0x12]);
    assert_eq!(image_bytes(&asm, 0x1003, 2), vec![0xb2, 0x12]);
}

#[test]
fn base_page_relocates_direct_page() {
    let asm = assemble(
        "basepage",
        "*= $1000\n .CPU 45GS02\n .BASE $16\n LDA $1612\n",
    );
    assert_eq!(image_bytes(&asm, 0x1000, 2), vec![0xa5, 0x12]);
}

#[test]
fn long_branch_mnemonics() {
    let asm = assemble(
        "lbranch",
        "*= $1000\n .CPU 45GS02\n LBNE FAR\nFAR RTS\n",
    );
    // Displacement is relative to pc+2 even for the 3-byte form.
    assert_eq!(image_bytes(&asm, 0x1000, 4), vec![0xd3, 0x01, 0x00, 0x60]);
}

#[test]
fn branch_optimization_promotes_far_branches() {
    let source = "\
*= $1000
 .CPU 45GS02
 BNE FAR
 .FILL 200 (0)
FAR RTS
";
    let asm = assemble_with("branchopt", source, |cfg| {
        cfg.branch_opt = true;
    });
    // 0x1000: long BNE (opcode | 3) with a 16-bit displacement.
    let far = 0x1003 + 200;
    let disp = far - 0x1002;
    assert_eq!(
        image_bytes(&asm, 0x1000, 3),
        vec![0xd3, (disp & 0xff) as u8, (disp >> 8) as u8]
    );
}

#[test]
fn branch_optimization_keeps_near_branches_short() {
    let source = "\
*= $1000
 .CPU 45GS02
 BNE NEXT
NEXT RTS
";
    let asm = assemble_with("branchopt-short", source, |cfg| {
        cfg.branch_opt = true;
    });
    assert_eq!(image_bytes(&asm, 0x1000, 3), vec![0xd0, 0x00, 0x60]);
}

#[test]
fn branch_out_of_range_without_optimization() {
    let source = "\
*= $1000
 BNE FAR
 .FILL 200 (0)
FAR RTS
";
    let msg = assemble_expect_error("branch-far", source);
    assert!(msg.contains("Branch too long"), "got: {msg}");
}

// ----------------------------------------------------------------------
// pass behavior

#[test]
fn forward_references_force_extra_passes() {
    // Resolving LATER in pass one counts as a label change, so a second
    // scanning pass must confirm the layout before the final pass runs.
    let asm = assemble("passes", "*= $1000\n JMP LATER\nLATER RTS\n");
    assert_eq!(asm.pass, 3);
    assert_eq!(asm.label_change_history, vec![1, 0, 0]);

    // Without forward references the second pass is already the final one.
    let asm = assemble("passes-min", "*= $1000\n LDA #1\n RTS\n");
    assert_eq!(asm.pass, 2);
    assert_eq!(asm.label_change_history, vec![0, 0]);
}

#[test]
fn bso_mode_defaults() {
    let dir = temp_dir("bso");
    let src_path = dir.join("main.src");
    fs::write(&src_path, "*= $1000\n lda #'A\n40$ rts\n bne 40$\n").expect("write");
    let mut cfg = config_for(&dir, "");
    cfg.source_path = src_path.to_string_lossy().to_string();
    cfg.bso_mode = true;
    cfg.ignore_case = true;
    cfg.branch_opt = true;
    cfg.fill_byte = 0xff;
    let mut asm = Assembler::new(cfg).expect("new");
    asm.assemble().expect("assemble");
    // Fill byte is 0xFF in BSO mode.
    assert_eq!(asm.image.get(0x0000), 0xff);
    // The nn$ local was scoped into the surrounding module.
    assert!(asm
        .symbols
        .symbols()
        .iter()
        .any(|sym| sym.name.ends_with("40$")));
    assert_eq!(image_bytes(&asm, 0x1000, 2), vec![0xa9, 0x41]);
}

#[test]
fn symbol_references_are_recorded_in_final_pass() {
    let asm = assemble(
        "refs",
        "*= $1000\nPTR = $FB\n LDA (PTR),Y\n LDA PTR\n",
    );
    let sym = asm.symbols.get("PTR").expect("PTR");
    // Definition plus two references.
    assert_eq!(sym.refs.len(), 3);
    assert_eq!(
        sym.refs[1].attr,
        crate::core::symbol_table::RefAttr::IndirectIndexed
    );
}

#[test]
fn undefined_symbols_stay_undefined() {
    let dir = temp_dir("stay-undef");
    let cfg = config_for(&dir, "#ifdef OPTIONAL\n .BYTE 1\n#endif\n");
    let mut asm = Assembler::new(cfg).expect("new");
    asm.assemble().expect("assemble");
    let sym = asm.symbols.get("OPTIONAL").expect("interned");
    assert_eq!(sym.address, UNDEFINED);
}

#[test]
fn error_taxonomy_is_observable() {
    let dir = temp_dir("taxonomy");
    let cfg = config_for(&dir, "*= $1000\n LDA #$1234\n");
    let mut asm = Assembler::new(cfg).expect("new");
    asm.assemble().expect("assemble completes");
    assert_eq!(asm.diagnostics.len(), 1);
    assert_eq!(asm.diagnostics[0].error().kind(), ErrorKind::Range);
}
