//! Decoder tests: the mask cascade and flag assignments.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use vr4300_core::isa::{Op, OpFlags, decode};

use crate::common::asm;

#[rstest]
#[case(asm::addiu(1, 2, 5), Op::Addiu)]
#[case(asm::addi(1, 2, 5), Op::Addi)]
#[case(asm::lui(1, 0x1234), Op::Lui)]
#[case(asm::lw(1, 2, 4), Op::Lw)]
#[case(asm::sw(1, 2, 4), Op::Sw)]
#[case(asm::ld(1, 2, 8), Op::Ld)]
#[case(asm::sd(1, 2, 8), Op::Sd)]
#[case(asm::ll(1, 2, 0), Op::Ll)]
#[case(asm::sc(1, 2, 0), Op::Sc)]
#[case(asm::beq(1, 2, 4), Op::Beq)]
#[case(asm::beql(1, 2, 4), Op::Beql)]
#[case(asm::j(0x100), Op::J)]
#[case(asm::jr(31), Op::Jr)]
#[case(asm::mult(1, 2), Op::Mult)]
#[case(asm::mflo(3), Op::Mflo)]
#[case(asm::cache(0x01, 2, 0), Op::Cache)]
fn primary_and_special_cascades(#[case] iw: u32, #[case] expected: Op) {
    assert_eq!(decode(iw).id, expected);
}

/// The all-zero word is a NOP: `SLL r0, r0, 0`.
#[test]
fn zero_word_is_sll() {
    let opcode = decode(0);
    assert_eq!(opcode.id, Op::Sll);
    assert!(opcode.flags.contains(OpFlags::NEEDRT));
}

/// Fixed CP0 words decode through the full-word cascade.
#[rstest]
#[case(0x4200_0001, Op::Tlbr)]
#[case(0x4200_0002, Op::Tlbwi)]
#[case(0x4200_0006, Op::Tlbwr)]
#[case(0x4200_0008, Op::Tlbp)]
#[case(0x4200_0018, Op::Eret)]
fn fixed_cp0_cascade(#[case] iw: u32, #[case] expected: Op) {
    assert_eq!(decode(iw).id, expected);
}

/// REGIMM encodings share a primary opcode and split on the RT field.
#[rstest]
#[case(0x0401_0000, Op::Bgez)]
#[case(0x0400_0000, Op::Bltz)]
#[case(0x0403_0000, Op::Bgezl)]
#[case(0x0411_0000, Op::Bgezal)]
fn regimm_cascade(#[case] iw: u32, #[case] expected: Op) {
    assert_eq!(decode(iw).id, expected);
}

/// MOVZ/MOVN/MUL require zeroed SA bits; a nonzero SA falls through to
/// reserved.
#[test]
fn movz_requires_clear_sa() {
    assert_eq!(decode(0x0000_000A).id, Op::Movz);
    assert_eq!(decode(0x0000_004A).id, Op::Invalid);
    assert_eq!(decode(0x7000_0002).id, Op::Mul);
}

/// WAIT matches through its own wide mask.
#[test]
fn wait_cascade() {
    assert_eq!(decode(0x4200_0020).id, Op::Wait);
    assert_eq!(decode(0x43FF_FFE0 | 0x20).id, Op::Wait);
}

/// COP1 moves take precedence over COP1 arithmetic (a zero format field
/// is MFC1, not ADD.fmt).
#[test]
fn cop1_moves_beat_arithmetic() {
    assert_eq!(decode(asm::mfc1(1, 2)).id, Op::Mfc1);
    assert_eq!(decode(asm::mtc1(1, 2)).id, Op::Mtc1);
    assert_eq!(decode(asm::cfc1(1, 31)).id, Op::Cfc1);
    assert_eq!(decode(asm::ctc1(1, 31)).id, Op::Ctc1);
    assert_eq!(decode(asm::add_s(4, 2, 0)).id, Op::Cp1Add);
}

/// BC1 variants all decode to one opcode; the sub-op stays in the word.
#[rstest]
#[case(asm::bc1t(4))]
#[case(asm::bc1f(4))]
#[case(0x4502_0004)]
#[case(0x4503_0004)]
fn bc1_variants(#[case] iw: u32) {
    let opcode = decode(iw);
    assert_eq!(opcode.id, Op::Bc1);
    assert!(opcode.flags.contains(OpFlags::BRANCH));
    assert!(opcode.flags.contains(OpFlags::FPU));
}

/// Compare twins (signalling forms) fold onto the quiet handlers.
#[test]
fn compare_twins_share_handlers() {
    let quiet = asm::c_lt_s(2, 4); // funct 0x3C
    let signalling = (quiet & !0x3F) | 0x34; // funct 0x34, C.OLT
    assert_eq!(decode(quiet).id, Op::Cp1COlt);
    assert_eq!(decode(signalling).id, Op::Cp1COlt);
}

/// Load/store flags drive operand fetch.
#[test]
fn flags_for_memory_ops() {
    let lw = decode(asm::lw(1, 2, 0));
    assert!(lw.flags.contains(OpFlags::LOAD));
    assert!(lw.flags.contains(OpFlags::NEEDRS));
    assert!(!lw.flags.contains(OpFlags::NEEDRT));

    let sw = decode(asm::sw(1, 2, 0));
    assert!(sw.flags.contains(OpFlags::STORE));
    assert!(sw.flags.contains(OpFlags::NEEDRS));
    assert!(sw.flags.contains(OpFlags::NEEDRT));
}

/// Source indices honour the FS/FT redirection into the CP1 block.
#[test]
fn source_indices_redirect_to_cp1() {
    use vr4300_core::common::reg::CP1_BASE;

    let opcode = decode(asm::add_s(4, 6, 8));
    let (first, second) = opcode.source_indices(asm::add_s(4, 6, 8));
    assert_eq!(first, Some(CP1_BASE + 6));
    assert_eq!(second, Some(CP1_BASE + 8));

    let opcode = decode(asm::addu(1, 2, 3));
    let (first, second) = opcode.source_indices(asm::addu(1, 2, 3));
    assert_eq!(first, Some(2));
    assert_eq!(second, Some(3));
}

proptest! {
    /// Decoding is total and deterministic over arbitrary words, and the
    /// FS/FT modifier bits never appear without their NEEDRS/NEEDRT base.
    #[test]
    fn decode_total_and_flags_consistent(iw in any::<u32>()) {
        let a = decode(iw);
        let b = decode(iw);
        prop_assert_eq!(a, b);
        if a.flags.contains(OpFlags::FS) {
            prop_assert!(a.flags.contains(OpFlags::NEEDRS));
        }
        if a.flags.contains(OpFlags::FT) {
            prop_assert!(a.flags.contains(OpFlags::NEEDRT));
        }
    }
}
