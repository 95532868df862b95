//! End-to-end pipeline scenarios.
//!
//! Each test runs a short hand-assembled program on the pipelined core
//! and checks architectural state afterwards: reset priming, branch delay
//! slots, branch-likely annulment, FPU condition branches, TLB refill,
//! and UART echo.

use pretty_assertions::assert_eq;

use vr4300_core::common::constants::{KSEG1_BASE, VECTOR_BASE, VECTOR_TLB_REFILL};
use vr4300_core::common::reg::cp0;

use crate::common::asm::*;
use crate::common::harness::{PROG_BASE, TestSystem, kseg1};

/// Reset and prime: from kseg1, a NOP stream advances the fetch PC by 4
/// per cycle and leaves every GPR zero.
#[test]
fn reset_and_prime() {
    let mut sys = TestSystem::new();
    sys.cpu.set_fetch_pc(KSEG1_BASE);

    let cycles = 64;
    sys.run(cycles);

    assert_eq!(sys.cpu.fetch_pc(), KSEG1_BASE + 4 * cycles);
    for n in 0..32 {
        assert_eq!(sys.gpr(n), 0, "GPR {n} must stay zero");
    }
}

/// Branch delay slot: the instruction after a taken branch executes, the
/// one after that is skipped, and execution continues at the target.
#[test]
fn branch_delay_slot() {
    let mut sys = TestSystem::new();
    let spin = kseg1(PROG_BASE + 12);
    sys.run_program(&[
        beq(0, 0, 2),     // taken: target = this + 4 + 8
        addiu(1, 0, 1),   // delay slot: runs
        addiu(2, 0, 2),   // skipped
        j_to(spin),       // target: spin here
        nop(),
    ]);

    assert_eq!(sys.gpr(1), 1, "delay slot ran");
    assert_eq!(sys.gpr(2), 0, "branch shadow skipped");
    let pc = sys.cpu.fetch_pc();
    assert!(
        (spin..=spin + 8).contains(&pc),
        "PC at target spin, got {pc:#x}"
    );
}

/// Branch-likely annul: a not-taken likely branch squashes its delay
/// slot; execution falls through past it.
#[test]
fn branch_likely_annul() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        addiu(1, 0, 1),     // r1 = 1, so BEQL r0 == r1 is not taken
        beql(0, 1, 2),      // not taken: annul the delay slot
        addiu(1, 0, 0x55),  // annulled: must not touch r1
        addiu(2, 0, 0x66),  // falls through
    ]);

    assert_eq!(sys.gpr(1), 1, "annulled slot had no effect");
    assert_eq!(sys.gpr(2), 0x66);
}

/// A taken branch-likely executes its delay slot like any other branch.
#[test]
fn branch_likely_taken_keeps_slot() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        beql(0, 0, 2),      // taken
        addiu(1, 0, 0x55),  // delay slot: runs
        addiu(2, 0, 0x66),  // skipped
        addiu(3, 0, 0x77),  // target
    ]);

    assert_eq!(sys.gpr(1), 0x55);
    assert_eq!(sys.gpr(2), 0);
    assert_eq!(sys.gpr(3), 0x77);
}

/// FPU compare feeding a condition branch: C.LT.S sets FCR31 bit 23 and
/// the immediately following BC1T consumes it through the bypass.
#[test]
fn fpu_compare_then_bc1t() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        lui(1, 0x3F80),   // 1.0f bits
        mtc1(1, 0),       // F0 = 1.0
        lui(2, 0x4000),   // 2.0f bits
        mtc1(2, 2),       // F2 = 2.0
        c_lt_s(0, 2),     // 1.0 < 2.0: condition set
        bc1t(2),          // taken
        nop(),            // delay slot
        addiu(3, 0, 9),   // skipped
        addiu(4, 0, 7),   // target
    ]);

    use vr4300_core::common::reg::FCR31;
    assert_ne!(sys.cpu.regs.read(FCR31) & (1 << 23), 0, "condition set");
    assert_eq!(sys.gpr(3), 0, "fall-through skipped");
    assert_eq!(sys.gpr(4), 7, "target reached");
}

/// The false side: BC1F after an equal compare of unequal values.
#[test]
fn fpu_compare_then_bc1f() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        lui(1, 0x3F80),
        mtc1(1, 0),       // F0 = 1.0
        lui(2, 0x4000),
        mtc1(2, 2),       // F2 = 2.0
        c_eq_s(0, 2),     // not equal: condition clear
        bc1f(2),          // taken because the flag is clear
        nop(),
        addiu(3, 0, 9),   // skipped
        addiu(4, 0, 7),   // target
    ]);

    assert_eq!(sys.gpr(3), 0);
    assert_eq!(sys.gpr(4), 7);
}

/// TLB refill: a kuseg load with an empty TLB raises TLBL, records the
/// exact faulting address and the load's PC, and lands on the refill
/// vector.
#[test]
fn tlb_refill_on_kuseg_load() {
    let mut sys = TestSystem::new();
    sys.load_program(&[
        lw(1, 0, 0x1000), // load from kuseg 0x1000: no TLB entry
    ]);
    sys.run(16);

    assert_eq!(sys.exc_code(), 2, "TLBL");
    assert_eq!(sys.cp0(cp0::BAD_VADDR), 0x1000);
    assert_eq!(sys.cp0(cp0::EPC), kseg1(PROG_BASE));
    let vector = VECTOR_BASE + VECTOR_TLB_REFILL;
    let pc = sys.cpu.fetch_pc();
    assert!(
        (vector..vector + 64).contains(&pc),
        "fetching from the refill vector, got {pc:#x}"
    );
}

/// A TLB entry written by TLBWI is observable by the very next load:
/// install a kuseg mapping and read through it.
#[test]
fn tlbwi_immediately_observable() {
    use crate::common::harness::DATA_BASE;

    let mut sys = TestSystem::new();
    sys.load_words(DATA_BASE, &[0xCAFE]);
    // EntryLo images: PFN for 0x8000/0x9000, cached, dirty, valid.
    let lo0 = ((DATA_BASE >> 12) << 6 | 0x3 << 3 | 0x6) as i16;
    let lo1 = (((DATA_BASE >> 12) + 1) << 6 | 0x3 << 3 | 0x6) as i16;
    sys.run_program(&[
        addiu(1, 0, 0x4000),
        mtc0(1, 10), // EntryHi: VPN2 for vaddr 0x4000
        addiu(2, 0, lo0),
        mtc0(2, 2),  // EntryLo0
        addiu(3, 0, lo1),
        mtc0(3, 3),  // EntryLo1
        mtc0(0, 5),  // PageMask: 4 KiB pages
        mtc0(0, 0),  // Index 0
        tlbwi(),
        addiu(4, 0, 0x4000),
        lw(5, 4, 0), // through the freshly written mapping
    ]);

    assert_eq!(sys.exc_code(), 0, "no TLB fault through the new entry");
    assert_eq!(sys.gpr(5), 0xCAFE);
}

/// UART echo, guest to host: a word store of 'A' to the UART window
/// reaches the device.
#[test]
fn uart_echo_out() {
    let mut sys = TestSystem::new();
    // kseg1 pointer to the UART base 0x1400_03F8.
    sys.run_program(&[
        lui(1, 0xB400),
        ori(1, 1, 0x03F8),
        addiu(2, 0, 0x41),
        sw(2, 1, 0),
    ]);

    assert_eq!(sys.bus.uart.take_output(), b"A");
}

/// UART echo, host to guest: a received byte appears in the data
/// register read.
#[test]
fn uart_echo_in() {
    let mut sys = TestSystem::new();
    sys.bus.uart.receive_char(b'Z');
    sys.run_program(&[
        lui(1, 0xB400),
        ori(1, 1, 0x03F8),
        lw(3, 1, 0),
    ]);

    assert_eq!(sys.gpr(3), 0x5A);
}
