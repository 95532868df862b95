//! Exceptions, interrupts, ERET, and the CP1 register-move round trips.

use pretty_assertions::assert_eq;

use vr4300_core::common::constants::{VECTOR_BASE, VECTOR_GENERAL};
use vr4300_core::common::reg::cp0;
use vr4300_core::core::cp0 as cp0_bits;

use crate::common::asm::*;
use crate::common::fpu_lock;
use crate::common::harness::{DATA_BASE, PROG_BASE, TestSystem, kseg0, kseg1};

/// ADDI on signed overflow raises Ov and leaves the destination
/// untouched.
#[test]
fn addi_overflow() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        lui(1, 0x7FFF),
        ori(1, 1, 0xFFFF), // r1 = i32::MAX
        addiu(2, 0, 0x55), // sentinel in r2
        addi(2, 1, 1),     // overflows
    ]);

    assert_eq!(sys.exc_code(), 12, "Ov");
    assert_eq!(sys.gpr(2), 0x55, "destination not written");
    assert_eq!(sys.cp0(cp0::EPC), kseg1(PROG_BASE + 12));
    let vector = VECTOR_BASE + VECTOR_GENERAL;
    let pc = sys.cpu.fetch_pc();
    assert!(
        (vector..vector + 0x100).contains(&pc),
        "at the general vector, got {pc:#x}"
    );
}

/// ADDIU on the same operands does not trap.
#[test]
fn addiu_never_overflows() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        lui(1, 0x7FFF),
        ori(1, 1, 0xFFFF),
        addiu(2, 1, 1),
    ]);
    assert_eq!(sys.exc_code(), 0);
    assert_eq!(sys.gpr(2), 0xFFFF_FFFF_8000_0000);
}

/// SYSCALL enters the general vector with ExcCode 8 and EPC at the
/// instruction.
#[test]
fn syscall_entry() {
    let mut sys = TestSystem::new();
    sys.run_program(&[nop(), syscall()]);
    assert_eq!(sys.exc_code(), 8);
    assert_eq!(sys.cp0(cp0::EPC), kseg1(PROG_BASE + 4));
    assert_ne!(sys.cp0(cp0::STATUS) & cp0_bits::STATUS_EXL, 0);
}

/// A fault in a branch delay slot backs EPC to the branch and sets
/// Cause.BD.
#[test]
fn delay_slot_fault_sets_bd() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        beq(0, 0, 2), // taken
        syscall(),    // faults in the delay slot
        nop(),
        nop(),
    ]);
    assert_eq!(sys.exc_code(), 8);
    assert_eq!(sys.cp0(cp0::EPC), kseg1(PROG_BASE), "EPC backs to the branch");
    assert_ne!(sys.cp0(cp0::CAUSE) & cp0_bits::CAUSE_BD, 0);
}

/// ERET returns to EPC and clears the LL bit unconditionally: a
/// following SC must fail.
#[test]
fn eret_clears_ll() {
    let mut sys = TestSystem::new();
    let data = kseg0(DATA_BASE);
    let resume = kseg1(PROG_BASE + 40);
    sys.load_words(DATA_BASE, &[0x1111]);
    // Pre-seed EXL so ERET is a pure return, then: LL sets the bit, ERET
    // clears it, SC observes failure.
    sys.run_program(&[
        lui(1, (resume >> 16) as u16),       // 0: build resume address
        ori(1, 1, resume as u16),            // 1
        mtc0(1, 14),                         // 2: EPC = resume
        lui(2, (data >> 16) as u16),         // 3
        ori(2, 2, data as u16),              // 4: r2 = data pointer
        ll(3, 2, 0),                         // 5: LL sets the bit
        addiu(4, 0, 0x99),                   // 6: SC source value
        eret(),                              // 7: clears LL, jumps to resume
        nop(),                               // 8: squashed wrong-path
        lui(5, 0xBAD),                       // 9: must not run
        sc(4, 2, 0),                         // 10 (resume): fails, r4 = 0
        lw(6, 2, 0),                         // 11: memory unchanged
    ]);

    assert_eq!(sys.gpr(4), 0, "SC after ERET must fail");
    assert_eq!(sys.gpr(6), 0x1111, "memory unchanged by failed SC");
    assert_eq!(sys.gpr(5), 0, "wrong-path instruction never ran");
}

/// Count/Compare raises the timer interrupt once interrupts are enabled;
/// the handler vector is entered with ExcCode Int and Cause.IP7 visible.
#[test]
fn timer_interrupt() {
    let mut sys = TestSystem::new();
    let status =
        cp0_bits::STATUS_RESET | cp0_bits::STATUS_IE | (1 << 15); // IM7
    sys.cpu.regs.set_cp0(cp0::STATUS, status);
    sys.cpu.regs.set_cp0(cp0::COMPARE, 8);
    sys.cpu.set_fetch_pc(kseg1(PROG_BASE));

    sys.run(64);

    assert_eq!(sys.exc_code(), 0, "Int");
    assert_ne!(sys.cp0(cp0::CAUSE) & cp0_bits::CAUSE_IP7, 0);
    assert_ne!(sys.cp0(cp0::STATUS) & cp0_bits::STATUS_EXL, 0);
    let vector = VECTOR_BASE + VECTOR_GENERAL;
    let pc = sys.cpu.fetch_pc();
    assert!(
        (vector..vector + 0x100).contains(&pc),
        "in the handler, got {pc:#x}"
    );
}

/// WAIT parks the pipeline until an interrupt is pending.
#[test]
fn wait_parks_until_interrupt() {
    use vr4300_core::core::pipeline::CycleStatus;

    let mut sys = TestSystem::new();
    let status = cp0_bits::STATUS_RESET | cp0_bits::STATUS_IE | (1 << 15);
    sys.cpu.regs.set_cp0(cp0::STATUS, status);
    sys.cpu.regs.set_cp0(cp0::COMPARE, 40);
    sys.run_program(&[wait()]);

    let mut saw_idle = false;
    let mut woke = false;
    for _ in 0..200 {
        match sys.cpu.cycle(&mut sys.bus) {
            CycleStatus::Idle => saw_idle = true,
            CycleStatus::ExceptionEntered => {
                woke = true;
                break;
            }
            _ => {}
        }
    }
    assert!(saw_idle, "WAIT parked the core");
    assert!(woke, "timer interrupt resumed it");
}

/// A reserved instruction word raises RI.
#[test]
fn reserved_instruction() {
    let mut sys = TestSystem::new();
    sys.run_program(&[0x7FFF_FFFF]);
    assert_eq!(sys.exc_code(), 10);
}

/// MTC1 then MFC1 with Status.FR set round-trips the low 32 bits.
#[test]
fn mtc1_mfc1_round_trip_fr1() {
    let mut sys = TestSystem::new();
    let status = cp0_bits::STATUS_RESET | cp0_bits::STATUS_FR;
    sys.cpu.regs.set_cp0(cp0::STATUS, status);
    sys.run_program(&[
        lui(1, 0x1234),
        ori(1, 1, 0x5678),
        mtc1(1, 7),
        mfc1(2, 7),
    ]);
    assert_eq!(sys.gpr(2), 0x1234_5678);
}

/// With FR clear, word moves splice into register-pair halves: writing
/// the odd half and reading it back is the identity.
#[test]
fn mtc1_mfc1_pair_splice_fr0() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        lui(1, 0xAAAA),
        ori(1, 1, 0x1111),
        lui(2, 0x5555),
        ori(2, 2, 0x2222),
        mtc1(1, 6), // even half of the F6/F7 pair
        mtc1(2, 7), // odd half
        mfc1(3, 6),
        mfc1(4, 7),
    ]);
    assert_eq!(sys.gpr(3) as u32, 0xAAAA_1111);
    assert_eq!(sys.gpr(4) as u32, 0x5555_2222);
}

/// CTC1 to FCR31 then CFC1 reads the value back after reserved-bit
/// masking, and the write is visible to the very next read.
#[test]
fn ctc1_cfc1_round_trip() {
    let _lock = fpu_lock();
    let mut sys = TestSystem::new();
    sys.run_program(&[
        lui(1, 0x0080),    // condition bit 23
        ori(1, 1, 0x0003), // RM = toward -inf
        ctc1(1, 31),
        cfc1(2, 31),
    ]);
    assert_eq!(sys.gpr(2), 0x0080_0003);

    // Leave the process-wide rounding mode as the next test expects it.
    vr4300_core::fpu::set_rounding_mode(vr4300_core::fpu::RoundingMode::Nearest);
}

/// CTC1 to a reserved FCR is discarded; CFC1 of FCR0 returns the
/// implementation id.
#[test]
fn reserved_fcr_writes_discarded() {
    let mut sys = TestSystem::new();
    sys.run_program(&[
        addiu(1, 0, 0x7F),
        ctc1(1, 5),  // reserved: dropped
        cfc1(2, 5),  // reserved: reads zero
        cfc1(3, 0),  // FCR0: implementation id
    ]);
    assert_eq!(sys.gpr(2), 0);
    assert_eq!(sys.gpr(3), 0x0B00);
    assert_eq!(sys.exc_code(), 0, "no fault either way");
}
