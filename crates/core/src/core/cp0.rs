//! CP0: the system control coprocessor.
//!
//! Register bit layouts, the Count/Compare timer, the interrupt gate, and
//! exception entry. Everything operates on the unified register bank so
//! both execution models share one implementation of the architectural
//! rules.

use crate::common::constants::{
    COUNT_DIVIDER, TLB_ENTRIES, VECTOR_BASE, VECTOR_BASE_BEV, VECTOR_GENERAL, VECTOR_TLB_REFILL,
    VECTOR_XTLB_REFILL,
};
use crate::common::reg::cp0;
use crate::common::{Exception, Fault, RegisterFile};

/// Status: global interrupt enable.
pub const STATUS_IE: u64 = 1 << 0;
/// Status: exception level (set on exception entry).
pub const STATUS_EXL: u64 = 1 << 1;
/// Status: error level (set on reset and cache errors).
pub const STATUS_ERL: u64 = 1 << 2;
/// Status: 64-bit addressing enabled in kernel mode.
pub const STATUS_KX: u64 = 1 << 7;
/// Status: interrupt mask field.
pub const STATUS_IM_MASK: u64 = 0xFF << 8;
/// Status: bootstrap exception vectors.
pub const STATUS_BEV: u64 = 1 << 22;
/// Status: FPU register file mode (32 doubles when set).
pub const STATUS_FR: u64 = 1 << 26;
/// Status: coprocessor 0 usable.
pub const STATUS_CU0: u64 = 1 << 28;
/// Status: coprocessor 1 usable.
pub const STATUS_CU1: u64 = 1 << 29;

/// Cause: exception code field shift.
pub const CAUSE_EXC_SHIFT: u32 = 2;
/// Cause: exception code field mask (in place).
pub const CAUSE_EXC_MASK: u64 = 0x1F << 2;
/// Cause: interrupt-pending field.
pub const CAUSE_IP_MASK: u64 = 0xFF << 8;
/// Cause: external interrupt line 0 (wired to the UART).
pub const CAUSE_IP2: u64 = 1 << 10;
/// Cause: timer interrupt (Count == Compare).
pub const CAUSE_IP7: u64 = 1 << 15;
/// Cause: coprocessor number field shift.
pub const CAUSE_CE_SHIFT: u32 = 28;
/// Cause: exception happened in a branch delay slot.
pub const CAUSE_BD: u64 = 1 << 31;

/// Status value after reset: CP0 and CP1 usable, normal vectors.
pub const STATUS_RESET: u64 = STATUS_CU1 | STATUS_CU0;
/// PRId value identifying a VR4300.
pub const PRID_RESET: u64 = 0x0B22;
/// Config register reset value.
pub const CONFIG_RESET: u64 = 0x7006_E463;
/// FCR0 value: FPU implementation and revision id.
pub const FCR0_RESET: u64 = 0x0B00;

/// Puts the CP0 block into its post-reset state.
pub fn reset(regs: &mut RegisterFile) {
    regs.set_cp0(cp0::STATUS, STATUS_RESET);
    regs.set_cp0(cp0::PRID, PRID_RESET);
    regs.set_cp0(cp0::CONFIG, CONFIG_RESET);
    regs.set_cp0(cp0::RANDOM, (TLB_ENTRIES - 1) as u64);
    regs.write(crate::common::reg::FCR0, FCR0_RESET);
}

/// Advances the Count register. Count ticks at half the master clock; on
/// a Compare match the timer interrupt (IP7) is asserted.
pub fn tick_count(regs: &mut RegisterFile, cycles: u64) {
    if cycles % COUNT_DIVIDER != 0 {
        return;
    }
    let count = (regs.cp0(cp0::COUNT) as u32).wrapping_add(1);
    regs.set_cp0(cp0::COUNT, u64::from(count));
    if u64::from(count) == regs.cp0(cp0::COMPARE) & 0xFFFF_FFFF {
        let cause = regs.cp0(cp0::CAUSE);
        regs.set_cp0(cp0::CAUSE, cause | CAUSE_IP7);
    }
}

/// Mirrors the external interrupt line (the UART) onto Cause.IP2.
pub fn set_external_irq(regs: &mut RegisterFile, asserted: bool) {
    let cause = regs.cp0(cp0::CAUSE);
    regs.set_cp0(
        cp0::CAUSE,
        if asserted {
            cause | CAUSE_IP2
        } else {
            cause & !CAUSE_IP2
        },
    );
}

/// True when an interrupt must be recognised at the next instruction
/// boundary: interrupts enabled, no exception/error level, and an
/// unmasked pending line.
pub fn interrupt_pending(regs: &RegisterFile) -> bool {
    let status = regs.cp0(cp0::STATUS);
    if status & (STATUS_IE | STATUS_EXL | STATUS_ERL) != STATUS_IE {
        return false;
    }
    let pending = regs.cp0(cp0::CAUSE) & CAUSE_IP_MASK;
    let mask = status & STATUS_IM_MASK;
    pending & mask != 0
}

/// Current value of the Random register: a free-running counter bounded
/// below by Wired.
pub fn random_index(regs: &RegisterFile, cycles: u64) -> usize {
    let wired = (regs.cp0(cp0::WIRED) as usize) % TLB_ENTRIES;
    let window = TLB_ENTRIES - wired;
    wired + (cycles as usize % window)
}

/// Writes a CP0 register with its architectural side effects.
pub fn write_cp0(regs: &mut RegisterFile, n: usize, value: u64) {
    match n {
        // Read-only registers.
        cp0::RANDOM | cp0::PRID => {}
        // Writing Compare acknowledges the timer interrupt.
        cp0::COMPARE => {
            regs.set_cp0(cp0::COMPARE, value & 0xFFFF_FFFF);
            let cause = regs.cp0(cp0::CAUSE);
            regs.set_cp0(cp0::CAUSE, cause & !CAUSE_IP7);
        }
        // Only the software interrupt bits of Cause are writable.
        cp0::CAUSE => {
            let cause = regs.cp0(cp0::CAUSE);
            let sw = 0x3 << 8;
            regs.set_cp0(cp0::CAUSE, (cause & !sw) | (value & sw));
        }
        cp0::WIRED => {
            regs.set_cp0(cp0::WIRED, value & 0x3F);
        }
        _ => regs.set_cp0(n, value),
    }
}

/// Performs architectural exception entry and returns the handler vector.
///
/// Saves the (delay-slot adjusted) PC into EPC with `Cause.BD`, records
/// the cause code, raises `Status.EXL`, and fills the TLB context
/// registers when the fault carries an address. When `EXL` was already
/// set, EPC is preserved and the general vector is used.
pub fn exception_entry(
    regs: &mut RegisterFile,
    fault: &Fault,
    pc: u64,
    in_delay_slot: bool,
) -> u64 {
    let status = regs.cp0(cp0::STATUS);
    let was_exl = status & STATUS_EXL != 0;

    let mut cause = regs.cp0(cp0::CAUSE) & !(CAUSE_EXC_MASK | CAUSE_BD | (0x3 << CAUSE_CE_SHIFT));
    cause |= u64::from(fault.exception.code()) << CAUSE_EXC_SHIFT;
    if let Exception::CoprocessorUnusable(n) = fault.exception {
        cause |= u64::from(n) << CAUSE_CE_SHIFT;
    }

    if !was_exl {
        if in_delay_slot {
            cause |= CAUSE_BD;
            regs.set_cp0(cp0::EPC, pc.wrapping_sub(4));
        } else {
            regs.set_cp0(cp0::EPC, pc);
        }
        regs.set_cp0(cp0::STATUS, status | STATUS_EXL);
    }
    regs.set_cp0(cp0::CAUSE, cause);

    if let Some(vaddr) = fault.bad_vaddr {
        regs.set_cp0(cp0::BAD_VADDR, vaddr);
        if matches!(
            fault.exception,
            Exception::TlbLoad | Exception::TlbStore | Exception::TlbModification
        ) {
            let vpn2 = (vaddr >> 13) & 0x7_FFFF;
            let context = regs.cp0(cp0::CONTEXT);
            regs.set_cp0(cp0::CONTEXT, (context & !0x7F_FFF0) | (vpn2 << 4));

            let xvpn2 = (vaddr >> 13) & 0x7FF_FFFF;
            let region = (vaddr >> 62) & 0x3;
            let xcontext = regs.cp0(cp0::XCONTEXT);
            regs.set_cp0(
                cp0::XCONTEXT,
                (xcontext & !0x1_FFFF_FFF0) | (region << 31) | (xvpn2 << 4),
            );

            let asid = regs.cp0(cp0::ENTRY_HI) & 0xFF;
            regs.set_cp0(cp0::ENTRY_HI, (vaddr & !0x1FFF) | asid);
        }
    }

    let base = if status & STATUS_BEV != 0 {
        VECTOR_BASE_BEV
    } else {
        VECTOR_BASE
    };
    let refill_vector = if status & STATUS_KX != 0 {
        VECTOR_XTLB_REFILL
    } else {
        VECTOR_TLB_REFILL
    };
    let offset = if fault.refill && !was_exl {
        refill_vector
    } else {
        VECTOR_GENERAL
    };
    base + offset
}
