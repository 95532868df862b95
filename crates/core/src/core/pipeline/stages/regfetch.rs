//! RF stage: decode, operand fetch, and hazard detection.
//!
//! Consumes the ICRF latch: applies the squash mask the EX stage may have
//! set this cycle (annulled branch-likely delay slots and wrong-path
//! fetches), decodes, and reads source operands. A source still pending in
//! the EXDC latch forces a one-cycle stall — the caller then skips IC so
//! the fetched word is re-read next cycle, by which time the producer has
//! reached DCWB and forwards directly.

use crate::common::reg::{CP1_BASE, cp0};
use crate::common::{Exception, Fault};
use crate::core::pipeline::latches::{LatchCommon, RfexLatch};
use crate::core::{Vr4300, cp0 as cp0_regs};
use crate::isa::{Op, decode};

/// Number of CP1 data registers (for the FR=0 even-pair adjustment).
const CP1_REGS: usize = 32;

/// Runs the RF stage. Returns true when the pipeline must stall for a
/// dependency against the EX stage's pending destination.
pub(crate) fn rf_stage(cpu: &mut Vr4300) -> bool {
    let icrf = cpu.pipeline.icrf;

    if icrf.common.killed {
        let iw_mask = cpu.pipeline.rfex.iw_mask;
        cpu.pipeline.rfex = RfexLatch {
            iw_mask,
            ..RfexLatch::default()
        };
        return false;
    }

    // The mask set by an annulling branch squashes the incoming word into
    // a NOP; it is consumed (reset) once an instruction actually moves on.
    let annulled = cpu.pipeline.rfex.iw_mask == 0;
    let iw = icrf.iw & cpu.pipeline.rfex.iw_mask;

    // A fetch fault on an annulled slot is discarded with the slot.
    if icrf.common.fault.is_some() && !annulled {
        let mut common = icrf.common;
        common.killed = false;
        cpu.pipeline.rfex = RfexLatch {
            common,
            ..RfexLatch::default()
        };
        return false;
    }

    let opcode = decode(iw);
    let mut common = LatchCommon {
        pc: icrf.common.pc,
        fault: None,
        killed: false,
        delay_slot: false,
    };
    if opcode.id == Op::Invalid {
        common.fault = Some(Fault::new(Exception::ReservedInstruction));
    }

    // Operand indices, with the FR=0 even-pair adjustment for CP1 sources.
    let fr = cpu.regs.cp0(cp0::STATUS) & cp0_regs::STATUS_FR != 0;
    let adjust = |idx: usize| {
        if !fr && (CP1_BASE..CP1_BASE + CP1_REGS).contains(&idx) {
            idx & !1
        } else {
            idx
        }
    };
    let (first, second) = opcode.source_indices(iw);
    let first = first.map(adjust);
    let second = second.map(adjust);

    // Dependency against the instruction that just left EX: stall one
    // cycle and re-read once it reaches DCWB.
    let exdc = &cpu.pipeline.exdc;
    if !exdc.common.killed && exdc.dest != 0 {
        let dest = Some(exdc.dest);
        if first == dest || second == dest {
            let iw_mask = cpu.pipeline.rfex.iw_mask;
            cpu.pipeline.rfex = RfexLatch {
                iw_mask,
                ..RfexLatch::default()
            };
            return true;
        }
    }

    // Operand read with direct forwarding from DCWB.
    let read = |idx: usize| {
        let dcwb = &cpu.pipeline.dcwb;
        if idx != 0 && !dcwb.common.killed && dcwb.dest == idx {
            dcwb.result
        } else {
            cpu.regs.read(idx)
        }
    };
    let rs = first.map(&read).unwrap_or(0);
    let rt = second.map(&read).unwrap_or(0);

    cpu.pipeline.rfex = RfexLatch {
        common,
        opcode,
        iw,
        iw_mask: !0,
        rs,
        rt,
    };
    false
}
