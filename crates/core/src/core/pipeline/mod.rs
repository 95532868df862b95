//! The five-stage pipeline.
//!
//! One `cycle()` call advances the machine one master-clock cycle. Stages
//! execute in reverse order — WB, DC, EX, RF, IC — so every latch is read
//! by its consumer before the producer overwrites it, which creates the
//! illusion of a parallel one-cycle advance with single-buffered latches.
//!
//! Stall machinery: a single `cycles_to_stall` counter plus a cycle-type
//! discriminator. Multi-cycle interlocks (MCI) drain the downstream WB and
//! DC stages while EX, RF and IC hold; memory stalls freeze the whole
//! machine while a cache fill is charged. Faults ride latch common blocks
//! to the DC boundary, where the exception is entered and younger slots
//! are killed.

/// Inter-stage latches.
pub mod latches;

/// The five stage implementations.
pub mod stages;

use latches::{DcwbLatch, ExdcLatch, IcrfLatch, LatchCommon, RfexLatch};
use tracing::debug;

use crate::common::Fault;
use crate::core::{Vr4300, cp0};
use crate::soc::Bus;

/// What the EX stage is currently occupied with during a stall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PipelineCycleType {
    /// Full-speed execution.
    #[default]
    Normal,
    /// Multi-cycle interlock: WB and DC drain, EX/RF/IC hold.
    Mci,
    /// Cache fill or write-back in progress: everything holds.
    MemoryStall,
}

/// Result of one `cycle()` call, inspected by the outer loop in place of
/// the nonlocal control flow the original used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStatus {
    /// A full pipeline advance happened.
    Normal,
    /// The cycle was consumed by a stall.
    Stalled,
    /// An exception was entered; the fetch PC now points at a vector.
    ExceptionEntered,
    /// The core is parked in `WAIT` until an interrupt is pending.
    Idle,
}

/// Pipeline latches plus stall control.
#[derive(Debug, Default)]
pub struct Pipeline {
    /// IC → RF latch.
    pub icrf: IcrfLatch,
    /// RF → EX latch.
    pub rfex: RfexLatch,
    /// EX → DC latch.
    pub exdc: ExdcLatch,
    /// DC → WB latch.
    pub dcwb: DcwbLatch,
    /// Remaining stall cycles before EX advances again.
    pub cycles_to_stall: u64,
    /// What the stall is for.
    pub cycle_type: PipelineCycleType,
    /// The next instruction through EX sits in a branch delay slot.
    pub next_delay_slot: bool,
}

impl Vr4300 {
    /// Advances the pipeline by one cycle.
    pub fn cycle(&mut self, bus: &mut Bus) -> CycleStatus {
        self.cycles += 1;
        self.stats.cycles += 1;
        cp0::set_external_irq(&mut self.regs, bus.irq_pending());
        cp0::tick_count(&mut self.regs, self.cycles);

        if self.waiting {
            if cp0::interrupt_pending(&self.regs) {
                self.waiting = false;
            } else {
                return CycleStatus::Idle;
            }
        }

        if self.pipeline.cycles_to_stall > 0 {
            self.pipeline.cycles_to_stall -= 1;
            match self.pipeline.cycle_type {
                PipelineCycleType::Mci => {
                    self.stats.mci_stall_cycles += 1;
                    stages::wb_stage(self);
                    let _ = stages::dc_stage(self, bus);
                }
                PipelineCycleType::MemoryStall => {
                    self.stats.memory_stall_cycles += 1;
                }
                PipelineCycleType::Normal => {}
            }
            if self.pipeline.cycles_to_stall == 0 {
                self.pipeline.cycle_type = PipelineCycleType::Normal;
            }
            return CycleStatus::Stalled;
        }

        stages::wb_stage(self);
        if stages::dc_stage(self, bus) {
            return CycleStatus::ExceptionEntered;
        }
        stages::ex_stage(self);
        if !stages::rf_stage(self) {
            stages::ic_stage(self, bus);
        }
        CycleStatus::Normal
    }

    /// Raises a multi-cycle interlock of `cycles` total cycles: the
    /// pipeline holds for `cycles - 1` further cycles while WB and DC
    /// drain.
    pub(crate) fn do_mci(&mut self, cycles: u32) {
        if cycles > 1 {
            self.pipeline.cycles_to_stall += u64::from(cycles) - 1;
            self.pipeline.cycle_type = PipelineCycleType::Mci;
        }
    }

    /// Charges a memory stall (cache fill or write-back).
    pub(crate) fn memory_stall(&mut self, cycles: u64) {
        self.pipeline.cycles_to_stall += cycles;
        if self.pipeline.cycle_type == PipelineCycleType::Normal {
            self.pipeline.cycle_type = PipelineCycleType::MemoryStall;
        }
    }

    /// Enters an architectural exception: updates CP0, redirects the fetch
    /// PC at the handler vector, and kills everything younger than the
    /// faulting instruction.
    pub(crate) fn service_exception(&mut self, common: &LatchCommon, fault: Fault) {
        let vector = cp0::exception_entry(&mut self.regs, &fault, common.pc, common.delay_slot);
        debug!(
            exception = %fault.exception,
            pc = format_args!("{:#x}", common.pc),
            vector = format_args!("{vector:#x}"),
            "exception entry"
        );
        self.stats.exceptions += 1;

        let p = &mut self.pipeline;
        p.icrf.pc = vector;
        p.icrf.common = LatchCommon::bubble();
        p.rfex.common.killed = true;
        p.rfex.iw_mask = !0;
        p.next_delay_slot = false;
    }
}
