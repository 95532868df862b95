//! The VR4300 core.
//!
//! This module holds the processor itself:
//! 1. **State:** the [`Vr4300`] struct — unified registers, caches, TLB,
//!    pipeline latches, and counters.
//! 2. **Coprocessors:** CP0 (system control) and CP1 (FPU dispatch).
//! 3. **Memory units:** I-cache, D-cache, and the TLB translator.
//! 4. **Pipeline:** the five-stage latch machine and its `cycle()` driver.

/// Shared integer execution helpers.
pub mod arith;

/// CP0 system control coprocessor.
pub mod cp0;

/// CP1 floating-point coprocessor dispatch.
pub mod cp1;

/// Data cache.
pub mod dcache;

/// Instruction cache.
pub mod icache;

/// Five-stage pipeline.
pub mod pipeline;

/// TLB and address translation.
pub mod tlb;

use crate::common::RegisterFile;
use crate::common::constants::RESET_VECTOR;
use crate::config::{Config, TimingConfig};
use crate::fpu;
use crate::stats::SimStats;
use dcache::DCache;
use icache::ICache;
use pipeline::Pipeline;
use tlb::Tlb;

/// The pipelined VR4300 core.
///
/// Owns every piece of architectural and microarchitectural state. The
/// system bus is deliberately not owned: the co-execution harness shares
/// one bus between this core and the functional reference model, so each
/// `cycle()` borrows it.
#[derive(Debug)]
pub struct Vr4300 {
    /// Unified architectural register bank.
    pub regs: RegisterFile,
    /// Pipeline latches and stall state.
    pub pipeline: Pipeline,
    /// Instruction cache.
    pub icache: ICache,
    /// Data cache.
    pub dcache: DCache,
    /// Translation lookaside buffer.
    pub tlb: Tlb,
    /// Load-linked bit for `LL`/`SC`; cleared by `ERET`.
    pub llbit: bool,
    /// Master cycle counter.
    pub cycles: u64,
    /// Parked by `WAIT` until an interrupt is pending.
    pub waiting: bool,
    /// Stall and interlock timings.
    pub timing: TimingConfig,
    /// Performance counters.
    pub stats: SimStats,
    /// Echo a retire trace to stderr.
    pub trace: bool,
}

impl Vr4300 {
    /// Creates a core in its post-reset state, fetching from the
    /// architectural reset vector.
    pub fn new(config: &Config) -> Self {
        let mut core = Self {
            regs: RegisterFile::new(),
            pipeline: Pipeline::default(),
            icache: ICache::new(),
            dcache: DCache::new(),
            tlb: Tlb::new(),
            llbit: false,
            cycles: 0,
            waiting: false,
            timing: config.timing.clone(),
            stats: SimStats::default(),
            trace: config.harness.trace,
        };
        cp0::reset(&mut core.regs);
        fpu::init();
        core.pipeline.icrf.pc = RESET_VECTOR;
        core
    }

    /// Redirects the fetch PC, discarding anything already fetched. Used
    /// by the harness to start execution at the image entry point.
    pub fn set_fetch_pc(&mut self, pc: u64) {
        self.pipeline.icrf.pc = pc;
        self.pipeline.icrf.common.killed = true;
    }

    /// The current fetch PC.
    pub fn fetch_pc(&self) -> u64 {
        self.pipeline.icrf.pc
    }

    /// Snapshot of the general-purpose registers.
    pub fn gpr_snapshot(&self) -> [u64; 32] {
        self.regs.gpr_snapshot()
    }
}
