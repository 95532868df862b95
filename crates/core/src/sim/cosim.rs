//! Co-execution harness.
//!
//! Runs the pipelined core and the functional reference model over one
//! shared memory image and compares their architectural register banks.
//! The harness exists as the validation surface for the pipeline: any
//! observable divergence in GPRs, HI or LO after the same program is a
//! pipeline bug (the functional model is the oracle).

use crate::common::SimError;
use crate::common::reg::{HI, LO};
use crate::config::Config;
use crate::core::Vr4300;
use crate::sim::interp::FunctionalCore;
use crate::soc::Bus;

/// One diverging register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMismatch {
    /// Unified register index.
    pub index: usize,
    /// Value in the functional model.
    pub functional: u64,
    /// Value in the pipelined model.
    pub pipeline: u64,
}

/// Both models plus the shared bus.
#[derive(Debug)]
pub struct CoSim {
    /// The pipelined core under test.
    pub pipeline: Vr4300,
    /// The functional oracle.
    pub functional: FunctionalCore,
    /// The shared memory image and devices.
    pub bus: Bus,
}

impl CoSim {
    /// Builds the harness with a capturing UART (console output is
    /// inspected, not printed).
    ///
    /// # Errors
    ///
    /// Propagates bus construction failures.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        Ok(Self {
            pipeline: Vr4300::new(config),
            functional: FunctionalCore::new(config),
            bus: Bus::with_captured_uart(config)?,
        })
    }

    /// Points both models at the same entry address.
    pub fn set_entry(&mut self, vaddr: u64) {
        self.pipeline.set_fetch_pc(vaddr);
        self.functional.pc = vaddr;
    }

    /// Steps the functional model until its PC reaches `target`. Returns
    /// false if `max_steps` ran out first.
    pub fn run_functional_until(&mut self, target: u64, max_steps: u64) -> bool {
        for _ in 0..max_steps {
            if self.functional.pc == target {
                return true;
            }
            let _ = self.functional.step(&mut self.bus);
        }
        self.functional.pc == target
    }

    /// Cycles the pipelined model until its fetch PC reaches `target` and
    /// the pipe has drained behind it. Returns false if `max_cycles` ran
    /// out first.
    pub fn run_pipeline_until(&mut self, target: u64, max_cycles: u64) -> bool {
        let mut reached = false;
        let mut drain = 0;
        for _ in 0..max_cycles {
            if !reached && self.pipeline.fetch_pc() == target {
                reached = true;
            }
            if reached {
                // Four more cycles flush everything older than the target
                // fetch through writeback.
                if drain == 4 {
                    return true;
                }
                drain += 1;
            }
            let _ = self.pipeline.cycle(&mut self.bus);
        }
        false
    }

    /// Compares the architectural integer state of the two models:
    /// GPRs 1–31 plus HI and LO.
    pub fn compare_registers(&self) -> Vec<RegisterMismatch> {
        let mut mismatches = Vec::new();
        for index in (1..32).chain([HI, LO]) {
            let functional = self.functional.regs.read(index);
            let pipeline = self.pipeline.regs.read(index);
            if functional != pipeline {
                mismatches.push(RegisterMismatch {
                    index,
                    functional,
                    pipeline,
                });
            }
        }
        mismatches
    }
}
