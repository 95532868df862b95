//! Inter-stage pipeline latches.
//!
//! Four records carry state between the five stages. Each has a common
//! substructure recording the instruction's PC, any exception in flight,
//! whether the slot has been killed, and whether the instruction sits in a
//! branch delay slot. Invariants:
//! - at most one pending destination per latch;
//! - `killed` implies the slot has no architectural effect;
//! - `fault` implies an exception is in flight and is serviced before any
//!   further commit.

use crate::common::{BusRequest, Fault};
use crate::isa::Opcode;

/// Fields shared by every latch.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatchCommon {
    /// PC of the instruction occupying the slot.
    pub pc: u64,
    /// Exception in flight, serviced at the DC boundary.
    pub fault: Option<Fault>,
    /// The slot is a bubble with no architectural effect.
    pub killed: bool,
    /// The instruction occupies a branch delay slot.
    pub delay_slot: bool,
}

impl LatchCommon {
    /// A killed bubble.
    pub fn bubble() -> Self {
        Self {
            killed: true,
            ..Self::default()
        }
    }
}

/// IC → RF latch: the fetch PC and the word most recently fetched.
#[derive(Clone, Copy, Debug)]
pub struct IcrfLatch {
    /// State of the fetched instruction en route to RF.
    pub common: LatchCommon,
    /// Next fetch address. Branches and exception entry redirect this.
    pub pc: u64,
    /// The fetched instruction word.
    pub iw: u32,
}

/// RF → EX latch: decoded instruction and bypassed operand values.
#[derive(Clone, Copy, Debug)]
pub struct RfexLatch {
    /// State of the instruction awaiting execution.
    pub common: LatchCommon,
    /// Decoded opcode and flags.
    pub opcode: Opcode,
    /// Raw instruction word.
    pub iw: u32,
    /// ANDed into the next word RF consumes; zeroed to squash the delay
    /// slot of an annulled branch-likely (and wrong-path fetches).
    pub iw_mask: u32,
    /// First source operand value after bypass.
    pub rs: u64,
    /// Second source operand value after bypass.
    pub rt: u64,
}

/// EX → DC latch: pending register write and optional memory request.
#[derive(Clone, Copy, Debug)]
pub struct ExdcLatch {
    /// State of the instruction in the data-cache stage.
    pub common: LatchCommon,
    /// Unified destination register index (0 = none).
    pub dest: usize,
    /// Result value, or the merge base while a read request is pending.
    pub result: u64,
    /// Memory request to execute, if the instruction accesses memory.
    pub request: Option<BusRequest>,
}

/// DC → WB latch: the committed result awaiting register-file write.
#[derive(Clone, Copy, Debug)]
pub struct DcwbLatch {
    /// State of the instruction about to commit.
    pub common: LatchCommon,
    /// Unified destination register index (0 = none).
    pub dest: usize,
    /// Value to write at commit.
    pub result: u64,
}

impl Default for IcrfLatch {
    fn default() -> Self {
        Self {
            common: LatchCommon::bubble(),
            pc: 0,
            iw: 0,
        }
    }
}

impl Default for RfexLatch {
    fn default() -> Self {
        Self {
            common: LatchCommon::bubble(),
            opcode: Opcode::INVALID,
            iw: 0,
            iw_mask: !0,
            rs: 0,
            rt: 0,
        }
    }
}

impl Default for ExdcLatch {
    fn default() -> Self {
        Self {
            common: LatchCommon::bubble(),
            dest: 0,
            result: 0,
            request: None,
        }
    }
}

impl Default for DcwbLatch {
    fn default() -> Self {
        Self {
            common: LatchCommon::bubble(),
            dest: 0,
            result: 0,
        }
    }
}
