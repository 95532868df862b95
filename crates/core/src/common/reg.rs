//! Unified architectural register file.
//!
//! Every architectural register — GPRs, the multiplier outputs, all CP0
//! registers, the CP1 data registers, and the two FPU control registers —
//! lives in one flat, index-addressed bank. The pipeline's destination
//! field is an index into this bank, which turns bypass and dependency
//! tracking into a single comparison on a small integer.

/// Index of HI (upper multiplier output).
pub const HI: usize = 32;
/// Index of LO (lower multiplier output).
pub const LO: usize = 33;

/// Base index of the CP0 register block (32 registers).
pub const CP0_BASE: usize = 34;
/// Base index of the CP1 data register block (32 registers).
pub const CP1_BASE: usize = 66;
/// Index of FCR0, the read-only FPU implementation register.
pub const FCR0: usize = 98;
/// Index of FCR31, the FPU control/status register.
pub const FCR31: usize = 99;
/// Total number of registers in the unified bank.
pub const NUM_REGS: usize = 100;

/// CP0 register numbers (offsets within the CP0 block).
pub mod cp0 {
    /// TLB entry index for `TLBWI`/`TLBR`.
    pub const INDEX: usize = 0;
    /// Pseudo-random TLB index for `TLBWR`.
    pub const RANDOM: usize = 1;
    /// Even-page TLB entry half.
    pub const ENTRY_LO0: usize = 2;
    /// Odd-page TLB entry half.
    pub const ENTRY_LO1: usize = 3;
    /// Pointer into the OS page-table area, updated on TLB faults.
    pub const CONTEXT: usize = 4;
    /// Page size mask for TLB writes.
    pub const PAGE_MASK: usize = 5;
    /// Lower bound of the TLBWR replacement window.
    pub const WIRED: usize = 6;
    /// Faulting virtual address.
    pub const BAD_VADDR: usize = 8;
    /// Free-running counter (master clock / 2).
    pub const COUNT: usize = 9;
    /// VPN2 + ASID; TLB probe/write source.
    pub const ENTRY_HI: usize = 10;
    /// Timer compare value; match asserts IP7.
    pub const COMPARE: usize = 11;
    /// Processor status: IE/EXL/ERL, IM, BEV, FR, CU.
    pub const STATUS: usize = 12;
    /// Exception cause: ExcCode, IP, BD.
    pub const CAUSE: usize = 13;
    /// Exception return address.
    pub const EPC: usize = 14;
    /// Processor revision identifier (read-only).
    pub const PRID: usize = 15;
    /// Configuration register.
    pub const CONFIG: usize = 16;
    /// Physical address of the last `LL`.
    pub const LL_ADDR: usize = 17;
    /// Watchpoint address, low half.
    pub const WATCH_LO: usize = 18;
    /// Watchpoint address, high half.
    pub const WATCH_HI: usize = 19;
    /// 64-bit analogue of Context.
    pub const XCONTEXT: usize = 20;
    /// ECC check bits for cache diagnostics.
    pub const ECC: usize = 26;
    /// Cache error status.
    pub const CACHE_ERR: usize = 27;
    /// Cache tag interface, low word.
    pub const TAG_LO: usize = 28;
    /// Cache tag interface, high word.
    pub const TAG_HI: usize = 29;
    /// Exception return address for error-level traps.
    pub const ERROR_EPC: usize = 30;
}

/// The unified register bank.
///
/// GPR 0 is hard-wired to zero: writes to index 0 are silently discarded,
/// which also neutralises pipeline bubbles that use destination 0.
#[derive(Debug)]
pub struct RegisterFile {
    regs: [u64; NUM_REGS],
}

impl RegisterFile {
    /// Creates a bank with every register zeroed.
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGS],
        }
    }

    /// Reads a register by unified index. Index 0 always reads zero.
    #[inline(always)]
    pub fn read(&self, idx: usize) -> u64 {
        self.regs[idx]
    }

    /// Writes a register by unified index. Writes to index 0 are dropped.
    #[inline(always)]
    pub fn write(&mut self, idx: usize, val: u64) {
        if idx != 0 {
            self.regs[idx] = val;
        }
    }

    /// Reads a CP0 register by its architectural number.
    #[inline(always)]
    pub fn cp0(&self, n: usize) -> u64 {
        self.regs[CP0_BASE + n]
    }

    /// Writes a CP0 register by its architectural number.
    #[inline(always)]
    pub fn set_cp0(&mut self, n: usize, val: u64) {
        self.regs[CP0_BASE + n] = val;
    }

    /// Reads a CP1 data register by its architectural number.
    #[inline(always)]
    pub fn cp1(&self, n: usize) -> u64 {
        self.regs[CP1_BASE + n]
    }

    /// Writes a CP1 data register by its architectural number.
    #[inline(always)]
    pub fn set_cp1(&mut self, n: usize, val: u64) {
        self.regs[CP1_BASE + n] = val;
    }

    /// Snapshot of the general-purpose registers, for harness comparison.
    pub fn gpr_snapshot(&self) -> [u64; 32] {
        let mut out = [0; 32];
        out.copy_from_slice(&self.regs[..32]);
        out
    }

    /// Dumps the GPRs, HI and LO to stderr for debugging.
    pub fn dump(&self) {
        for i in 0..32 {
            eprintln!("r{:<2}: {:#018x}", i, self.regs[i]);
        }
        eprintln!("hi : {:#018x}", self.regs[HI]);
        eprintln!("lo : {:#018x}", self.regs[LO]);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
