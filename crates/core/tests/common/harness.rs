//! System harness for pipeline and functional-model tests.
//!
//! Owns one core and one bus with a capturing UART. Programs are loaded
//! at a fixed physical address and executed through the uncached kseg1
//! window, so tests that don't target the caches see deterministic
//! single-cycle fetches. RAM beyond the program reads as zero, which
//! decodes as NOP — programs simply run off their end harmlessly.

use vr4300_core::common::constants::{KSEG0_BASE, KSEG1_BASE};
use vr4300_core::common::reg::{HI, LO, cp0};
use vr4300_core::sim::FunctionalCore;
use vr4300_core::{Bus, Config, Vr4300};

/// Default physical load address for test programs.
pub const PROG_BASE: u32 = 0x1000;
/// Scratch data area used by load/store tests.
pub const DATA_BASE: u32 = 0x8000;

/// Virtual (kseg1, uncached) address of a physical address.
pub fn kseg1(paddr: u32) -> u64 {
    KSEG1_BASE | u64::from(paddr)
}

/// Virtual (kseg0, cached) address of a physical address.
pub fn kseg0(paddr: u32) -> u64 {
    KSEG0_BASE | u64::from(paddr)
}

/// A pipelined core plus its bus.
pub struct TestSystem {
    /// The core under test.
    pub cpu: Vr4300,
    /// The bus, with a capturing UART.
    pub bus: Bus,
}

impl TestSystem {
    /// Builds a system with default configuration.
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            cpu: Vr4300::new(&config),
            bus: Bus::with_captured_uart(&config).expect("bus construction"),
        }
    }

    /// Writes a word image at a physical address.
    pub fn load_words(&mut self, paddr: u32, words: &[u32]) {
        for (i, &w) in words.iter().enumerate() {
            self.bus.write_word(paddr + (i as u32) * 4, w, !0);
        }
    }

    /// Loads a program at [`PROG_BASE`] and points the fetch PC at it
    /// through kseg1.
    pub fn load_program(&mut self, words: &[u32]) {
        self.load_words(PROG_BASE, words);
        self.cpu.set_fetch_pc(kseg1(PROG_BASE));
    }

    /// Runs the given number of cycles.
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            let _ = self.cpu.cycle(&mut self.bus);
        }
    }

    /// Loads a program and runs long enough for every instruction (plus
    /// slack for stalls) to retire.
    pub fn run_program(&mut self, words: &[u32]) {
        self.load_program(words);
        self.run(words.len() as u64 * 4 + 24);
    }

    /// Reads a GPR.
    pub fn gpr(&self, n: usize) -> u64 {
        self.cpu.regs.read(n)
    }

    /// Reads HI.
    pub fn hi(&self) -> u64 {
        self.cpu.regs.read(HI)
    }

    /// Reads LO.
    pub fn lo(&self) -> u64 {
        self.cpu.regs.read(LO)
    }

    /// Reads a CP0 register by architectural number.
    pub fn cp0(&self, n: usize) -> u64 {
        self.cpu.regs.cp0(n)
    }

    /// Reads the Cause exception code.
    pub fn exc_code(&self) -> u32 {
        ((self.cp0(cp0::CAUSE) >> 2) & 0x1F) as u32
    }
}

impl Default for TestSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// A functional core plus its bus.
pub struct FunctionalSystem {
    /// The reference model.
    pub cpu: FunctionalCore,
    /// The bus, with a capturing UART.
    pub bus: Bus,
}

impl FunctionalSystem {
    /// Builds a system with default configuration.
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            cpu: FunctionalCore::new(&config),
            bus: Bus::with_captured_uart(&config).expect("bus construction"),
        }
    }

    /// Writes a word image at a physical address.
    pub fn load_words(&mut self, paddr: u32, words: &[u32]) {
        for (i, &w) in words.iter().enumerate() {
            self.bus.write_word(paddr + (i as u32) * 4, w, !0);
        }
    }

    /// Loads a program at [`PROG_BASE`] and points the PC at it.
    pub fn load_program(&mut self, words: &[u32]) {
        self.load_words(PROG_BASE, words);
        self.cpu.pc = kseg1(PROG_BASE);
    }

    /// Executes the given number of instructions.
    pub fn step(&mut self, instructions: u64) {
        for _ in 0..instructions {
            let _ = self.cpu.step(&mut self.bus);
        }
    }

    /// Loads a program and executes exactly its length plus slack.
    pub fn run_program(&mut self, words: &[u32]) {
        self.load_program(words);
        self.step(words.len() as u64 + 8);
    }

    /// Reads a GPR.
    pub fn gpr(&self, n: usize) -> u64 {
        self.cpu.regs.read(n)
    }
}

impl Default for FunctionalSystem {
    fn default() -> Self {
        Self::new()
    }
}
