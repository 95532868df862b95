//! Simulation statistics.
//!
//! Counters the core increments as it runs, reported at the end of a run
//! or inspected by tests. Purely observational: nothing reads these back
//! into the simulation.

/// Counter block for one core.
#[derive(Debug, Default, Clone)]
pub struct SimStats {
    /// Pipeline cycles executed (or instructions, for the functional model).
    pub cycles: u64,
    /// Instructions retired at writeback.
    pub retired: u64,
    /// I-cache hits.
    pub icache_hits: u64,
    /// I-cache misses.
    pub icache_misses: u64,
    /// D-cache hits.
    pub dcache_hits: u64,
    /// D-cache misses.
    pub dcache_misses: u64,
    /// Cycles lost to multi-cycle interlocks.
    pub mci_stall_cycles: u64,
    /// Cycles lost to cache fills and write-backs.
    pub memory_stall_cycles: u64,
    /// Architectural exceptions taken (including interrupts).
    pub exceptions: u64,
}

impl SimStats {
    /// Prints a summary to stderr.
    pub fn print(&self) {
        eprintln!("cycles:        {}", self.cycles);
        eprintln!("retired:       {}", self.retired);
        eprintln!(
            "i-cache:       {} hits / {} misses",
            self.icache_hits, self.icache_misses
        );
        eprintln!(
            "d-cache:       {} hits / {} misses",
            self.dcache_hits, self.dcache_misses
        );
        eprintln!(
            "stall cycles:  {} interlock / {} memory",
            self.mci_stall_cycles, self.memory_stall_cycles
        );
        eprintln!("exceptions:    {}", self.exceptions);
    }
}
