//! Configuration for the simulator.
//!
//! This module defines the configuration structures used to parameterize a
//! run. It provides:
//! 1. **Defaults:** baseline hardware constants (RAM, UART, timings).
//! 2. **Structures:** hierarchical config for system, timing, and harness.
//!
//! Configuration is supplied as JSON via `--config` or built with
//! `Config::default()`.

use serde::Deserialize;

/// Default configuration constants.
mod defaults {
    /// Physical memory size (64 MiB), matching the stock system image.
    pub const MEM_SIZE: u32 = 64 * 1024 * 1024;

    /// Base physical address of the UART register window.
    ///
    /// The window is word-addressed: register N lives at `base + 4 * N`.
    pub const UART_BASE: u32 = 0x1400_03F8;

    /// Size of the UART register window in bytes (8 word registers).
    pub const UART_SIZE: u32 = 0x20;

    /// Cycles the pipeline stalls while an I-cache line is filled.
    pub const ICACHE_FILL: u64 = 8;

    /// Cycles the pipeline stalls while a D-cache line is filled.
    pub const DCACHE_FILL: u64 = 8;

    /// Additional stall cycles when a dirty victim must be written back.
    pub const WRITEBACK_PENALTY: u64 = 4;

    /// MCI interlock for `MULT`/`MULTU`/`MUL`.
    pub const MULT_CYCLES: u32 = 5;

    /// MCI interlock for `DIV`/`DIVU`.
    pub const DIV_CYCLES: u32 = 37;

    /// Cycles a worker thread runs per mutex acquisition.
    pub const BATCH_CYCLES: u32 = 10_000;
}

/// Physical layout of the system.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Physical memory size in bytes; addresses below this are RAM.
    pub mem_size: u32,
    /// Base physical address of the UART window.
    pub uart_base: u32,
    /// Size of the UART window in bytes.
    pub uart_size: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            mem_size: defaults::MEM_SIZE,
            uart_base: defaults::UART_BASE,
            uart_size: defaults::UART_SIZE,
        }
    }
}

/// Stall and interlock timings.
///
/// The FPU interlock table is architectural and not configurable; these
/// cover the memory system and the integer multiplier/divider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// I-cache miss fill latency in cycles.
    pub icache_fill: u64,
    /// D-cache miss fill latency in cycles.
    pub dcache_fill: u64,
    /// Extra cycles for writing back a dirty victim line.
    pub writeback_penalty: u64,
    /// MCI interlock raised by `MULT`/`MULTU`/`MUL`.
    pub mult_cycles: u32,
    /// MCI interlock raised by `DIV`/`DIVU`.
    pub div_cycles: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            icache_fill: defaults::ICACHE_FILL,
            dcache_fill: defaults::DCACHE_FILL,
            writeback_penalty: defaults::WRITEBACK_PENALTY,
            mult_cycles: defaults::MULT_CYCLES,
            div_cycles: defaults::DIV_CYCLES,
        }
    }
}

/// Harness parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Cycles (or instructions, for the functional model) a worker thread
    /// executes per mutex acquisition before yielding to the console.
    pub batch_cycles: u32,
    /// Echo retired-instruction trace to stderr.
    pub trace: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            batch_cycles: defaults::BATCH_CYCLES,
            trace: false,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Physical layout.
    pub system: SystemConfig,
    /// Stall and interlock timings.
    pub timing: TimingConfig,
    /// Harness parameters.
    pub harness: HarnessConfig,
}

impl Config {
    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::common::SimError::Config`] when the JSON does not
    /// deserialize.
    pub fn from_json(text: &str) -> Result<Self, crate::common::SimError> {
        serde_json::from_str(text).map_err(|e| crate::common::SimError::Config(e.to_string()))
    }
}
