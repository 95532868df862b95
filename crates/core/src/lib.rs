//! VR4300 system simulator library.
//!
//! This crate implements a cycle-accurate MIPS III (VR4300) core together
//! with a functional reference model of the same ISA:
//! 1. **Core:** five-stage in-order pipeline (IC, RF, EX, DC, WB) with
//!    bypass/stall control, I- and D-caches, TLB, CP0 and CP1.
//! 2. **ISA:** the mask-cascade decoder and shared execution helpers both
//!    models agree on.
//! 3. **FPU:** bit-exact IEEE-754 primitives with process-wide rounding
//!    control.
//! 4. **SoC:** bus controller, red-black memory map, and the console UART.
//! 5. **Simulation:** S-record loader, functional interpreter, and the
//!    co-execution harness that compares the two models.

/// Common types and constants (addresses, registers, faults, requests).
pub mod common;
/// Simulator configuration (defaults and JSON-deserializable structures).
pub mod config;
/// The VR4300 core: pipeline, caches, TLB, coprocessors.
pub mod core;
/// Bit-exact floating-point primitives and rounding control.
pub mod fpu;
/// Instruction-set definitions shared by both execution models.
pub mod isa;
/// Simulation: loader, functional interpreter, co-execution harness.
pub mod sim;
/// System-on-chip: bus, memory map, devices.
pub mod soc;
/// Simulation statistics.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize JSON.
pub use crate::config::Config;
/// The pipelined core.
pub use crate::core::Vr4300;
/// The functional reference model.
pub use crate::sim::interp::FunctionalCore;
/// The system bus; construct with `Bus::new`.
pub use crate::soc::Bus;
