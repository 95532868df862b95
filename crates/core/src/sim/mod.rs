//! Simulation layer.
//!
//! 1. **Loader:** Motorola S-record images into the memory image.
//! 2. **Interpreter:** the functional one-instruction-at-a-time oracle.
//! 3. **Co-execution:** both models over one bus, compared by register.

/// Co-execution harness.
pub mod cosim;

/// Functional reference model.
pub mod interp;

/// S-record image loader.
pub mod loader;

pub use cosim::CoSim;
pub use interp::FunctionalCore;
pub use loader::{load_srec, load_srec_file};
