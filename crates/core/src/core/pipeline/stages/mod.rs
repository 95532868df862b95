//! Pipeline stage implementations.
//!
//! One file per stage, in pipeline order: IC (fetch), RF (register
//! fetch/decode), EX (execute), DC (data cache), WB (writeback). The
//! driver in [`crate::core::pipeline`] invokes them in reverse.

/// EX stage: dispatch and execute.
pub mod execute;

/// IC stage: instruction fetch.
pub mod fetch;

/// DC stage: data-cache access and fault servicing.
pub mod memory;

/// RF stage: decode, operand fetch, hazard detection.
pub mod regfetch;

/// WB stage: register-file commit.
pub mod writeback;

pub(crate) use execute::ex_stage;
pub(crate) use fetch::ic_stage;
pub(crate) use memory::dc_stage;
pub(crate) use regfetch::rf_stage;
pub(crate) use writeback::wb_stage;
