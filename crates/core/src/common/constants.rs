//! System-wide architectural constants.
//!
//! Addresses, masks, and fixed hardware parameters shared by the pipeline,
//! the translator, and the caches. Timing parameters that a user may want
//! to vary live in [`crate::config`] instead.

/// Base of the sign-extended kseg0 window (unmapped, cached).
pub const KSEG0_BASE: u64 = 0xFFFF_FFFF_8000_0000;
/// Base of the sign-extended kseg1 window (unmapped, uncached).
pub const KSEG1_BASE: u64 = 0xFFFF_FFFF_A000_0000;
/// Base of the sign-extended kseg2 window (TLB-mapped).
pub const KSEG2_BASE: u64 = 0xFFFF_FFFF_C000_0000;
/// Exclusive upper bound of kuseg in 32-bit compatibility space.
pub const KUSEG_LIMIT: u64 = 0x0000_0000_8000_0000;
/// Mask that strips a kseg0/kseg1 virtual address down to its physical bits.
pub const KSEG_STRIP: u64 = 0x1FFF_FFFF;

/// Architectural reset vector (kseg1, uncached).
pub const RESET_VECTOR: u64 = 0xFFFF_FFFF_BFC0_0000;
/// Exception vector base when `Status.BEV` is clear.
pub const VECTOR_BASE: u64 = 0xFFFF_FFFF_8000_0000;
/// Exception vector base when `Status.BEV` is set (bootstrap, uncached).
pub const VECTOR_BASE_BEV: u64 = 0xFFFF_FFFF_BFC0_0200;
/// Offset of the 32-bit TLB refill vector from the vector base.
pub const VECTOR_TLB_REFILL: u64 = 0x000;
/// Offset of the 64-bit (XTLB) refill vector from the vector base.
pub const VECTOR_XTLB_REFILL: u64 = 0x080;
/// Offset of the general exception vector from the vector base.
pub const VECTOR_GENERAL: u64 = 0x180;

/// Number of TLB entries in the VR4300.
pub const TLB_ENTRIES: usize = 32;

/// Number of lines in each cache (both caches are direct-mapped).
pub const CACHE_LINES: usize = 512;
/// Bytes per cache line.
pub const CACHE_LINE_BYTES: usize = 16;
/// Shift from a byte address to a line index.
pub const CACHE_INDEX_SHIFT: u32 = 4;
/// Mask selecting the line index from a shifted virtual address.
pub const CACHE_INDEX_MASK: u32 = 0x1FF;

/// `Count` advances once for every this many pipeline cycles (master/2).
pub const COUNT_DIVIDER: u64 = 2;

/// Instruction word of a NOP (`SLL r0, r0, 0`).
pub const NOP_IW: u32 = 0x0000_0000;
