//! Architectural exceptions and host-side errors.
//!
//! Two taxonomies live here and must not be confused:
//! 1. **`Exception`** — guest-visible architectural exceptions, delivered
//!    through CP0 and never surfaced to the host as failures.
//! 2. **`SimError`** — host-side fatal errors (bad images, bad config)
//!    that abort the simulation with a diagnostic.

use std::fmt;

use super::addr::PhysAddr;

/// MIPS architectural exception causes.
///
/// The discriminant order is not meaningful; [`Exception::code`] produces
/// the architectural `ExcCode` value written into `Cause`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exception {
    /// Interrupt (asynchronous; `Cause.IP & Status.IM` nonzero).
    Interrupt,
    /// TLB modification: store to a matching entry with the dirty bit clear.
    TlbModification,
    /// TLB miss or invalid entry on a load or instruction fetch.
    TlbLoad,
    /// TLB miss or invalid entry on a store.
    TlbStore,
    /// Address error on a load or fetch (misalignment or bad region).
    AddressLoad,
    /// Address error on a store.
    AddressStore,
    /// Bus error on an instruction fetch.
    BusFetch,
    /// Bus error on a data access.
    BusData,
    /// `SYSCALL` executed.
    Syscall,
    /// `BREAK` executed.
    Breakpoint,
    /// Reserved or undecodable instruction word.
    ReservedInstruction,
    /// Coprocessor unusable; the payload is the coprocessor number.
    CoprocessorUnusable(u8),
    /// Two's-complement overflow in `ADD`/`ADDI`/`SUB`.
    Overflow,
    /// Trap instruction condition met (`TNE` and friends).
    Trap,
    /// Floating-point exception.
    FloatingPoint,
    /// Watchpoint hit.
    Watch,
}

impl Exception {
    /// Architectural `ExcCode` value for the `Cause` register.
    pub fn code(self) -> u32 {
        match self {
            Exception::Interrupt => 0,
            Exception::TlbModification => 1,
            Exception::TlbLoad => 2,
            Exception::TlbStore => 3,
            Exception::AddressLoad => 4,
            Exception::AddressStore => 5,
            Exception::BusFetch => 6,
            Exception::BusData => 7,
            Exception::Syscall => 8,
            Exception::Breakpoint => 9,
            Exception::ReservedInstruction => 10,
            Exception::CoprocessorUnusable(_) => 11,
            Exception::Overflow => 12,
            Exception::Trap => 13,
            Exception::FloatingPoint => 15,
            Exception::Watch => 23,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exception::CoprocessorUnusable(n) => write!(f, "CoprocessorUnusable({})", n),
            other => write!(f, "{:?}", other),
        }
    }
}

/// An exception in flight through the pipeline.
///
/// Carried in the `fault` field of a latch common block until it reaches
/// the service point. `refill` distinguishes a true TLB miss (refill
/// vector) from a matching-but-invalid entry (general vector).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fault {
    /// The architectural cause.
    pub exception: Exception,
    /// Faulting virtual address, for the BadVAddr family.
    pub bad_vaddr: Option<u64>,
    /// True when the TLB had no matching entry at all.
    pub refill: bool,
}

impl Fault {
    /// A fault with no associated address (Sys, Bp, RI, Ov, ...).
    pub fn new(exception: Exception) -> Self {
        Self {
            exception,
            bad_vaddr: None,
            refill: false,
        }
    }

    /// A fault that records the offending virtual address.
    pub fn at(exception: Exception, vaddr: u64) -> Self {
        Self {
            exception,
            bad_vaddr: Some(vaddr),
            refill: false,
        }
    }
}

/// Outcome of a virtual-to-physical translation.
#[derive(Debug)]
pub struct TranslationResult {
    /// The physical address; zero when translation faulted.
    pub paddr: PhysAddr,
    /// Whether the access goes through the cache hierarchy.
    pub cached: bool,
    /// The fault raised, if translation failed.
    pub fault: Option<Fault>,
}

impl TranslationResult {
    /// A successful translation.
    #[inline]
    pub fn success(paddr: PhysAddr, cached: bool) -> Self {
        Self {
            paddr,
            cached,
            fault: None,
        }
    }

    /// A failed translation.
    #[inline]
    pub fn fault(fault: Fault) -> Self {
        Self {
            paddr: PhysAddr(0),
            cached: false,
            fault: Some(fault),
        }
    }
}

/// Host-side fatal errors.
///
/// These abort the run; nothing in this enum is ever visible to the guest.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The S-record image could not be read or parsed.
    #[error("S-record image error: {0}")]
    Image(String),

    /// A load address fell outside the physical memory image.
    #[error("image record at {addr:#010x} does not fit in {mem_size:#x} bytes of RAM")]
    ImageBounds {
        /// Physical address of the offending record.
        addr: u32,
        /// Configured memory size.
        mem_size: u32,
    },

    /// The configuration file could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(String),

    /// An overlapping range was handed to the memory map.
    #[error("memory map ranges overlap at {0:#010x}")]
    MapOverlap(u32),
}
