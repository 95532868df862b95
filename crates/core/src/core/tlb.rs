//! TLB and virtual address translation.
//!
//! The VR4300 translates through 32 fully-associative TLB entries, each
//! mapping a pair of physical frames (even/odd) under a configurable page
//! mask. The kernel unmapped windows (kseg0/kseg1) bypass the TLB
//! entirely; every other region — kuseg, kseg2 and the 64-bit spaces —
//! takes the TLB path and faults on a miss.

use crate::common::constants::{
    KSEG0_BASE, KSEG1_BASE, KSEG2_BASE, KSEG_STRIP, KUSEG_LIMIT, TLB_ENTRIES,
};
use crate::common::{AccessMode, Exception, Fault, PhysAddr, TranslationResult};

/// One TLB entry, stored as the raw architectural register values.
#[derive(Clone, Copy, Debug, Default)]
pub struct TlbEntry {
    /// PageMask register value: the don't-care bits of the VPN comparison.
    pub page_mask: u64,
    /// EntryHi value: VPN2 and ASID.
    pub entry_hi: u64,
    /// EntryLo0: even-page frame, coherency, dirty, valid.
    pub entry_lo0: u64,
    /// EntryLo1: odd-page frame, coherency, dirty, valid.
    pub entry_lo1: u64,
    /// Global: the entry matches regardless of ASID.
    pub global: bool,
}

/// Result of a successful TLB hit.
struct TlbHit {
    pfn: u32,
    offset_mask: u64,
    valid: bool,
    dirty: bool,
    cached: bool,
}

/// The translation lookaside buffer.
#[derive(Debug)]
pub struct Tlb {
    entries: [TlbEntry; TLB_ENTRIES],
}

impl Tlb {
    /// Creates a TLB in its reset state. Every entry's VPN points into
    /// the kseg0 window, which translation never looks up, so an
    /// uninitialised entry can never match a mapped address (a zeroed
    /// EntryHi would otherwise claim VPN2 0).
    pub fn new() -> Self {
        let mut entries = [TlbEntry::default(); TLB_ENTRIES];
        for e in &mut entries {
            e.entry_hi = KSEG0_BASE;
        }
        Self { entries }
    }

    /// Writes an entry from the architectural register images, as `TLBWI`
    /// and `TLBWR` do. The global flag is the AND of the two EntryLo G
    /// bits.
    pub fn write(&mut self, index: usize, page_mask: u64, entry_hi: u64, lo0: u64, lo1: u64) {
        self.entries[index % TLB_ENTRIES] = TlbEntry {
            page_mask,
            entry_hi,
            entry_lo0: lo0,
            entry_lo1: lo1,
            global: (lo0 & lo1 & 1) != 0,
        };
    }

    /// Reads an entry back into register images, as `TLBR` does. The
    /// global flag reappears as the G bit of both EntryLo values.
    pub fn read(&self, index: usize) -> (u64, u64, u64, u64) {
        let e = &self.entries[index % TLB_ENTRIES];
        let g = u64::from(e.global);
        (e.page_mask, e.entry_hi, e.entry_lo0 | g, e.entry_lo1 | g)
    }

    /// Probes for an entry matching the given EntryHi image, as `TLBP`
    /// does.
    pub fn probe(&self, entry_hi: u64) -> Option<usize> {
        let asid = entry_hi & 0xFF;
        self.entries.iter().position(|e| {
            let vpn_mask = !(e.page_mask | 0x1FFF);
            (e.entry_hi & vpn_mask) == (entry_hi & vpn_mask)
                && (e.global || (e.entry_hi & 0xFF) == asid)
        })
    }

    /// Looks up a virtual address in the mapped region.
    fn lookup(&self, vaddr: u64, asid: u64) -> Option<TlbHit> {
        for e in &self.entries {
            let vpn_mask = !(e.page_mask | 0x1FFF);
            if (vaddr & vpn_mask) != (e.entry_hi & vpn_mask) {
                continue;
            }
            if !e.global && (e.entry_hi & 0xFF) != asid {
                continue;
            }

            // Page size follows the mask; bit above the offset selects the
            // even or odd frame of the pair.
            let offset_mask = (e.page_mask >> 1) | 0xFFF;
            let odd = vaddr & (offset_mask + 1) != 0;
            let lo = if odd { e.entry_lo1 } else { e.entry_lo0 };

            return Some(TlbHit {
                pfn: ((lo >> 6) & 0x00FF_FFFF) as u32,
                offset_mask,
                valid: lo & 0x2 != 0,
                dirty: lo & 0x4 != 0,
                cached: (lo >> 3) & 0x7 != 2,
            });
        }
        None
    }

    /// Translates a virtual address to a physical address.
    ///
    /// kseg0 and kseg1 strip the high bits without consulting the TLB
    /// (kseg1 uncached). Everything else is TLB-mapped: a miss raises
    /// TLBL/TLBS with the refill flag, a matching invalid entry raises
    /// TLBL/TLBS without it, and a store to a clean page raises Mod.
    pub fn translate(&self, vaddr: u64, asid: u64, mode: AccessMode) -> TranslationResult {
        if (KSEG0_BASE..KSEG1_BASE).contains(&vaddr) {
            return TranslationResult::success(PhysAddr::new((vaddr & KSEG_STRIP) as u32), true);
        }
        if (KSEG1_BASE..KSEG2_BASE).contains(&vaddr) {
            return TranslationResult::success(PhysAddr::new((vaddr & KSEG_STRIP) as u32), false);
        }

        // kuseg, kseg2/kseg3 and the 64-bit spaces all take the TLB path.
        let mapped = vaddr < KUSEG_LIMIT || vaddr >= KSEG2_BASE || vaddr < KSEG0_BASE;
        debug_assert!(mapped);

        let exception = |refill| {
            let exc = match mode {
                AccessMode::Store => Exception::TlbStore,
                _ => Exception::TlbLoad,
            };
            TranslationResult::fault(Fault {
                exception: exc,
                bad_vaddr: Some(vaddr),
                refill,
            })
        };

        match self.lookup(vaddr, asid) {
            None => exception(true),
            Some(hit) if !hit.valid => exception(false),
            Some(hit) if mode == AccessMode::Store && !hit.dirty => {
                TranslationResult::fault(Fault::at(Exception::TlbModification, vaddr))
            }
            Some(hit) => {
                let frame = (u64::from(hit.pfn) << 12) & !hit.offset_mask;
                let paddr = (frame | (vaddr & hit.offset_mask)) as u32;
                TranslationResult::success(PhysAddr::new(paddr), hit.cached)
            }
        }
    }
}

impl Default for Tlb {
    fn default() -> Self {
        Self::new()
    }
}
