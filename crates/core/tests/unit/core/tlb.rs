//! TLB and translation tests.

use pretty_assertions::assert_eq;

use vr4300_core::common::constants::{KSEG0_BASE, KSEG1_BASE};
use vr4300_core::common::{AccessMode, Exception};
use vr4300_core::core::tlb::Tlb;

/// EntryHi for a 4 KiB-page mapping of `vaddr` with an ASID.
fn entry_hi(vaddr: u64, asid: u64) -> u64 {
    (vaddr & !0x1FFF) | asid
}

/// EntryLo mapping a physical frame: PFN, cached, dirty, valid.
fn entry_lo(pfn: u64, dirty: bool, valid: bool) -> u64 {
    (pfn << 6) | (0x3 << 3) | (u64::from(dirty) << 2) | (u64::from(valid) << 1)
}

/// kseg0/kseg1 strip the window bits without touching the TLB; kseg1 is
/// uncached.
#[test]
fn unmapped_windows() {
    let tlb = Tlb::new();

    let r = tlb.translate(KSEG0_BASE | 0x1234, 0, AccessMode::Load);
    assert!(r.fault.is_none());
    assert_eq!(r.paddr.val(), 0x1234);
    assert!(r.cached);

    let r = tlb.translate(KSEG1_BASE | 0x1234, 0, AccessMode::Load);
    assert!(r.fault.is_none());
    assert_eq!(r.paddr.val(), 0x1234);
    assert!(!r.cached);
}

/// A kuseg miss raises the refill flavour of TLBL/TLBS with the exact
/// faulting address.
#[test]
fn kuseg_miss_is_refill() {
    let tlb = Tlb::new();

    let r = tlb.translate(0x1000, 0, AccessMode::Load);
    let fault = r.fault.expect("must miss");
    assert_eq!(fault.exception, Exception::TlbLoad);
    assert_eq!(fault.bad_vaddr, Some(0x1000));
    assert!(fault.refill);

    let r = tlb.translate(0x2000, 0, AccessMode::Store);
    assert_eq!(r.fault.expect("must miss").exception, Exception::TlbStore);
}

/// A written entry is immediately visible to translation, selecting the
/// even or odd frame by the page selector bit.
#[test]
fn write_then_translate_even_odd() {
    let mut tlb = Tlb::new();
    tlb.write(0, 0, entry_hi(0x0000_4000, 0), entry_lo(0x100, true, true), entry_lo(0x101, true, true));

    let even = tlb.translate(0x4010, 0, AccessMode::Load);
    assert!(even.fault.is_none());
    assert_eq!(even.paddr.val(), 0x10_0010);

    let odd = tlb.translate(0x5010, 0, AccessMode::Load);
    assert!(odd.fault.is_none());
    assert_eq!(odd.paddr.val(), 0x10_1010);
}

/// A matching entry with the valid bit clear raises TLBL without the
/// refill flag (general vector, not refill vector).
#[test]
fn invalid_entry_is_not_refill() {
    let mut tlb = Tlb::new();
    tlb.write(0, 0, entry_hi(0x4000, 0), entry_lo(0x100, true, false), entry_lo(0x101, true, false));

    let fault = tlb.translate(0x4000, 0, AccessMode::Load).fault.expect("invalid");
    assert_eq!(fault.exception, Exception::TlbLoad);
    assert!(!fault.refill);
}

/// A store through a clean page raises Mod; a load does not.
#[test]
fn clean_page_store_raises_mod() {
    let mut tlb = Tlb::new();
    tlb.write(0, 0, entry_hi(0x4000, 0), entry_lo(0x100, false, true), entry_lo(0x101, false, true));

    assert!(tlb.translate(0x4000, 0, AccessMode::Load).fault.is_none());
    let fault = tlb.translate(0x4000, 0, AccessMode::Store).fault.expect("clean");
    assert_eq!(fault.exception, Exception::TlbModification);
}

/// ASID participates in matching unless the entry is global.
#[test]
fn asid_matching_and_global() {
    let mut tlb = Tlb::new();
    tlb.write(0, 0, entry_hi(0x4000, 7), entry_lo(0x100, true, true), entry_lo(0x101, true, true));

    assert!(tlb.translate(0x4000, 7, AccessMode::Load).fault.is_none());
    assert!(tlb.translate(0x4000, 8, AccessMode::Load).fault.is_some());

    // Global bit: both EntryLo G bits set.
    tlb.write(
        1,
        0,
        entry_hi(0x8000, 7),
        entry_lo(0x200, true, true) | 1,
        entry_lo(0x201, true, true) | 1,
    );
    assert!(tlb.translate(0x8000, 99, AccessMode::Load).fault.is_none());
}

/// TLBP-style probe finds the matching index.
#[test]
fn probe() {
    let mut tlb = Tlb::new();
    tlb.write(5, 0, entry_hi(0x4000, 3), entry_lo(0x100, true, true), entry_lo(0x101, true, true));

    assert_eq!(tlb.probe(entry_hi(0x4000, 3)), Some(5));
    assert_eq!(tlb.probe(entry_hi(0x4000, 4)), None);
    assert_eq!(tlb.probe(entry_hi(0x6000, 3)), None);
}

/// TLBR reads back what TLBWI wrote, with the global bit folded into
/// both EntryLo images.
#[test]
fn read_back() {
    let mut tlb = Tlb::new();
    let (hi, lo0, lo1) = (
        entry_hi(0x4000, 3),
        entry_lo(0x100, true, true) | 1,
        entry_lo(0x101, false, true) | 1,
    );
    tlb.write(9, 0x0000, hi, lo0, lo1);

    let (mask, r_hi, r_lo0, r_lo1) = tlb.read(9);
    assert_eq!(mask, 0);
    assert_eq!(r_hi, hi);
    assert_eq!(r_lo0, lo0);
    assert_eq!(r_lo1, lo1);
}

/// A page mask widens the page and moves the even/odd selector bit.
#[test]
fn page_mask_16k() {
    let mut tlb = Tlb::new();
    // 16 KiB pages: mask covers bits 14:13.
    let mask = 0x6000;
    tlb.write(
        0,
        mask,
        entry_hi(0x0010_0000, 0),
        entry_lo(0x100, true, true),
        entry_lo(0x200, true, true),
    );

    // Offsets within the 16 KiB even page.
    let r = tlb.translate(0x0010_3FFC, 0, AccessMode::Load);
    assert!(r.fault.is_none());
    assert_eq!(r.paddr.val(), 0x10_3FFC);

    // The odd page starts 16 KiB in.
    let r = tlb.translate(0x0010_4000, 0, AccessMode::Load);
    assert!(r.fault.is_none());
    assert_eq!(r.paddr.val(), 0x20_0000);
}
