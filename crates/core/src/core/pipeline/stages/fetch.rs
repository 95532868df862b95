//! IC stage: instruction fetch.
//!
//! Translates the fetch PC, probes the I-cache for cached regions, and
//! delivers the fetched word toward RF through the ICRF latch. A miss
//! fills the line from the bus and charges the fill latency; uncached
//! fetches read the bus directly. Translation faults ride the latch to
//! the DC boundary rather than being serviced here, preserving the
//! in-order exception model.

use crate::common::constants::CACHE_LINE_BYTES;
use crate::common::reg::cp0;
use crate::common::{AccessMode, Exception, Fault};
use crate::core::Vr4300;
use crate::core::pipeline::latches::LatchCommon;
use crate::soc::Bus;

/// Fetches the instruction at the current fetch PC.
pub(crate) fn ic_stage(cpu: &mut Vr4300, bus: &mut Bus) {
    let pc = cpu.pipeline.icrf.pc;
    let mut common = LatchCommon {
        pc,
        fault: None,
        killed: false,
        delay_slot: false,
    };
    let mut iw = 0;

    if pc & 3 != 0 {
        common.fault = Some(Fault::at(Exception::AddressLoad, pc));
    } else {
        let asid = cpu.regs.cp0(cp0::ENTRY_HI) & 0xFF;
        let translated = cpu.tlb.translate(pc, asid, AccessMode::Fetch);
        if let Some(fault) = translated.fault {
            common.fault = Some(fault);
        } else {
            let paddr = translated.paddr.val();
            if translated.cached {
                iw = fetch_cached(cpu, bus, pc, paddr);
            } else {
                iw = bus.read_word(paddr);
            }
        }
    }

    if cpu.trace {
        eprintln!("IC  pc={:#018x} iw={:#010x}", pc, iw);
    }

    cpu.pipeline.icrf.common = common;
    cpu.pipeline.icrf.iw = iw;
    cpu.pipeline.icrf.pc = pc.wrapping_add(4);
}

/// Probes the I-cache, filling the line on a miss and charging the fill
/// latency.
fn fetch_cached(cpu: &mut Vr4300, bus: &mut Bus, pc: u64, paddr: u32) -> u32 {
    let offset = (pc & 0xF) as usize;
    if let Some(line) = cpu.icache.probe(pc, paddr) {
        cpu.stats.icache_hits += 1;
        return line.word(offset);
    }

    cpu.stats.icache_misses += 1;
    let base = paddr & !(CACHE_LINE_BYTES as u32 - 1);
    let mut data = [0u8; CACHE_LINE_BYTES];
    for i in 0..CACHE_LINE_BYTES / 4 {
        let word = bus.read_word(base + (i as u32) * 4);
        data[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    cpu.icache.fill(pc, paddr, data);
    let fill = cpu.timing.icache_fill;
    cpu.memory_stall(fill);

    cpu.icache
        .probe(pc, paddr)
        .map(|line| line.word(offset))
        .unwrap_or(0)
}
