//! DC stage: data-cache access, bus requests, and fault servicing.
//!
//! Consumes the EXDC latch. Faults that rode this far — from fetch,
//! decode, or execute — are serviced here, at the last point before
//! commit, so older instructions have already completed in order. A
//! pending memory request is translated and executed: cached accesses go
//! through the D-cache with write-back/write-allocate, uncached accesses
//! straight to the bus, and `CACHE` operations manipulate lines directly.

use crate::common::constants::CACHE_LINE_BYTES;
use crate::common::reg::cp0;
use crate::common::{AccessKind, AccessMode, BusRequest, RequestKind};
use crate::core::Vr4300;
use crate::core::arith::se32;
use crate::core::dcache::CacheOp;
use crate::core::pipeline::latches::{DcwbLatch, ExdcLatch};
use crate::isa::unaligned::{merge_lwl, merge_lwr};
use crate::soc::Bus;

/// Runs the DC stage. Returns true when an exception was entered this
/// cycle (the caller ends the cycle; younger slots are already dead).
pub(crate) fn dc_stage(cpu: &mut Vr4300, bus: &mut Bus) -> bool {
    let exdc = cpu.pipeline.exdc;
    cpu.pipeline.exdc = ExdcLatch::default();

    if exdc.common.killed {
        cpu.pipeline.dcwb = DcwbLatch::default();
        return false;
    }
    if let Some(fault) = exdc.common.fault {
        cpu.service_exception(&exdc.common, fault);
        cpu.pipeline.dcwb = DcwbLatch::default();
        return true;
    }

    let mut result = exdc.result;
    if let Some(req) = exdc.request {
        let mode = match req.kind {
            RequestKind::Write => AccessMode::Store,
            _ => AccessMode::Load,
        };
        let asid = cpu.regs.cp0(cp0::ENTRY_HI) & 0xFF;
        let translated = cpu.tlb.translate(req.vaddr, asid, mode);
        if let Some(fault) = translated.fault {
            cpu.service_exception(&exdc.common, fault);
            cpu.pipeline.dcwb = DcwbLatch::default();
            return true;
        }
        let paddr = translated.paddr.val();
        let cached = translated.cached;

        match req.kind {
            RequestKind::Read { signed } => {
                result = load_value(cpu, bus, &req, paddr, cached, signed, exdc.result);
            }
            RequestKind::Write => store_value(cpu, bus, &req, paddr, cached),
            RequestKind::CacheOp(op) => cache_op(cpu, bus, op, req.vaddr, paddr),
        }
    }

    cpu.pipeline.dcwb = DcwbLatch {
        common: exdc.common,
        dest: exdc.dest,
        result,
    };
    false
}

/// Makes the line for the address pair resident, filling (and writing
/// back a dirty victim) on miss, and charges the stall. Returns the line
/// index.
fn ensure_line(cpu: &mut Vr4300, bus: &mut Bus, vaddr: u64, paddr: u32) -> usize {
    if let Some(idx) = cpu.dcache.probe(vaddr, paddr) {
        cpu.stats.dcache_hits += 1;
        return idx;
    }
    cpu.stats.dcache_misses += 1;

    let mut stall = cpu.timing.dcache_fill;
    if let Some((victim_paddr, data)) = cpu.dcache.should_flush_line(vaddr) {
        write_line(bus, victim_paddr, &data);
        stall += cpu.timing.writeback_penalty;
    }

    let base = paddr & !(CACHE_LINE_BYTES as u32 - 1);
    let mut data = [0u8; CACHE_LINE_BYTES];
    for i in 0..CACHE_LINE_BYTES / 4 {
        let word = bus.read_word(base + (i as u32) * 4);
        data[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    let idx = cpu.dcache.fill(vaddr, paddr, data);
    cpu.memory_stall(stall);
    idx
}

/// Writes a full line back through the bus.
fn write_line(bus: &mut Bus, paddr: u32, data: &[u8; CACHE_LINE_BYTES]) {
    for i in 0..CACHE_LINE_BYTES / 4 {
        let word = u32::from_le_bytes([
            data[i * 4],
            data[i * 4 + 1],
            data[i * 4 + 2],
            data[i * 4 + 3],
        ]);
        bus.write_word(paddr + (i as u32) * 4, word, !0);
    }
}

/// Reads one aligned word, through the resident line or the bus.
fn read_aligned(
    cpu: &Vr4300,
    bus: &mut Bus,
    line: Option<usize>,
    vaddr: u64,
    paddr: u32,
) -> u32 {
    match line {
        Some(idx) => cpu.dcache.line(idx).word((vaddr & 0xF) as usize),
        None => bus.read_word(paddr),
    }
}

/// Executes a read request and produces the register result.
fn load_value(
    cpu: &mut Vr4300,
    bus: &mut Bus,
    req: &BusRequest,
    paddr: u32,
    cached: bool,
    signed: bool,
    merge_base: u64,
) -> u64 {
    let a = req.vaddr;
    let line = cached.then(|| ensure_line(cpu, bus, a, paddr));

    let word = read_aligned(cpu, bus, line, a & !3, paddr & !3);
    let value = match req.access {
        AccessKind::Byte => {
            let b = u64::from((word >> (8 * (a & 3) as u32)) & 0xFF);
            if signed { b as u8 as i8 as i64 as u64 } else { b }
        }
        AccessKind::Half => {
            let h = u64::from((word >> (8 * (a & 3) as u32)) & 0xFFFF);
            if signed { h as u16 as i16 as i64 as u64 } else { h }
        }
        AccessKind::Word => {
            if signed {
                se32(u64::from(word))
            } else {
                u64::from(word)
            }
        }
        AccessKind::Dword => {
            let hi = read_aligned(cpu, bus, line, (a & !7) + 4, (paddr & !7) + 4);
            u64::from(word) | (u64::from(hi) << 32)
        }
        AccessKind::WordLeft => {
            return se32(u64::from(merge_lwl(req.data as u32, word, a)));
        }
        AccessKind::WordRight => {
            return se32(u64::from(merge_lwr(req.data as u32, word, a)));
        }
    };
    merge_base | (value << req.postshift)
}

/// Executes a write request through the cache or the bus.
fn store_value(cpu: &mut Vr4300, bus: &mut Bus, req: &BusRequest, paddr: u32, cached: bool) {
    let a = req.vaddr;

    // Decompose into aligned word lanes: (vaddr, paddr, data, mask).
    let mut lanes = [(0u64, 0u32, 0u32, 0u32); 2];
    let n = match req.access {
        AccessKind::Byte | AccessKind::Half => {
            let shift = 8 * (a & 3) as u32;
            lanes[0] = (
                a & !3,
                paddr & !3,
                (req.data as u32) << shift,
                (req.wdqm as u32) << shift,
            );
            1
        }
        AccessKind::Word | AccessKind::WordLeft | AccessKind::WordRight => {
            lanes[0] = (a & !3, paddr & !3, req.data as u32, req.wdqm as u32);
            1
        }
        AccessKind::Dword => {
            lanes[0] = (a, paddr, req.data as u32, req.wdqm as u32);
            lanes[1] = (a + 4, paddr + 4, (req.data >> 32) as u32, (req.wdqm >> 32) as u32);
            2
        }
    };

    if cached {
        let idx = ensure_line(cpu, bus, a, paddr);
        for &(va, _, data, dqm) in &lanes[..n] {
            cpu.dcache
                .line_mut(idx)
                .merge_word((va & 0xF) as usize, data, dqm);
        }
        cpu.dcache.set_dirty(idx);
    } else {
        for &(_, pa, data, dqm) in &lanes[..n] {
            bus.write_word(pa, data, dqm);
        }
    }
}

/// Executes a `CACHE` instruction operation.
fn cache_op(cpu: &mut Vr4300, bus: &mut Bus, op: CacheOp, vaddr: u64, paddr: u32) {
    match op {
        CacheOp::IcIndexInvalidate => cpu.icache.index_invalidate(vaddr),
        CacheOp::IcHitInvalidate => cpu.icache.hit_invalidate(vaddr, paddr),
        CacheOp::DcIndexWbInvalidate => {
            if let Some((victim_paddr, data)) = cpu.dcache.wb_invalidate(vaddr) {
                write_line(bus, victim_paddr, &data);
                let penalty = cpu.timing.writeback_penalty;
                cpu.memory_stall(penalty);
            }
        }
        CacheOp::DcIndexLoadTag => {
            let taglo = cpu.dcache.get_taglo(vaddr);
            cpu.regs.set_cp0(cp0::TAG_LO, u64::from(taglo));
        }
        CacheOp::DcIndexStoreTag => {
            let taglo = cpu.regs.cp0(cp0::TAG_LO) as u32;
            cpu.dcache.set_taglo(vaddr, taglo);
        }
        CacheOp::DcCreateDirtyExclusive => {
            if let Some((victim_paddr, data)) = cpu.dcache.should_flush_line(vaddr) {
                if victim_paddr & !0xFFF != paddr & !0xFFF {
                    write_line(bus, victim_paddr, &data);
                    let penalty = cpu.timing.writeback_penalty;
                    cpu.memory_stall(penalty);
                }
            }
            let _ = cpu.dcache.create_dirty_exclusive(vaddr, paddr);
        }
        CacheOp::DcHitInvalidate => cpu.dcache.invalidate_hit(vaddr, paddr),
        CacheOp::DcHitWbInvalidate => {
            if cpu.dcache.probe(vaddr, paddr).is_some() {
                if let Some((victim_paddr, data)) = cpu.dcache.wb_invalidate(vaddr) {
                    write_line(bus, victim_paddr, &data);
                    let penalty = cpu.timing.writeback_penalty;
                    cpu.memory_stall(penalty);
                }
            }
        }
        CacheOp::DcHitWb => {
            if let Some(idx) = cpu.dcache.probe(vaddr, paddr) {
                if let Some((victim_paddr, data)) = cpu.dcache.should_flush_line(vaddr) {
                    write_line(bus, victim_paddr, &data);
                    let penalty = cpu.timing.writeback_penalty;
                    cpu.memory_stall(penalty);
                }
                cpu.dcache.clear_dirty(idx);
            }
        }
        CacheOp::Nop => {}
    }
}
