//! EX stage: dispatch and execute.
//!
//! Consumes the RFEX latch and produces the EXDC latch: a pending register
//! write, an optional memory request, or a fault. Branches redirect the
//! fetch PC from here — the delay slot was fetched last cycle and always
//! runs; annulling variants zero the RFEX squash mask instead of
//! redirecting. Interrupts are recognised at the top of the stage, before
//! the instruction executes. Multi-cycle operations (multiplier, divider,
//! FPU) raise an MCI interlock after depositing their result.

use crate::common::reg::{HI, LO, cp0 as cp0_reg};
use crate::common::{AccessKind, BusRequest, Exception, Fault, RequestKind};
use crate::core::pipeline::latches::{ExdcLatch, RfexLatch};
use crate::core::{Vr4300, arith, cp0, cp1};
use crate::core::dcache::CacheOp;
use crate::isa::opcodes::{Op, OpFlags, imm16, rd, rt, sa, target26};
use crate::isa::unaligned::{split_swl, split_swr};

/// Runs the EX stage.
pub(crate) fn ex_stage(cpu: &mut Vr4300) {
    let rfex = cpu.pipeline.rfex;
    if rfex.common.killed {
        cpu.pipeline.exdc = ExdcLatch::default();
        return;
    }

    let delay_slot = cpu.pipeline.next_delay_slot;
    cpu.pipeline.next_delay_slot = rfex.opcode.flags.contains(OpFlags::BRANCH);

    let mut common = rfex.common;
    common.delay_slot = delay_slot;
    let mut out = ExdcLatch {
        common,
        dest: 0,
        result: 0,
        request: None,
    };

    // Faults from fetch or decode pass through untouched.
    if out.common.fault.is_some() {
        cpu.pipeline.next_delay_slot = false;
        cpu.pipeline.exdc = out;
        return;
    }

    // Interrupts are recognised at the start of EX: the instruction does
    // not execute and re-runs after the handler returns.
    if cp0::interrupt_pending(&cpu.regs) {
        out.common.fault = Some(Fault::new(Exception::Interrupt));
        cpu.pipeline.next_delay_slot = false;
        cpu.pipeline.exdc = out;
        return;
    }

    // FPU instructions require CP1 to be usable.
    if rfex.opcode.flags.contains(OpFlags::FPU)
        && cpu.regs.cp0(cp0_reg::STATUS) & cp0::STATUS_CU1 == 0
    {
        out.common.fault = Some(Fault::new(Exception::CoprocessorUnusable(1)));
        cpu.pipeline.exdc = out;
        return;
    }

    dispatch(cpu, &mut out, &rfex);
    cpu.pipeline.exdc = out;
}

/// Redirects the fetch PC (branch taken, jump, ERET).
fn redirect(cpu: &mut Vr4300, target: u64) {
    cpu.pipeline.icrf.pc = target;
}

/// Squashes the instruction currently passing through RF (annulled
/// branch-likely delay slots, ERET wrong-path fetch).
fn squash_next(cpu: &mut Vr4300) {
    cpu.pipeline.rfex.iw_mask = 0;
}

/// Conditional branch target: PC of the delay slot plus the shifted
/// offset.
fn branch_target(pc: u64, iw: u32) -> u64 {
    pc.wrapping_add(4).wrapping_add((imm16(iw) << 2) as u64)
}

/// Issues a load request, checking natural alignment.
fn mem_read(out: &mut ExdcLatch, vaddr: u64, access: AccessKind, signed: bool) {
    if vaddr & access.align_mask() != 0 {
        out.common.fault = Some(Fault::at(Exception::AddressLoad, vaddr));
        out.dest = 0;
        return;
    }
    out.request = Some(BusRequest::read(vaddr, access, signed));
}

/// Issues a store request, checking natural alignment.
fn mem_write(out: &mut ExdcLatch, vaddr: u64, access: AccessKind, data: u64) {
    if vaddr & access.align_mask() != 0 {
        out.common.fault = Some(Fault::at(Exception::AddressStore, vaddr));
        return;
    }
    out.request = Some(BusRequest::write(vaddr, access, data));
}

/// The integer dispatch table. FPU opcodes hand off to CP1.
fn dispatch(cpu: &mut Vr4300, out: &mut ExdcLatch, rfex: &RfexLatch) {
    use arith::se32;

    let iw = rfex.iw;
    let rs = rfex.rs;
    let rt_val = rfex.rt;
    let pc = rfex.common.pc;

    if rfex.opcode.flags.contains(OpFlags::FPU) {
        cp1::ex_cp1(cpu, out, rfex);
        return;
    }

    match rfex.opcode.id {
        // Shifts.
        Op::Sll => {
            out.dest = rd(iw);
            out.result = se32(u64::from((rt_val as u32) << sa(iw)));
        }
        Op::Srl => {
            out.dest = rd(iw);
            out.result = se32(u64::from((rt_val as u32) >> sa(iw)));
        }
        Op::Sra => {
            out.dest = rd(iw);
            out.result = se32(((rt_val as u32 as i32) >> sa(iw)) as u32 as u64);
        }
        Op::Sllv => {
            out.dest = rd(iw);
            out.result = se32(u64::from((rt_val as u32) << (rs & 31)));
        }
        Op::Srlv => {
            out.dest = rd(iw);
            out.result = se32(u64::from((rt_val as u32) >> (rs & 31)));
        }
        Op::Srav => {
            out.dest = rd(iw);
            out.result = se32(((rt_val as u32 as i32) >> (rs & 31)) as u32 as u64);
        }

        // Jumps.
        Op::J => redirect(cpu, (pc.wrapping_add(4) & 0xFFFF_FFFF_F000_0000) | (target26(iw) << 2)),
        Op::Jal => {
            out.dest = 31;
            out.result = pc.wrapping_add(8);
            redirect(cpu, (pc.wrapping_add(4) & 0xFFFF_FFFF_F000_0000) | (target26(iw) << 2));
        }
        Op::Jr => redirect(cpu, rs),
        Op::Jalr => {
            out.dest = rd(iw);
            out.result = pc.wrapping_add(8);
            redirect(cpu, rs);
        }

        // Conditional branches; likely variants annul the delay slot when
        // not taken.
        Op::Beq | Op::Beql => {
            if rs == rt_val {
                redirect(cpu, branch_target(pc, iw));
            } else if rfex.opcode.id == Op::Beql {
                squash_next(cpu);
            }
        }
        Op::Bne | Op::Bnel => {
            if rs != rt_val {
                redirect(cpu, branch_target(pc, iw));
            } else if rfex.opcode.id == Op::Bnel {
                squash_next(cpu);
            }
        }
        Op::Blez | Op::Blezl => {
            if (rs as i64) <= 0 {
                redirect(cpu, branch_target(pc, iw));
            } else if rfex.opcode.id == Op::Blezl {
                squash_next(cpu);
            }
        }
        Op::Bgtz | Op::Bgtzl => {
            if (rs as i64) > 0 {
                redirect(cpu, branch_target(pc, iw));
            } else if rfex.opcode.id == Op::Bgtzl {
                squash_next(cpu);
            }
        }
        Op::Bltz | Op::Bltzl | Op::Bltzal => {
            if rfex.opcode.id == Op::Bltzal {
                out.dest = 31;
                out.result = pc.wrapping_add(8);
            }
            if (rs as i64) < 0 {
                redirect(cpu, branch_target(pc, iw));
            } else if rfex.opcode.id == Op::Bltzl {
                squash_next(cpu);
            }
        }
        Op::Bgez | Op::Bgezl | Op::Bgezal => {
            if rfex.opcode.id == Op::Bgezal {
                out.dest = 31;
                out.result = pc.wrapping_add(8);
            }
            if (rs as i64) >= 0 {
                redirect(cpu, branch_target(pc, iw));
            } else if rfex.opcode.id == Op::Bgezl {
                squash_next(cpu);
            }
        }

        // Immediate arithmetic.
        Op::Addi => match arith::add32_overflow(rs, imm16(iw) as u64) {
            Some(v) => {
                out.dest = rt(iw);
                out.result = v;
            }
            None => out.common.fault = Some(Fault::new(Exception::Overflow)),
        },
        Op::Addiu => {
            out.dest = rt(iw);
            out.result = se32(rs.wrapping_add(imm16(iw) as u64));
        }
        Op::Slti => {
            out.dest = rt(iw);
            out.result = u64::from((rs as i64) < imm16(iw));
        }
        Op::Sltiu => {
            out.dest = rt(iw);
            out.result = u64::from(rs < imm16(iw) as u64);
        }
        Op::Andi => {
            out.dest = rt(iw);
            out.result = rs & u64::from(iw as u16);
        }
        Op::Ori => {
            out.dest = rt(iw);
            out.result = rs | u64::from(iw as u16);
        }
        Op::Xori => {
            out.dest = rt(iw);
            out.result = rs ^ u64::from(iw as u16);
        }
        Op::Lui => {
            out.dest = rt(iw);
            out.result = se32(u64::from(iw as u16) << 16);
        }

        // Three-register arithmetic.
        Op::Add => match arith::add32_overflow(rs, rt_val) {
            Some(v) => {
                out.dest = rd(iw);
                out.result = v;
            }
            None => out.common.fault = Some(Fault::new(Exception::Overflow)),
        },
        Op::Addu => {
            out.dest = rd(iw);
            out.result = se32(rs.wrapping_add(rt_val));
        }
        Op::Sub => match arith::sub32_overflow(rs, rt_val) {
            Some(v) => {
                out.dest = rd(iw);
                out.result = v;
            }
            None => out.common.fault = Some(Fault::new(Exception::Overflow)),
        },
        Op::Subu => {
            out.dest = rd(iw);
            out.result = se32(rs.wrapping_sub(rt_val));
        }
        Op::Daddu => {
            out.dest = rd(iw);
            out.result = rs.wrapping_add(rt_val);
        }
        Op::And => {
            out.dest = rd(iw);
            out.result = rs & rt_val;
        }
        Op::Or => {
            out.dest = rd(iw);
            out.result = rs | rt_val;
        }
        Op::Xor => {
            out.dest = rd(iw);
            out.result = rs ^ rt_val;
        }
        Op::Nor => {
            out.dest = rd(iw);
            out.result = !(rs | rt_val);
        }
        Op::Slt => {
            out.dest = rd(iw);
            out.result = u64::from((rs as i64) < (rt_val as i64));
        }
        Op::Sltu => {
            out.dest = rd(iw);
            out.result = u64::from(rs < rt_val);
        }
        Op::Movz => {
            if rt_val == 0 {
                out.dest = rd(iw);
                out.result = rs;
            }
        }
        Op::Movn => {
            if rt_val != 0 {
                out.dest = rd(iw);
                out.result = rs;
            }
        }

        // Multiplier. HI and LO are read and written directly in EX, which
        // keeps them out of the bypass network entirely.
        Op::Mfhi => {
            out.dest = rd(iw);
            out.result = cpu.regs.read(HI);
        }
        Op::Mflo => {
            out.dest = rd(iw);
            out.result = cpu.regs.read(LO);
        }
        Op::Mthi => cpu.regs.write(HI, rs),
        Op::Mtlo => cpu.regs.write(LO, rs),
        Op::Mult => {
            let (lo, hi) = arith::mult(rs, rt_val);
            cpu.regs.write(LO, lo);
            cpu.regs.write(HI, hi);
            cpu.do_mci(cpu.timing.mult_cycles);
        }
        Op::Multu => {
            let (lo, hi) = arith::multu(rs, rt_val);
            cpu.regs.write(LO, lo);
            cpu.regs.write(HI, hi);
            cpu.do_mci(cpu.timing.mult_cycles);
        }
        Op::Div => {
            let (lo, hi) = arith::div(rs, rt_val);
            cpu.regs.write(LO, lo);
            cpu.regs.write(HI, hi);
            cpu.do_mci(cpu.timing.div_cycles);
        }
        Op::Divu => {
            let (lo, hi) = arith::divu(rs, rt_val);
            cpu.regs.write(LO, lo);
            cpu.regs.write(HI, hi);
            cpu.do_mci(cpu.timing.div_cycles);
        }
        Op::Mul => {
            let (lo, hi) = arith::mult(rs, rt_val);
            cpu.regs.write(LO, lo);
            cpu.regs.write(HI, hi);
            out.dest = rd(iw);
            out.result = lo;
            cpu.do_mci(cpu.timing.mult_cycles);
        }

        // Loads.
        Op::Lb => {
            out.dest = rt(iw);
            mem_read(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Byte, true);
        }
        Op::Lbu => {
            out.dest = rt(iw);
            mem_read(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Byte, false);
        }
        Op::Lh => {
            out.dest = rt(iw);
            mem_read(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Half, true);
        }
        Op::Lhu => {
            out.dest = rt(iw);
            mem_read(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Half, false);
        }
        Op::Lw => {
            out.dest = rt(iw);
            mem_read(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Word, true);
        }
        Op::Lwu => {
            out.dest = rt(iw);
            mem_read(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Word, false);
        }
        Op::Ld => {
            out.dest = rt(iw);
            mem_read(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Dword, true);
        }
        Op::Ll => {
            let vaddr = rs.wrapping_add(imm16(iw) as u64);
            out.dest = rt(iw);
            mem_read(out, vaddr, AccessKind::Word, true);
            if out.common.fault.is_none() {
                cpu.llbit = true;
                cpu.regs.set_cp0(cp0_reg::LL_ADDR, vaddr >> 4);
            }
        }
        Op::Lwl => {
            let vaddr = rs.wrapping_add(imm16(iw) as u64);
            out.dest = rt(iw);
            out.request = Some(BusRequest {
                vaddr,
                kind: RequestKind::Read { signed: true },
                access: AccessKind::WordLeft,
                data: rt_val,
                wdqm: 0,
                postshift: 0,
            });
        }
        Op::Lwr => {
            let vaddr = rs.wrapping_add(imm16(iw) as u64);
            out.dest = rt(iw);
            out.request = Some(BusRequest {
                vaddr,
                kind: RequestKind::Read { signed: true },
                access: AccessKind::WordRight,
                data: rt_val,
                wdqm: 0,
                postshift: 0,
            });
        }

        // Stores.
        Op::Sb => mem_write(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Byte, rt_val),
        Op::Sh => mem_write(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Half, rt_val),
        Op::Sw => mem_write(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Word, rt_val),
        Op::Sd => mem_write(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Dword, rt_val),
        Op::Swl => {
            let vaddr = rs.wrapping_add(imm16(iw) as u64);
            let (data, dqm) = split_swl(rt_val as u32, vaddr);
            out.request = Some(BusRequest {
                vaddr,
                kind: RequestKind::Write,
                access: AccessKind::WordLeft,
                data: u64::from(data),
                wdqm: u64::from(dqm),
                postshift: 0,
            });
        }
        Op::Swr => {
            let vaddr = rs.wrapping_add(imm16(iw) as u64);
            let (data, dqm) = split_swr(rt_val as u32, vaddr);
            out.request = Some(BusRequest {
                vaddr,
                kind: RequestKind::Write,
                access: AccessKind::WordRight,
                data: u64::from(data),
                wdqm: u64::from(dqm),
                postshift: 0,
            });
        }
        Op::Sc => {
            out.dest = rt(iw);
            if cpu.llbit {
                mem_write(out, rs.wrapping_add(imm16(iw) as u64), AccessKind::Word, rt_val);
                out.result = u64::from(out.common.fault.is_none());
            } else {
                out.result = 0;
            }
            cpu.llbit = false;
        }

        // Cache maintenance and prefetch.
        Op::Cache => {
            let vaddr = rs.wrapping_add(imm16(iw) as u64);
            let op = CacheOp::from_field(rt(iw) as u32);
            out.request = Some(BusRequest {
                vaddr,
                kind: RequestKind::CacheOp(op),
                access: AccessKind::Word,
                data: 0,
                wdqm: 0,
                postshift: 0,
            });
        }
        Op::Pref => {}

        // System.
        Op::Syscall => out.common.fault = Some(Fault::new(Exception::Syscall)),
        Op::Break => out.common.fault = Some(Fault::new(Exception::Breakpoint)),
        Op::Sync => {}
        Op::Tne => {
            if rs != rt_val {
                out.common.fault = Some(Fault::new(Exception::Trap));
            }
        }
        Op::Wait => cpu.waiting = true,

        // CP0. Moves and TLB maintenance execute directly so their
        // effects are observable by the very next instruction.
        Op::Mfc0 => {
            let n = rd(iw);
            let value = if n == cp0_reg::RANDOM {
                cp0::random_index(&cpu.regs, cpu.cycles) as u64
            } else {
                cpu.regs.cp0(n)
            };
            out.dest = rt(iw);
            out.result = se32(value);
        }
        Op::Mtc0 => cp0::write_cp0(&mut cpu.regs, rd(iw), se32(rt_val)),
        Op::Tlbr => {
            let index = (cpu.regs.cp0(cp0_reg::INDEX) as usize) & 0x1F;
            let (mask, hi, lo0, lo1) = cpu.tlb.read(index);
            cpu.regs.set_cp0(cp0_reg::PAGE_MASK, mask);
            cpu.regs.set_cp0(cp0_reg::ENTRY_HI, hi);
            cpu.regs.set_cp0(cp0_reg::ENTRY_LO0, lo0);
            cpu.regs.set_cp0(cp0_reg::ENTRY_LO1, lo1);
        }
        Op::Tlbwi => {
            let index = (cpu.regs.cp0(cp0_reg::INDEX) as usize) & 0x1F;
            write_tlb(cpu, index);
        }
        Op::Tlbwr => {
            let index = cp0::random_index(&cpu.regs, cpu.cycles);
            write_tlb(cpu, index);
        }
        Op::Tlbp => {
            let hi = cpu.regs.cp0(cp0_reg::ENTRY_HI);
            match cpu.tlb.probe(hi) {
                Some(index) => cpu.regs.set_cp0(cp0_reg::INDEX, index as u64),
                None => cpu.regs.set_cp0(cp0_reg::INDEX, 1 << 31),
            }
        }
        Op::Eret => {
            let status = cpu.regs.cp0(cp0_reg::STATUS);
            let target = if status & cp0::STATUS_ERL != 0 {
                cpu.regs
                    .set_cp0(cp0_reg::STATUS, status & !cp0::STATUS_ERL);
                cpu.regs.cp0(cp0_reg::ERROR_EPC)
            } else {
                cpu.regs
                    .set_cp0(cp0_reg::STATUS, status & !cp0::STATUS_EXL);
                cpu.regs.cp0(cp0_reg::EPC)
            };
            cpu.llbit = false;
            redirect(cpu, target);
            squash_next(cpu);
        }

        Op::Invalid => {
            out.common.fault = Some(Fault::new(Exception::ReservedInstruction));
        }

        // FPU opcodes were dispatched above.
        _ => {
            out.common.fault = Some(Fault::new(Exception::ReservedInstruction));
        }
    }

    if cpu.trace && !rfex.common.killed {
        eprintln!(
            "EX  pc={:#018x} iw={:#010x} {:?}",
            pc, iw, rfex.opcode.id
        );
    }
}

/// Writes a TLB entry from the CP0 register images.
fn write_tlb(cpu: &mut Vr4300, index: usize) {
    cpu.tlb.write(
        index,
        cpu.regs.cp0(cp0_reg::PAGE_MASK),
        cpu.regs.cp0(cp0_reg::ENTRY_HI),
        cpu.regs.cp0(cp0_reg::ENTRY_LO0),
        cpu.regs.cp0(cp0_reg::ENTRY_LO1),
    );
}
