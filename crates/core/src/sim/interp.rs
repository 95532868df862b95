//! Functional reference model.
//!
//! One architectural instruction per `step()`: fetch, decode, execute,
//! retire. No caches, no latches — memory goes straight to the bus — but
//! the same decoder, the same TLB and CP0 rules, and the same FPU
//! primitives as the pipelined core, so the two models can only disagree
//! where the pipeline itself is wrong. Branch delay slots are modelled
//! with a pending-target register: a taken branch executes the following
//! instruction first, then lands on the target.

use crate::common::constants::RESET_VECTOR;
use crate::common::reg::{CP1_BASE, FCR0, FCR31, HI, LO, cp0 as cp0_reg};
use crate::common::{AccessKind, AccessMode, Exception, Fault, RegisterFile};
use crate::config::Config;
use crate::core::cp1::FCR31_CONDITION;
use crate::core::pipeline::CycleStatus;
use crate::core::tlb::Tlb;
use crate::core::{arith, cp0};
use crate::fpu::{self, RoundingMode, RoundingOverride};
use crate::isa::opcodes::{Fmt, Op, fd, fmt, fs, ft, imm16, rd, rt, sa, target26};
use crate::isa::unaligned::{merge_lwl, merge_lwr, split_swl, split_swr};
use crate::isa::{OpFlags, decode};
use crate::soc::Bus;
use crate::stats::SimStats;

/// Control-flow outcome of one executed instruction.
enum Control {
    /// Fall through to the next instruction.
    Next,
    /// Branch taken: execute the delay slot, then jump to the target.
    Branch(u64),
    /// Branch-likely not taken: annul the delay slot.
    Annul,
    /// The instruction faulted.
    Fault(Fault),
    /// `ERET`/exception-style redirect with no delay slot.
    Redirect(u64),
}

/// The instruction-at-a-time reference core.
#[derive(Debug)]
pub struct FunctionalCore {
    /// Unified architectural register bank.
    pub regs: RegisterFile,
    /// Architectural program counter.
    pub pc: u64,
    /// Translation lookaside buffer.
    pub tlb: Tlb,
    /// Load-linked bit for `LL`/`SC`.
    pub llbit: bool,
    /// Instructions executed.
    pub steps: u64,
    /// Parked by `WAIT` until an interrupt is pending.
    pub waiting: bool,
    /// Counters.
    pub stats: SimStats,
    /// Echo an instruction trace to stderr.
    pub trace: bool,
    pending_branch: Option<u64>,
}

impl FunctionalCore {
    /// Creates a core in its post-reset state at the reset vector.
    pub fn new(config: &Config) -> Self {
        let mut regs = RegisterFile::new();
        cp0::reset(&mut regs);
        fpu::init();
        Self {
            regs,
            pc: RESET_VECTOR,
            tlb: Tlb::new(),
            llbit: false,
            steps: 0,
            waiting: false,
            stats: SimStats::default(),
            trace: config.harness.trace,
            pending_branch: None,
        }
    }

    /// Snapshot of the general-purpose registers.
    pub fn gpr_snapshot(&self) -> [u64; 32] {
        self.regs.gpr_snapshot()
    }

    /// Executes one architectural instruction.
    pub fn step(&mut self, bus: &mut Bus) -> CycleStatus {
        self.steps += 1;
        self.stats.cycles += 1;
        cp0::set_external_irq(&mut self.regs, bus.irq_pending());
        cp0::tick_count(&mut self.regs, self.steps);

        if self.waiting {
            if cp0::interrupt_pending(&self.regs) {
                self.waiting = false;
            } else {
                return CycleStatus::Idle;
            }
        }

        let in_delay = self.pending_branch.is_some();

        if cp0::interrupt_pending(&self.regs) {
            self.enter_exception(Fault::new(Exception::Interrupt), in_delay);
            return CycleStatus::ExceptionEntered;
        }

        // Fetch.
        if self.pc & 3 != 0 {
            let fault = Fault::at(Exception::AddressLoad, self.pc);
            self.enter_exception(fault, in_delay);
            return CycleStatus::ExceptionEntered;
        }
        let iw = match self.translate(self.pc, AccessMode::Fetch) {
            Ok(paddr) => bus.read_word(paddr),
            Err(fault) => {
                self.enter_exception(fault, in_delay);
                return CycleStatus::ExceptionEntered;
            }
        };

        if self.trace {
            eprintln!("ST  pc={:#018x} iw={:#010x}", self.pc, iw);
        }

        let taken_target = self.pending_branch.take();
        let control = self.execute(bus, iw);
        self.stats.retired += 1;

        match control {
            Control::Next => {
                self.pc = taken_target.unwrap_or(self.pc.wrapping_add(4));
            }
            Control::Branch(target) => {
                self.pending_branch = Some(target);
                self.pc = self.pc.wrapping_add(4);
            }
            Control::Annul => {
                self.pc = self.pc.wrapping_add(8);
            }
            Control::Redirect(target) => {
                self.pc = target;
            }
            Control::Fault(fault) => {
                self.enter_exception(fault, in_delay);
                return CycleStatus::ExceptionEntered;
            }
        }
        CycleStatus::Normal
    }

    /// Enters an exception for the instruction at the current PC.
    fn enter_exception(&mut self, fault: Fault, in_delay: bool) {
        let vector = cp0::exception_entry(&mut self.regs, &fault, self.pc, in_delay);
        self.stats.exceptions += 1;
        self.pending_branch = None;
        self.pc = vector;
    }

    /// Translates through the shared TLB rules.
    fn translate(&self, vaddr: u64, mode: AccessMode) -> Result<u32, Fault> {
        let asid = self.regs.cp0(cp0_reg::ENTRY_HI) & 0xFF;
        let translated = self.tlb.translate(vaddr, asid, mode);
        match translated.fault {
            Some(fault) => Err(fault),
            None => Ok(translated.paddr.val()),
        }
    }

    /// Loads a naturally aligned value, unextended.
    fn load(&mut self, bus: &mut Bus, vaddr: u64, access: AccessKind) -> Result<u64, Fault> {
        if vaddr & access.align_mask() != 0 {
            return Err(Fault::at(Exception::AddressLoad, vaddr));
        }
        let paddr = self.translate(vaddr, AccessMode::Load)?;
        let word = bus.read_word(paddr & !3);
        Ok(match access {
            AccessKind::Byte => u64::from((word >> (8 * (vaddr & 3) as u32)) & 0xFF),
            AccessKind::Half => u64::from((word >> (8 * (vaddr & 3) as u32)) & 0xFFFF),
            AccessKind::Word | AccessKind::WordLeft | AccessKind::WordRight => u64::from(word),
            AccessKind::Dword => {
                let hi = bus.read_word(paddr + 4);
                u64::from(word) | (u64::from(hi) << 32)
            }
        })
    }

    /// Stores under a width mask.
    fn store(
        &mut self,
        bus: &mut Bus,
        vaddr: u64,
        access: AccessKind,
        data: u64,
        wdqm: u64,
    ) -> Result<(), Fault> {
        if vaddr & access.align_mask() != 0 {
            return Err(Fault::at(Exception::AddressStore, vaddr));
        }
        let paddr = self.translate(vaddr, AccessMode::Store)?;
        match access {
            AccessKind::Byte | AccessKind::Half => {
                let shift = 8 * (vaddr & 3) as u32;
                bus.write_word(paddr & !3, (data as u32) << shift, (wdqm as u32) << shift);
            }
            AccessKind::Word | AccessKind::WordLeft | AccessKind::WordRight => {
                bus.write_word(paddr & !3, data as u32, wdqm as u32);
            }
            AccessKind::Dword => {
                bus.write_word(paddr, data as u32, wdqm as u32);
                bus.write_word(paddr + 4, (data >> 32) as u32, (wdqm >> 32) as u32);
            }
        }
        Ok(())
    }

    /// CP1 data register index honouring the FR=0 even-pair rule.
    fn cp1_index(&self, field: usize) -> usize {
        if self.regs.cp0(cp0_reg::STATUS) & cp0::STATUS_FR != 0 {
            CP1_BASE + field
        } else {
            CP1_BASE + (field & !1)
        }
    }

    /// True when `Status.FR` selects the full register file.
    fn fr(&self) -> bool {
        self.regs.cp0(cp0_reg::STATUS) & cp0::STATUS_FR != 0
    }

    /// Executes one decoded instruction.
    fn execute(&mut self, bus: &mut Bus, iw: u32) -> Control {
        use arith::se32;

        let opcode = decode(iw);
        let pc = self.pc;
        let rs_val = self.regs.read(crate::isa::opcodes::rs(iw));
        let rt_val = self.regs.read(rt(iw));
        let branch = |cond: bool| {
            if cond {
                Control::Branch(pc.wrapping_add(4).wrapping_add((imm16(iw) << 2) as u64))
            } else {
                Control::Next
            }
        };
        let branch_likely = |cond: bool| {
            if cond {
                Control::Branch(pc.wrapping_add(4).wrapping_add((imm16(iw) << 2) as u64))
            } else {
                Control::Annul
            }
        };
        let jump_target = (pc.wrapping_add(4) & 0xFFFF_FFFF_F000_0000) | (target26(iw) << 2);

        if opcode.flags.contains(OpFlags::FPU) {
            if self.regs.cp0(cp0_reg::STATUS) & cp0::STATUS_CU1 == 0 {
                return Control::Fault(Fault::new(Exception::CoprocessorUnusable(1)));
            }
            return self.execute_cp1(bus, opcode.id, iw, rs_val);
        }

        match opcode.id {
            Op::Sll => self.regs.write(rd(iw), se32(u64::from((rt_val as u32) << sa(iw)))),
            Op::Srl => self.regs.write(rd(iw), se32(u64::from((rt_val as u32) >> sa(iw)))),
            Op::Sra => self
                .regs
                .write(rd(iw), se32(((rt_val as u32 as i32) >> sa(iw)) as u32 as u64)),
            Op::Sllv => self
                .regs
                .write(rd(iw), se32(u64::from((rt_val as u32) << (rs_val & 31)))),
            Op::Srlv => self
                .regs
                .write(rd(iw), se32(u64::from((rt_val as u32) >> (rs_val & 31)))),
            Op::Srav => self.regs.write(
                rd(iw),
                se32(((rt_val as u32 as i32) >> (rs_val & 31)) as u32 as u64),
            ),

            Op::J => return Control::Branch(jump_target),
            Op::Jal => {
                self.regs.write(31, pc.wrapping_add(8));
                return Control::Branch(jump_target);
            }
            Op::Jr => return Control::Branch(rs_val),
            Op::Jalr => {
                self.regs.write(rd(iw), pc.wrapping_add(8));
                return Control::Branch(rs_val);
            }

            Op::Beq => return branch(rs_val == rt_val),
            Op::Bne => return branch(rs_val != rt_val),
            Op::Blez => return branch(rs_val as i64 <= 0),
            Op::Bgtz => return branch(rs_val as i64 > 0),
            Op::Bltz => return branch((rs_val as i64) < 0),
            Op::Bgez => return branch(rs_val as i64 >= 0),
            Op::Beql => return branch_likely(rs_val == rt_val),
            Op::Bnel => return branch_likely(rs_val != rt_val),
            Op::Blezl => return branch_likely(rs_val as i64 <= 0),
            Op::Bgtzl => return branch_likely(rs_val as i64 > 0),
            Op::Bltzl => return branch_likely((rs_val as i64) < 0),
            Op::Bgezl => return branch_likely(rs_val as i64 >= 0),
            Op::Bltzal => {
                self.regs.write(31, pc.wrapping_add(8));
                return branch((rs_val as i64) < 0);
            }
            Op::Bgezal => {
                self.regs.write(31, pc.wrapping_add(8));
                return branch(rs_val as i64 >= 0);
            }

            Op::Addi => match arith::add32_overflow(rs_val, imm16(iw) as u64) {
                Some(v) => self.regs.write(rt(iw), v),
                None => return Control::Fault(Fault::new(Exception::Overflow)),
            },
            Op::Addiu => self.regs.write(rt(iw), se32(rs_val.wrapping_add(imm16(iw) as u64))),
            Op::Slti => self.regs.write(rt(iw), u64::from((rs_val as i64) < imm16(iw))),
            Op::Sltiu => self.regs.write(rt(iw), u64::from(rs_val < imm16(iw) as u64)),
            Op::Andi => self.regs.write(rt(iw), rs_val & u64::from(iw as u16)),
            Op::Ori => self.regs.write(rt(iw), rs_val | u64::from(iw as u16)),
            Op::Xori => self.regs.write(rt(iw), rs_val ^ u64::from(iw as u16)),
            Op::Lui => self.regs.write(rt(iw), se32(u64::from(iw as u16) << 16)),

            Op::Add => match arith::add32_overflow(rs_val, rt_val) {
                Some(v) => self.regs.write(rd(iw), v),
                None => return Control::Fault(Fault::new(Exception::Overflow)),
            },
            Op::Sub => match arith::sub32_overflow(rs_val, rt_val) {
                Some(v) => self.regs.write(rd(iw), v),
                None => return Control::Fault(Fault::new(Exception::Overflow)),
            },
            Op::Addu => self.regs.write(rd(iw), se32(rs_val.wrapping_add(rt_val))),
            Op::Subu => self.regs.write(rd(iw), se32(rs_val.wrapping_sub(rt_val))),
            Op::Daddu => self.regs.write(rd(iw), rs_val.wrapping_add(rt_val)),
            Op::And => self.regs.write(rd(iw), rs_val & rt_val),
            Op::Or => self.regs.write(rd(iw), rs_val | rt_val),
            Op::Xor => self.regs.write(rd(iw), rs_val ^ rt_val),
            Op::Nor => self.regs.write(rd(iw), !(rs_val | rt_val)),
            Op::Slt => self.regs.write(rd(iw), u64::from((rs_val as i64) < (rt_val as i64))),
            Op::Sltu => self.regs.write(rd(iw), u64::from(rs_val < rt_val)),
            Op::Movz => {
                if rt_val == 0 {
                    self.regs.write(rd(iw), rs_val);
                }
            }
            Op::Movn => {
                if rt_val != 0 {
                    self.regs.write(rd(iw), rs_val);
                }
            }

            Op::Mfhi => {
                let hi = self.regs.read(HI);
                self.regs.write(rd(iw), hi);
            }
            Op::Mflo => {
                let lo = self.regs.read(LO);
                self.regs.write(rd(iw), lo);
            }
            Op::Mthi => self.regs.write(HI, rs_val),
            Op::Mtlo => self.regs.write(LO, rs_val),
            Op::Mult => {
                let (lo, hi) = arith::mult(rs_val, rt_val);
                self.regs.write(LO, lo);
                self.regs.write(HI, hi);
            }
            Op::Multu => {
                let (lo, hi) = arith::multu(rs_val, rt_val);
                self.regs.write(LO, lo);
                self.regs.write(HI, hi);
            }
            Op::Div => {
                let (lo, hi) = arith::div(rs_val, rt_val);
                self.regs.write(LO, lo);
                self.regs.write(HI, hi);
            }
            Op::Divu => {
                let (lo, hi) = arith::divu(rs_val, rt_val);
                self.regs.write(LO, lo);
                self.regs.write(HI, hi);
            }
            Op::Mul => {
                let (lo, hi) = arith::mult(rs_val, rt_val);
                self.regs.write(LO, lo);
                self.regs.write(HI, hi);
                self.regs.write(rd(iw), lo);
            }

            Op::Lb | Op::Lbu | Op::Lh | Op::Lhu | Op::Lw | Op::Lwu | Op::Ld | Op::Ll => {
                let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                let (access, signed) = match opcode.id {
                    Op::Lb => (AccessKind::Byte, true),
                    Op::Lbu => (AccessKind::Byte, false),
                    Op::Lh => (AccessKind::Half, true),
                    Op::Lhu => (AccessKind::Half, false),
                    Op::Lwu => (AccessKind::Word, false),
                    Op::Ld => (AccessKind::Dword, false),
                    _ => (AccessKind::Word, true),
                };
                let raw = match self.load(bus, vaddr, access) {
                    Ok(v) => v,
                    Err(fault) => return Control::Fault(fault),
                };
                let value = if signed {
                    match access {
                        AccessKind::Byte => raw as u8 as i8 as i64 as u64,
                        AccessKind::Half => raw as u16 as i16 as i64 as u64,
                        _ => se32(raw),
                    }
                } else {
                    raw
                };
                self.regs.write(rt(iw), value);
                if opcode.id == Op::Ll {
                    self.llbit = true;
                    self.regs.set_cp0(cp0_reg::LL_ADDR, vaddr >> 4);
                }
            }
            Op::Lwl | Op::Lwr => {
                let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                let word = match self.load(bus, vaddr & !3, AccessKind::Word) {
                    Ok(v) => v as u32,
                    Err(fault) => return Control::Fault(fault),
                };
                let merged = if opcode.id == Op::Lwl {
                    merge_lwl(rt_val as u32, word, vaddr)
                } else {
                    merge_lwr(rt_val as u32, word, vaddr)
                };
                self.regs.write(rt(iw), se32(u64::from(merged)));
            }

            Op::Sb | Op::Sh | Op::Sw | Op::Sd => {
                let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                let (access, wdqm) = match opcode.id {
                    Op::Sb => (AccessKind::Byte, 0xFF),
                    Op::Sh => (AccessKind::Half, 0xFFFF),
                    Op::Sw => (AccessKind::Word, 0xFFFF_FFFF),
                    _ => (AccessKind::Dword, !0u64),
                };
                if let Err(fault) = self.store(bus, vaddr, access, rt_val, wdqm) {
                    return Control::Fault(fault);
                }
            }
            Op::Swl | Op::Swr => {
                let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                let (data, dqm) = if opcode.id == Op::Swl {
                    split_swl(rt_val as u32, vaddr)
                } else {
                    split_swr(rt_val as u32, vaddr)
                };
                if let Err(fault) = self.store(
                    bus,
                    vaddr & !3,
                    AccessKind::Word,
                    u64::from(data),
                    u64::from(dqm),
                ) {
                    return Control::Fault(fault);
                }
            }
            Op::Sc => {
                if self.llbit {
                    let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                    if let Err(fault) =
                        self.store(bus, vaddr, AccessKind::Word, rt_val, 0xFFFF_FFFF)
                    {
                        self.llbit = false;
                        return Control::Fault(fault);
                    }
                    self.regs.write(rt(iw), 1);
                } else {
                    self.regs.write(rt(iw), 0);
                }
                self.llbit = false;
            }

            // The functional model has no caches; CACHE and PREF retire
            // without effect.
            Op::Cache | Op::Pref | Op::Sync => {}

            Op::Syscall => return Control::Fault(Fault::new(Exception::Syscall)),
            Op::Break => return Control::Fault(Fault::new(Exception::Breakpoint)),
            Op::Tne => {
                if rs_val != rt_val {
                    return Control::Fault(Fault::new(Exception::Trap));
                }
            }
            Op::Wait => self.waiting = true,

            Op::Mfc0 => {
                let n = rd(iw);
                let value = if n == cp0_reg::RANDOM {
                    cp0::random_index(&self.regs, self.steps) as u64
                } else {
                    self.regs.cp0(n)
                };
                self.regs.write(rt(iw), se32(value));
            }
            Op::Mtc0 => cp0::write_cp0(&mut self.regs, rd(iw), se32(rt_val)),
            Op::Tlbr => {
                let index = (self.regs.cp0(cp0_reg::INDEX) as usize) & 0x1F;
                let (mask, hi, lo0, lo1) = self.tlb.read(index);
                self.regs.set_cp0(cp0_reg::PAGE_MASK, mask);
                self.regs.set_cp0(cp0_reg::ENTRY_HI, hi);
                self.regs.set_cp0(cp0_reg::ENTRY_LO0, lo0);
                self.regs.set_cp0(cp0_reg::ENTRY_LO1, lo1);
            }
            Op::Tlbwi => {
                let index = (self.regs.cp0(cp0_reg::INDEX) as usize) & 0x1F;
                self.write_tlb(index);
            }
            Op::Tlbwr => {
                let index = cp0::random_index(&self.regs, self.steps);
                self.write_tlb(index);
            }
            Op::Tlbp => {
                let hi = self.regs.cp0(cp0_reg::ENTRY_HI);
                match self.tlb.probe(hi) {
                    Some(index) => self.regs.set_cp0(cp0_reg::INDEX, index as u64),
                    None => self.regs.set_cp0(cp0_reg::INDEX, 1 << 31),
                }
            }
            Op::Eret => {
                let status = self.regs.cp0(cp0_reg::STATUS);
                let target = if status & cp0::STATUS_ERL != 0 {
                    self.regs.set_cp0(cp0_reg::STATUS, status & !cp0::STATUS_ERL);
                    self.regs.cp0(cp0_reg::ERROR_EPC)
                } else {
                    self.regs.set_cp0(cp0_reg::STATUS, status & !cp0::STATUS_EXL);
                    self.regs.cp0(cp0_reg::EPC)
                };
                self.llbit = false;
                return Control::Redirect(target);
            }

            Op::Invalid => return Control::Fault(Fault::new(Exception::ReservedInstruction)),

            // FPU opcodes are handled before this match.
            _ => return Control::Fault(Fault::new(Exception::ReservedInstruction)),
        }
        Control::Next
    }

    /// Writes a TLB entry from the CP0 register images.
    fn write_tlb(&mut self, index: usize) {
        self.tlb.write(
            index,
            self.regs.cp0(cp0_reg::PAGE_MASK),
            self.regs.cp0(cp0_reg::ENTRY_HI),
            self.regs.cp0(cp0_reg::ENTRY_LO0),
            self.regs.cp0(cp0_reg::ENTRY_LO1),
        );
    }

    /// Executes a CP1 instruction.
    fn execute_cp1(&mut self, bus: &mut Bus, op: Op, iw: u32, rs_val: u64) -> Control {
        use arith::se32;

        let fs_val = self.regs.read(self.cp1_index(fs(iw)));
        let ft_val = self.regs.read(self.cp1_index(ft(iw)));
        let pc = self.pc;

        match op {
            Op::Mfc1 => {
                let value = if self.fr() || fs(iw) & 1 == 0 {
                    se32(fs_val)
                } else {
                    se32(fs_val >> 32)
                };
                self.regs.write(rt(iw), value);
            }
            Op::Dmfc1 => self.regs.write(rt(iw), fs_val),
            Op::Cfc1 => {
                let value = match rd(iw) {
                    0 => self.regs.read(FCR0),
                    31 => self.regs.read(FCR31),
                    _ => 0,
                };
                self.regs.write(rt(iw), se32(value));
            }
            Op::Mtc1 => {
                let rt_val = self.regs.read(rt(iw));
                if self.fr() {
                    self.regs.write(CP1_BASE + fs(iw), se32(rt_val));
                } else {
                    let merged = if fs(iw) & 1 != 0 {
                        (fs_val & 0xFFFF_FFFF) | (rt_val << 32)
                    } else {
                        (fs_val & !0xFFFF_FFFF) | u64::from(rt_val as u32)
                    };
                    self.regs.write(CP1_BASE + (fs(iw) & !1), merged);
                }
            }
            Op::Dmtc1 => {
                let rt_val = self.regs.read(rt(iw));
                self.regs.write(CP1_BASE + fs(iw), rt_val);
            }
            Op::Ctc1 => {
                if rd(iw) == 31 {
                    let rt_val = self.regs.read(rt(iw)) & 0x0183_FFFF;
                    fpu::set_rounding_mode(RoundingMode::from_fcr31(rt_val as u32));
                    self.regs.write(FCR31, rt_val);
                }
            }
            Op::Bc1 => {
                let set = self.regs.read(FCR31) & FCR31_CONDITION != 0;
                let target = pc.wrapping_add(4).wrapping_add((imm16(iw) << 2) as u64);
                return match (iw >> 16) & 0x3 {
                    0x0 => {
                        if !set {
                            Control::Branch(target)
                        } else {
                            Control::Next
                        }
                    }
                    0x1 => {
                        if set {
                            Control::Branch(target)
                        } else {
                            Control::Next
                        }
                    }
                    0x2 => {
                        if !set {
                            Control::Branch(target)
                        } else {
                            Control::Annul
                        }
                    }
                    _ => {
                        if set {
                            Control::Branch(target)
                        } else {
                            Control::Annul
                        }
                    }
                };
            }

            Op::Lwc1 => {
                let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                let word = match self.load(bus, vaddr, AccessKind::Word) {
                    Ok(v) => v,
                    Err(fault) => return Control::Fault(fault),
                };
                if self.fr() {
                    self.regs.write(CP1_BASE + ft(iw), word);
                } else {
                    let merged = if ft(iw) & 1 != 0 {
                        (ft_val & 0xFFFF_FFFF) | (word << 32)
                    } else {
                        (ft_val & !0xFFFF_FFFF) | word
                    };
                    self.regs.write(CP1_BASE + (ft(iw) & !1), merged);
                }
            }
            Op::Ldc1 => {
                let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                match self.load(bus, vaddr, AccessKind::Dword) {
                    Ok(v) => self.regs.write(CP1_BASE + ft(iw), v),
                    Err(fault) => return Control::Fault(fault),
                }
            }
            Op::Swc1 => {
                let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                let data = if self.fr() {
                    ft_val
                } else {
                    ft_val >> (((ft(iw) & 1) as u32) << 5)
                };
                if let Err(fault) = self.store(bus, vaddr, AccessKind::Word, data, 0xFFFF_FFFF) {
                    return Control::Fault(fault);
                }
            }
            Op::Sdc1 => {
                let vaddr = rs_val.wrapping_add(imm16(iw) as u64);
                if let Err(fault) = self.store(bus, vaddr, AccessKind::Dword, ft_val, !0) {
                    return Control::Fault(fault);
                }
            }

            _ => return self.execute_cp1_arith(op, iw, fs_val, ft_val),
        }
        Control::Next
    }

    /// CP1 arithmetic, conversions, and compares.
    fn execute_cp1_arith(&mut self, op: Op, iw: u32, fs_val: u64, ft_val: u64) -> Control {
        let format = Fmt::from_field(fmt(iw));
        let reserved = Control::Fault(Fault::new(Exception::ReservedInstruction));

        let binary = |op32: fn(&u32, &u32, &mut u32), op64: fn(&u64, &u64, &mut u64)| match format {
            Fmt::S => {
                let (a, b) = (fs_val as u32, ft_val as u32);
                let mut r = 0u32;
                op32(&a, &b, &mut r);
                Some(u64::from(r))
            }
            Fmt::D => {
                let mut r = 0u64;
                op64(&fs_val, &ft_val, &mut r);
                Some(r)
            }
            _ => None,
        };
        let unary = |op32: fn(&u32, &mut u32), op64: fn(&u64, &mut u64)| match format {
            Fmt::S => {
                let a = fs_val as u32;
                let mut r = 0u32;
                op32(&a, &mut r);
                Some(u64::from(r))
            }
            Fmt::D => {
                let mut r = 0u64;
                op64(&fs_val, &mut r);
                Some(r)
            }
            _ => None,
        };
        let to_word = || match format {
            Fmt::S => {
                let a = fs_val as u32;
                let mut r = 0u32;
                fpu::f32_to_i32(&a, &mut r);
                Some(u64::from(r))
            }
            Fmt::D => {
                let mut r = 0u32;
                fpu::f64_to_i32(&fs_val, &mut r);
                Some(u64::from(r))
            }
            _ => None,
        };
        let to_long = || match format {
            Fmt::S => {
                let a = fs_val as u32;
                let mut r = 0u64;
                fpu::f32_to_i64(&a, &mut r);
                Some(r)
            }
            Fmt::D => {
                let mut r = 0u64;
                fpu::f64_to_i64(&fs_val, &mut r);
                Some(r)
            }
            _ => None,
        };

        fpu::clear_flags();
        let result = match op {
            Op::Cp1Add => binary(fpu::add_32, fpu::add_64),
            Op::Cp1Sub => binary(fpu::sub_32, fpu::sub_64),
            Op::Cp1Mul => binary(fpu::mul_32, fpu::mul_64),
            Op::Cp1Div => binary(fpu::div_32, fpu::div_64),
            Op::Cp1Sqrt => unary(fpu::sqrt_32, fpu::sqrt_64),
            Op::Cp1Abs => unary(fpu::abs_32, fpu::abs_64),
            Op::Cp1Neg => unary(fpu::neg_32, fpu::neg_64),
            Op::Cp1Mov => match format {
                Fmt::S | Fmt::D => Some(fs_val),
                _ => None,
            },
            Op::Cp1CvtW => to_word(),
            Op::Cp1CvtL => to_long(),
            Op::Cp1RoundW | Op::Cp1TruncW | Op::Cp1CeilW | Op::Cp1FloorW => {
                let _guard = RoundingOverride::new(directed_mode(op));
                to_word()
            }
            Op::Cp1RoundL | Op::Cp1TruncL | Op::Cp1CeilL | Op::Cp1FloorL => {
                let _guard = RoundingOverride::new(directed_mode(op));
                to_long()
            }
            Op::Cp1CvtS => match format {
                Fmt::D => {
                    let mut r = 0u32;
                    fpu::f64_to_f32(&fs_val, &mut r);
                    Some(u64::from(r))
                }
                Fmt::W => {
                    let a = fs_val as u32;
                    let mut r = 0u32;
                    fpu::i32_to_f32(&a, &mut r);
                    Some(u64::from(r))
                }
                Fmt::L => {
                    let mut r = 0u32;
                    fpu::i64_to_f32(&fs_val, &mut r);
                    Some(u64::from(r))
                }
                _ => None,
            },
            Op::Cp1CvtD => match format {
                Fmt::S => {
                    let a = fs_val as u32;
                    let mut r = 0u64;
                    fpu::f32_to_f64(&a, &mut r);
                    Some(r)
                }
                Fmt::W => {
                    let a = fs_val as u32;
                    let mut r = 0u64;
                    fpu::i32_to_f64(&a, &mut r);
                    Some(r)
                }
                Fmt::L => {
                    let mut r = 0u64;
                    fpu::i64_to_f64(&fs_val, &mut r);
                    Some(r)
                }
                _ => None,
            },

            Op::Cp1CF | Op::Cp1CUn | Op::Cp1CEq | Op::Cp1CUeq | Op::Cp1COlt | Op::Cp1CUlt
            | Op::Cp1COle | Op::Cp1CUle => {
                let flag = match (op, format) {
                    (Op::Cp1CF, Fmt::S | Fmt::D) => false,
                    (Op::Cp1CUn, Fmt::S) => fpu::cmp_un_32(&(fs_val as u32), &(ft_val as u32)),
                    (Op::Cp1CUn, Fmt::D) => fpu::cmp_un_64(&fs_val, &ft_val),
                    (Op::Cp1CEq, Fmt::S) => fpu::cmp_eq_32(&(fs_val as u32), &(ft_val as u32)),
                    (Op::Cp1CEq, Fmt::D) => fpu::cmp_eq_64(&fs_val, &ft_val),
                    (Op::Cp1CUeq, Fmt::S) => fpu::cmp_ueq_32(&(fs_val as u32), &(ft_val as u32)),
                    (Op::Cp1CUeq, Fmt::D) => fpu::cmp_ueq_64(&fs_val, &ft_val),
                    (Op::Cp1COlt, Fmt::S) => fpu::cmp_olt_32(&(fs_val as u32), &(ft_val as u32)),
                    (Op::Cp1COlt, Fmt::D) => fpu::cmp_olt_64(&fs_val, &ft_val),
                    (Op::Cp1CUlt, Fmt::S) => fpu::cmp_ult_32(&(fs_val as u32), &(ft_val as u32)),
                    (Op::Cp1CUlt, Fmt::D) => fpu::cmp_ult_64(&fs_val, &ft_val),
                    (Op::Cp1COle, Fmt::S) => fpu::cmp_ole_32(&(fs_val as u32), &(ft_val as u32)),
                    (Op::Cp1COle, Fmt::D) => fpu::cmp_ole_64(&fs_val, &ft_val),
                    (Op::Cp1CUle, Fmt::S) => fpu::cmp_ule_32(&(fs_val as u32), &(ft_val as u32)),
                    (Op::Cp1CUle, Fmt::D) => fpu::cmp_ule_64(&fs_val, &ft_val),
                    _ => return reserved,
                };
                let base = self.regs.read(FCR31) & !FCR31_CONDITION;
                self.regs.write(FCR31, base | (u64::from(flag) << 23));
                return Control::Next;
            }

            _ => return reserved,
        };

        match result {
            Some(value) => {
                let flags = u64::from(fpu::harvest_flags());
                if flags != 0 {
                    let fcr = self.regs.read(FCR31);
                    self.regs.write(FCR31, fcr | flags);
                }
                self.regs.write(CP1_BASE + fd(iw), value);
                Control::Next
            }
            None => reserved,
        }
    }
}

/// Rounding mode forced by a directed-round conversion.
fn directed_mode(op: Op) -> RoundingMode {
    match op {
        Op::Cp1RoundW | Op::Cp1RoundL => RoundingMode::Nearest,
        Op::Cp1TruncW | Op::Cp1TruncL => RoundingMode::TowardZero,
        Op::Cp1CeilW | Op::Cp1CeilL => RoundingMode::Up,
        _ => RoundingMode::Down,
    }
}
