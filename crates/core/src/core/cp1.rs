//! CP1: the floating-point coprocessor.
//!
//! Translates FPU instructions into pipeline effects. Each routine reads
//! its operands from the RFEX source latches, selects a format (S, D, W,
//! L — reserved formats fault through the dispatcher), calls the matching
//! FPU primitive, deposits `{dest, result}` in the EXDC latch, and raises
//! a multi-cycle interlock sized for the operation. CP1 owns FCR31: the
//! compare condition lands in bit 23, IEEE flags accumulate in the flag
//! field, and the RM field drives the process-wide rounding mode.

use tracing::debug;

use crate::common::reg::{CP1_BASE, FCR0, FCR31, cp0 as cp0_reg};
use crate::common::{AccessKind, BusRequest, Exception, Fault};
use crate::core::arith::se32;
use crate::core::pipeline::latches::{ExdcLatch, RfexLatch};
use crate::core::{Vr4300, cp0};
use crate::fpu::{self, RoundingMode, RoundingOverride};
use crate::isa::opcodes::{Fmt, Op, fd, fmt, fs, ft, imm16, rd, rt};

/// FCR31 condition-flag bit consumed by the BC1 branches.
pub const FCR31_CONDITION: u64 = 1 << 23;
/// Writable bits of FCR31.
const FCR31_WRITE_MASK: u64 = 0x0183_FFFF;

/// MCI interlock for ADD/SUB/ABS/NEG.
const MCI_SHORT: u32 = 3;
/// MCI interlock for single-precision MUL.
const MCI_MUL_S: u32 = 5;
/// MCI interlock for double-precision MUL.
const MCI_MUL_D: u32 = 8;
/// MCI interlock for single-precision DIV and SQRT.
const MCI_DIV_S: u32 = 29;
/// MCI interlock for double-precision DIV and SQRT.
const MCI_DIV_D: u32 = 58;
/// MCI interlock for conversions and directed rounds.
const MCI_CVT: u32 = 5;
/// MCI interlock for CVT.S from double.
const MCI_CVT_S_FROM_D: u32 = 2;

/// Executes one CP1 instruction in the EX stage.
pub(crate) fn ex_cp1(cpu: &mut Vr4300, out: &mut ExdcLatch, rfex: &RfexLatch) {
    let iw = rfex.iw;
    let fs_val = rfex.rs;
    let ft_val = rfex.rt;

    match rfex.opcode.id {
        Op::Mfc1 => mfc1(cpu, out, iw, fs_val),
        Op::Dmfc1 => {
            out.dest = rt(iw);
            out.result = fs_val;
        }
        Op::Cfc1 => cfc1(cpu, out, iw),
        Op::Mtc1 => mtc1(cpu, out, iw, fs_val, ft_val),
        Op::Dmtc1 => {
            out.dest = CP1_BASE + fs(iw);
            out.result = ft_val;
        }
        Op::Ctc1 => ctc1(cpu, out, iw, ft_val),
        Op::Bc1 => bc1(cpu, iw, rfex.common.pc),
        Op::Lwc1 => lwc1(cpu, out, iw, fs_val.wrapping_add(imm16(iw) as u64), ft_val),
        Op::Ldc1 => {
            let vaddr = fs_val.wrapping_add(imm16(iw) as u64);
            out.dest = CP1_BASE + ft(iw);
            if vaddr & AccessKind::Dword.align_mask() != 0 {
                out.common.fault = Some(Fault::at(Exception::AddressLoad, vaddr));
                out.dest = 0;
                return;
            }
            out.request = Some(BusRequest::read(vaddr, AccessKind::Dword, false));
        }
        Op::Swc1 => swc1(cpu, out, iw, fs_val.wrapping_add(imm16(iw) as u64), ft_val),
        Op::Sdc1 => {
            let vaddr = fs_val.wrapping_add(imm16(iw) as u64);
            if vaddr & AccessKind::Dword.align_mask() != 0 {
                out.common.fault = Some(Fault::at(Exception::AddressStore, vaddr));
                return;
            }
            out.request = Some(BusRequest::write(vaddr, AccessKind::Dword, ft_val));
        }
        _ => arith_op(cpu, out, rfex.opcode.id, iw, fs_val, ft_val),
    }
}

/// MFC1: move a 32-bit word from an FPU register to a GPR, selecting the
/// pair half when `Status.FR` is clear.
fn mfc1(cpu: &mut Vr4300, out: &mut ExdcLatch, iw: u32, fs_val: u64) {
    let fr = cpu.regs.cp0(cp0_reg::STATUS) & cp0::STATUS_FR != 0;
    out.dest = rt(iw);
    out.result = if fr || fs(iw) & 1 == 0 {
        se32(fs_val)
    } else {
        se32(fs_val >> 32)
    };
}

/// MTC1: move a 32-bit word from a GPR into an FPU register, splicing
/// into the pair half when `Status.FR` is clear.
fn mtc1(cpu: &mut Vr4300, out: &mut ExdcLatch, iw: u32, fs_val: u64, rt_val: u64) {
    let fr = cpu.regs.cp0(cp0_reg::STATUS) & cp0::STATUS_FR != 0;
    let mut dest = CP1_BASE + fs(iw);
    let result = if fr {
        rt_val as u32 as i32 as i64 as u64
    } else {
        let merged = if fs(iw) & 1 != 0 {
            (fs_val & 0xFFFF_FFFF) | (rt_val << 32)
        } else {
            (fs_val & !0xFFFF_FFFF) | u64::from(rt_val as u32)
        };
        dest &= !1;
        merged
    };
    out.dest = dest;
    out.result = result;
}

/// CFC1: read an FPU control register. Results written in the previous
/// cycle are bypassed from DCWB explicitly.
fn cfc1(cpu: &mut Vr4300, out: &mut ExdcLatch, iw: u32) {
    let mut result = match rd(iw) {
        0 => cpu.regs.read(FCR0),
        31 => cpu.regs.read(FCR31),
        n => {
            debug!(fcr = n, "CFC1 from reserved FCR");
            0
        }
    };
    if rd(iw) == 31 {
        let dcwb = &cpu.pipeline.dcwb;
        if !dcwb.common.killed && dcwb.dest == FCR31 {
            result = dcwb.result;
        }
    }
    out.dest = rt(iw);
    out.result = se32(result);
}

/// CTC1: write an FPU control register. Writes to anything but FCR31 are
/// reserved and discarded; an FCR31 write retargets the rounding mode
/// immediately.
fn ctc1(cpu: &mut Vr4300, out: &mut ExdcLatch, iw: u32, rt_val: u64) {
    if rd(iw) != 31 {
        debug!(fcr = rd(iw), "CTC1 to reserved FCR, discarded");
        return;
    }
    let value = rt_val & FCR31_WRITE_MASK;
    fpu::set_rounding_mode(RoundingMode::from_fcr31(value as u32));
    out.dest = FCR31;
    out.result = value;
}

/// BC1F/BC1T/BC1FL/BC1TL: branch on the FCR31 condition bit, bypassing a
/// condition produced in the immediately preceding cycle from DCWB.
/// Likely variants annul the delay slot when not taken.
fn bc1(cpu: &mut Vr4300, iw: u32, pc: u64) {
    let mut cond = cpu.regs.read(FCR31);
    let dcwb = &cpu.pipeline.dcwb;
    if !dcwb.common.killed && dcwb.dest == FCR31 {
        cond = dcwb.result;
    }
    let taken_pc = pc
        .wrapping_add(4)
        .wrapping_add((imm16(iw) << 2) as u64);
    let set = cond & FCR31_CONDITION != 0;

    match (iw >> 16) & 0x3 {
        0x0 => {
            // BC1F
            if !set {
                cpu.pipeline.icrf.pc = taken_pc;
            }
        }
        0x1 => {
            // BC1T
            if set {
                cpu.pipeline.icrf.pc = taken_pc;
            }
        }
        0x2 => {
            // BC1FL
            if !set {
                cpu.pipeline.icrf.pc = taken_pc;
            } else {
                cpu.pipeline.rfex.iw_mask = 0;
            }
        }
        _ => {
            // BC1TL
            if set {
                cpu.pipeline.icrf.pc = taken_pc;
            } else {
                cpu.pipeline.rfex.iw_mask = 0;
            }
        }
    }
}

/// LWC1: load a word into an FPU register, honouring the `Status.FR`
/// pairing rule by preserving the untouched half and shifting the loaded
/// word into place.
fn lwc1(cpu: &mut Vr4300, out: &mut ExdcLatch, iw: u32, vaddr: u64, ft_val: u64) {
    if vaddr & AccessKind::Word.align_mask() != 0 {
        out.common.fault = Some(Fault::at(Exception::AddressLoad, vaddr));
        return;
    }
    let fr = cpu.regs.cp0(cp0_reg::STATUS) & cp0::STATUS_FR != 0;
    let mut dest = CP1_BASE + ft(iw);
    let mut postshift = 0;
    let mut preserved = 0;

    if !fr {
        preserved = if ft(iw) & 1 != 0 {
            ft_val & 0x0000_0000_FFFF_FFFF
        } else {
            ft_val & 0xFFFF_FFFF_0000_0000
        };
        postshift = ((ft(iw) & 1) as u32) << 5;
        dest &= !1;
    }

    let mut request = BusRequest::read(vaddr, AccessKind::Word, false);
    request.postshift = postshift;
    out.request = Some(request);
    out.result = preserved;
    out.dest = dest;
}

/// SWC1: store a word from an FPU register, selecting the pair half when
/// `Status.FR` is clear.
fn swc1(cpu: &mut Vr4300, out: &mut ExdcLatch, iw: u32, vaddr: u64, ft_val: u64) {
    if vaddr & AccessKind::Word.align_mask() != 0 {
        out.common.fault = Some(Fault::at(Exception::AddressStore, vaddr));
        return;
    }
    let fr = cpu.regs.cp0(cp0_reg::STATUS) & cp0::STATUS_FR != 0;
    let mut data = ft_val;
    if !fr {
        data >>= ((ft(iw) & 1) as u32) << 5;
    }
    out.request = Some(BusRequest::write(vaddr, AccessKind::Word, data));
}

/// Raises the reserved-format fault the dispatcher uses for unsupported
/// format fields.
fn reserved_format(out: &mut ExdcLatch) {
    out.dest = 0;
    out.common.fault = Some(Fault::new(Exception::ReservedInstruction));
}

/// Runs a single/double arithmetic pair, writing FD.
///
/// Returns the raised interlock; IEEE flags accumulate into FCR31.
fn binary_op(
    cpu: &mut Vr4300,
    out: &mut ExdcLatch,
    iw: u32,
    fs_val: u64,
    ft_val: u64,
    op32: fn(&u32, &u32, &mut u32),
    op64: fn(&u64, &u64, &mut u64),
) -> bool {
    fpu::clear_flags();
    let result = match Fmt::from_field(fmt(iw)) {
        Fmt::S => {
            let (a, b) = (fs_val as u32, ft_val as u32);
            let mut r = 0u32;
            op32(&a, &b, &mut r);
            u64::from(r)
        }
        Fmt::D => {
            let mut r = 0u64;
            op64(&fs_val, &ft_val, &mut r);
            r
        }
        _ => {
            reserved_format(out);
            return false;
        }
    };
    accumulate_flags(cpu);
    out.dest = CP1_BASE + fd(iw);
    out.result = result;
    true
}

/// As [`binary_op`] for one-operand pairs (SQRT, ABS, NEG, MOV).
fn unary_op(
    cpu: &mut Vr4300,
    out: &mut ExdcLatch,
    iw: u32,
    fs_val: u64,
    op32: fn(&u32, &mut u32),
    op64: fn(&u64, &mut u64),
) -> bool {
    fpu::clear_flags();
    let result = match Fmt::from_field(fmt(iw)) {
        Fmt::S => {
            let a = fs_val as u32;
            let mut r = 0u32;
            op32(&a, &mut r);
            u64::from(r)
        }
        Fmt::D => {
            let mut r = 0u64;
            op64(&fs_val, &mut r);
            r
        }
        _ => {
            reserved_format(out);
            return false;
        }
    };
    accumulate_flags(cpu);
    out.dest = CP1_BASE + fd(iw);
    out.result = result;
    true
}

/// Converts FS to a 32-bit integer result under the active rounding mode.
fn to_word(cpu: &mut Vr4300, out: &mut ExdcLatch, iw: u32, fs_val: u64) -> bool {
    fpu::clear_flags();
    let result = match Fmt::from_field(fmt(iw)) {
        Fmt::S => {
            let a = fs_val as u32;
            let mut r = 0u32;
            fpu::f32_to_i32(&a, &mut r);
            u64::from(r)
        }
        Fmt::D => {
            let mut r = 0u32;
            fpu::f64_to_i32(&fs_val, &mut r);
            u64::from(r)
        }
        _ => {
            reserved_format(out);
            return false;
        }
    };
    accumulate_flags(cpu);
    out.dest = CP1_BASE + fd(iw);
    out.result = result;
    true
}

/// Converts FS to a 64-bit integer result under the active rounding mode.
fn to_long(cpu: &mut Vr4300, out: &mut ExdcLatch, iw: u32, fs_val: u64) -> bool {
    fpu::clear_flags();
    let result = match Fmt::from_field(fmt(iw)) {
        Fmt::S => {
            let a = fs_val as u32;
            let mut r = 0u64;
            fpu::f32_to_i64(&a, &mut r);
            r
        }
        Fmt::D => {
            let mut r = 0u64;
            fpu::f64_to_i64(&fs_val, &mut r);
            r
        }
        _ => {
            reserved_format(out);
            return false;
        }
    };
    accumulate_flags(cpu);
    out.dest = CP1_BASE + fd(iw);
    out.result = result;
    true
}

/// Folds harvested host IEEE flags into the FCR31 flag field.
fn accumulate_flags(cpu: &mut Vr4300) {
    let flags = u64::from(fpu::harvest_flags());
    if flags != 0 {
        let fcr = cpu.regs.read(FCR31);
        cpu.regs.write(FCR31, fcr | flags);
    }
}

/// Runs a compare pair, writing the condition into FCR31 bit 23.
fn compare_op(
    cpu: &mut Vr4300,
    out: &mut ExdcLatch,
    iw: u32,
    fs_val: u64,
    ft_val: u64,
    cmp32: fn(&u32, &u32) -> bool,
    cmp64: fn(&u64, &u64) -> bool,
) {
    let flag = match Fmt::from_field(fmt(iw)) {
        Fmt::S => {
            let (a, b) = (fs_val as u32, ft_val as u32);
            cmp32(&a, &b)
        }
        Fmt::D => cmp64(&fs_val, &ft_val),
        _ => {
            reserved_format(out);
            return;
        }
    };
    let base = cpu.regs.read(FCR31) & !FCR31_CONDITION;
    out.dest = FCR31;
    out.result = base | (u64::from(flag) << 23);
}

/// Arithmetic, conversion, and compare dispatch.
fn arith_op(cpu: &mut Vr4300, out: &mut ExdcLatch, op: Op, iw: u32, fs_val: u64, ft_val: u64) {
    let is_double = Fmt::from_field(fmt(iw)) == Fmt::D;
    match op {
        Op::Cp1Add => {
            if binary_op(cpu, out, iw, fs_val, ft_val, fpu::add_32, fpu::add_64) {
                cpu.do_mci(MCI_SHORT);
            }
        }
        Op::Cp1Sub => {
            if binary_op(cpu, out, iw, fs_val, ft_val, fpu::sub_32, fpu::sub_64) {
                cpu.do_mci(MCI_SHORT);
            }
        }
        Op::Cp1Mul => {
            if binary_op(cpu, out, iw, fs_val, ft_val, fpu::mul_32, fpu::mul_64) {
                cpu.do_mci(if is_double { MCI_MUL_D } else { MCI_MUL_S });
            }
        }
        Op::Cp1Div => {
            if binary_op(cpu, out, iw, fs_val, ft_val, fpu::div_32, fpu::div_64) {
                cpu.do_mci(if is_double { MCI_DIV_D } else { MCI_DIV_S });
            }
        }
        Op::Cp1Sqrt => {
            if unary_op(cpu, out, iw, fs_val, fpu::sqrt_32, fpu::sqrt_64) {
                cpu.do_mci(if is_double { MCI_DIV_D } else { MCI_DIV_S });
            }
        }
        Op::Cp1Abs => {
            if unary_op(cpu, out, iw, fs_val, fpu::abs_32, fpu::abs_64) {
                cpu.do_mci(MCI_SHORT);
            }
        }
        Op::Cp1Neg => {
            if unary_op(cpu, out, iw, fs_val, fpu::neg_32, fpu::neg_64) {
                cpu.do_mci(MCI_SHORT);
            }
        }
        Op::Cp1Mov => match Fmt::from_field(fmt(iw)) {
            Fmt::S | Fmt::D => {
                out.dest = CP1_BASE + fd(iw);
                out.result = fs_val;
            }
            _ => reserved_format(out),
        },

        // Directed rounds: override the rounding mode for the conversion;
        // the guard restores the previous mode when it drops.
        Op::Cp1RoundW | Op::Cp1TruncW | Op::Cp1CeilW | Op::Cp1FloorW => {
            let _guard = RoundingOverride::new(directed_mode(op));
            if to_word(cpu, out, iw, fs_val) {
                cpu.do_mci(MCI_CVT);
            }
        }
        Op::Cp1RoundL | Op::Cp1TruncL | Op::Cp1CeilL | Op::Cp1FloorL => {
            let _guard = RoundingOverride::new(directed_mode(op));
            if to_long(cpu, out, iw, fs_val) {
                cpu.do_mci(MCI_CVT);
            }
        }
        Op::Cp1CvtW => {
            if to_word(cpu, out, iw, fs_val) {
                cpu.do_mci(MCI_CVT);
            }
        }
        Op::Cp1CvtL => {
            if to_long(cpu, out, iw, fs_val) {
                cpu.do_mci(MCI_CVT);
            }
        }
        Op::Cp1CvtS => {
            fpu::clear_flags();
            let result = match Fmt::from_field(fmt(iw)) {
                Fmt::D => {
                    let mut r = 0u32;
                    fpu::f64_to_f32(&fs_val, &mut r);
                    u64::from(r)
                }
                Fmt::W => {
                    let a = fs_val as u32;
                    let mut r = 0u32;
                    fpu::i32_to_f32(&a, &mut r);
                    u64::from(r)
                }
                Fmt::L => {
                    let mut r = 0u32;
                    fpu::i64_to_f32(&fs_val, &mut r);
                    u64::from(r)
                }
                _ => {
                    reserved_format(out);
                    return;
                }
            };
            accumulate_flags(cpu);
            out.dest = CP1_BASE + fd(iw);
            out.result = result;
            cpu.do_mci(if is_double { MCI_CVT_S_FROM_D } else { MCI_CVT });
        }
        Op::Cp1CvtD => {
            fpu::clear_flags();
            let result = match Fmt::from_field(fmt(iw)) {
                Fmt::S => {
                    let a = fs_val as u32;
                    let mut r = 0u64;
                    fpu::f32_to_f64(&a, &mut r);
                    r
                }
                Fmt::W => {
                    let a = fs_val as u32;
                    let mut r = 0u64;
                    fpu::i32_to_f64(&a, &mut r);
                    r
                }
                Fmt::L => {
                    let mut r = 0u64;
                    fpu::i64_to_f64(&fs_val, &mut r);
                    r
                }
                _ => {
                    reserved_format(out);
                    return;
                }
            };
            accumulate_flags(cpu);
            out.dest = CP1_BASE + fd(iw);
            out.result = result;
            cpu.do_mci(MCI_CVT);
        }

        Op::Cp1CF => compare_op(cpu, out, iw, fs_val, ft_val, fpu::cmp_f_32, fpu::cmp_f_64),
        Op::Cp1CUn => compare_op(cpu, out, iw, fs_val, ft_val, fpu::cmp_un_32, fpu::cmp_un_64),
        Op::Cp1CEq => compare_op(cpu, out, iw, fs_val, ft_val, fpu::cmp_eq_32, fpu::cmp_eq_64),
        Op::Cp1CUeq => compare_op(cpu, out, iw, fs_val, ft_val, fpu::cmp_ueq_32, fpu::cmp_ueq_64),
        Op::Cp1COlt => compare_op(cpu, out, iw, fs_val, ft_val, fpu::cmp_olt_32, fpu::cmp_olt_64),
        Op::Cp1CUlt => compare_op(cpu, out, iw, fs_val, ft_val, fpu::cmp_ult_32, fpu::cmp_ult_64),
        Op::Cp1COle => compare_op(cpu, out, iw, fs_val, ft_val, fpu::cmp_ole_32, fpu::cmp_ole_64),
        Op::Cp1CUle => compare_op(cpu, out, iw, fs_val, ft_val, fpu::cmp_ule_32, fpu::cmp_ule_64),

        _ => reserved_format(out),
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
