//! Opcode identifiers, decode flags, and instruction field extractors.
//!
//! The decoder reduces every instruction word to an [`Opcode`]: an [`Op`]
//! identifier plus an [`OpFlags`] bitset that tells the pipeline which
//! operands the instruction needs and how it behaves (branch, load, store,
//! FPU). The flag encoding folds the "operand is an FPU register" bit into
//! the low bits so hazard checks stay flag-driven.

use crate::common::reg::CP1_BASE;

/// Decode flag bitset.
///
/// `NEEDFS`/`NEEDFT` are supersets of `NEEDRS`/`NEEDRT`: they set the same
/// "needs first/second operand" bit plus a low bit redirecting the operand
/// fetch into the CP1 register block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct OpFlags(pub u32);

impl OpFlags {
    /// No operands, no special behaviour.
    pub const NONE: OpFlags = OpFlags(0);
    /// First operand comes from the CP1 block (modifier on `NEEDRS`).
    pub const FS: OpFlags = OpFlags(1 << 0);
    /// Second operand comes from the CP1 block (modifier on `NEEDRT`).
    pub const FT: OpFlags = OpFlags(1 << 1);
    /// The instruction executes on the FPU coprocessor.
    pub const FPU: OpFlags = OpFlags(1 << 2);
    /// The instruction reads its first source operand (RS position).
    pub const NEEDRS: OpFlags = OpFlags(1 << 3);
    /// The instruction reads FS (first operand, CP1 block).
    pub const NEEDFS: OpFlags = OpFlags(1 << 3 | 1 << 0);
    /// The instruction reads its second source operand (RT position).
    pub const NEEDRT: OpFlags = OpFlags(1 << 4);
    /// The instruction reads FT (second operand, CP1 block).
    pub const NEEDFT: OpFlags = OpFlags(1 << 4 | 1 << 1);
    /// The instruction is a memory load.
    pub const LOAD: OpFlags = OpFlags(1 << 5);
    /// The instruction is a memory store.
    pub const STORE: OpFlags = OpFlags(1 << 6);
    /// The instruction is a branch or jump.
    pub const BRANCH: OpFlags = OpFlags(1 << 31);

    /// Union of two flag sets.
    #[inline(always)]
    pub const fn union(self, other: OpFlags) -> OpFlags {
        OpFlags(self.0 | other.0)
    }

    /// True when every bit of `other` is set in `self`.
    #[inline(always)]
    pub const fn contains(self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The instruction reads a first source operand.
    #[inline(always)]
    pub fn needs_first(self) -> bool {
        self.contains(OpFlags::NEEDRS)
    }

    /// The instruction reads a second source operand.
    #[inline(always)]
    pub fn needs_second(self) -> bool {
        self.contains(OpFlags::NEEDRT)
    }
}

impl std::ops::BitOr for OpFlags {
    type Output = OpFlags;
    fn bitor(self, rhs: OpFlags) -> OpFlags {
        self.union(rhs)
    }
}

/// Opcode identifiers for every instruction the core executes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)] // Names are the MIPS mnemonics.
pub enum Op {
    // Jumps and branches.
    J,
    Jal,
    Jr,
    Jalr,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Beql,
    Bnel,
    Blezl,
    Bgtzl,
    Bltz,
    Bgez,
    Bltzl,
    Bgezl,
    Bltzal,
    Bgezal,
    // Immediate arithmetic.
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    // Loads and stores.
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lw,
    Lwu,
    Lwl,
    Lwr,
    Ld,
    Ll,
    Sb,
    Sh,
    Sw,
    Swl,
    Swr,
    Sd,
    Sc,
    Cache,
    Pref,
    // Three-register arithmetic and logic.
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Daddu,
    Movz,
    Movn,
    // Multiplier.
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Mult,
    Multu,
    Div,
    Divu,
    Mul,
    // System.
    Syscall,
    Break,
    Sync,
    Tne,
    Wait,
    // CP0.
    Mfc0,
    Mtc0,
    Tlbr,
    Tlbwi,
    Tlbwr,
    Tlbp,
    Eret,
    // CP1 moves and branches.
    Mfc1,
    Dmfc1,
    Cfc1,
    Mtc1,
    Dmtc1,
    Ctc1,
    Bc1,
    // CP1 loads and stores.
    Lwc1,
    Ldc1,
    Swc1,
    Sdc1,
    // CP1 arithmetic.
    Cp1Add,
    Cp1Sub,
    Cp1Mul,
    Cp1Div,
    Cp1Sqrt,
    Cp1Abs,
    Cp1Mov,
    Cp1Neg,
    Cp1RoundL,
    Cp1TruncL,
    Cp1CeilL,
    Cp1FloorL,
    Cp1RoundW,
    Cp1TruncW,
    Cp1CeilW,
    Cp1FloorW,
    Cp1CvtS,
    Cp1CvtD,
    Cp1CvtW,
    Cp1CvtL,
    // CP1 compares (each handler covers the ordered and signalling twin).
    Cp1CF,
    Cp1CUn,
    Cp1CEq,
    Cp1CUeq,
    Cp1COlt,
    Cp1CUlt,
    Cp1COle,
    Cp1CUle,
    /// Undecodable word; raises a reserved-instruction exception.
    Invalid,
}

/// A decoded instruction: identifier plus behaviour flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opcode {
    /// The opcode identifier.
    pub id: Op,
    /// Behaviour flags driving operand fetch and hazard checks.
    pub flags: OpFlags,
}

impl Opcode {
    /// Constructs an opcode record.
    pub const fn new(id: Op, flags: OpFlags) -> Self {
        Self { id, flags }
    }

    /// The reserved-instruction sentinel.
    pub const INVALID: Opcode = Opcode::new(Op::Invalid, OpFlags::NONE);

    /// Unified register indices of the two source operands, honouring the
    /// FS/FT redirection bits. `None` when the operand is not read.
    pub fn source_indices(&self, iw: u32) -> (Option<usize>, Option<usize>) {
        let first = if self.flags.needs_first() {
            Some(if self.flags.contains(OpFlags::FS) {
                CP1_BASE + fd_field(iw, 11)
            } else {
                rs(iw)
            })
        } else {
            None
        };
        let second = if self.flags.needs_second() {
            Some(if self.flags.contains(OpFlags::FT) {
                CP1_BASE + fd_field(iw, 16)
            } else {
                rt(iw)
            })
        } else {
            None
        };
        (first, second)
    }
}

/// RS field (bits 25:21).
#[inline(always)]
pub fn rs(iw: u32) -> usize {
    ((iw >> 21) & 0x1F) as usize
}

/// RT field (bits 20:16).
#[inline(always)]
pub fn rt(iw: u32) -> usize {
    ((iw >> 16) & 0x1F) as usize
}

/// RD field (bits 15:11).
#[inline(always)]
pub fn rd(iw: u32) -> usize {
    ((iw >> 11) & 0x1F) as usize
}

/// SA shift-amount field (bits 10:6).
#[inline(always)]
pub fn sa(iw: u32) -> u32 {
    (iw >> 6) & 0x1F
}

/// FUNCT field (bits 5:0).
#[inline(always)]
pub fn funct(iw: u32) -> u32 {
    iw & 0x3F
}

/// FMT field of a COP1 instruction (bits 25:21).
#[inline(always)]
pub fn fmt(iw: u32) -> u32 {
    (iw >> 21) & 0x1F
}

/// An FPU register field at the given shift, as a raw 0-31 number.
#[inline(always)]
fn fd_field(iw: u32, shift: u32) -> usize {
    ((iw >> shift) & 0x1F) as usize
}

/// FS field (bits 15:11) as a raw CP1 register number.
#[inline(always)]
pub fn fs(iw: u32) -> usize {
    fd_field(iw, 11)
}

/// FT field (bits 20:16) as a raw CP1 register number.
#[inline(always)]
pub fn ft(iw: u32) -> usize {
    fd_field(iw, 16)
}

/// FD field (bits 10:6) as a raw CP1 register number.
#[inline(always)]
pub fn fd(iw: u32) -> usize {
    fd_field(iw, 6)
}

/// Sign-extended 16-bit immediate.
#[inline(always)]
pub fn imm16(iw: u32) -> i64 {
    iw as u16 as i16 as i64
}

/// 26-bit jump target field.
#[inline(always)]
pub fn target26(iw: u32) -> u64 {
    (iw & 0x03FF_FFFF) as u64
}

/// COP1 operand formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fmt {
    /// Single-precision float.
    S,
    /// Double-precision float.
    D,
    /// 32-bit integer word.
    W,
    /// 64-bit integer long.
    L,
    /// Any other (reserved) format value.
    Reserved,
}

impl Fmt {
    /// Decodes the FMT field value.
    pub fn from_field(field: u32) -> Fmt {
        match field {
            16 => Fmt::S,
            17 => Fmt::D,
            20 => Fmt::W,
            21 => Fmt::L,
            _ => Fmt::Reserved,
        }
    }
}
