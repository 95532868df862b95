//! MIPS III instruction encoders for test programs.
//!
//! Thin functions over the encoding formats; register arguments are
//! architectural numbers (0–31), immediates are the architectural
//! signed/unsigned 16-bit fields.

/// I-type encoding.
fn itype(op: u32, rs: u32, rt: u32, imm: u16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | u32::from(imm)
}

/// R-type (SPECIAL) encoding.
fn rtype(rs: u32, rt: u32, rd: u32, sa: u32, funct: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | (sa << 6) | funct
}

/// `NOP` (`SLL r0, r0, 0`).
pub fn nop() -> u32 {
    0
}

/// `ADDIU rt, rs, imm`.
pub fn addiu(rt: u32, rs: u32, imm: i16) -> u32 {
    itype(0x09, rs, rt, imm as u16)
}

/// `ADDI rt, rs, imm` (overflow-trapping).
pub fn addi(rt: u32, rs: u32, imm: i16) -> u32 {
    itype(0x08, rs, rt, imm as u16)
}

/// `ORI rt, rs, imm`.
pub fn ori(rt: u32, rs: u32, imm: u16) -> u32 {
    itype(0x0D, rs, rt, imm)
}

/// `LUI rt, imm`.
pub fn lui(rt: u32, imm: u16) -> u32 {
    itype(0x0F, 0, rt, imm)
}

/// `ADDU rd, rs, rt`.
pub fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, rd, 0, 0x21)
}

/// `OR rd, rs, rt`.
pub fn or(rd: u32, rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, rd, 0, 0x25)
}

/// `SLT rd, rs, rt`.
pub fn slt(rd: u32, rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, rd, 0, 0x2A)
}

/// `MULT rs, rt`.
pub fn mult(rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, 0, 0, 0x18)
}

/// `DIV rs, rt`.
pub fn div(rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, 0, 0, 0x1A)
}

/// `MFLO rd`.
pub fn mflo(rd: u32) -> u32 {
    rtype(0, 0, rd, 0, 0x12)
}

/// `MFHI rd`.
pub fn mfhi(rd: u32) -> u32 {
    rtype(0, 0, rd, 0, 0x10)
}

/// `JR rs`.
pub fn jr(rs: u32) -> u32 {
    rtype(rs, 0, 0, 0, 0x08)
}

/// `J target` (26-bit word target field).
pub fn j(target: u32) -> u32 {
    (0x02 << 26) | (target & 0x03FF_FFFF)
}

/// `JAL target`.
pub fn jal(target: u32) -> u32 {
    (0x03 << 26) | (target & 0x03FF_FFFF)
}

/// `J` to an absolute virtual address (within the current 256 MiB region).
pub fn j_to(vaddr: u64) -> u32 {
    j(((vaddr >> 2) & 0x03FF_FFFF) as u32)
}

/// `BEQ rs, rt, offset` (instruction words).
pub fn beq(rs: u32, rt: u32, offset: i16) -> u32 {
    itype(0x04, rs, rt, offset as u16)
}

/// `BNE rs, rt, offset`.
pub fn bne(rs: u32, rt: u32, offset: i16) -> u32 {
    itype(0x05, rs, rt, offset as u16)
}

/// `BEQL rs, rt, offset`.
pub fn beql(rs: u32, rt: u32, offset: i16) -> u32 {
    itype(0x14, rs, rt, offset as u16)
}

/// `LB rt, offset(base)`.
pub fn lb(rt: u32, base: u32, offset: i16) -> u32 {
    itype(0x20, base, rt, offset as u16)
}

/// `LW rt, offset(base)`.
pub fn lw(rt: u32, base: u32, offset: i16) -> u32 {
    itype(0x23, base, rt, offset as u16)
}

/// `LD rt, offset(base)`.
pub fn ld(rt: u32, base: u32, offset: i16) -> u32 {
    itype(0x37, base, rt, offset as u16)
}

/// `SB rt, offset(base)`.
pub fn sb(rt: u32, base: u32, offset: i16) -> u32 {
    itype(0x28, base, rt, offset as u16)
}

/// `SW rt, offset(base)`.
pub fn sw(rt: u32, base: u32, offset: i16) -> u32 {
    itype(0x2B, base, rt, offset as u16)
}

/// `SD rt, offset(base)`.
pub fn sd(rt: u32, base: u32, offset: i16) -> u32 {
    itype(0x3F, base, rt, offset as u16)
}

/// `LL rt, offset(base)`.
pub fn ll(rt: u32, base: u32, offset: i16) -> u32 {
    itype(0x30, base, rt, offset as u16)
}

/// `SC rt, offset(base)`.
pub fn sc(rt: u32, base: u32, offset: i16) -> u32 {
    itype(0x38, base, rt, offset as u16)
}

/// `MFC0 rt, cp0reg`.
pub fn mfc0(rt: u32, cp0reg: u32) -> u32 {
    0x4000_0000 | (rt << 16) | (cp0reg << 11)
}

/// `MTC0 rt, cp0reg`.
pub fn mtc0(rt: u32, cp0reg: u32) -> u32 {
    0x4080_0000 | (rt << 16) | (cp0reg << 11)
}

/// `TLBWI`.
pub fn tlbwi() -> u32 {
    0x4200_0002
}

/// `ERET`.
pub fn eret() -> u32 {
    0x4200_0018
}

/// `MTC1 rt, fs`.
pub fn mtc1(rt: u32, fs: u32) -> u32 {
    0x4480_0000 | (rt << 16) | (fs << 11)
}

/// `MFC1 rt, fs`.
pub fn mfc1(rt: u32, fs: u32) -> u32 {
    0x4400_0000 | (rt << 16) | (fs << 11)
}

/// `CTC1 rt, fcr`.
pub fn ctc1(rt: u32, fcr: u32) -> u32 {
    0x44C0_0000 | (rt << 16) | (fcr << 11)
}

/// `CFC1 rt, fcr`.
pub fn cfc1(rt: u32, fcr: u32) -> u32 {
    0x4440_0000 | (rt << 16) | (fcr << 11)
}

/// `ADD.S fd, fs, ft`.
pub fn add_s(fd: u32, fs: u32, ft: u32) -> u32 {
    0x4600_0000 | (ft << 16) | (fs << 11) | (fd << 6)
}

/// `C.LT.S fs, ft`.
pub fn c_lt_s(fs: u32, ft: u32) -> u32 {
    0x4600_0000 | (ft << 16) | (fs << 11) | 0x3C
}

/// `C.EQ.S fs, ft`.
pub fn c_eq_s(fs: u32, ft: u32) -> u32 {
    0x4600_0000 | (ft << 16) | (fs << 11) | 0x32
}

/// `BC1T offset`.
pub fn bc1t(offset: i16) -> u32 {
    0x4501_0000 | u32::from(offset as u16)
}

/// `BC1F offset`.
pub fn bc1f(offset: i16) -> u32 {
    0x4500_0000 | u32::from(offset as u16)
}

/// `CACHE op, offset(base)`.
pub fn cache(op: u32, base: u32, offset: i16) -> u32 {
    itype(0x2F, base, op, offset as u16)
}

/// `WAIT`.
pub fn wait() -> u32 {
    0x4200_0020
}

/// `SYSCALL`.
pub fn syscall() -> u32 {
    0x0000_000C
}
