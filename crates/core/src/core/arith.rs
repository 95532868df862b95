//! Shared integer execution helpers.
//!
//! Both execution models route their arithmetic through these helpers, so
//! corner cases — 32-bit overflow detection, the multiplier register
//! pairs, division by zero — cannot diverge between them.

/// Sign-extends the low 32 bits of a value to 64 bits.
#[inline(always)]
pub fn se32(v: u64) -> u64 {
    v as u32 as i32 as i64 as u64
}

/// 32-bit add with two's-complement overflow detection (`ADD`/`ADDI`).
pub fn add32_overflow(a: u64, b: u64) -> Option<u64> {
    (a as u32 as i32)
        .checked_add(b as u32 as i32)
        .map(|r| r as i64 as u64)
}

/// 32-bit subtract with overflow detection (`SUB`).
pub fn sub32_overflow(a: u64, b: u64) -> Option<u64> {
    (a as u32 as i32)
        .checked_sub(b as u32 as i32)
        .map(|r| r as i64 as u64)
}

/// `MULT`: signed 32×32 product, split into sign-extended (LO, HI).
pub fn mult(a: u64, b: u64) -> (u64, u64) {
    let prod = i64::from(a as u32 as i32) * i64::from(b as u32 as i32);
    (se32(prod as u64), se32((prod >> 32) as u64))
}

/// `MULTU`: unsigned 32×32 product, split into sign-extended (LO, HI).
pub fn multu(a: u64, b: u64) -> (u64, u64) {
    let prod = u64::from(a as u32) * u64::from(b as u32);
    (se32(prod), se32(prod >> 32))
}

/// `DIV`: signed 32-bit division. Division by zero does not trap; the
/// quotient is all-ones for a non-negative dividend and one otherwise,
/// with the dividend left in HI, matching observed hardware convention.
pub fn div(a: u64, b: u64) -> (u64, u64) {
    let a = a as u32 as i32;
    let b = b as u32 as i32;
    if b == 0 {
        let lo = if a >= 0 { -1i32 } else { 1 };
        return (se32(lo as u32 as u64), se32(a as u32 as u64));
    }
    // i32::MIN / -1 overflows; hardware produces the dividend unchanged.
    let (q, r) = if a == i32::MIN && b == -1 {
        (i32::MIN, 0)
    } else {
        (a / b, a % b)
    };
    (se32(q as u32 as u64), se32(r as u32 as u64))
}

/// `DIVU`: unsigned 32-bit division, same zero-divisor convention.
pub fn divu(a: u64, b: u64) -> (u64, u64) {
    let a = a as u32;
    let b = b as u32;
    if b == 0 {
        return (se32(u64::from(u32::MAX)), se32(u64::from(a)));
    }
    (se32(u64::from(a / b)), se32(u64::from(a % b)))
}
