//! Bit-exact IEEE-754 floating-point primitives.
//!
//! The FPU layer the CP1 coprocessor dispatches into. It provides:
//! 1. **Arithmetic:** add/sub/mul/div/sqrt and sign ops in single and
//!    double precision, operating on opaque 32-/64-bit words.
//! 2. **Conversions:** to/from 32- and 64-bit integers honouring the
//!    process-wide rounding mode.
//! 3. **Comparisons:** the eight IEEE predicate handlers in both widths.
//! 4. **Rounding control:** a process-wide mode mirrored onto the host FPU,
//!    with a scoped override guard.
//! 5. **Flags:** host exception flags harvested for FCR31 accumulation.
//!
//! Operands are passed by reference to opaque words and results written
//! through `&mut` out-parameters, so callers never alias the architectural
//! representation with a host float. There is one hardware FPU: the
//! rounding mode is process-wide state, and trap masking is permanently
//! "no traps" (the host default); IEEE flags accumulate via [`harvest_flags`].

/// Rounding-mode control and the scoped override guard.
pub mod rounding;

pub use rounding::{RoundingMode, RoundingOverride, rounding_mode, set_rounding_mode};

// Host FPU exception flag bits from <fenv.h>. These are the same on x86_64
// and aarch64 Linux (POSIX standard values).
const FE_INEXACT: i32 = 0x20;
const FE_UNDERFLOW: i32 = 0x10;
const FE_OVERFLOW: i32 = 0x08;
const FE_DIVBYZERO: i32 = 0x04;
const FE_INVALID: i32 = 0x01;
const FE_ALL_EXCEPT: i32 =
    FE_INEXACT | FE_UNDERFLOW | FE_OVERFLOW | FE_DIVBYZERO | FE_INVALID;

unsafe extern "C" {
    fn feclearexcept(excepts: i32) -> i32;
    fn fetestexcept(excepts: i32) -> i32;
}

/// FCR31 flag-field bit for an inexact result.
pub const FLAG_INEXACT: u32 = 1 << 2;
/// FCR31 flag-field bit for underflow.
pub const FLAG_UNDERFLOW: u32 = 1 << 3;
/// FCR31 flag-field bit for overflow.
pub const FLAG_OVERFLOW: u32 = 1 << 4;
/// FCR31 flag-field bit for division by zero.
pub const FLAG_DIV_ZERO: u32 = 1 << 5;
/// FCR31 flag-field bit for an invalid operation.
pub const FLAG_INVALID: u32 = 1 << 6;

/// Initialises the FPU environment: round-to-nearest, traps masked, flags
/// clear.
pub fn init() {
    set_rounding_mode(RoundingMode::Nearest);
    clear_flags();
}

/// Clears the host FPU exception flags.
pub fn clear_flags() {
    // SAFETY: feclearexcept only mutates the thread's floating-point
    // environment and accepts any subset of the FE_* bits.
    unsafe {
        let _ = feclearexcept(FE_ALL_EXCEPT);
    }
}

/// Reads the host FPU exception flags accumulated since the last clear,
/// mapped onto the FCR31 flag field.
pub fn harvest_flags() -> u32 {
    // SAFETY: fetestexcept is a read-only query of the FP environment.
    let host = unsafe { fetestexcept(FE_ALL_EXCEPT) };
    let mut flags = 0;
    if host & FE_INVALID != 0 {
        flags |= FLAG_INVALID;
    }
    if host & FE_DIVBYZERO != 0 {
        flags |= FLAG_DIV_ZERO;
    }
    if host & FE_OVERFLOW != 0 {
        flags |= FLAG_OVERFLOW;
    }
    if host & FE_UNDERFLOW != 0 {
        flags |= FLAG_UNDERFLOW;
    }
    if host & FE_INEXACT != 0 {
        flags |= FLAG_INEXACT;
    }
    flags
}

// ---- Single-precision arithmetic ----

/// `fd = fs + ft` in single precision.
pub fn add_32(fs: &u32, ft: &u32, fd: &mut u32) {
    *fd = (f32::from_bits(*fs) + f32::from_bits(*ft)).to_bits();
}

/// `fd = fs - ft` in single precision.
pub fn sub_32(fs: &u32, ft: &u32, fd: &mut u32) {
    *fd = (f32::from_bits(*fs) - f32::from_bits(*ft)).to_bits();
}

/// `fd = fs * ft` in single precision.
pub fn mul_32(fs: &u32, ft: &u32, fd: &mut u32) {
    *fd = (f32::from_bits(*fs) * f32::from_bits(*ft)).to_bits();
}

/// `fd = fs / ft` in single precision.
pub fn div_32(fs: &u32, ft: &u32, fd: &mut u32) {
    *fd = (f32::from_bits(*fs) / f32::from_bits(*ft)).to_bits();
}

/// `fd = sqrt(fs)` in single precision.
pub fn sqrt_32(fs: &u32, fd: &mut u32) {
    *fd = f32::from_bits(*fs).sqrt().to_bits();
}

/// `fd = |fs|` in single precision (sign-bit clear).
pub fn abs_32(fs: &u32, fd: &mut u32) {
    *fd = *fs & 0x7FFF_FFFF;
}

/// `fd = -fs` in single precision (sign-bit flip).
pub fn neg_32(fs: &u32, fd: &mut u32) {
    *fd = *fs ^ 0x8000_0000;
}

// ---- Double-precision arithmetic ----

/// `fd = fs + ft` in double precision.
pub fn add_64(fs: &u64, ft: &u64, fd: &mut u64) {
    *fd = (f64::from_bits(*fs) + f64::from_bits(*ft)).to_bits();
}

/// `fd = fs - ft` in double precision.
pub fn sub_64(fs: &u64, ft: &u64, fd: &mut u64) {
    *fd = (f64::from_bits(*fs) - f64::from_bits(*ft)).to_bits();
}

/// `fd = fs * ft` in double precision.
pub fn mul_64(fs: &u64, ft: &u64, fd: &mut u64) {
    *fd = (f64::from_bits(*fs) * f64::from_bits(*ft)).to_bits();
}

/// `fd = fs / ft` in double precision.
pub fn div_64(fs: &u64, ft: &u64, fd: &mut u64) {
    *fd = (f64::from_bits(*fs) / f64::from_bits(*ft)).to_bits();
}

/// `fd = sqrt(fs)` in double precision.
pub fn sqrt_64(fs: &u64, fd: &mut u64) {
    *fd = f64::from_bits(*fs).sqrt().to_bits();
}

/// `fd = |fs|` in double precision (sign-bit clear).
pub fn abs_64(fs: &u64, fd: &mut u64) {
    *fd = *fs & 0x7FFF_FFFF_FFFF_FFFF;
}

/// `fd = -fs` in double precision (sign-bit flip).
pub fn neg_64(fs: &u64, fd: &mut u64) {
    *fd = *fs ^ 0x8000_0000_0000_0000;
}

// ---- Conversions ----

/// Applies the process-wide rounding mode to a value, producing an integer
/// still represented as f64.
fn round_by_mode(v: f64) -> f64 {
    match rounding_mode() {
        RoundingMode::Nearest => v.round_ties_even(),
        RoundingMode::TowardZero => v.trunc(),
        RoundingMode::Up => v.ceil(),
        RoundingMode::Down => v.floor(),
    }
}

/// Rounds and clamps to i32. NaN and out-of-range values saturate high,
/// matching the result the guest observes on an invalid conversion.
fn to_i32_clamped(v: f64) -> i32 {
    if v.is_nan() {
        return i32::MAX;
    }
    let r = round_by_mode(v);
    if r >= -(i32::MIN as f64) {
        i32::MAX
    } else if r < i32::MIN as f64 {
        i32::MIN
    } else {
        r as i32
    }
}

/// Rounds and clamps to i64 with the same saturation rules.
fn to_i64_clamped(v: f64) -> i64 {
    if v.is_nan() {
        return i64::MAX;
    }
    let r = round_by_mode(v);
    if r >= -(i64::MIN as f64) {
        i64::MAX
    } else if r < i64::MIN as f64 {
        i64::MIN
    } else {
        r as i64
    }
}

/// Converts single precision to a 32-bit integer word.
pub fn f32_to_i32(fs: &u32, fd: &mut u32) {
    *fd = to_i32_clamped(f32::from_bits(*fs) as f64) as u32;
}

/// Converts double precision to a 32-bit integer word.
pub fn f64_to_i32(fs: &u64, fd: &mut u32) {
    *fd = to_i32_clamped(f64::from_bits(*fs)) as u32;
}

/// Converts single precision to a 64-bit integer.
pub fn f32_to_i64(fs: &u32, fd: &mut u64) {
    *fd = to_i64_clamped(f32::from_bits(*fs) as f64) as u64;
}

/// Converts double precision to a 64-bit integer.
pub fn f64_to_i64(fs: &u64, fd: &mut u64) {
    *fd = to_i64_clamped(f64::from_bits(*fs)) as u64;
}

/// Converts a 32-bit integer word to single precision.
pub fn i32_to_f32(fs: &u32, fd: &mut u32) {
    *fd = (*fs as i32 as f32).to_bits();
}

/// Converts a 32-bit integer word to double precision.
pub fn i32_to_f64(fs: &u32, fd: &mut u64) {
    *fd = (*fs as i32 as f64).to_bits();
}

/// Converts a 64-bit integer to single precision.
pub fn i64_to_f32(fs: &u64, fd: &mut u32) {
    *fd = (*fs as i64 as f32).to_bits();
}

/// Converts a 64-bit integer to double precision.
pub fn i64_to_f64(fs: &u64, fd: &mut u64) {
    *fd = (*fs as i64 as f64).to_bits();
}

/// Widens single to double precision (exact).
pub fn f32_to_f64(fs: &u32, fd: &mut u64) {
    *fd = (f32::from_bits(*fs) as f64).to_bits();
}

/// Narrows double to single precision under the current rounding mode.
pub fn f64_to_f32(fs: &u64, fd: &mut u32) {
    *fd = (f64::from_bits(*fs) as f32).to_bits();
}

// ---- Comparisons ----
//
// Each predicate returns the single condition flag CP1 writes into FCR31
// bit 23. The signalling twins (C.SF, C.SEQ, ...) share these handlers.

macro_rules! compare_pair {
    ($n32:ident, $n64:ident, $doc:literal, |$a:ident, $b:ident| $body:expr) => {
        #[doc = $doc]
        #[doc = " (single precision)."]
        pub fn $n32(fs: &u32, ft: &u32) -> bool {
            let $a = f32::from_bits(*fs);
            let $b = f32::from_bits(*ft);
            $body
        }

        #[doc = $doc]
        #[doc = " (double precision)."]
        pub fn $n64(fs: &u64, ft: &u64) -> bool {
            let $a = f64::from_bits(*fs);
            let $b = f64::from_bits(*ft);
            $body
        }
    };
}

compare_pair!(cmp_f_32, cmp_f_64, "Always-false predicate", |a, b| {
    let _ = (a, b);
    false
});
compare_pair!(cmp_un_32, cmp_un_64, "Unordered", |a, b| a.is_nan()
    || b.is_nan());
compare_pair!(cmp_eq_32, cmp_eq_64, "Ordered equal", |a, b| a == b);
compare_pair!(cmp_ueq_32, cmp_ueq_64, "Unordered or equal", |a, b| a
    .is_nan()
    || b.is_nan()
    || a == b);
compare_pair!(cmp_olt_32, cmp_olt_64, "Ordered less-than", |a, b| a < b);
compare_pair!(cmp_ult_32, cmp_ult_64, "Unordered or less-than", |a, b| a
    .is_nan()
    || b.is_nan()
    || a < b);
compare_pair!(cmp_ole_32, cmp_ole_64, "Ordered less-or-equal", |a, b| a
    <= b);
compare_pair!(
    cmp_ule_32,
    cmp_ule_64,
    "Unordered or less-or-equal",
    |a, b| a.is_nan() || b.is_nan() || a <= b
);
