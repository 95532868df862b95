//! Process-wide rounding-mode control.
//!
//! There is exactly one hardware FPU, so the rounding mode is process-wide
//! state: a logical mode consulted by the software conversion paths, kept
//! in lock-step with the host FPU control word so hardware arithmetic
//! rounds the same way. Code that needs a different mode for one operation
//! takes a [`RoundingOverride`]; the previous mode is restored by `Drop`,
//! so an early return cannot leak the override.

use std::sync::atomic::{AtomicU8, Ordering};

// Host <fenv.h> rounding-control values. Unlike the exception flags these
// differ per architecture.
#[cfg(target_arch = "x86_64")]
mod host {
    pub const FE_TONEAREST: i32 = 0x000;
    pub const FE_DOWNWARD: i32 = 0x400;
    pub const FE_UPWARD: i32 = 0x800;
    pub const FE_TOWARDZERO: i32 = 0xC00;
}
#[cfg(target_arch = "aarch64")]
mod host {
    pub const FE_TONEAREST: i32 = 0x00000000;
    pub const FE_UPWARD: i32 = 0x00400000;
    pub const FE_DOWNWARD: i32 = 0x00800000;
    pub const FE_TOWARDZERO: i32 = 0x00C00000;
}

unsafe extern "C" {
    fn fesetround(round: i32) -> i32;
}

/// IEEE-754 rounding modes, in the encoding of the FCR31 RM field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RoundingMode {
    /// Round to nearest, ties to even (RM = 0).
    Nearest = 0,
    /// Round toward zero (RM = 1).
    TowardZero = 1,
    /// Round toward +∞ (RM = 2).
    Up = 2,
    /// Round toward −∞ (RM = 3).
    Down = 3,
}

impl RoundingMode {
    /// Decodes the two-bit FCR31 RM field.
    pub fn from_fcr31(bits: u32) -> RoundingMode {
        match bits & 0x3 {
            0 => RoundingMode::Nearest,
            1 => RoundingMode::TowardZero,
            2 => RoundingMode::Up,
            _ => RoundingMode::Down,
        }
    }

    fn host_value(self) -> i32 {
        match self {
            RoundingMode::Nearest => host::FE_TONEAREST,
            RoundingMode::TowardZero => host::FE_TOWARDZERO,
            RoundingMode::Up => host::FE_UPWARD,
            RoundingMode::Down => host::FE_DOWNWARD,
        }
    }

    fn from_u8(v: u8) -> RoundingMode {
        match v {
            1 => RoundingMode::TowardZero,
            2 => RoundingMode::Up,
            3 => RoundingMode::Down,
            _ => RoundingMode::Nearest,
        }
    }
}

/// The logical process-wide mode, mirrored onto the host FPU.
static MODE: AtomicU8 = AtomicU8::new(RoundingMode::Nearest as u8);

/// Returns the current process-wide rounding mode.
pub fn rounding_mode() -> RoundingMode {
    RoundingMode::from_u8(MODE.load(Ordering::Relaxed))
}

/// Sets the process-wide rounding mode, updating the host FPU to match.
pub fn set_rounding_mode(mode: RoundingMode) {
    MODE.store(mode as u8, Ordering::Relaxed);
    // SAFETY: fesetround accepts exactly the FE_* rounding values, which
    // host_value is total over; it only mutates the FP control word.
    unsafe {
        let _ = fesetround(mode.host_value());
    }
}

/// Scoped rounding-mode override.
///
/// Saves the current mode, installs the requested one, and restores the
/// saved mode on drop. Failure to restore would be a fatal invariant
/// violation, which is why restoration is tied to `Drop` rather than to a
/// paired call.
#[derive(Debug)]
pub struct RoundingOverride {
    saved: RoundingMode,
}

impl RoundingOverride {
    /// Installs `mode`, remembering the mode it displaced.
    pub fn new(mode: RoundingMode) -> Self {
        let saved = rounding_mode();
        set_rounding_mode(mode);
        Self { saved }
    }
}

impl Drop for RoundingOverride {
    fn drop(&mut self) {
        set_rounding_mode(self.saved);
    }
}
