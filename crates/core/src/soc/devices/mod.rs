//! Memory-mapped devices.
//!
//! The device set is closed, so the memory map refers to devices through
//! the [`DeviceId`] tag rather than a polymorphic handle; the bus owns the
//! device instances and dispatches on the tag.

/// Console UART device.
pub mod uart;

pub use uart::Uart;

/// Identifies the device behind a mapped range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceId {
    /// The console UART.
    Uart,
}
