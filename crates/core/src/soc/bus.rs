//! System bus controller.
//!
//! The bus owns the physical memory image and the device instances, and
//! demuxes word transactions: addresses below `mem_size` are served
//! straight from RAM and never consult the memory map; everything else is
//! resolved through the map to a device. Unmapped reads return zero and
//! unmapped writes are dropped, with a debug log either way.
//!
//! Words travel the bus in native (little-endian) order; the architectural
//! big-endian byte swap is deliberately elided, matching the behaviour the
//! accompanying system images were built against.

use tracing::debug;

use crate::common::SimError;
use crate::config::Config;
use crate::soc::devices::{DeviceId, Uart};
use crate::soc::map::MemoryMap;

/// The system bus: memory image, memory map, and devices.
#[derive(Debug)]
pub struct Bus {
    mem: Vec<u8>,
    mem_size: u32,
    map: MemoryMap,
    /// The console UART.
    pub uart: Uart,
}

impl Bus {
    /// Builds the bus for the given configuration: allocates RAM and maps
    /// the UART window.
    ///
    /// # Errors
    ///
    /// Returns a [`SimError`] if the device ranges collide (they cannot
    /// with a sane configuration, but the map checks regardless).
    pub fn new(config: &Config) -> Result<Self, SimError> {
        let mut map = MemoryMap::new();
        map.map(
            config.system.uart_base,
            config.system.uart_size,
            DeviceId::Uart,
        )?;

        let mut uart = Uart::new();
        uart.reset();

        Ok(Self {
            mem: vec![0; config.system.mem_size as usize],
            mem_size: config.system.mem_size,
            map,
            uart,
        })
    }

    /// As [`Bus::new`], but the UART captures output for inspection.
    pub fn with_captured_uart(config: &Config) -> Result<Self, SimError> {
        let mut bus = Self::new(config)?;
        bus.uart = Uart::capturing();
        Ok(bus)
    }

    /// Physical memory size in bytes.
    pub fn mem_size(&self) -> u32 {
        self.mem_size
    }

    /// Reads an aligned word. RAM is served directly; other addresses go
    /// through the memory map. Unmapped addresses read as zero.
    pub fn read_word(&mut self, address: u32) -> u32 {
        if address < self.mem_size {
            let i = (address & !3) as usize;
            let bytes = [self.mem[i], self.mem[i + 1], self.mem[i + 2], self.mem[i + 3]];
            return u32::from_le_bytes(bytes);
        }

        let Some(mapping) = self.map.resolve(address) else {
            debug!(address = format_args!("{address:#010x}"), "unmapped bus read");
            return 0;
        };
        let offset = address - mapping.start;
        match mapping.device {
            DeviceId::Uart => self.uart.read(offset),
        }
    }

    /// Writes an aligned word under a bit mask: bits set in `dqm` are
    /// written, bits clear are preserved. Unmapped addresses drop the
    /// write.
    pub fn write_word(&mut self, address: u32, word: u32, dqm: u32) {
        if address < self.mem_size {
            let i = (address & !3) as usize;
            let orig = u32::from_le_bytes([
                self.mem[i],
                self.mem[i + 1],
                self.mem[i + 2],
                self.mem[i + 3],
            ]);
            let merged = (orig & !dqm) | (word & dqm);
            self.mem[i..i + 4].copy_from_slice(&merged.to_le_bytes());
            return;
        }

        let Some(mapping) = self.map.resolve(address) else {
            debug!(
                address = format_args!("{address:#010x}"),
                "unmapped bus write"
            );
            return;
        };
        let offset = address - mapping.start;
        match mapping.device {
            DeviceId::Uart => self.uart.write(offset, word & dqm, dqm),
        }
    }

    /// True when a device is asserting its interrupt line.
    pub fn irq_pending(&self) -> bool {
        self.uart.irq_pending()
    }

    /// Copies an image blob into RAM at a physical address. Used by the
    /// loader; bounds are checked against the memory size.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ImageBounds`] when the blob does not fit.
    pub fn load_image(&mut self, address: u32, data: &[u8]) -> Result<(), SimError> {
        let end = address as usize + data.len();
        if end > self.mem.len() {
            return Err(SimError::ImageBounds {
                addr: address,
                mem_size: self.mem_size,
            });
        }
        self.mem[address as usize..end].copy_from_slice(data);
        Ok(())
    }
}
