//! Motorola S-record image loader.
//!
//! Parses the ASCII S-record format into the physical memory image:
//! S1/S2/S3 data records (16-, 24- and 32-bit addresses) are written to
//! RAM through the bus, S7/S8/S9 termination records yield the entry
//! address, and S0/S4/S5/S6 records are accepted and ignored. Every
//! record's checksum is verified.

use crate::common::SimError;
use crate::soc::Bus;

/// Parses one pair of hex digits.
fn hex_byte(line: &str, pos: usize) -> Result<u8, SimError> {
    line.get(pos..pos + 2)
        .and_then(|s| u8::from_str_radix(s, 16).ok())
        .ok_or_else(|| SimError::Image(format!("bad hex at column {pos}: {line:?}")))
}

/// Loads an S-record image from text, returning the entry address if a
/// termination record carried one.
///
/// # Errors
///
/// Returns [`SimError::Image`] on malformed records or checksum
/// mismatches, and [`SimError::ImageBounds`] when a record falls outside
/// RAM.
pub fn load_srec(bus: &mut Bus, text: &str) -> Result<Option<u32>, SimError> {
    let mut entry = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let Some(kind) = line.strip_prefix('S').and_then(|r| r.chars().next()) else {
            return Err(SimError::Image(format!("not an S-record: {line:?}")));
        };

        let count = hex_byte(line, 2)? as usize;
        if count == 0 || line.len() < 4 + count * 2 {
            return Err(SimError::Image(format!("truncated record: {line:?}")));
        }

        // Checksum: ones' complement of the byte sum of count, address
        // and data.
        let mut sum = count as u32;
        let mut bytes = Vec::with_capacity(count.saturating_sub(1));
        for i in 0..count - 1 {
            let b = hex_byte(line, 4 + i * 2)?;
            sum += u32::from(b);
            bytes.push(b);
        }
        let checksum = hex_byte(line, 4 + (count - 1) * 2)?;
        if checksum != !(sum as u8) {
            return Err(SimError::Image(format!("checksum mismatch: {line:?}")));
        }

        let addr_len = match kind {
            '0' | '1' | '9' | '5' => 2,
            '2' | '8' | '6' => 3,
            '3' | '7' => 4,
            _ => return Err(SimError::Image(format!("unknown record type: {line:?}"))),
        };
        if bytes.len() < addr_len {
            return Err(SimError::Image(format!("short record: {line:?}")));
        }
        let addr = bytes[..addr_len]
            .iter()
            .fold(0u32, |a, &b| (a << 8) | u32::from(b));

        match kind {
            '1' | '2' | '3' => bus.load_image(addr, &bytes[addr_len..])?,
            '7' | '8' | '9' => entry = Some(addr),
            _ => {}
        }
    }

    Ok(entry)
}

/// Loads an S-record image from a file.
///
/// # Errors
///
/// As [`load_srec`], plus [`SimError::Image`] when the file cannot be
/// read.
pub fn load_srec_file(bus: &mut Bus, path: &str) -> Result<Option<u32>, SimError> {
    let text =
        std::fs::read_to_string(path).map_err(|e| SimError::Image(format!("{path}: {e}")))?;
    load_srec(bus, &text)
}
