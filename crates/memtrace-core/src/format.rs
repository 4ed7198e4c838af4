//! Value rendering rules for traced memory accesses.
//!
//! Reads and writes are rendered differently. A read of exactly four bytes is
//! interpreted as a little-endian `u32` and rendered `0x`-prefixed without
//! leading zeros; reads of any other width are dumped as raw lowercase hex
//! with no prefix. Writes always render the engine-supplied value as
//! `0x`-prefixed hex regardless of width. Trace consumers parse this output,
//! so the asymmetry is part of the format.

use std::fmt::Write as _;

/// Byte width of a read that is rendered as a numeric word.
pub const NUMERIC_READ_WIDTH: usize = 4;

/// Renders the bytes observed by a traced read.
///
/// `[0x01, 0x00, 0x00, 0x00]` renders `0x1`; `[0xAB, 0xCD]` renders `abcd`.
#[must_use]
pub fn format_read_value(data: &[u8]) -> String {
    match <[u8; NUMERIC_READ_WIDTH]>::try_from(data) {
        Ok(word) => format!("0x{:x}", u32::from_le_bytes(word)),
        Err(_) => encode_hex(data),
    }
}

/// Renders the value carried by a traced write.
///
/// The access size does not participate: the value is printed at whatever
/// width the engine handed over.
#[must_use]
pub fn format_write_value(value: u64) -> String {
    format!("0x{value:x}")
}

/// Encodes bytes as lowercase hex, two digits per byte, in slice order.
#[must_use]
pub fn encode_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        // Writing into a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}
