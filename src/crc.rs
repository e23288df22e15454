//! CRC-16 checksum engine for Modbus RTU frames
//!
//! The checksum is the reflected CRC-16 with polynomial 0xA001 and an
//! all-ones seed, computed with two 256-entry lookup tables (one per
//! accumulator byte). The tables are generated from the polynomial at
//! compile time.
//!
//! The value returned by [`checksum`] holds the byte that goes on the wire
//! first in its high half, so a frame is completed by appending
//! `checksum.to_be_bytes()`:
//!
//! ```rust
//! use voltage_modbus_rtu::crc::checksum;
//!
//! let crc = checksum(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);
//! assert_eq!(crc.to_be_bytes(), [0xC4, 0x0B]);
//! ```

/// Reflected CRC-16 polynomial used by Modbus
pub const CRC_POLYNOMIAL: u16 = 0xA001;

/// Initial value of both accumulator bytes
pub const CRC_SEED: u8 = 0xFF;

/// Table of CRC values for the high-order accumulator byte
pub static TABLE_CRC_HI: [u8; 256] = build_table(false);

/// Table of CRC values for the low-order accumulator byte
pub static TABLE_CRC_LO: [u8; 256] = build_table(true);

/// Bitwise reflected CRC of a single byte index
const fn crc_entry(index: u8) -> u16 {
    let mut crc = index as u16;
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x0001 != 0 {
            (crc >> 1) ^ CRC_POLYNOMIAL
        } else {
            crc >> 1
        };
        bit += 1;
    }
    crc
}

/// Split the per-index CRC into the hi/lo byte tables.
///
/// The "hi" accumulator tracks the low byte of the running CRC, which is
/// why the hi table takes the low byte of each entry.
const fn build_table(upper: bool) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let entry = crc_entry(i as u8);
        table[i] = if upper { (entry >> 8) as u8 } else { entry as u8 };
        i += 1;
    }
    table
}

/// Compute the CRC-16 of `data`
///
/// Pure function; an empty slice yields the seed `0xFFFF`.
pub fn checksum(data: &[u8]) -> u16 {
    let mut crc_hi = CRC_SEED;
    let mut crc_lo = CRC_SEED;

    for &byte in data {
        let i = (crc_hi ^ byte) as usize;
        crc_hi = crc_lo ^ TABLE_CRC_HI[i];
        crc_lo = TABLE_CRC_LO[i];
    }

    u16::from_be_bytes([crc_hi, crc_lo])
}
