//! Modbus RTU frame layout, construction and inspection
//!
//! ```text
//! | offset | field                | size     |
//! |--------|----------------------|----------|
//! | 0      | destination slave id | 1 byte   |
//! | 1      | function code        | 1 byte   |
//! | 2..    | payload              | variable |
//! | last-2 | CRC high byte        | 1 byte   |
//! | last-1 | CRC low byte         | 1 byte   |
//! ```
//!
//! Everything in this module is pure: no I/O, no logging. The serial
//! backend wraps these functions with diagnostics and recovery.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crc::checksum;
use crate::error::{ModbusError, ModbusResult};

/// Length of the RTU header (slave id)
pub const HEADER_LENGTH: usize = 1;

/// Length of the request basis: slave, function, address (2), count (2)
pub const PRESET_REQ_LENGTH: usize = 6;

/// Length of the response basis: slave, function
pub const PRESET_RSP_LENGTH: usize = 2;

/// Length of the trailing CRC
pub const CHECKSUM_LENGTH: usize = 2;

/// RS232 / RS485 ADU = 253 bytes PDU + slave (1 byte) + CRC (2 bytes)
pub const MAX_ADU_LENGTH: usize = 256;

/// Destination id addressing every device on the line
pub const BROADCAST_ID: u8 = 0;

/// Highest assignable slave id
pub const MAX_SLAVE_ID: u8 = 247;

/// Modbus RTU slave identifier (0-247)
///
/// Zero is accepted as a local id even though it doubles as the broadcast
/// destination; some deployments run a listener there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct SlaveId(u8);

impl SlaveId {
    /// The broadcast identifier
    pub const BROADCAST: SlaveId = SlaveId(BROADCAST_ID);

    /// Validate a candidate identifier
    ///
    /// Accepts every integer in `0..=247`, rejects everything else
    /// (negative values included).
    pub fn new(candidate: i64) -> ModbusResult<Self> {
        if (0..=MAX_SLAVE_ID as i64).contains(&candidate) {
            Ok(SlaveId(candidate as u8))
        } else {
            Err(ModbusError::invalid_identifier(candidate))
        }
    }

    /// Raw byte value
    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_broadcast(self) -> bool {
        self.0 == BROADCAST_ID
    }
}

impl TryFrom<i64> for SlaveId {
    type Error = ModbusError;

    fn try_from(value: i64) -> ModbusResult<Self> {
        SlaveId::new(value)
    }
}

impl TryFrom<u8> for SlaveId {
    type Error = ModbusError;

    fn try_from(value: u8) -> ModbusResult<Self> {
        SlaveId::new(value as i64)
    }
}

impl From<SlaveId> for u8 {
    fn from(id: SlaveId) -> u8 {
        id.0
    }
}

impl fmt::Display for SlaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slave, function and transaction id of a request being answered
///
/// The serial variant has no transaction id; it is always 0 here but kept
/// so response construction has the same shape for every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub slave: SlaveId,
    pub function: u8,
    pub transaction_id: u16,
}

impl ResponseHeader {
    pub fn new(slave: SlaveId, function: u8) -> Self {
        Self {
            slave,
            function,
            transaction_id: 0,
        }
    }
}

/// Build the request prefix shared by addressed commands
///
/// Address and count are laid out big-endian after the slave id and
/// function code.
pub fn build_request_basis(slave: SlaveId, function: u8, address: u16, count: u16) -> [u8; PRESET_REQ_LENGTH] {
    let [addr_hi, addr_lo] = address.to_be_bytes();
    let [count_hi, count_lo] = count.to_be_bytes();
    [slave.get(), function, addr_hi, addr_lo, count_hi, count_lo]
}

/// Build the response prefix: slave id and function code
pub fn build_response_basis(header: &ResponseHeader) -> [u8; PRESET_RSP_LENGTH] {
    [header.slave.get(), header.function]
}

/// Append the CRC of the current bytes, high byte first
///
/// Must run once per outbound frame, after the payload is final.
/// Returns the new frame length.
pub fn append_checksum(frame: &mut Vec<u8>) -> usize {
    let crc = checksum(frame);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame.len()
}

/// Outcome of comparing a frame's trailing CRC against its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    /// CRC matches; carries the unchanged frame length
    Valid(usize),
    /// CRC differs
    Mismatch { received: u16, calculated: u16 },
}

/// Recompute the CRC over all but the last two bytes and compare
///
/// Frames shorter than the CRC itself are a frame error, never a
/// mismatch. The frame is not modified either way.
pub fn verify_checksum(frame: &[u8]) -> ModbusResult<Integrity> {
    if frame.len() < CHECKSUM_LENGTH {
        return Err(ModbusError::frame(format!(
            "RTU frame too short for CRC: {} bytes",
            frame.len()
        )));
    }

    let data_len = frame.len() - CHECKSUM_LENGTH;
    let calculated = checksum(&frame[..data_len]);
    let received = u16::from_be_bytes([frame[data_len], frame[data_len + 1]]);

    if calculated == received {
        Ok(Integrity::Valid(frame.len()))
    } else {
        Ok(Integrity::Mismatch { received, calculated })
    }
}

/// Whether a frame sent to `destination` is meant for the endpoint `own_id`
///
/// Broadcast frames are always accepted.
pub fn accepts(own_id: SlaveId, destination: u8) -> bool {
    destination == own_id.get() || destination == BROADCAST_ID
}

/// Destination id of a raw frame, if it has one
pub fn destination(frame: &[u8]) -> Option<u8> {
    frame.first().copied()
}
