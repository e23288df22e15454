//! # Modbus RTU Error Handling
//!
//! Error types for the RTU frame engine and its serial transport.
//!
//! ## Error Categories
//!
//! ### Identifier Errors
//! - **Invalid Identifier**: a slave id outside `0..=247` was supplied
//!
//! ### Frame Errors
//! - **Checksum Mismatch**: the trailing CRC of a received frame does not match
//! - **Frame Errors**: frames too short or too long to be valid RTU frames
//!
//! ### Transport Errors
//! - **Transport Open Failure**: the driver refused to open the channel
//! - **Transport I/O Failure**: the driver returned a negative status on read/write
//! - **I/O / Connection / Timeout**: generic transport conditions
//!
//! ### System Errors
//! - **Configuration Errors**: invalid session parameters
//! - **Invalid Data**: request arguments outside their allowed range
//!
//! ## Error Recovery
//!
//! This layer never retries. Callers decide using the classification helpers:
//!
//! ```rust
//! use voltage_modbus_rtu::{ModbusError, ModbusResult};
//!
//! fn handle(result: ModbusResult<usize>) {
//!     match result {
//!         Ok(len) => println!("accepted {} bytes", len),
//!         Err(ModbusError::ChecksumMismatch { received, calculated }) => {
//!             println!("corrupt frame: {:04X} != {:04X}", received, calculated);
//!         }
//!         Err(error) if error.is_recoverable() => println!("retry later: {}", error),
//!         Err(error) => println!("fatal: {}", error),
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for Modbus RTU operations
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Modbus RTU error types
///
/// Each variant carries enough context to diagnose the failure without
/// access to the frame that caused it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Slave identifier outside the accepted `0..=247` range
    ///
    /// Raised by identifier assignment. No state is changed when this is
    /// returned; the caller must supply a corrected value.
    #[error("Invalid slave identifier: {value} (must be 0-247)")]
    InvalidIdentifier { value: i64 },

    /// CRC validation failure
    ///
    /// Both values are kept for diagnostics. The frame that produced this
    /// error must be treated as unusable.
    #[error("CRC validation failed: received={received:04X}, calculated={calculated:04X}")]
    ChecksumMismatch { received: u16, calculated: u16 },

    /// The serial driver could not open the channel
    ///
    /// `code` is the driver status code, passed through unchanged.
    #[error("Failed to open {port} (driver code {code})")]
    TransportOpen { port: String, code: i32 },

    /// The serial driver reported a negative status on read or write
    #[error("Transport I/O failure during {operation} (driver code {code})")]
    TransportIo { operation: String, code: i32 },

    /// Generic I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Session not open, or lost
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The line went quiet before a complete frame arrived
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Frame structure violations (too short, too long)
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Invalid session configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Invalid data value
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

impl ModbusError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(value: i64) -> Self {
        Self::InvalidIdentifier { value }
    }

    /// Create a checksum mismatch error
    ///
    /// # Arguments
    ///
    /// * `received` - CRC found in the trailing two bytes of the frame
    /// * `calculated` - CRC recomputed over the preceding bytes
    pub fn checksum_mismatch(received: u16, calculated: u16) -> Self {
        Self::ChecksumMismatch { received, calculated }
    }

    /// Create a transport open failure carrying the driver status code
    pub fn transport_open<S: Into<String>>(port: S, code: i32) -> Self {
        Self::TransportOpen { port: port.into(), code }
    }

    /// Create a transport I/O failure carrying the driver status code
    pub fn transport_io<S: Into<String>>(operation: S, code: i32) -> Self {
        Self::TransportIo { operation: operation.into(), code }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a frame error
    pub fn frame<S: Into<String>>(message: S) -> Self {
        Self::Frame { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData { message: message.into() }
    }

    /// Check if the error is recoverable (can retry)
    ///
    /// A corrupted frame is recoverable: the next transaction may well
    /// succeed, especially after a flush. Identifier and configuration
    /// errors are not, and neither is a failed open.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use voltage_modbus_rtu::ModbusError;
    ///
    /// assert!(ModbusError::checksum_mismatch(0x1234, 0x4321).is_recoverable());
    /// assert!(!ModbusError::invalid_identifier(300).is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::TransportIo { .. }
                | Self::Io { .. }
                | Self::Connection { .. }
                | Self::Timeout { .. }
        )
    }

    /// Check if the error is a transport issue
    ///
    /// ```rust
    /// use voltage_modbus_rtu::ModbusError;
    ///
    /// assert!(ModbusError::transport_io("send", -5).is_transport_error());
    /// assert!(!ModbusError::checksum_mismatch(1, 2).is_transport_error());
    /// ```
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::TransportOpen { .. }
                | Self::TransportIo { .. }
                | Self::Io { .. }
                | Self::Connection { .. }
                | Self::Timeout { .. }
        )
    }

    /// Check if the error is a protocol (frame level) issue
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::Frame { .. } | Self::InvalidIdentifier { .. }
        )
    }
}

/// Convert from std::io::Error
///
/// Deadlines are owned by the serial driver, so an I/O timeout reaching
/// this point carries no deadline and is reported as a plain I/O error.
impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serialport::Error> for ModbusError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::InvalidInput => Self::configuration(err.to_string()),
            serialport::ErrorKind::NoDevice => Self::connection(err.to_string()),
            _ => Self::io(err.to_string()),
        }
    }
}

/// Convert from serde JSON errors
impl From<serde_json::Error> for ModbusError {
    fn from(err: serde_json::Error) -> Self {
        Self::configuration(format!("JSON error: {}", err))
    }
}
