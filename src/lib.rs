//! # Voltage Modbus RTU - Serial Frame Engine
//!
//! **Author:** Evan Liu <evan.liu@voltageenergy.com>
//! **Version:** 0.2.0
//! **License:** MIT
//!
//! The serial (RTU) backend of a Modbus stack: it builds, checksums,
//! validates and filters Modbus RTU frames and moves them over a timed
//! serial driver. Function-code semantics, retries and register storage
//! belong to the layer above.
//!
//! ## Features
//!
//! - **CRC-16/Modbus**: table-driven checksum, tables generated at compile time
//! - **Frame construction**: request and response prefixes, checksum append
//! - **Frame validation**: checksum verification with optional line flush
//! - **Destination filtering**: own id or broadcast
//! - **Pluggable drivers**: any [`SerialDriver`], with an OS serial port driver included
//! - **Diagnostics**: `tracing` events plus a debug-mode frame logger
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_modbus_rtu::{ModbusBackend, ModbusResult, RtuBackend, SerialConfig};
//!
//! fn main() -> ModbusResult<()> {
//!     let mut backend = RtuBackend::serial(SerialConfig::new("/dev/ttyUSB0", 9600))?;
//!     backend.set_slave(1)?;
//!     backend.set_debug(true);
//!     backend.connect()?;
//!
//!     backend.send_request(0x03, 0x0000, 0x0002)?;
//!     match backend.receive_frame(9)? {
//!         Some(frame) => println!("Reply: {:02X?}", frame),
//!         None => println!("Reply addressed to another slave"),
//!     }
//!
//!     backend.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐
//! │  Request/response layer     │
//! └─────────────────────────────┘
//!               │ ModbusBackend
//! ┌─────────────────────────────┐
//! │  RtuBackend                 │
//! │  frame / crc (pure)         │
//! └─────────────────────────────┘
//!               │ SerialDriver
//! ┌─────────────────────────────┐
//! │  Serial driver (timed I/O)  │
//! └─────────────────────────────┘
//! ```

/// Core error types and result handling
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod error;

/// CRC-16/Modbus checksum engine
pub mod crc;

/// RTU frame layout, construction, validation and filtering
pub mod frame;

/// Serial session configuration
pub mod config;

/// Serial driver contract and OS serial port driver
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod transport;

/// Backend capability trait and the RTU backend
pub mod backend;

/// Utility functions and performance monitoring
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod utils;

/// Debug-mode diagnostic logging
///
/// Author: Evan Liu <evan.liu@voltageenergy.com>
pub mod logging;

// Re-export main types for convenience
pub use backend::{BackendType, ModbusBackend, RtuBackend};
pub use config::{DataBits, FifoTrigger, FlowControl, Parity, SerialConfig, StopBits};
pub use crc::checksum;
pub use error::{ModbusError, ModbusResult};
pub use frame::{Integrity, ResponseHeader, SlaveId};
pub use logging::{CallbackLogger, LogCallback, LogLevel, LoggingMode};
pub use transport::{SerialDriver, SerialPortDriver, TransportStats};
pub use utils::{OperationTimer, PerformanceMetrics};

/// Default timeout for timed serial operations (1 second)
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Maximum number of registers that can be read in a single request
pub const MAX_REGISTERS_PER_REQUEST: u16 = 125;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Voltage Modbus RTU v{} - Modbus RTU serial frame engine by Evan Liu", VERSION)
}
