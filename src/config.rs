//! Serial session configuration
//!
//! A [`SerialConfig`] is fixed for the lifetime of an open session; the
//! backend copies it at construction and never mutates it.
//!
//! ```rust
//! use voltage_modbus_rtu::config::{SerialConfig, Parity};
//! use std::time::Duration;
//!
//! let config = SerialConfig::new("/dev/ttyUSB0", 19200)
//!     .with_parity(Parity::Even)
//!     .with_timeout(Duration::from_millis(500));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModbusError, ModbusResult};

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
    /// Parity bit always set
    High,
    /// Parity bit always clear
    Low,
}

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = ModbusError;

    fn try_from(bits: u8) -> ModbusResult<Self> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(ModbusError::configuration(format!("Invalid data bits: {} (must be 5-8)", bits))),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> u8 {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Number of stop bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = ModbusError;

    fn try_from(bits: u8) -> ModbusResult<Self> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            _ => Err(ModbusError::configuration(format!("Invalid stop bits: {} (must be 1 or 2)", bits))),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> u8 {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Handshake mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    /// No handshake
    None,
    /// Assert DSR while transmitting (RS485 direction control)
    DsrOnTx,
    /// RTS/CTS hardware flow control
    Hardware,
}

/// UART receive FIFO trigger level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FifoTrigger {
    Disabled,
    Size1,
    Size4,
    Size8,
    Size14,
}

impl FifoTrigger {
    /// Trigger level in bytes, 0 when the FIFO is disabled
    pub fn level(self) -> u8 {
        match self {
            FifoTrigger::Disabled => 0,
            FifoTrigger::Size1 => 1,
            FifoTrigger::Size4 => 4,
            FifoTrigger::Size8 => 8,
            FifoTrigger::Size14 => 14,
        }
    }
}

/// Configuration of one serial session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Channel identifier (e.g. "/dev/ttyUSB0" or "COM1")
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub fifo_trigger: FifoTrigger,
    /// Deadline for each timed send/receive, enforced by the driver
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 9600,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            fifo_trigger: FifoTrigger::Size8,
            timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS),
        }
    }
}

impl SerialConfig {
    /// 8N1 configuration for `port` at `baud_rate`
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            ..Self::default()
        }
    }

    /// Load a configuration from JSON
    ///
    /// Missing fields take their default values. The result is validated.
    pub fn from_json(json: &str) -> ModbusResult<Self> {
        let config: SerialConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn with_fifo_trigger(mut self, fifo_trigger: FifoTrigger) -> Self {
        self.fifo_trigger = fifo_trigger;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the parameters a session cannot be opened without
    pub fn validate(&self) -> ModbusResult<()> {
        if self.port.trim().is_empty() {
            return Err(ModbusError::configuration("Serial port name is empty"));
        }
        if self.baud_rate == 0 {
            return Err(ModbusError::configuration("Baud rate must be greater than zero"));
        }
        if self.timeout.is_zero() {
            return Err(ModbusError::configuration("Timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Serialize a `Duration` as whole milliseconds
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
