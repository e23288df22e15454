//! # Serial Transport Layer
//!
//! The frame engine talks to the physical line through the narrow
//! [`SerialDriver`] trait. Its primitives follow the convention of
//! real-time serial drivers: timed reads and writes report the number of
//! bytes **not** transferred (0 means everything went through), and
//! negative values are driver status codes.
//!
//! [`transferred_len`] is the one place where that convention is turned
//! into "bytes actually transferred".
//!
//! ## Drivers
//!
//! - [`SerialPortDriver`] - blocking OS serial port via the `serialport` crate
//! - any test double implementing [`SerialDriver`]
//!
//! ## Transport Statistics
//!
//! ```rust,no_run
//! # use voltage_modbus_rtu::backend::{ModbusBackend, RtuBackend};
//! # use voltage_modbus_rtu::transport::SerialPortDriver;
//! # fn example(backend: &RtuBackend<SerialPortDriver>) {
//! let stats = backend.get_stats();
//! println!("Frames sent: {}", stats.frames_sent);
//! println!("CRC errors: {}", stats.crc_errors);
//! println!("Filtered frames: {}", stats.frames_filtered);
//! # }
//! ```

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::{DataBits, FlowControl, Parity, SerialConfig, StopBits};
use crate::error::{ModbusError, ModbusResult};

/// Generic driver failure
pub const DRIVER_EUNKNOWN: i32 = -1;
/// I/O error
pub const DRIVER_EIO: i32 = -5;
/// Device not present
pub const DRIVER_ENODEV: i32 = -19;
/// Unsupported or invalid line setting
pub const DRIVER_EINVAL: i32 = -22;

/// Raw serial channel primitives required by the frame engine
///
/// Every timed call blocks until it completes or `timeout` elapses; the
/// engine never enforces deadlines itself.
pub trait SerialDriver: Send {
    /// Open the channel with the session's line settings
    ///
    /// Returns the driver status code on failure.
    fn open(&mut self, config: &SerialConfig) -> Result<(), i32>;

    /// Write `data`, returning the count of bytes not written, or a
    /// negative status code
    fn write_timed(&mut self, data: &[u8], timeout: Duration) -> isize;

    /// Fill `buf`, returning the count of bytes not received, or a
    /// negative status code
    fn read_timed(&mut self, buf: &mut [u8], timeout: Duration) -> isize;

    /// Discard pending received bytes
    ///
    /// Returns the driver status code on failure.
    fn clear_rx(&mut self) -> Result<(), i32>;

    /// Discard pending bytes not yet transmitted
    ///
    /// Returns the driver status code on failure.
    fn clear_tx(&mut self) -> Result<(), i32>;

    /// Release the channel
    fn close(&mut self);
}

/// Convert a driver "bytes not transferred" status into bytes transferred
///
/// Negative statuses become [`ModbusError::TransportIo`] with the code
/// unchanged. A pending count larger than the request is clamped, so the
/// result is always within `0..=requested`.
pub fn transferred_len(operation: &str, requested: usize, status: isize) -> ModbusResult<usize> {
    if status < 0 {
        let code = i32::try_from(status).unwrap_or(i32::MIN);
        return Err(ModbusError::transport_io(operation, code));
    }
    let pending = (status as usize).min(requested);
    Ok(requested - pending)
}

/// Transport layer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub crc_errors: u64,
    pub frames_filtered: u64,
    pub flushes: u64,
    pub errors: u64,
}

/// Format raw bytes as hex string for packet logging
pub fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Negative status code for an I/O error
fn io_status(err: &std::io::Error) -> isize {
    err.raw_os_error().map(|code| -(code as isize)).unwrap_or(DRIVER_EIO as isize)
}

/// Blocking OS serial port driver
///
/// RS485 direction control ([`FlowControl::DsrOnTx`]) and mark/space
/// parity are not available through the OS driver and fail the open with
/// [`DRIVER_EINVAL`]. The FIFO trigger level is left to the OS.
#[derive(Default)]
pub struct SerialPortDriver {
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialPortDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn clear(&mut self, buffer: serialport::ClearBuffer) -> Result<(), i32> {
        let Some(port) = self.port.as_ref() else {
            return Err(DRIVER_ENODEV);
        };
        port.clear(buffer).map_err(|e| {
            warn!("Failed to clear {:?} buffer: {}", buffer, e);
            Self::status_from_error(&e)
        })
    }

    fn status_from_error(err: &serialport::Error) -> i32 {
        match err.kind() {
            serialport::ErrorKind::NoDevice => DRIVER_ENODEV,
            serialport::ErrorKind::InvalidInput => DRIVER_EINVAL,
            serialport::ErrorKind::Io(_) => DRIVER_EIO,
            _ => DRIVER_EUNKNOWN,
        }
    }
}

impl SerialDriver for SerialPortDriver {
    fn open(&mut self, config: &SerialConfig) -> Result<(), i32> {
        let parity = match config.parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
            Parity::High | Parity::Low => {
                warn!("Parity {:?} is not supported by the OS serial driver", config.parity);
                return Err(DRIVER_EINVAL);
            }
        };
        let flow_control = match config.flow_control {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
            FlowControl::DsrOnTx => {
                warn!("DSR-on-TX handshake is not supported by the OS serial driver");
                return Err(DRIVER_EINVAL);
            }
        };
        let data_bits = match config.data_bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        };
        let stop_bits = match config.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        };
        debug!(
            "FIFO trigger level {} left to the OS for {}",
            config.fifo_trigger.level(),
            config.port
        );

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|e| {
                warn!("Failed to open serial port {}: {}", config.port, e);
                Self::status_from_error(&e)
            })?;

        self.port = Some(port);
        Ok(())
    }

    fn write_timed(&mut self, data: &[u8], timeout: Duration) -> isize {
        let Some(port) = self.port.as_mut() else {
            return DRIVER_ENODEV as isize;
        };
        if let Err(e) = port.set_timeout(timeout) {
            return Self::status_from_error(&e) as isize;
        }

        let mut written = 0;
        while written < data.len() {
            match port.write(&data[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return io_status(&e),
            }
        }
        if let Err(e) = port.flush() {
            if e.kind() != ErrorKind::TimedOut {
                return io_status(&e);
            }
        }

        (data.len() - written) as isize
    }

    fn read_timed(&mut self, buf: &mut [u8], timeout: Duration) -> isize {
        let Some(port) = self.port.as_mut() else {
            return DRIVER_ENODEV as isize;
        };

        let deadline = Instant::now() + timeout;
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Err(e) = port.set_timeout(remaining) {
                return Self::status_from_error(&e) as isize;
            }
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return io_status(&e),
            }
        }

        (buf.len() - filled) as isize
    }

    fn clear_rx(&mut self) -> Result<(), i32> {
        self.clear(serialport::ClearBuffer::Input)
    }

    fn clear_tx(&mut self) -> Result<(), i32> {
        self.clear(serialport::ClearBuffer::Output)
    }

    fn close(&mut self) {
        // Dropping the handle closes the OS port
        self.port = None;
    }
}
