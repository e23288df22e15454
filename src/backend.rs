//! # Modbus Backend Abstraction
//!
//! [`ModbusBackend`] is the capability set a transport variant offers to
//! the request/response layer above it: slave addressing, frame prefix
//! construction, checksum handling, timed I/O and destination filtering.
//! New transports implement the trait; callers never change.
//!
//! [`RtuBackend`] is the serial (RTU) variant. It owns one
//! [`SerialDriver`] session exclusively and is not meant to be shared
//! between threads without external locking.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use voltage_modbus_rtu::backend::{ModbusBackend, RtuBackend};
//! use voltage_modbus_rtu::config::SerialConfig;
//!
//! # fn main() -> voltage_modbus_rtu::ModbusResult<()> {
//! let mut backend = RtuBackend::serial(SerialConfig::new("/dev/ttyUSB0", 9600))?;
//! backend.set_slave(17)?;
//! backend.connect()?;
//!
//! // Read 2 holding registers at 0x0013
//! backend.send_request(0x03, 0x0013, 0x0002)?;
//! // slave + function + byte count + 4 data bytes + CRC
//! if let Some(frame) = backend.receive_frame(9)? {
//!     println!("Response: {:02X?}", frame);
//! }
//!
//! backend.close();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SerialConfig;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::{
    self, Integrity, ResponseHeader, SlaveId, CHECKSUM_LENGTH, HEADER_LENGTH, MAX_ADU_LENGTH,
};
use crate::logging::CallbackLogger;
use crate::transport::{transferred_len, SerialDriver, SerialPortDriver, TransportStats};

/// Transport variant of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Check-summed, address-prefixed serial framing
    Rtu,
}

/// Capability set of a Modbus transport backend
pub trait ModbusBackend {
    fn backend_type(&self) -> BackendType;

    /// Bytes preceding the function code in every frame
    fn header_length(&self) -> usize;

    /// Bytes of integrity check trailing every frame
    fn checksum_length(&self) -> usize;

    /// Largest frame the backend can send or receive
    fn max_adu_length(&self) -> usize;

    /// Set the slave id: the destination in master mode, the own id in
    /// slave mode
    ///
    /// Accepts `0..=247`. On rejection the previous id is kept.
    fn set_slave(&mut self, slave: i64) -> ModbusResult<()>;

    fn slave(&self) -> Option<SlaveId>;

    /// Build the request prefix (slave, function, address, count)
    ///
    /// # Panics
    ///
    /// If no slave has been set. Requests are never built without a
    /// destination, so this is a caller bug.
    fn build_request_basis(&self, function: u8, address: u16, count: u16) -> Vec<u8>;

    /// Build the response prefix for the request described by `header`
    fn build_response_basis(&self, header: &ResponseHeader) -> Vec<u8>;

    /// Strip the integrity check from a received request length and
    /// return its transaction id
    fn prepare_response_tid(&self, req: &[u8], req_length: &mut usize) -> u16;

    /// Finalize an outbound frame by appending its integrity check
    ///
    /// Returns the new length. Must be called exactly once per frame.
    fn send_msg_pre(&self, frame: &mut Vec<u8>) -> usize;

    /// Send a finalized frame, returning the number of bytes written
    fn send(&mut self, frame: &[u8]) -> ModbusResult<usize>;

    /// Receive up to `buf.len()` bytes, returning the number read
    fn recv(&mut self, buf: &mut [u8]) -> ModbusResult<usize>;

    /// Validate a received frame, returning its unchanged length
    fn check_integrity(&mut self, frame: &[u8]) -> ModbusResult<usize>;

    fn connect(&mut self) -> ModbusResult<()>;

    /// Release the channel; does nothing if not connected
    fn close(&mut self);

    /// Discard pending bytes in both directions
    fn flush(&mut self) -> ModbusResult<()>;

    /// Whether [`select`](ModbusBackend::select) reflects real data
    /// availability. When false, `select` always reports ready.
    fn has_readiness_signal(&self) -> bool;

    /// Wait until `length_to_read` bytes may be read
    fn select(&mut self, timeout: Duration, length_to_read: usize) -> ModbusResult<bool>;

    /// Whether a frame sent to `destination` concerns this endpoint
    fn accepts_destination(&mut self, destination: u8) -> bool;

    fn is_connected(&self) -> bool;

    /// Deadline the driver applies to each timed send or receive
    fn response_timeout(&self) -> Duration;

    fn get_stats(&self) -> TransportStats;

    /// Build, finalize and send an addressed request
    fn send_request(&mut self, function: u8, address: u16, count: u16) -> ModbusResult<usize> {
        let mut frame = self.build_request_basis(function, address, count);
        self.send_msg_pre(&mut frame);
        self.send(&frame)
    }

    /// Read a frame of `length` bytes, validate it and filter it by
    /// destination
    ///
    /// Returns `Ok(None)` for a valid frame addressed to another slave, and
    /// [`ModbusError::Timeout`] when the line went quiet before `length`
    /// bytes arrived.
    fn receive_frame(&mut self, length: usize) -> ModbusResult<Option<Vec<u8>>> {
        if length > self.max_adu_length() {
            return Err(ModbusError::frame(format!(
                "Requested frame of {} bytes exceeds maximum of {}",
                length,
                self.max_adu_length()
            )));
        }

        let mut buf = vec![0u8; length];
        let read = self.recv(&mut buf)?;
        if read < length {
            return Err(ModbusError::timeout(
                format!("receive frame ({} of {} bytes)", read, length),
                self.response_timeout().as_millis() as u64,
            ));
        }

        self.check_integrity(&buf)?;
        match frame::destination(&buf) {
            Some(destination) if self.accepts_destination(destination) => Ok(Some(buf)),
            _ => Ok(None),
        }
    }
}

/// Modbus RTU backend over a serial driver
pub struct RtuBackend<D: SerialDriver> {
    driver: D,
    config: SerialConfig,
    slave: Option<SlaveId>,
    connected: bool,
    /// Report frames and failures to the diagnostic logger
    debug: bool,
    /// Flush the line when a corrupted frame is detected
    error_recovery: bool,
    logger: CallbackLogger,
    stats: TransportStats,
}

impl RtuBackend<SerialPortDriver> {
    /// Create a backend over the OS serial port named in `config`
    ///
    /// The port is not opened until [`connect`](ModbusBackend::connect).
    pub fn serial(config: SerialConfig) -> ModbusResult<Self> {
        Self::new(SerialPortDriver::new(), config)
    }
}

impl<D: SerialDriver> RtuBackend<D> {
    /// Create a backend over `driver`
    ///
    /// The configuration is validated here and fixed for the lifetime of
    /// the backend.
    pub fn new(driver: D, config: SerialConfig) -> ModbusResult<Self> {
        config.validate()?;
        Ok(Self {
            driver,
            config,
            slave: None,
            connected: false,
            debug: false,
            error_recovery: false,
            logger: CallbackLogger::console(),
            stats: TransportStats::default(),
        })
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_error_recovery(&mut self, enabled: bool) {
        self.error_recovery = enabled;
    }

    pub fn error_recovery(&self) -> bool {
        self.error_recovery
    }

    /// Replace the diagnostic logger used in debug mode
    pub fn set_logger(&mut self, logger: CallbackLogger) {
        self.logger = logger;
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn reset_stats(&mut self) {
        self.stats = TransportStats::default();
    }

    fn ensure_connected(&self, operation: &str) -> ModbusResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ModbusError::connection(format!(
                "Serial port {} not connected ({})",
                self.config.port, operation
            )))
        }
    }
}

impl<D: SerialDriver> ModbusBackend for RtuBackend<D> {
    fn backend_type(&self) -> BackendType {
        BackendType::Rtu
    }

    fn header_length(&self) -> usize {
        HEADER_LENGTH
    }

    fn checksum_length(&self) -> usize {
        CHECKSUM_LENGTH
    }

    fn max_adu_length(&self) -> usize {
        MAX_ADU_LENGTH
    }

    fn set_slave(&mut self, slave: i64) -> ModbusResult<()> {
        self.slave = Some(SlaveId::new(slave)?);
        Ok(())
    }

    fn slave(&self) -> Option<SlaveId> {
        self.slave
    }

    fn build_request_basis(&self, function: u8, address: u16, count: u16) -> Vec<u8> {
        let Some(slave) = self.slave else {
            panic!("request basis built before a destination slave was set");
        };
        frame::build_request_basis(slave, function, address, count).to_vec()
    }

    fn build_response_basis(&self, header: &ResponseHeader) -> Vec<u8> {
        frame::build_response_basis(header).to_vec()
    }

    fn prepare_response_tid(&self, _req: &[u8], req_length: &mut usize) -> u16 {
        *req_length = req_length.saturating_sub(CHECKSUM_LENGTH);
        // No transaction id on a serial line
        0
    }

    fn send_msg_pre(&self, frame: &mut Vec<u8>) -> usize {
        frame::append_checksum(frame)
    }

    fn send(&mut self, frame: &[u8]) -> ModbusResult<usize> {
        self.ensure_connected("send")?;
        if frame.len() > MAX_ADU_LENGTH {
            self.stats.errors += 1;
            return Err(ModbusError::frame(format!(
                "RTU frame too large: {} bytes (max {})",
                frame.len(),
                MAX_ADU_LENGTH
            )));
        }

        if self.debug {
            self.logger.log_frame("send", frame);
        }

        let status = self.driver.write_timed(frame, self.config.timeout);
        let written = transferred_len("send", frame.len(), status).map_err(|e| {
            self.stats.errors += 1;
            e
        })?;

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += written as u64;
        Ok(written)
    }

    fn recv(&mut self, buf: &mut [u8]) -> ModbusResult<usize> {
        self.ensure_connected("recv")?;

        let status = self.driver.read_timed(buf, self.config.timeout);
        let read = transferred_len("recv", buf.len(), status).map_err(|e| {
            self.stats.errors += 1;
            e
        })?;

        if self.debug {
            self.logger.log_frame("recv", &buf[..read]);
        }
        self.stats.bytes_received += read as u64;
        Ok(read)
    }

    fn check_integrity(&mut self, frame: &[u8]) -> ModbusResult<usize> {
        match frame::verify_checksum(frame)? {
            Integrity::Valid(length) => {
                self.stats.frames_received += 1;
                Ok(length)
            }
            Integrity::Mismatch { received, calculated } => {
                self.stats.crc_errors += 1;
                warn!(
                    "CRC received {:04X} != CRC calculated {:04X}",
                    received, calculated
                );
                if self.debug {
                    self.logger.log_crc_mismatch(received, calculated);
                }
                if self.error_recovery {
                    if let Err(e) = self.flush() {
                        warn!("Flush after CRC error failed: {}", e);
                    }
                }
                Err(ModbusError::checksum_mismatch(received, calculated))
            }
        }
    }

    fn connect(&mut self) -> ModbusResult<()> {
        if self.connected {
            return Ok(());
        }

        if self.debug {
            self.logger.info(&format!(
                "Opening {} at {} baud ({:?}, {} data bits, {} stop bits, FIFO {})",
                self.config.port,
                self.config.baud_rate,
                self.config.parity,
                u8::from(self.config.data_bits),
                u8::from(self.config.stop_bits),
                self.config.fifo_trigger.level()
            ));
        }

        if let Err(code) = self.driver.open(&self.config) {
            warn!("ERROR {}: Can't open {}", code, self.config.port);
            if self.debug {
                self.logger.error(&format!("ERROR {}: Can't open {}", code, self.config.port));
            }
            self.stats.errors += 1;
            return Err(ModbusError::transport_open(self.config.port.clone(), code));
        }

        debug!("Opened serial port {} at {} baud", self.config.port, self.config.baud_rate);
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        if self.connected {
            self.driver.close();
            self.connected = false;
            debug!("Closed serial port {}", self.config.port);
        }
    }

    fn flush(&mut self) -> ModbusResult<()> {
        self.ensure_connected("flush")?;
        if let Err(code) = self.driver.clear_rx().and_then(|()| self.driver.clear_tx()) {
            self.stats.errors += 1;
            return Err(ModbusError::transport_io("flush", code));
        }
        self.stats.flushes += 1;
        debug!("Flushed serial port {}", self.config.port);
        Ok(())
    }

    fn has_readiness_signal(&self) -> bool {
        false
    }

    fn select(&mut self, _timeout: Duration, _length_to_read: usize) -> ModbusResult<bool> {
        // Reads are timed by the driver; there is nothing to wait on here
        Ok(true)
    }

    fn accepts_destination(&mut self, destination: u8) -> bool {
        let accepted = match self.slave {
            Some(own_id) => frame::accepts(own_id, destination),
            None => destination == frame::BROADCAST_ID,
        };

        if !accepted {
            self.stats.frames_filtered += 1;
            if self.debug {
                match self.slave {
                    Some(own_id) => self.logger.log_filtered(destination, own_id.get()),
                    None => self.logger.info(&format!(
                        "Request for slave {} ignored (no slave id set)",
                        destination
                    )),
                }
            }
        }
        accepted
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn response_timeout(&self) -> Duration {
        self.config.timeout
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

impl<D: SerialDriver> Drop for RtuBackend<D> {
    fn drop(&mut self) {
        self.close();
    }
}
