//! Diagnostic stream for debug mode
//!
//! The backend reports sent and received frames, checksum failures and
//! ignored frames here when debug mode is on. Nothing logged through this
//! module ever changes control flow.

use std::sync::Arc;

use crate::frame::{verify_checksum, Integrity, BROADCAST_ID, CHECKSUM_LENGTH};
use crate::transport::format_hex_packet;

/// Log levels for the callback logging system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Error messages
    Error,
    /// Warning messages
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
}

/// Logging mode for frame display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Show raw frame bytes only
    Raw,
    /// Show decoded frame fields
    Interpreted,
    /// Show both raw and decoded data
    Both,
}

impl LogLevel {
    /// Convert log level to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Type alias for log callback functions
///
/// The callback receives a log level and message string
pub type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Logger that uses callbacks for flexible logging
#[derive(Clone)]
pub struct CallbackLogger {
    callback: Option<Arc<LogCallback>>,
    min_level: LogLevel,
    mode: LoggingMode,
}

impl CallbackLogger {
    /// Create a new callback logger
    pub fn new(callback: Option<LogCallback>, min_level: LogLevel) -> Self {
        Self {
            callback: callback.map(Arc::new),
            min_level,
            mode: LoggingMode::Interpreted,
        }
    }

    /// Create a new callback logger with specific mode
    pub fn with_mode(callback: Option<LogCallback>, min_level: LogLevel, mode: LoggingMode) -> Self {
        Self {
            callback: callback.map(Arc::new),
            min_level,
            mode,
        }
    }

    /// Create a logger writing to stderr with timestamps
    pub fn console() -> Self {
        let callback: LogCallback = Box::new(|level, message| {
            let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
            eprintln!("[{}] {}: {}", timestamp, level.as_str(), message);
        });
        Self::with_mode(Some(callback), LogLevel::Debug, LoggingMode::Both)
    }

    /// Create a logger that outputs nothing (disabled)
    pub fn disabled() -> Self {
        Self::new(None, LogLevel::Error)
    }

    pub fn set_mode(&mut self, mode: LoggingMode) {
        self.mode = mode;
    }

    pub fn get_mode(&self) -> LoggingMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.callback.is_some()
    }

    /// Log a message at the specified level
    pub fn log(&self, level: LogLevel, message: &str) {
        if self.should_log(level) {
            if let Some(ref callback) = self.callback {
                callback(level, message);
            }
        }
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn should_log(&self, level: LogLevel) -> bool {
        self.callback.is_some() && level as u8 <= self.min_level as u8
    }

    /// Log an RTU frame according to the current mode
    ///
    /// `direction` is a short label such as "send" or "recv".
    pub fn log_frame(&self, direction: &str, frame: &[u8]) {
        match self.mode {
            LoggingMode::Raw => {
                self.debug(&format!("RTU {} -> Raw: {}", direction, format_hex_packet(frame)));
            }
            LoggingMode::Interpreted => {
                self.debug(&format!("RTU {} -> {}", direction, interpret_frame(frame)));
            }
            LoggingMode::Both => {
                self.debug(&format!("RTU {} -> {}", direction, interpret_frame(frame)));
                self.debug(&format!("RTU {} -> Raw: {}", direction, format_hex_packet(frame)));
            }
        }
    }

    /// Report a frame whose CRC did not match
    pub fn log_crc_mismatch(&self, received: u16, calculated: u16) {
        self.error(&format!(
            "CRC received {:04X} != CRC calculated {:04X}",
            received, calculated
        ));
    }

    /// Report a frame ignored because it addressed another slave
    pub fn log_filtered(&self, destination: u8, own_id: u8) {
        self.info(&format!(
            "Request for slave {} ignored (not {})",
            destination, own_id
        ));
    }
}

impl Default for CallbackLogger {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Get human-readable function name
fn function_name(function_code: u8) -> &'static str {
    match function_code & 0x7F {
        0x01 => "Read Coils",
        0x02 => "Read Discrete Inputs",
        0x03 => "Read Holding Registers",
        0x04 => "Read Input Registers",
        0x05 => "Write Single Coil",
        0x06 => "Write Single Register",
        0x07 => "Read Exception Status",
        0x0F => "Write Multiple Coils",
        0x10 => "Write Multiple Registers",
        0x11 => "Report Slave ID",
        0x16 => "Mask Write Register",
        0x17 => "Write and Read Registers",
        _ => "Unknown Function",
    }
}

/// Decode slave, function, payload and CRC status of a raw frame
fn interpret_frame(frame: &[u8]) -> String {
    if frame.len() < 2 + CHECKSUM_LENGTH {
        return format!("Truncated frame ({} bytes): {}", frame.len(), hex::encode_upper(frame));
    }

    let slave = frame[0];
    let function = frame[1];
    let payload = &frame[2..frame.len() - CHECKSUM_LENGTH];
    let target = if slave == BROADCAST_ID {
        "broadcast".to_string()
    } else {
        slave.to_string()
    };
    let kind = if function & 0x80 != 0 { "exception " } else { "" };
    let crc = match verify_checksum(frame) {
        Ok(Integrity::Valid(_)) => "CRC ok".to_string(),
        Ok(Integrity::Mismatch { received, calculated }) => {
            format!("CRC bad ({:04X} != {:04X})", received, calculated)
        }
        Err(_) => "CRC missing".to_string(),
    };

    format!(
        "Slave: {}, Function: {}{} (0x{:02X}), Data: {}, {}",
        target,
        kind,
        function_name(function),
        function,
        if payload.is_empty() { "none".to_string() } else { hex::encode_upper(payload) },
        crc
    )
}

/// Convenience macro for creating a simple console logger
#[macro_export]
macro_rules! console_logger {
    () => {
        $crate::logging::CallbackLogger::console()
    };
}

/// Convenience macro for creating a custom logger
#[macro_export]
macro_rules! custom_logger {
    ($callback:expr) => {
        $crate::logging::CallbackLogger::new(Some($callback), $crate::logging::LogLevel::Debug)
    };
    ($callback:expr, $level:expr) => {
        $crate::logging::CallbackLogger::new(Some($callback), $level)
    };
    ($callback:expr, $level:expr, $mode:expr) => {
        $crate::logging::CallbackLogger::with_mode(Some($callback), $level, $mode)
    };
}
