/// Utility functions and helpers for RTU sessions
///
/// Transaction timing, argument validation, display formatting and test
/// logger setup.

use std::time::{Duration, Instant};
use log::{debug, info, warn};
use crate::error::{ModbusError, ModbusResult};

/// Timing metrics over a series of request/response transactions
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_duration: Duration,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub avg_duration: Duration,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction that produced a valid reply
    pub fn record_success(&mut self, duration: Duration) {
        self.successful_requests += 1;
        self.record(duration);
        self.min_duration = Some(self.min_duration.map_or(duration, |min| min.min(duration)));
        self.max_duration = Some(self.max_duration.map_or(duration, |max| max.max(duration)));
    }

    /// Record a transaction that failed (I/O error, CRC error, no reply)
    pub fn record_failure(&mut self, duration: Duration) {
        self.failed_requests += 1;
        self.record(duration);
    }

    fn record(&mut self, duration: Duration) {
        self.total_requests += 1;
        self.total_duration += duration;
        self.avg_duration = self.total_duration / self.total_requests as u32;
    }

    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.successful_requests as f64 / self.total_requests as f64) * 100.0
    }

    pub fn requests_per_second(&self) -> f64 {
        if self.total_duration.is_zero() {
            return 0.0;
        }
        self.total_requests as f64 / self.total_duration.as_secs_f64()
    }
}

/// Timer for measuring one transaction
pub struct OperationTimer {
    start: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn start(operation_name: &str) -> Self {
        debug!("Starting operation: {}", operation_name);
        Self {
            start: Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    /// Stop the timer and log the outcome
    pub fn stop_and_log(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        if success {
            info!("Operation '{}' succeeded in {:?}", self.operation_name, duration);
        } else {
            warn!("Operation '{}' failed after {:?}", self.operation_name, duration);
        }
        duration
    }
}

/// Request argument validation
pub mod validation {
    use super::*;

    /// Validate a register window starting at `start`
    ///
    /// The window must be non-empty and stay inside the 16-bit address space.
    pub fn validate_address_range(start: u16, count: u16) -> ModbusResult<()> {
        if count == 0 || (start as u32 + count as u32) > 65536 {
            return Err(ModbusError::invalid_data(format!(
                "Invalid address range: start={}, count={}",
                start, count
            )));
        }
        Ok(())
    }

    /// Validate a register count for read requests
    pub fn validate_register_count(count: u16) -> ModbusResult<()> {
        if count == 0 || count > crate::MAX_REGISTERS_PER_REQUEST {
            return Err(ModbusError::invalid_data(format!(
                "Invalid register count: {} (must be 1-{})",
                count,
                crate::MAX_REGISTERS_PER_REQUEST
            )));
        }
        Ok(())
    }

    /// Expected length of a read-registers reply: slave, function,
    /// byte count, two bytes per register, CRC
    pub fn read_registers_reply_length(count: u16) -> usize {
        3 + 2 * count as usize + crate::frame::CHECKSUM_LENGTH
    }
}

/// Formatting and display utilities
pub mod format {
    use super::*;

    /// Format register values as hex
    pub fn registers_to_hex(registers: &[u16]) -> String {
        registers
            .iter()
            .map(|r| format!("{:04X}", r))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Decode big-endian register values from a reply payload
    ///
    /// A trailing odd byte is ignored.
    pub fn registers_from_bytes(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Format duration in a human-readable way
    pub fn format_duration(duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis < 1000 {
            format!("{}ms", millis)
        } else if millis < 60_000 {
            format!("{:.2}s", duration.as_secs_f64())
        } else {
            let mins = millis / 60_000;
            let secs = (millis % 60_000) as f64 / 1000.0;
            format!("{}m {:.1}s", mins, secs)
        }
    }

    /// Format performance metrics as a table
    pub fn format_metrics(metrics: &PerformanceMetrics) -> String {
        format!(
            "Performance Metrics:\n\
             ├─ Total Requests: {}\n\
             ├─ Successful: {} ({:.1}%)\n\
             ├─ Failed: {}\n\
             ├─ Average Duration: {}\n\
             ├─ Min Duration: {}\n\
             ├─ Max Duration: {}\n\
             └─ Requests/sec: {:.1}",
            metrics.total_requests,
            metrics.successful_requests,
            metrics.success_rate(),
            metrics.failed_requests,
            format_duration(metrics.avg_duration),
            metrics.min_duration.map_or("N/A".to_string(), format_duration),
            metrics.max_duration.map_or("N/A".to_string(), format_duration),
            metrics.requests_per_second()
        )
    }
}

/// Logging utilities
pub mod logging {
    use super::*;

    /// Initialize env_logger for tests; later calls are no-ops
    pub fn init_test_logger() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }

    /// Log one transaction summary at debug level
    pub fn log_transaction(slave_id: u8, function: u8, reply: &[u8], duration: Duration, success: bool) {
        debug!(
            "{} slave {} function 0x{:02X} | Reply: {} | Duration: {}",
            if success { "OK" } else { "FAILED" },
            slave_id,
            function,
            crate::transport::format_hex_packet(reply),
            format::format_duration(duration)
        );
    }
}
