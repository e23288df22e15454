//! Integration Tests for Voltage Modbus RTU
//!
//! Exercise the backend, frame engine and checksum together against a
//! scripted serial driver, in both master and slave roles.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use proptest::prelude::*;
use voltage_modbus_rtu::frame::{append_checksum, build_response_basis, verify_checksum};
use voltage_modbus_rtu::transport::DRIVER_ENODEV;
use voltage_modbus_rtu::utils::{format, logging};
use voltage_modbus_rtu::*;

/// Mock RTU line for testing without actual serial hardware
///
/// Frames written that match a configured request get the configured
/// response queued on the receive side.
#[derive(Debug, Default)]
pub struct MockRtuDriver {
    responses: HashMap<Vec<u8>, Vec<u8>>,
    rx: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    open_error: Option<i32>,
    pending_on_write: isize,
    opens: usize,
    closes: usize,
}

impl MockRtuDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a response for a given request frame
    pub fn set_response(&mut self, request: Vec<u8>, response: Vec<u8>) {
        self.responses.insert(request, response);
    }

    /// Queue bytes arriving on the line
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }
}

impl SerialDriver for MockRtuDriver {
    fn open(&mut self, _config: &SerialConfig) -> Result<(), i32> {
        if let Some(code) = self.open_error {
            return Err(code);
        }
        self.opens += 1;
        Ok(())
    }

    fn write_timed(&mut self, data: &[u8], _timeout: Duration) -> isize {
        self.sent.push(data.to_vec());
        if let Some(response) = self.responses.get(data).cloned() {
            self.inject(&response);
        }
        self.pending_on_write
    }

    fn read_timed(&mut self, buf: &mut [u8], _timeout: Duration) -> isize {
        let mut filled = 0;
        while filled < buf.len() {
            let Some(byte) = self.rx.pop_front() else { break };
            buf[filled] = byte;
            filled += 1;
        }
        (buf.len() - filled) as isize
    }

    fn clear_rx(&mut self) -> Result<(), i32> {
        self.rx.clear();
        Ok(())
    }

    fn clear_tx(&mut self) -> Result<(), i32> {
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

fn with_crc(bytes: &[u8]) -> Vec<u8> {
    let mut frame = bytes.to_vec();
    append_checksum(&mut frame);
    frame
}

fn backend(driver: MockRtuDriver) -> RtuBackend<MockRtuDriver> {
    logging::init_test_logger();
    let mut backend = RtuBackend::new(driver, SerialConfig::new("/dev/ttyMOCK", 19200)).unwrap();
    backend.set_logger(CallbackLogger::disabled());
    backend
}

/// Reference frame: read 2 holding registers from slave 1 at address 0
#[test]
fn test_rtu_frame_construction() {
    let mut backend = backend(MockRtuDriver::new());
    backend.set_slave(1).unwrap();

    let mut frame = backend.build_request_basis(0x03, 0x0000, 0x0002);
    assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);
    assert_eq!(backend.send_msg_pre(&mut frame), 8);
    assert_eq!(frame, vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]);
    assert_eq!(backend.check_integrity(&frame), Ok(8));
}

#[test]
fn test_master_read_cycle() {
    let request = with_crc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);
    let response = with_crc(&[0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x0B]);
    let mut driver = MockRtuDriver::new();
    driver.set_response(request.clone(), response.clone());

    let mut backend = backend(driver);
    backend.set_slave(1).unwrap();
    backend.connect().unwrap();

    assert_eq!(backend.send_request(0x03, 0x0000, 0x0002).unwrap(), 8);
    let frame = backend.receive_frame(response.len()).unwrap().unwrap();
    assert_eq!(frame, response);
    assert_eq!(format::registers_from_bytes(&frame[3..7]), vec![0x000A, 0x000B]);
    assert_eq!(backend.driver().sent, vec![request]);

    let stats = backend.get_stats();
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(stats.frames_received, 1);
    assert_eq!(stats.bytes_sent, 8);
    assert_eq!(stats.bytes_received, 9);
}

#[test]
fn test_reply_from_other_slave_is_filtered() {
    let request = with_crc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
    let response = with_crc(&[0x02, 0x03, 0x02, 0x12, 0x34]);
    let mut driver = MockRtuDriver::new();
    driver.set_response(request, response.clone());

    let mut backend = backend(driver);
    backend.set_slave(1).unwrap();
    backend.connect().unwrap();

    backend.send_request(0x03, 0x0000, 0x0001).unwrap();
    assert_eq!(backend.receive_frame(response.len()).unwrap(), None);
    assert_eq!(backend.get_stats().frames_filtered, 1);
}

#[test]
fn test_corrupted_reply_with_error_recovery() {
    let request = with_crc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
    let mut response = with_crc(&[0x01, 0x03, 0x02, 0x12, 0x34]);
    response[3] ^= 0x01;
    // Trailing noise that the flush must discard
    response.extend_from_slice(&[0xAA, 0xBB]);
    let mut driver = MockRtuDriver::new();
    driver.set_response(request, response);

    let mut backend = backend(driver);
    backend.set_slave(1).unwrap();
    backend.set_error_recovery(true);
    backend.connect().unwrap();

    backend.send_request(0x03, 0x0000, 0x0001).unwrap();
    let err = backend.receive_frame(7).unwrap_err();
    assert!(matches!(err, ModbusError::ChecksumMismatch { .. }));
    assert!(err.is_recoverable());
    assert!(backend.driver().rx.is_empty());
    assert_eq!(backend.get_stats().crc_errors, 1);
    assert_eq!(backend.get_stats().flushes, 1);
}

#[test]
fn test_corrupted_reply_without_recovery_keeps_line() {
    let mut driver = MockRtuDriver::new();
    let mut response = with_crc(&[0x01, 0x03, 0x02, 0x12, 0x34]);
    response[6] ^= 0xFF;
    driver.inject(&response);
    driver.inject(&[0xAA]);

    let mut backend = backend(driver);
    backend.set_slave(1).unwrap();
    backend.connect().unwrap();

    assert!(backend.receive_frame(7).is_err());
    assert_eq!(backend.driver().rx.len(), 1);
    assert_eq!(backend.get_stats().flushes, 0);
}

#[test]
fn test_slave_role_cycle() {
    let mut driver = MockRtuDriver::new();
    driver.inject(&with_crc(&[0x05, 0x06, 0x00, 0x01, 0x00, 0x03]));
    driver.inject(&with_crc(&[0x00, 0x06, 0x00, 0x01, 0x00, 0x03]));
    driver.inject(&with_crc(&[0x06, 0x06, 0x00, 0x01, 0x00, 0x03]));

    let mut backend = backend(driver);
    backend.set_slave(5).unwrap();
    backend.connect().unwrap();

    let addressed = backend.receive_frame(8).unwrap().unwrap();
    let mut length = addressed.len();
    assert_eq!(backend.prepare_response_tid(&addressed, &mut length), 0);
    assert_eq!(length, 6);

    let header = ResponseHeader::new(backend.slave().unwrap(), addressed[1]);
    let mut reply = backend.build_response_basis(&header);
    reply.extend_from_slice(&addressed[2..length]);
    backend.send_msg_pre(&mut reply);
    assert_eq!(backend.send(&reply).unwrap(), 8);
    assert_eq!(reply, addressed);

    // Broadcast is accepted, another slave's request is not
    assert!(backend.receive_frame(8).unwrap().is_some());
    assert!(backend.receive_frame(8).unwrap().is_none());
}

#[test]
fn test_response_basis_for_every_slave() {
    for value in 0..=247 {
        let header = ResponseHeader::new(SlaveId::new(value).unwrap(), 0x04);
        assert_eq!(build_response_basis(&header), [value as u8, 0x04]);
    }
}

#[test]
fn test_partial_write_reports_bytes_sent() {
    let mut driver = MockRtuDriver::new();
    driver.pending_on_write = 3;
    let mut backend = backend(driver);
    backend.connect().unwrap();

    assert_eq!(backend.send(&[0u8; 10]).unwrap(), 7);

    backend.driver_mut().pending_on_write = -5;
    let err = backend.send(&[0u8; 10]).unwrap_err();
    assert_eq!(err, ModbusError::transport_io("send", -5));
    assert!(err.is_transport_error());
}

#[test]
fn test_short_read_reports_bytes_received() {
    let mut driver = MockRtuDriver::new();
    driver.inject(&[0x01, 0x02, 0x03]);
    let mut backend = backend(driver);
    backend.connect().unwrap();

    let mut buf = [0u8; 10];
    assert_eq!(backend.recv(&mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], &[0x01, 0x02, 0x03]);
    assert_eq!(backend.recv(&mut buf).unwrap(), 0);
}

#[test]
fn test_open_failure_and_lifecycle() {
    let mut driver = MockRtuDriver::new();
    driver.open_error = Some(DRIVER_ENODEV);
    let mut backend = backend(driver);

    let err = backend.connect().unwrap_err();
    assert_eq!(err, ModbusError::transport_open("/dev/ttyMOCK", DRIVER_ENODEV));
    assert!(!backend.is_connected());

    backend.driver_mut().open_error = None;
    backend.connect().unwrap();
    backend.connect().unwrap();
    assert_eq!(backend.driver().opens, 1);

    backend.close();
    backend.close();
    assert_eq!(backend.driver().closes, 1);
    assert!(matches!(backend.flush(), Err(ModbusError::Connection { .. })));
}

#[test]
fn test_set_slave_range() {
    let mut backend = backend(MockRtuDriver::new());
    for value in -300i64..=300 {
        let accepted = backend.set_slave(value).is_ok();
        assert_eq!(accepted, (0..=247).contains(&value), "slave id {}", value);
    }
    assert_eq!(backend.slave().map(SlaveId::get), Some(247));
}

#[test]
fn test_backend_from_json_config() {
    let config = SerialConfig::from_json(
        r#"{"port": "/dev/ttyMOCK", "baud_rate": 38400, "parity": "odd", "timeout_ms": 200}"#,
    )
    .unwrap();
    let backend = RtuBackend::new(MockRtuDriver::new(), config).unwrap();
    assert_eq!(backend.config().baud_rate, 38400);
    assert_eq!(backend.config().parity, Parity::Odd);
    assert_eq!(backend.config().timeout, Duration::from_millis(200));
    assert_eq!(backend.backend_type(), BackendType::Rtu);
}

#[test]
fn test_checksum_matches_crc_crate() {
    const CRC_MODBUS: ::crc::Crc<u16> = ::crc::Crc::<u16>::new(&::crc::CRC_16_MODBUS);
    let samples: [&[u8]; 4] = [
        b"123456789",
        &[0x01, 0x03, 0x00, 0x00, 0x00, 0x02],
        &[0x11, 0x03, 0x00, 0x6B, 0x00, 0x03],
        &[0x00; 64],
    ];
    for data in samples {
        assert_eq!(checksum(data), CRC_MODBUS.checksum(data).swap_bytes());
    }
}

proptest! {
    #[test]
    fn prop_appended_checksum_validates(data in proptest::collection::vec(any::<u8>(), 0..254)) {
        let mut frame = data.clone();
        let len = append_checksum(&mut frame);
        prop_assert_eq!(len, data.len() + 2);
        prop_assert_eq!(&frame[..data.len()], &data[..]);
        prop_assert_eq!(verify_checksum(&frame).unwrap(), Integrity::Valid(len));
    }

    #[test]
    fn prop_single_bit_flip_is_detected(
        data in proptest::collection::vec(any::<u8>(), 1..254),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut frame = data;
        append_checksum(&mut frame);
        let index = position.index(frame.len());
        frame[index] ^= 1 << bit;
        let is_mismatch = matches!(verify_checksum(&frame).unwrap(), Integrity::Mismatch { .. });
        prop_assert!(is_mismatch);
    }

    #[test]
    fn prop_wrong_checksum_suffix_is_mismatch(
        data in proptest::collection::vec(any::<u8>(), 1..254),
        suffix in any::<u16>(),
    ) {
        let calculated = checksum(&data);
        prop_assume!(suffix != calculated);
        let mut frame = data;
        frame.extend_from_slice(&suffix.to_be_bytes());
        prop_assert_eq!(
            verify_checksum(&frame).unwrap(),
            Integrity::Mismatch { received: suffix, calculated }
        );
    }

    #[test]
    fn prop_checksum_matches_crc_crate(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        const CRC_MODBUS: ::crc::Crc<u16> = ::crc::Crc::<u16>::new(&::crc::CRC_16_MODBUS);
        prop_assert_eq!(checksum(&data), CRC_MODBUS.checksum(&data).swap_bytes());
    }
}
