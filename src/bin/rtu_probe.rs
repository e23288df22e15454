/// Modbus RTU Probe
///
/// Sends a Read Holding Registers request to one slave and prints the
/// validated reply.
///
/// Usage:
///   rtu_probe <port> [slave] [address] [count] [baud]
///   rtu_probe <config.json> [slave] [address] [count]
///
/// Set RUST_LOG=debug for driver and session events. Set RTU_DEBUG=1 for
/// frame dumps.

use std::env;
use std::fs;

use voltage_modbus_rtu::{
    utils::{format, logging, validation},
    ModbusBackend, ModbusError, ModbusResult, OperationTimer, PerformanceMetrics, RtuBackend,
    SerialConfig,
};

const READ_HOLDING_REGISTERS: u8 = 0x03;

struct ProbeArgs {
    config: SerialConfig,
    slave: i64,
    address: u16,
    count: u16,
}

fn parse_number<T: std::str::FromStr>(value: Option<&String>, default: T, name: &str) -> ModbusResult<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| ModbusError::configuration(format!("Invalid {}: {}", name, raw))),
        None => Ok(default),
    }
}

fn parse_args(args: &[String]) -> ModbusResult<ProbeArgs> {
    let target = args
        .get(1)
        .ok_or_else(|| ModbusError::configuration("Usage: rtu_probe <port|config.json> [slave] [address] [count] [baud]"))?;

    let config = if target.ends_with(".json") {
        let json = fs::read_to_string(target)?;
        SerialConfig::from_json(&json)?
    } else {
        let baud = parse_number(args.get(5), 9600u32, "baud rate")?;
        SerialConfig::new(target, baud)
    };

    Ok(ProbeArgs {
        config,
        slave: parse_number(args.get(2), 1i64, "slave id")?,
        address: parse_number(args.get(3), 0u16, "address")?,
        count: parse_number(args.get(4), 1u16, "count")?,
    })
}

fn probe(args: ProbeArgs) -> ModbusResult<()> {
    validation::validate_register_count(args.count)?;
    validation::validate_address_range(args.address, args.count)?;

    println!("🔌 Modbus RTU Probe");
    println!("==================");
    println!("{}", voltage_modbus_rtu::info());
    println!(
        "Port: {} @ {} baud, slave {}, registers {}..{}",
        args.config.port,
        args.config.baud_rate,
        args.slave,
        args.address,
        args.address as u32 + args.count as u32
    );

    let mut backend = RtuBackend::serial(args.config)?;
    backend.set_slave(args.slave)?;
    backend.set_debug(env::var("RTU_DEBUG").is_ok());
    backend.set_error_recovery(true);
    backend.connect()?;

    let mut metrics = PerformanceMetrics::new();
    let timer = OperationTimer::start("read holding registers");
    backend.send_request(READ_HOLDING_REGISTERS, args.address, args.count)?;
    let reply_length = validation::read_registers_reply_length(args.count);
    let result = backend.receive_frame(reply_length);
    let duration = timer.stop_and_log(matches!(result, Ok(Some(_))));

    match result {
        Ok(Some(frame)) => {
            metrics.record_success(duration);
            logging::log_transaction(frame[0], frame[1], &frame, duration, true);
            let payload = &frame[3..frame.len() - backend.checksum_length()];
            let registers = format::registers_from_bytes(payload);
            println!("✅ Registers: {}", format::registers_to_hex(&registers));
        }
        Ok(None) => {
            metrics.record_failure(duration);
            println!("⚠️  Reply was addressed to another slave");
        }
        Err(e) => {
            metrics.record_failure(duration);
            println!("❌ {}", e);
        }
    }

    let stats = backend.get_stats();
    println!("\n{}", format::format_metrics(&metrics));
    println!(
        "Transport: {} frames sent, {} bytes received, {} CRC errors, {} filtered",
        stats.frames_sent, stats.bytes_received, stats.crc_errors, stats.frames_filtered
    );

    backend.close();
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if let Err(e) = parse_args(&args).and_then(probe) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}
