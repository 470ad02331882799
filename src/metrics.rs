use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::{Duration, Instant};

lazy_static! {
    /// Registry holding every emulator metric
    pub static ref REGISTRY: Registry = Registry::new();

    /// Counter for executed instructions by opcode
    pub static ref CPU_INSTRUCTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cpu_instructions_total", "Total number of CPU instructions executed by opcode"),
        &["opcode", "instruction"]
    ).expect("Failed to create CPU instructions counter");

    /// Counter for fetched opcodes with no table entry
    pub static ref CPU_ILLEGAL_OPCODES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cpu_illegal_opcodes_total", "Total number of illegal opcodes fetched"),
        &["opcode"]
    ).expect("Failed to create illegal opcodes counter");

    /// Histogram for instruction execution time
    pub static ref INSTRUCTION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("instruction_duration_seconds", "Time spent executing instructions")
            .buckets(vec![0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001]),
        &["instruction"]
    ).expect("Failed to create instruction duration histogram");

    /// Counter for CPU resets, including soft resets from the control register
    pub static ref CPU_RESETS_TOTAL: Counter = Counter::new(
        "cpu_resets_total", "Total number of CPU resets"
    ).expect("Failed to create CPU resets counter");

    /// Counter for bytes copied into ROM
    pub static ref ROM_BYTES_LOADED_TOTAL: Counter = Counter::new(
        "rom_bytes_loaded_total", "Total number of bytes loaded into ROM"
    ).expect("Failed to create ROM bytes counter");
}

lazy_static! {
    // First registration outcome, replayed by every later `init_metrics` call.
    static ref REGISTRATION: Result<(), String> =
        register_all(&REGISTRY).map_err(|e| e.to_string());
}

/// Register the metrics with `REGISTRY`. Safe to call more than once; a
/// failed first registration is reported on every call.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRATION.clone().map_err(prometheus::Error::Msg)
}

fn register_all(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(CPU_INSTRUCTIONS_TOTAL.clone()))?;
    registry.register(Box::new(CPU_ILLEGAL_OPCODES_TOTAL.clone()))?;
    registry.register(Box::new(INSTRUCTION_DURATION.clone()))?;
    registry.register(Box::new(CPU_RESETS_TOTAL.clone()))?;
    registry.register(Box::new(ROM_BYTES_LOADED_TOTAL.clone()))?;
    Ok(())
}

/// Encode the registry in the Prometheus text format.
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Record a CPU instruction execution
pub fn record_instruction(opcode: u8, instruction_name: &str, duration: Duration) {
    CPU_INSTRUCTIONS_TOTAL
        .with_label_values(&[&format!("0x{:02X}", opcode), instruction_name])
        .inc();

    INSTRUCTION_DURATION
        .with_label_values(&[instruction_name])
        .observe(duration.as_secs_f64());
}

/// Record an illegal opcode fetch
pub fn record_illegal_opcode(opcode: u8) {
    CPU_ILLEGAL_OPCODES_TOTAL
        .with_label_values(&[&format!("0x{:02X}", opcode)])
        .inc();
}

pub fn record_reset() {
    CPU_RESETS_TOTAL.inc();
}

pub fn record_rom_load(bytes: usize) {
    ROM_BYTES_LOADED_TOTAL.inc_by(bytes as f64);
}

/// Helper struct for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
