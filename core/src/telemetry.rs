use prometheus::{Counter, Histogram, HistogramOpts, IntGauge, Registry, TextEncoder, Encoder};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Detection metrics
    pub static ref BLOCKS_SCANNED: Counter = Counter::new(
        "blocks_scanned_total",
        "Blocks fetched and scanned for sandwich patterns"
    ).unwrap();

    pub static ref BLOCKS_MALFORMED: Counter = Counter::new(
        "blocks_malformed_total",
        "Blocks rejected before aggregation (missing leader, unordered events)"
    ).unwrap();

    pub static ref SANDWICHES_DETECTED: Counter = Counter::new(
        "sandwiches_detected_total",
        "Sandwich instances emitted by the detector"
    ).unwrap();

    // Attribution metrics
    pub static ref CREDIT_DROPPED: Counter = Counter::new(
        "credit_dropped_total",
        "Weighted credit truncated at the start of a leader's observed range"
    ).unwrap();

    pub static ref VALIDATORS_FLAGGED: IntGauge = IntGauge::new(
        "validators_flagged",
        "Validators flagged by both metrics in the last completed run"
    ).unwrap();

    pub static ref VALIDATORS_EVALUATED: IntGauge = IntGauge::new(
        "validators_evaluated",
        "Validators with at least one observed slot in the last completed run"
    ).unwrap();

    // Latency metrics
    pub static ref SCAN_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "block_scan_latency_ms",
            "Time to scan one block's swap sequence"
        )
    ).unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(BLOCKS_SCANNED.clone())).unwrap();
    REGISTRY.register(Box::new(BLOCKS_MALFORMED.clone())).unwrap();
    REGISTRY.register(Box::new(SANDWICHES_DETECTED.clone())).unwrap();
    REGISTRY.register(Box::new(CREDIT_DROPPED.clone())).unwrap();
    REGISTRY.register(Box::new(VALIDATORS_FLAGGED.clone())).unwrap();
    REGISTRY.register(Box::new(VALIDATORS_EVALUATED.clone())).unwrap();
    REGISTRY.register(Box::new(SCAN_LATENCY.clone())).unwrap();
}

/// Render the registry in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap_or_default()
}
