use std::sync::atomic::{AtomicU64, Ordering};

use sandwich_core::telemetry;

/// Run-level counters, updated from the scan workers and the aggregation
/// fold. Also bridges into the Prometheus registry.
pub struct RunMetrics {
    pub blocks_scanned: AtomicU64,
    pub blocks_skipped: AtomicU64,
    pub blocks_malformed: AtomicU64,
    pub sandwiches_detected: AtomicU64,
    // Fixed-point micro-units; f64 has no atomic counterpart
    pub dropped_credit_micros: AtomicU64,
}

impl detector::ports::TelemetryPort for RunMetrics {
    fn log_block_scanned(&self, sandwiches: usize) {
        self.blocks_scanned.fetch_add(1, Ordering::Relaxed);
        self.sandwiches_detected
            .fetch_add(sandwiches as u64, Ordering::Relaxed);
        telemetry::BLOCKS_SCANNED.inc();
        telemetry::SANDWICHES_DETECTED.inc_by(sandwiches as f64);
    }

    fn log_malformed_block(&self) {
        self.blocks_malformed.fetch_add(1, Ordering::Relaxed);
        telemetry::BLOCKS_MALFORMED.inc();
    }

    fn log_dropped_credit(&self, credit: f64) {
        self.dropped_credit_micros
            .fetch_add((credit * 1e6) as u64, Ordering::Relaxed);
        telemetry::CREDIT_DROPPED.inc_by(credit);
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            blocks_scanned: AtomicU64::new(0),
            blocks_skipped: AtomicU64::new(0),
            blocks_malformed: AtomicU64::new(0),
            sandwiches_detected: AtomicU64::new(0),
            dropped_credit_micros: AtomicU64::new(0),
        }
    }

    pub fn log_skipped_slot(&self) {
        self.blocks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_credit(&self) -> f64 {
        self.dropped_credit_micros.load(Ordering::Relaxed) as f64 / 1e6
    }

    pub fn print_summary(&self, evaluated: usize, flagged: usize) {
        let scanned = self.blocks_scanned.load(Ordering::Relaxed);
        let skipped = self.blocks_skipped.load(Ordering::Relaxed);
        let malformed = self.blocks_malformed.load(Ordering::Relaxed);
        let sandwiches = self.sandwiches_detected.load(Ordering::Relaxed);

        println!(
            "
╔════════════════════════════════════════════════════╗
║          RUN SUMMARY                               ║
╠════════════════════════════════════════════════════╣
║ BLOCKS                                             ║
║   Scanned:            {:>14}               ║
║   Skipped slots:      {:>14}               ║
║   Malformed:          {:>14}               ║
╠════════════════════════════════════════════════════╣
║ DETECTION                                          ║
║   Sandwiches:         {:>14}               ║
║   Dropped credit:     {:>14.4}             ║
╠════════════════════════════════════════════════════╣
║ FLAGGING                                           ║
║   Evaluated:          {:>14}               ║
║   Flagged (both):     {:>14}               ║
╚════════════════════════════════════════════════════╝
        ",
            scanned, skipped, malformed, sandwiches, self.dropped_credit(), evaluated, flagged,
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
