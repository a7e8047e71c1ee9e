pub mod ports;
pub mod scan;     // per-block pattern scan
pub mod credit;   // landing-delay credit smearing
pub mod aggregate;
pub mod flagger;

#[cfg(test)]
mod scenario_tests;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sandwich_core::{AnalysisError, Block, BlockDetection, ClusterBaseline, SandwichInstance};
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use crate::aggregate::{DroppedCredit, MetricsAggregator, ValidatorCounts};
use crate::credit::{CreditDistributor, SmearConfig};
use crate::flagger::{FlagConfig, StatisticalFlagger, ValidatorVerdict};
use crate::ports::TelemetryPort;
use crate::scan::ScanConfig;

/// One batch analysis over a slot range.
///
/// Scanning is a pure per-block function and safe to run from any number of
/// workers; `record` is the serialization point and must see blocks in slot
/// order so each leader's smear window means "immediately preceding".
pub struct AnalysisRun {
    scan_config: ScanConfig,
    inner: Mutex<RunState>,
    telemetry: Option<Arc<dyn TelemetryPort>>,
}

struct RunState {
    distributor: CreditDistributor,
    aggregator: MetricsAggregator,
    last_slot: Option<u64>,
}

/// Everything the flagger and report assembler need from one finished run.
pub struct RunOutput {
    pub baseline: ClusterBaseline,
    pub validator_counts: HashMap<Pubkey, ValidatorCounts>,
    pub verdicts: Vec<ValidatorVerdict>,
    pub dropped_credit: DroppedCredit,
}

impl AnalysisRun {
    pub fn new(
        scan_config: ScanConfig,
        smear_config: SmearConfig,
        telemetry: Option<Arc<dyn TelemetryPort>>,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            scan_config,
            inner: Mutex::new(RunState {
                distributor: CreditDistributor::new(smear_config)?,
                aggregator: MetricsAggregator::new(),
                last_slot: None,
            }),
            telemetry,
        })
    }

    /// Scan one block. Pure; callable concurrently.
    pub fn scan(&self, block: &Block) -> Vec<SandwichInstance> {
        let instances = scan::scan_block(block, &self.scan_config);
        if let Some(tel) = &self.telemetry {
            tel.log_block_scanned(instances.len());
        }
        instances
    }

    /// Fold one block's raw detection outcome, in slot order.
    pub fn record(&self, detection: BlockDetection) -> Result<(), AnalysisError> {
        let mut state = self.inner.lock();
        if let Some(last) = state.last_slot {
            if detection.slot <= last {
                return Err(AnalysisError::MalformedBlock {
                    slot: detection.slot,
                    reason: format!("out of order (previous slot {})", last),
                });
            }
        }
        state.last_slot = Some(detection.slot);

        let smear = state.distributor.observe(detection.leader, detection.slot);
        if smear.dropped > 0.0 {
            if let Some(tel) = &self.telemetry {
                let indicator = if detection.inclusive() { 1.0 } else { 0.0 };
                let magnitude = indicator + detection.sandwich_count as f64;
                tel.log_dropped_credit(magnitude * smear.dropped);
            }
        }
        state.aggregator.record(&detection, &smear);
        Ok(())
    }

    /// Compute the baseline and per-validator flags. Consumes the run.
    pub fn finalize(self, flag_config: FlagConfig) -> Result<RunOutput, AnalysisError> {
        let flagger = StatisticalFlagger::new(flag_config)?;
        let state = self.inner.into_inner();
        let baseline = state.aggregator.baseline();
        let validator_counts = state.aggregator.validator_counts().clone();
        let dropped_credit = state.aggregator.dropped_credit();
        if dropped_credit.total() > 0.0 {
            warn!(
                "⚠️ {:.2} units of smeared credit dropped at range start",
                dropped_credit.total()
            );
        }
        let verdicts = flagger.evaluate(&baseline, &validator_counts);
        Ok(RunOutput {
            baseline,
            validator_counts,
            verdicts,
            dropped_credit,
        })
    }
}
