use std::collections::HashMap;

use sandwich_core::stats::{expected_count_interval, wilson_interval, z_for_confidence};
use sandwich_core::{AnalysisError, ClusterBaseline};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::aggregate::ValidatorCounts;

#[derive(Debug, Clone)]
pub struct FlagConfig {
    /// Two-sided confidence level for both hypothesis tests.
    pub confidence_level: f64,
    /// Validators below this sample size are excluded from the filtered view
    /// (the underlying flags are still computed).
    pub min_slots: u64,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.9999,
            min_slots: 50,
        }
    }
}

impl FlagConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalysisError::ConfigurationError(format!(
                "confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }
}

/// Flag decision for one validator with at least one observed slot.
/// Interval bounds are on the normalized (per-slot) scale of the report.
#[derive(Debug, Clone)]
pub struct ValidatorVerdict {
    pub identity: Pubkey,
    pub slots: u64,
    /// Weighted sandwich count / inclusive-block count (raw scale).
    pub sc_raw: f64,
    pub sc_p_raw: f64,
    /// Per-slot normalized forms.
    pub sc: f64,
    pub sc_p: f64,
    pub sc_interval: (f64, f64),
    pub sc_p_interval: (f64, f64),
    pub sc_flag: bool,
    pub sc_p_flag: bool,
}

impl ValidatorVerdict {
    /// The alternative hypothesis needs both metrics out of line with the
    /// cluster; either one alone leaves the null standing.
    #[inline(always)]
    pub fn flagged(&self) -> bool {
        self.sc_flag && self.sc_p_flag
    }
}

/// Pure function over the cluster baseline and per-validator weighted counts.
/// Runs once after the full aggregation completes.
pub struct StatisticalFlagger {
    config: FlagConfig,
    z: f64,
}

impl StatisticalFlagger {
    pub fn new(config: FlagConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let z = z_for_confidence(config.confidence_level);
        Ok(Self { config, z })
    }

    pub fn min_slots(&self) -> u64 {
        self.config.min_slots
    }

    pub fn evaluate(
        &self,
        baseline: &ClusterBaseline,
        counts: &HashMap<Pubkey, ValidatorCounts>,
    ) -> Vec<ValidatorVerdict> {
        let mut verdicts: Vec<ValidatorVerdict> = counts
            .iter()
            .filter_map(|(identity, c)| self.evaluate_one(*identity, baseline, c))
            .collect();

        // Deterministic report order: strongest signal first
        verdicts.sort_by(|a, b| {
            b.sc_raw
                .partial_cmp(&a.sc_raw)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.identity.to_string().cmp(&b.identity.to_string()))
        });
        verdicts
    }

    fn evaluate_one(
        &self,
        identity: Pubkey,
        baseline: &ClusterBaseline,
        counts: &ValidatorCounts,
    ) -> Option<ValidatorVerdict> {
        let slots = counts.raw.slots_observed;
        // A validator with no observed slots cannot be evaluated: omitted
        // entirely, neither flagged true nor false
        if slots == 0 {
            return None;
        }
        let n = slots as f64;
        let k = counts.weighted.weighted_inclusive_blocks;
        let sc_raw = counts.weighted.weighted_sandwich_count;

        // Metric A: each observed block as a Bernoulli trial on the
        // inclusive indicator; anomalous when even the interval's lower
        // bound clears the cluster proportion
        let (p_lb, p_ub) = wilson_interval(k, n, self.z)?;
        let sc_p_flag = p_lb > baseline.proportion;

        // Metric B: the count a cluster-average validator of this size would
        // show; anomalous when the observed count clears the upper bound
        let (c_lb, c_ub) = expected_count_interval(
            n,
            baseline.mean_sandwiches_per_block,
            baseline.std_dev_sandwiches_per_block,
            self.z,
        )?;
        let sc_flag = sc_raw > c_ub;

        if sc_flag && sc_p_flag {
            debug!(
                "🚩 {} anomalous on both metrics (N={}, Sc={:.2}, Sc_p={:.4})",
                identity, slots, sc_raw, k / n
            );
        }

        Some(ValidatorVerdict {
            identity,
            slots,
            sc_raw,
            sc_p_raw: k,
            sc: sc_raw / n,
            sc_p: k / n,
            sc_interval: (c_lb / n, c_ub / n),
            sc_p_interval: (p_lb, p_ub),
            sc_flag,
            sc_p_flag,
        })
    }
}
