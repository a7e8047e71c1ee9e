use std::collections::HashMap;

use sandwich_core::stats::RunningMoments;
use sandwich_core::{BlockDetection, ClusterBaseline, ValidatorRawCounts, ValidatorWeightedCounts};
use solana_sdk::pubkey::Pubkey;

use crate::credit::SmearResult;

/// Raw and smeared counters for one validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorCounts {
    pub raw: ValidatorRawCounts,
    pub weighted: ValidatorWeightedCounts,
}

/// Credit lost to the start-of-range boundary, reported rather than silently
/// absorbed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DroppedCredit {
    pub inclusive_blocks: f64,
    pub sandwich_count: f64,
}

impl DroppedCredit {
    pub fn total(&self) -> f64 {
        self.inclusive_blocks + self.sandwich_count
    }
}

/// Single streaming fold over per-block contributions. Per-leader and cluster
/// accumulators are all sums, counts and sums-of-squares, so partials built by
/// parallel workers merge commutatively.
///
/// The cluster baseline always uses the unsmeared raw indicator: smearing
/// shifts per-validator attribution, never the global denominator.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    per_leader: HashMap<Pubkey, ValidatorCounts>,
    total_blocks: u64,
    inclusive_blocks: u64,
    moments: RunningMoments,
    dropped: DroppedCredit,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observed leader slot into the accumulators.
    ///
    /// All smeared credit lands on earlier observed slots of the same leader,
    /// so validator totals take the kept fraction directly; per-slot placement
    /// is only visible through the smear result itself.
    pub fn record(&mut self, detection: &BlockDetection, smear: &SmearResult) {
        let indicator = if detection.inclusive() { 1.0 } else { 0.0 };
        let count = detection.sandwich_count as f64;
        let kept = smear.kept();

        let acc = self.per_leader.entry(detection.leader).or_default();
        acc.raw.slots_observed += 1;
        if detection.inclusive() {
            acc.raw.raw_inclusive_blocks += 1;
        }
        acc.raw.raw_sandwich_count += detection.sandwich_count as u64;
        acc.weighted.weighted_inclusive_blocks += indicator * kept;
        acc.weighted.weighted_sandwich_count += count * kept;

        self.total_blocks += 1;
        if detection.inclusive() {
            self.inclusive_blocks += 1;
        }
        self.moments.add(count);

        self.dropped.inclusive_blocks += indicator * smear.dropped;
        self.dropped.sandwich_count += count * smear.dropped;
    }

    /// Merge a partial aggregator built by another worker.
    pub fn merge(&mut self, other: MetricsAggregator) {
        for (leader, counts) in other.per_leader {
            let acc = self.per_leader.entry(leader).or_default();
            acc.raw.slots_observed += counts.raw.slots_observed;
            acc.raw.raw_inclusive_blocks += counts.raw.raw_inclusive_blocks;
            acc.raw.raw_sandwich_count += counts.raw.raw_sandwich_count;
            acc.weighted.weighted_inclusive_blocks += counts.weighted.weighted_inclusive_blocks;
            acc.weighted.weighted_sandwich_count += counts.weighted.weighted_sandwich_count;
        }
        self.total_blocks += other.total_blocks;
        self.inclusive_blocks += other.inclusive_blocks;
        self.moments.merge(&other.moments);
        self.dropped.inclusive_blocks += other.dropped.inclusive_blocks;
        self.dropped.sandwich_count += other.dropped.sandwich_count;
    }

    pub fn dropped_credit(&self) -> DroppedCredit {
        self.dropped
    }

    pub fn baseline(&self) -> ClusterBaseline {
        let proportion = if self.total_blocks > 0 {
            self.inclusive_blocks as f64 / self.total_blocks as f64
        } else {
            0.0
        };
        ClusterBaseline {
            total_blocks: self.total_blocks,
            sandwich_inclusive_blocks: self.inclusive_blocks,
            proportion,
            mean_sandwiches_per_block: self.moments.mean(),
            std_dev_sandwiches_per_block: self.moments.population_std_dev(),
        }
    }

    pub fn validator_counts(&self) -> &HashMap<Pubkey, ValidatorCounts> {
        &self.per_leader
    }
}
