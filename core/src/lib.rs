pub mod stats;
pub mod telemetry;

use serde::{Serialize, Deserialize};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Trade direction relative to the canonical side of a pool.
/// The canonical side is fixed per pool by mint ordering, so every decoder
/// maps the same on-chain trade to the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    #[inline(always)]
    pub fn opposite(&self) -> TradeDirection {
        match self {
            TradeDirection::Buy => TradeDirection::Sell,
            TradeDirection::Sell => TradeDirection::Buy,
        }
    }

    /// Canonical direction for a trade: buying the lexically-greater mint of
    /// the pair counts as `Buy`. Any fixed convention works as long as every
    /// decoder applies the same one.
    #[inline(always)]
    pub fn from_mints(input_mint: &Pubkey, output_mint: &Pubkey) -> TradeDirection {
        if input_mint.to_bytes() < output_mint.to_bytes() {
            TradeDirection::Buy
        } else {
            TradeDirection::Sell
        }
    }
}

/// One decoded AMM interaction inside a transaction.
/// Constructed once by the ingestion-side decoder, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvent {
    pub pool: Pubkey,
    pub signer: Pubkey,
    /// Outer program invoking the AMM, if the swap went through one.
    pub wrapper_program: Option<Pubkey>,
    pub direction: TradeDirection,
    pub input_amount: u64,
    pub output_amount: u64,
    /// Position of the carrying transaction within the block (total order).
    pub inclusion_index: u32,
    pub signature: String,
}

/// Ordered swap activity of a single slot, plus its producer.
/// Discarded after processing; only derived counts persist.
#[derive(Debug, Clone)]
pub struct Block {
    pub slot: u64,
    pub leader: Pubkey,
    pub swaps: Vec<SwapEvent>,
}

impl Block {
    pub fn new(slot: u64, leader: Pubkey, swaps: Vec<SwapEvent>) -> Result<Self, AnalysisError> {
        // Inclusion indexes must be strictly increasing; a block that violates
        // this is rejected whole rather than partially aggregated.
        for pair in swaps.windows(2) {
            if pair[1].inclusion_index <= pair[0].inclusion_index {
                return Err(AnalysisError::MalformedBlock {
                    slot,
                    reason: format!(
                        "inclusion order not strictly increasing ({} then {})",
                        pair[0].inclusion_index, pair[1].inclusion_index
                    ),
                });
            }
        }
        Ok(Self { slot, leader, swaps })
    }
}

/// A detected sandwich: one frontrun, one or more victims, one backrun,
/// all on the same pool, in strictly increasing inclusion order.
#[derive(Debug, Clone, Serialize)]
pub struct SandwichInstance {
    pub slot: u64,
    pub leader: Pubkey,
    pub pool: Pubkey,
    pub frontrun: SwapEvent,
    pub victims: Vec<SwapEvent>,
    pub backrun: SwapEvent,
}

/// Raw (unsmeared) outcome of scanning one block.
#[derive(Debug, Clone, Copy)]
pub struct BlockDetection {
    pub slot: u64,
    pub leader: Pubkey,
    pub sandwich_count: u32,
}

impl BlockDetection {
    #[inline(always)]
    pub fn inclusive(&self) -> bool {
        self.sandwich_count > 0
    }
}

/// Per-validator counters before credit smearing. Monotonic increments only.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ValidatorRawCounts {
    pub slots_observed: u64,
    pub raw_inclusive_blocks: u64,
    pub raw_sandwich_count: u64,
}

/// Per-validator counters after credit smearing. Computed once per run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ValidatorWeightedCounts {
    pub weighted_inclusive_blocks: f64,
    pub weighted_sandwich_count: f64,
}

/// Cluster-wide aggregates over the whole slot range. Read-only input to the
/// flagger; always derived from unsmeared per-block counts.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClusterBaseline {
    pub total_blocks: u64,
    pub sandwich_inclusive_blocks: u64,
    pub proportion: f64,
    pub mean_sandwiches_per_block: f64,
    pub std_dev_sandwiches_per_block: f64,
}

/// Final output row, one per evaluated validator. 14 fields, matching the
/// externally consumed report schema.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatorReportRecord {
    pub identity: Pubkey,
    pub vote_account: Option<Pubkey>,
    pub name: Option<String>,
    /// Weighted sandwiches per observed slot.
    pub sc: f64,
    /// Weighted inclusive-block proportion.
    pub sc_p: f64,
    pub sc_raw: f64,
    pub sc_p_raw: f64,
    pub slots: u64,
    pub sc_p_lower: f64,
    pub sc_p_upper: f64,
    pub sc_lower: f64,
    pub sc_upper: f64,
    pub sc_p_flag: bool,
    pub sc_flag: bool,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Malformed block at slot {slot}: {reason}")]
    MalformedBlock { slot: u64, reason: String },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

pub mod constants {
    use solana_sdk::pubkey;
    use solana_sdk::pubkey::Pubkey;

    pub const RAYDIUM_V4_PROGRAM: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");
    pub const PUMP_AMM_PROGRAM: Pubkey = pubkey!("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA");
    pub const ORCA_WHIRLPOOL_PROGRAM: Pubkey = pubkey!("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc");

    /// Public aggregator routers are never accepted as the wrapper fingerprint
    /// linking frontrun to backrun: they are not built for an attacker to keep
    /// track of its own tokens across transactions.
    pub const JUPITER_V6_PROGRAM: Pubkey = pubkey!("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4");
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn swap(idx: u32) -> SwapEvent {
        SwapEvent {
            pool: Pubkey::new_unique(),
            signer: Pubkey::new_unique(),
            wrapper_program: None,
            direction: TradeDirection::Buy,
            input_amount: 1,
            output_amount: 1,
            inclusion_index: idx,
            signature: String::new(),
        }
    }

    #[test]
    fn test_block_accepts_ordered_swaps() {
        let block = Block::new(1, Pubkey::new_unique(), vec![swap(1), swap(5), swap(9)]);
        assert!(block.is_ok());
    }

    #[test]
    fn test_block_rejects_duplicate_inclusion_index() {
        let err = Block::new(1, Pubkey::new_unique(), vec![swap(3), swap(3)]).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedBlock { slot: 1, .. }));
    }

    #[test]
    fn test_block_rejects_unordered_swaps() {
        let err = Block::new(7, Pubkey::new_unique(), vec![swap(5), swap(2)]).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedBlock { slot: 7, .. }));
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(TradeDirection::Buy.opposite(), TradeDirection::Sell);
        assert_eq!(TradeDirection::Sell.opposite(), TradeDirection::Buy);
    }
}
