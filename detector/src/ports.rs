// Port Definitions for Hexagonal Architecture
// These traits define the boundaries between the analytical core and the
// ingestion / persistence / metadata collaborators around it

use anyhow::Result;
use sandwich_core::{Block, SandwichInstance, TradeDirection};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

/// Port for block acquisition
/// The core only ever sees fully materialized blocks, already filtered down to
/// swap-bearing transactions; retries and timeouts live behind this boundary
#[async_trait::async_trait]
pub trait BlockSource: Send + Sync {
    /// Leaders for `len` consecutive slots starting at `start_slot`
    async fn slot_leaders(&self, start_slot: u64, len: u64) -> Result<Vec<Pubkey>>;

    /// One block per slot; `None` for skipped slots
    async fn fetch_block(&self, slot: u64, leader: Pubkey) -> Result<Option<Block>>;
}

/// Port for the append-only audit log of detected instances
#[async_trait::async_trait]
pub trait SandwichSink: Send + Sync {
    async fn persist(&self, instances: &[SandwichInstance]) -> Result<()>;
}

/// Display metadata for one validator, consulted only at report time.
#[derive(Debug, Clone, Default)]
pub struct ValidatorMetadata {
    pub vote_account: Option<Pubkey>,
    pub name: Option<String>,
}

/// Port for identity -> vote-account/name resolution
#[async_trait::async_trait]
pub trait ValidatorMetadataPort: Send + Sync {
    async fn resolve(&self, identities: &[Pubkey]) -> Result<HashMap<Pubkey, ValidatorMetadata>>;
}

/// Port for run telemetry; implementations must be cheap and non-blocking
pub trait TelemetryPort: Send + Sync {
    fn log_block_scanned(&self, sandwiches: usize);
    fn log_malformed_block(&self);
    fn log_dropped_credit(&self, credit: f64);
}

/// One candidate AMM invocation, flattened by ingestion from a transaction:
/// the instruction itself plus the token movements it produced.
#[derive(Debug, Clone)]
pub struct AmmInvocation {
    pub program: Pubkey,
    /// Outer program when the AMM was reached through a CPI
    pub wrapper: Option<Pubkey>,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
    pub transfers: Vec<TokenTransfer>,
}

#[derive(Debug, Clone)]
pub struct TokenTransfer {
    pub source: Pubkey,
    pub destination: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
}

/// What a family decoder extracts from one swap invocation.
/// Direction is derived centrally from the mint pair so every family maps the
/// same trade to the same canonical side.
#[derive(Debug, Clone)]
pub struct DecodedSwap {
    pub pool: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub input_amount: u64,
    pub output_amount: u64,
}

impl DecodedSwap {
    #[inline(always)]
    pub fn direction(&self) -> TradeDirection {
        TradeDirection::from_mints(&self.input_mint, &self.output_mint)
    }
}

/// Capability interface for AMM instruction decoding: one implementation per
/// program family, selected by ingestion before the core ever sees data.
/// The core itself never branches on AMM identity except via pool equality.
pub trait SwapDecoder: Send + Sync {
    fn program_id(&self) -> Pubkey;

    /// `None` when the invocation is not a swap of this family
    fn decode(&self, invocation: &AmmInvocation) -> Option<DecodedSwap>;
}
