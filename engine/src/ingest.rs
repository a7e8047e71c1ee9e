use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use detector::ports::{AmmInvocation, BlockSource, SwapDecoder, TokenTransfer};
use sandwich_core::{Block, SwapEvent, TradeDirection};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcBlockConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_transaction_status::{
    EncodedTransaction, UiConfirmedBlock, UiInnerInstructions, UiInstruction, UiMessage,
    UiParsedInstruction, UiTransactionEncoding,
};
use tracing::{debug, warn};

// RPC caps get_slot_leaders at 5000 per request
const MAX_LEADER_CHUNK: u64 = 5_000;

/// Batch block acquisition over JSON RPC. Fetches jsonParsed blocks, filters
/// them down to swap-bearing transactions via the configured family decoders,
/// and hands the core fully materialized `Block`s.
pub struct RpcBlockSource {
    rpc: RpcClient,
    decoders: Vec<Arc<dyn SwapDecoder>>,
}

impl RpcBlockSource {
    pub fn new(rpc_url: &str, decoders: Vec<Arc<dyn SwapDecoder>>) -> Self {
        Self {
            rpc: RpcClient::new(rpc_url.to_string()),
            decoders,
        }
    }

}

#[async_trait::async_trait]
impl BlockSource for RpcBlockSource {
    async fn slot_leaders(&self, start_slot: u64, len: u64) -> Result<Vec<Pubkey>> {
        let mut leaders = Vec::with_capacity(len as usize);
        let mut cursor = start_slot;
        while cursor < start_slot + len {
            let chunk = MAX_LEADER_CHUNK.min(start_slot + len - cursor);
            let mut batch = self
                .rpc
                .get_slot_leaders(cursor, chunk)
                .await
                .with_context(|| format!("fetching slot leaders from {}", cursor))?;
            leaders.append(&mut batch);
            cursor += chunk;
        }
        Ok(leaders)
    }

    async fn fetch_block(&self, slot: u64, leader: Pubkey) -> Result<Option<Block>> {
        let config = RpcBlockConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            transaction_details: None,
            rewards: Some(false),
            commitment: Some(CommitmentConfig::finalized()),
            max_supported_transaction_version: Some(0),
        };
        let encoded = match self.rpc.get_block_with_config(slot, config).await {
            Ok(block) => block,
            Err(e) => {
                let msg = e.to_string();
                // Skipped slots are normal; everything else bubbles up
                if msg.contains("-32007") || msg.contains("-32009") || msg.contains("skipped") {
                    debug!("Slot {} was skipped", slot);
                    return Ok(None);
                }
                return Err(e).with_context(|| format!("fetching block {}", slot));
            }
        };
        let block = block_from_encoded(slot, leader, encoded, &self.decoders)?;
        Ok(Some(block))
    }
}

/// Flatten a jsonParsed block into the core's swap model.
/// Non-swap transactions and undecodable programs are invisible downstream.
pub fn block_from_encoded(
    slot: u64,
    leader: Pubkey,
    encoded: UiConfirmedBlock,
    decoders: &[Arc<dyn SwapDecoder>],
) -> Result<Block> {
    let mut swaps: Vec<SwapEvent> = Vec::new();
    let mut inclusion = 0u32;

    for tx in encoded.transactions.unwrap_or_default() {
        let Some(meta) = &tx.meta else { continue };
        // No swaps in failed txs
        if meta.err.is_some() {
            continue;
        }
        let EncodedTransaction::Json(ui_tx) = &tx.transaction else {
            continue;
        };
        let UiMessage::Parsed(message) = &ui_tx.message else {
            continue;
        };
        let Some(signature) = ui_tx.signatures.first() else {
            continue;
        };
        let Some(fee_payer) = message
            .account_keys
            .first()
            .and_then(|k| Pubkey::from_str(&k.pubkey).ok())
        else {
            continue;
        };

        // ATA -> mint, for plain transfers that don't carry the mint inline
        let mut mint_by_account: HashMap<String, String> = HashMap::new();
        let balances: Option<Vec<_>> = meta.post_token_balances.clone().into();
        for balance in balances.unwrap_or_default() {
            if let Some(key) = message.account_keys.get(balance.account_index as usize) {
                mint_by_account.insert(key.pubkey.clone(), balance.mint.clone());
            }
        }

        let inner: Option<Vec<UiInnerInstructions>> = meta.inner_instructions.clone().into();
        let mut inner_by_index: HashMap<u8, &UiInnerInstructions> = HashMap::new();
        for group in inner.iter().flatten() {
            inner_by_index.insert(group.index, group);
        }

        let mut tx_had_swap = false;
        for (ix_index, instruction) in message.instructions.iter().enumerate() {
            let UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(raw)) = instruction
            else {
                continue;
            };
            let inner_group = inner_by_index.get(&(ix_index as u8));

            let decoded = if let Some(decoder) = decoder_lookup(decoders, &raw.program_id) {
                // Direct AMM call: the inner instructions are its transfers
                let transfers = inner_group
                    .map(|g| collect_transfers(&g.instructions, &mint_by_account))
                    .unwrap_or_default();
                let invocation = AmmInvocation {
                    program: decoder.program_id(),
                    wrapper: None,
                    accounts: parse_accounts(&raw.accounts),
                    data: bs58::decode(&raw.data).into_vec().unwrap_or_default(),
                    transfers,
                };
                decoder.decode(&invocation).map(|s| (s, None))
            } else if let Some(group) = inner_group {
                // Wrapper call: look for an AMM invocation among its CPIs
                let wrapper = Pubkey::from_str(&raw.program_id).ok();
                decode_wrapped(decoders, group, wrapper, &mint_by_account)
            } else {
                None
            };

            if let Some((swap, wrapper)) = decoded {
                swaps.push(SwapEvent {
                    pool: swap.pool,
                    signer: fee_payer,
                    wrapper_program: wrapper,
                    direction: TradeDirection::from_mints(&swap.input_mint, &swap.output_mint),
                    input_amount: swap.input_amount,
                    output_amount: swap.output_amount,
                    inclusion_index: inclusion,
                    signature: signature.clone(),
                });
                inclusion += 1;
                tx_had_swap = true;
            }
        }
        if !tx_had_swap {
            debug!("No decodable swap in tx {}", signature);
        }
    }

    Block::new(slot, leader, swaps).map_err(Into::into)
}

fn decoder_lookup<'a>(
    decoders: &'a [Arc<dyn SwapDecoder>],
    program_id: &str,
) -> Option<&'a Arc<dyn SwapDecoder>> {
    decoders
        .iter()
        .find(|d| d.program_id().to_string() == program_id)
}

/// Walk a wrapper's inner instructions: the first decodable AMM call wins,
/// with the token movements that follow it as the swap legs.
fn decode_wrapped(
    decoders: &[Arc<dyn SwapDecoder>],
    group: &UiInnerInstructions,
    wrapper: Option<Pubkey>,
    mint_by_account: &HashMap<String, String>,
) -> Option<(detector::ports::DecodedSwap, Option<Pubkey>)> {
    for (j, instruction) in group.instructions.iter().enumerate() {
        let UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(raw)) = instruction else {
            continue;
        };
        let Some(decoder) = decoder_lookup(decoders, &raw.program_id) else {
            continue;
        };
        let transfers = collect_transfers(&group.instructions[j + 1..], mint_by_account);
        let invocation = AmmInvocation {
            program: decoder.program_id(),
            wrapper,
            accounts: parse_accounts(&raw.accounts),
            data: bs58::decode(&raw.data).into_vec().unwrap_or_default(),
            transfers,
        };
        if let Some(swap) = decoder.decode(&invocation) {
            return Some((swap, wrapper));
        }
    }
    None
}

fn parse_accounts(accounts: &[String]) -> Vec<Pubkey> {
    accounts
        .iter()
        .filter_map(|a| Pubkey::from_str(a).ok())
        .collect()
}

/// SPL token movements out of a parsed instruction list, in order.
fn collect_transfers(
    instructions: &[UiInstruction],
    mint_by_account: &HashMap<String, String>,
) -> Vec<TokenTransfer> {
    let mut transfers = Vec::new();
    for instruction in instructions {
        let UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) = instruction else {
            continue;
        };
        if parsed.program != "spl-token" {
            continue;
        }
        let kind = parsed.parsed.get("type").and_then(|t| t.as_str());
        let info = parsed.parsed.get("info");
        let Some(info) = info else { continue };

        let (amount, mint) = match kind {
            Some("transfer") => {
                let amount = info.get("amount").and_then(|a| a.as_str());
                // Plain transfers don't carry the mint; recover it from the
                // destination's (or source's) post balance entry
                let mint = info
                    .get("destination")
                    .and_then(|d| d.as_str())
                    .and_then(|d| mint_by_account.get(d))
                    .or_else(|| {
                        info.get("source")
                            .and_then(|s| s.as_str())
                            .and_then(|s| mint_by_account.get(s))
                    });
                (amount, mint.cloned())
            }
            Some("transferChecked") => {
                let amount = info
                    .get("tokenAmount")
                    .and_then(|t| t.get("amount"))
                    .and_then(|a| a.as_str());
                let mint = info.get("mint").and_then(|m| m.as_str()).map(str::to_string);
                (amount, mint)
            }
            _ => continue,
        };

        let (Some(amount), Some(mint)) = (amount, mint) else {
            continue;
        };
        let Ok(amount) = amount.parse::<u64>() else {
            warn!("Unparseable token amount in transfer: {}", amount);
            continue;
        };
        let source = info
            .get("source")
            .and_then(|s| s.as_str())
            .and_then(|s| Pubkey::from_str(s).ok())
            .unwrap_or_default();
        let destination = info
            .get("destination")
            .and_then(|d| d.as_str())
            .and_then(|d| Pubkey::from_str(d).ok())
            .unwrap_or_default();
        let Ok(mint) = Pubkey::from_str(&mint) else {
            continue;
        };
        transfers.push(TokenTransfer { source, destination, mint, amount });
    }
    transfers
}
