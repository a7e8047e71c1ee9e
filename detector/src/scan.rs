use std::collections::{HashMap, HashSet};

use sandwich_core::constants::JUPITER_V6_PROGRAM;
use sandwich_core::{Block, SandwichInstance};
use smallvec::SmallVec;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

/// Detector tuning that is not part of the pattern itself.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Wrapper programs that never count as the frontrun/backrun fingerprint.
    /// Public aggregator routers land here: they are not a plausible way for
    /// an attacker to track its own tokens across transactions.
    pub wrapper_deny_list: Vec<Pubkey>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            wrapper_deny_list: vec![JUPITER_V6_PROGRAM],
        }
    }
}

/// Scan one block's ordered swap sequence for sandwich instances.
///
/// An instance requires, on a single pool:
///   frontrun (dir D) < victims (dir D, >=1) < backrun (dir !D)
/// with the attacker round-trip non-loss-making, every victim signer distinct
/// from both attacker legs, and an identical non-denied wrapper program on
/// both attacker legs. Nearest-preceding frontrun and nearest-following
/// backrun win ties; frontrun/backrun roles are consumed at most once per
/// swap, victims at most once.
///
/// Pure function of the block: same input, same instances.
pub fn scan_block(block: &Block, config: &ScanConfig) -> Vec<SandwichInstance> {
    let mut by_pool: HashMap<Pubkey, SmallVec<[usize; 8]>> = HashMap::new();
    for (i, swap) in block.swaps.iter().enumerate() {
        by_pool.entry(swap.pool).or_default().push(i);
    }

    // Pool order is irrelevant to the result set but sorted for a stable
    // emission order.
    let mut pool_ids: Vec<Pubkey> = by_pool.keys().copied().collect();
    pool_ids.sort();

    let mut consumed: HashSet<usize> = HashSet::new();
    let mut victim_used: HashSet<usize> = HashSet::new();
    let mut instances = Vec::new();

    for pool in pool_ids {
        scan_pool(
            block,
            &by_pool[&pool],
            config,
            &mut consumed,
            &mut victim_used,
            &mut instances,
        );
    }

    if !instances.is_empty() {
        debug!(
            "🥪 slot {}: {} sandwich instance(s) across {} swap(s)",
            block.slot,
            instances.len(),
            block.swaps.len()
        );
    }
    instances
}

fn scan_pool(
    block: &Block,
    order: &[usize],
    config: &ScanConfig,
    consumed: &mut HashSet<usize>,
    victim_used: &mut HashSet<usize>,
    out: &mut Vec<SandwichInstance>,
) {
    // Treating each swap as a potential closer (backrun) in inclusion order
    // makes the nearest-following-closer tie-break automatic: an anchor is
    // taken by the first closer that forms a valid instance with it.
    for (ci, &closer_idx) in order.iter().enumerate() {
        if consumed.contains(&closer_idx) {
            continue;
        }
        let closer = &block.swaps[closer_idx];
        let Some(closer_wrapper) = closer.wrapper_program else {
            continue;
        };
        if config.wrapper_deny_list.contains(&closer_wrapper) {
            continue;
        }

        // Nearest preceding anchor first; fall back to farther anchors only
        // when the nearer window holds no eligible victim.
        for ai in (0..ci).rev() {
            let anchor_idx = order[ai];
            if consumed.contains(&anchor_idx) {
                continue;
            }
            let anchor = &block.swaps[anchor_idx];
            if anchor.direction != closer.direction.opposite() {
                continue;
            }
            if anchor.wrapper_program != Some(closer_wrapper) {
                continue;
            }
            // Attacker round trip must not lose tokens on either side
            if closer.output_amount < anchor.input_amount
                || anchor.output_amount < closer.input_amount
            {
                continue;
            }

            let mut victims: SmallVec<[usize; 4]> = SmallVec::new();
            for &mid_idx in &order[ai + 1..ci] {
                let mid = &block.swaps[mid_idx];
                if mid.direction != anchor.direction {
                    continue;
                }
                if victim_used.contains(&mid_idx) {
                    continue;
                }
                if mid.signer == anchor.signer || mid.signer == closer.signer {
                    continue;
                }
                victims.push(mid_idx);
            }
            if victims.is_empty() {
                continue;
            }

            consumed.insert(anchor_idx);
            consumed.insert(closer_idx);
            for &v in &victims {
                victim_used.insert(v);
            }
            out.push(SandwichInstance {
                slot: block.slot,
                leader: block.leader,
                pool: anchor.pool,
                frontrun: anchor.clone(),
                victims: victims.iter().map(|&v| block.swaps[v].clone()).collect(),
                backrun: closer.clone(),
            });
            break;
        }
    }
}
