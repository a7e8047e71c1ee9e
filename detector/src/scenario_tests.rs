//! End-to-end scenarios over the full analysis run: scan -> smear ->
//! aggregate -> flag, driven through the public surface only.

use std::collections::HashMap;

use sandwich_core::{Block, BlockDetection, SwapEvent, TradeDirection};
use solana_sdk::pubkey::Pubkey;

use crate::credit::SmearConfig;
use crate::flagger::FlagConfig;
use crate::scan::{scan_block, ScanConfig};
use crate::AnalysisRun;

fn wrapper() -> Pubkey {
    Pubkey::new_from_array([7u8; 32])
}

fn swap(
    pool: Pubkey,
    signer: Pubkey,
    wrap: Option<Pubkey>,
    direction: TradeDirection,
    idx: u32,
    input: u64,
    output: u64,
) -> SwapEvent {
    SwapEvent {
        pool,
        signer,
        wrapper_program: wrap,
        direction,
        input_amount: input,
        output_amount: output,
        inclusion_index: idx,
        signature: format!("sig-{}", idx),
    }
}

/// The canonical three-swap sandwich of the scenario suite:
/// A(buy, 100->110, wrapped), B(buy, victim), C(sell, 109->101, wrapped).
fn canonical_swaps(pool: Pubkey, attacker: Pubkey, victim: Pubkey) -> Vec<SwapEvent> {
    vec![
        swap(pool, attacker, Some(wrapper()), TradeDirection::Buy, 1, 100, 110),
        swap(pool, victim, None, TradeDirection::Buy, 2, 10, 9),
        swap(pool, attacker, Some(wrapper()), TradeDirection::Sell, 3, 109, 101),
    ]
}

fn block_of(swaps: Vec<SwapEvent>) -> Block {
    Block::new(1000, Pubkey::new_from_array([42u8; 32]), swaps).unwrap()
}

#[test]
fn scenario_1_canonical_sandwich() {
    let pool = Pubkey::new_unique();
    let attacker = Pubkey::new_unique();
    let victim = Pubkey::new_unique();
    let block = block_of(canonical_swaps(pool, attacker, victim));

    let instances = scan_block(&block, &ScanConfig::default());
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].frontrun.inclusion_index, 1);
    assert_eq!(
        instances[0].victims.iter().map(|v| v.inclusion_index).collect::<Vec<_>>(),
        vec![2]
    );
    assert_eq!(instances[0].backrun.inclusion_index, 3);
}

#[test]
fn scenario_2_wrapper_absent_on_backrun() {
    let pool = Pubkey::new_unique();
    let attacker = Pubkey::new_unique();
    let victim = Pubkey::new_unique();
    let mut swaps = canonical_swaps(pool, attacker, victim);
    swaps[2].wrapper_program = None;
    let block = block_of(swaps);
    assert!(scan_block(&block, &ScanConfig::default()).is_empty());
}

#[test]
fn scenario_3_victim_shares_frontrun_signer() {
    let pool = Pubkey::new_unique();
    let attacker = Pubkey::new_unique();
    let mut swaps = canonical_swaps(pool, attacker, Pubkey::new_unique());
    swaps[1].signer = attacker;
    let block = block_of(swaps);
    assert!(scan_block(&block, &ScanConfig::default()).is_empty());
}

/// Mutating any single constraint on an otherwise-valid three-swap sequence
/// must suppress the instance.
#[test]
fn single_constraint_mutations_suppress_detection() {
    let pool = Pubkey::new_unique();
    let attacker = Pubkey::new_unique();
    let victim = Pubkey::new_unique();

    let mutations: Vec<(&str, Box<dyn Fn(&mut Vec<SwapEvent>)>)> = vec![
        ("victim direction flipped", Box::new(|s: &mut Vec<SwapEvent>| {
            s[1].direction = TradeDirection::Sell;
        })),
        ("backrun direction flipped", Box::new(|s: &mut Vec<SwapEvent>| {
            s[2].direction = TradeDirection::Buy;
        })),
        ("wrapper dropped on frontrun", Box::new(|s: &mut Vec<SwapEvent>| {
            s[0].wrapper_program = None;
        })),
        ("wrapper dropped on backrun", Box::new(|s: &mut Vec<SwapEvent>| {
            s[2].wrapper_program = None;
        })),
        ("wrapper mismatch", Box::new(|s: &mut Vec<SwapEvent>| {
            s[2].wrapper_program = Some(Pubkey::new_from_array([8u8; 32]));
        })),
        ("victim signer equals frontrun", Box::new(move |s: &mut Vec<SwapEvent>| {
            s[1].signer = s[0].signer;
        })),
        ("victim signer equals backrun", Box::new(move |s: &mut Vec<SwapEvent>| {
            s[1].signer = s[2].signer;
        })),
        ("victim on another pool", Box::new(|s: &mut Vec<SwapEvent>| {
            s[1].pool = Pubkey::new_unique();
        })),
        ("round trip loses the input side", Box::new(|s: &mut Vec<SwapEvent>| {
            s[2].output_amount = 99; // < frontrun input of 100
        })),
        ("round trip loses the output side", Box::new(|s: &mut Vec<SwapEvent>| {
            s[2].input_amount = 111; // > frontrun output of 110
        })),
    ];

    for (label, mutate) in mutations {
        let mut swaps = canonical_swaps(pool, attacker, victim);
        mutate(&mut swaps);
        let block = block_of(swaps);
        assert!(
            scan_block(&block, &ScanConfig::default()).is_empty(),
            "mutation not suppressed: {}",
            label
        );
    }
}

#[test]
fn full_run_produces_baseline_and_verdicts() {
    let run = AnalysisRun::new(ScanConfig::default(), SmearConfig::default(), None).unwrap();
    let pool = Pubkey::new_unique();
    let hot_leader = Pubkey::new_from_array([1u8; 32]);
    let quiet_leader = Pubkey::new_from_array([2u8; 32]);

    let mut slot = 1_000u64;
    let mut detections = Vec::new();
    // The hot leader lands a sandwich in every one of its 60 blocks; the
    // quiet leader never does across 540 of its own
    for i in 0..600u64 {
        let (leader, sandwiched) = if i % 10 == 0 {
            (hot_leader, true)
        } else {
            (quiet_leader, false)
        };
        let swaps = if sandwiched {
            canonical_swaps(pool, Pubkey::new_unique(), Pubkey::new_unique())
        } else {
            Vec::new()
        };
        let block = Block::new(slot, leader, swaps).unwrap();
        let instances = run.scan(&block);
        detections.push(BlockDetection {
            slot: block.slot,
            leader: block.leader,
            sandwich_count: instances.len() as u32,
        });
        slot += 1;
    }
    for d in detections {
        run.record(d).unwrap();
    }

    let output = run.finalize(FlagConfig::default()).unwrap();
    assert_eq!(output.baseline.total_blocks, 600);
    assert_eq!(output.baseline.sandwich_inclusive_blocks, 60);
    assert!((output.baseline.proportion - 0.1).abs() < 1e-12);

    let verdicts: HashMap<Pubkey, _> =
        output.verdicts.iter().map(|v| (v.identity, v.clone())).collect();
    let hot = &verdicts[&hot_leader];
    assert!(hot.flagged(), "hot leader must be flagged on both metrics");
    let quiet = &verdicts[&quiet_leader];
    assert!(!quiet.sc_p_flag && !quiet.sc_flag);
    assert!(!quiet.flagged());

    // One unit of inclusive credit and one of count credit truncated at the
    // hot leader's first observed slot
    assert!((output.dropped_credit.inclusive_blocks - 0.5).abs() < 1e-12);
    assert!((output.dropped_credit.sandwich_count - 0.5).abs() < 1e-12);
}

#[test]
fn out_of_order_slots_rejected() {
    let run = AnalysisRun::new(ScanConfig::default(), SmearConfig::default(), None).unwrap();
    let leader = Pubkey::new_unique();
    run.record(BlockDetection { slot: 10, leader, sandwich_count: 0 }).unwrap();
    let err = run
        .record(BlockDetection { slot: 9, leader, sandwich_count: 0 })
        .unwrap_err();
    assert!(matches!(err, sandwich_core::AnalysisError::MalformedBlock { slot: 9, .. }));
}

#[test]
fn weighted_totals_stay_within_raw_totals() {
    // Smearing may truncate but never inflate a validator's totals
    let run = AnalysisRun::new(ScanConfig::default(), SmearConfig::default(), None).unwrap();
    let leader = Pubkey::new_unique();
    for (slot, count) in [(1u64, 2u32), (2, 0), (3, 1), (4, 3)] {
        run.record(BlockDetection { slot, leader, sandwich_count: count }).unwrap();
    }
    let output = run.finalize(FlagConfig::default()).unwrap();
    let counts = &output.validator_counts[&leader];
    assert!(counts.weighted.weighted_sandwich_count <= counts.raw.raw_sandwich_count as f64);
    assert!(counts.weighted.weighted_inclusive_blocks <= counts.raw.raw_inclusive_blocks as f64);
    // And what was lost is accounted for
    let lost = counts.raw.raw_sandwich_count as f64 - counts.weighted.weighted_sandwich_count;
    assert!((lost - output.dropped_credit.sandwich_count).abs() < 1e-12);
}
