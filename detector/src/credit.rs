use std::collections::{HashMap, VecDeque};

use sandwich_core::AnalysisError;
use smallvec::SmallVec;
use solana_sdk::pubkey::Pubkey;

/// Landing-delay compensation: how one unit of raw detection credit is spread
/// over the detecting slot and the leader's preceding observed slots.
///
/// `weights[0]` applies to the detecting slot, `weights[i]` to the i-th
/// immediately preceding observed slot of the same leader. The default splits
/// credit evenly across the detecting slot and one prior slot (one hop of
/// landing-delay smear).
#[derive(Debug, Clone)]
pub struct SmearConfig {
    pub window: usize,
    pub weights: Vec<f64>,
}

impl Default for SmearConfig {
    fn default() -> Self {
        Self {
            window: 1,
            weights: vec![0.5, 0.5],
        }
    }
}

impl SmearConfig {
    /// Invalid smear settings would silently bias every downstream statistic,
    /// so they are fatal before any aggregation begins.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.weights.len() != self.window + 1 {
            return Err(AnalysisError::ConfigurationError(format!(
                "smear weights must have window + 1 entries (window={}, got {})",
                self.window,
                self.weights.len()
            )));
        }
        if self.weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(AnalysisError::ConfigurationError(
                "smear weights must be finite and non-negative".into(),
            ));
        }
        let total: f64 = self.weights.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(AnalysisError::ConfigurationError(format!(
                "smear weights must sum to 1.0, got {}",
                total
            )));
        }
        Ok(())
    }
}

/// Where one unit of raw credit landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditAllocation {
    pub slot: u64,
    pub fraction: f64,
}

/// Smearing outcome for one observed block. Fractions plus `dropped` always
/// sum to 1.0: credit is moved, never created or destroyed.
#[derive(Debug, Clone)]
pub struct SmearResult {
    pub allocations: SmallVec<[CreditAllocation; 4]>,
    /// Weight that had no prior own-leader slot to land on (start of range).
    pub dropped: f64,
}

impl SmearResult {
    pub fn kept(&self) -> f64 {
        self.allocations.iter().map(|a| a.fraction).sum()
    }
}

/// Distributes detection credit backward over each leader's observed slot
/// history. Histories are independent per leader; slots must arrive in slot
/// order for the window to mean "immediately preceding".
pub struct CreditDistributor {
    config: SmearConfig,
    histories: HashMap<Pubkey, VecDeque<u64>>,
}

impl CreditDistributor {
    pub fn new(config: SmearConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            histories: HashMap::new(),
        })
    }

    /// Record one observed leader slot and return how a unit of credit
    /// detected in it is distributed.
    pub fn observe(&mut self, leader: Pubkey, slot: u64) -> SmearResult {
        let history = self.histories.entry(leader).or_default();

        let mut allocations: SmallVec<[CreditAllocation; 4]> = SmallVec::new();
        allocations.push(CreditAllocation {
            slot,
            fraction: self.config.weights[0],
        });

        let mut dropped = 0.0;
        for i in 1..=self.config.window {
            match history.iter().rev().nth(i - 1) {
                Some(&prev_slot) => allocations.push(CreditAllocation {
                    slot: prev_slot,
                    fraction: self.config.weights[i],
                }),
                // Fewer than `window` prior own-leader slots exist: the
                // remaining weight is dropped, not reallocated.
                None => dropped += self.config.weights[i],
            }
        }

        history.push_back(slot);
        if history.len() > self.config.window {
            history.pop_front();
        }

        SmearResult { allocations, dropped }
    }
}
