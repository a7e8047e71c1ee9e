use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use tracing::info;

/// Manual override table for validators whose metrics only marginally exceed
/// the thresholds. Curated by humans outside the statistical engine and
/// injected here, never embedded as logic.
#[derive(Debug, Default, Clone)]
pub struct ExclusionList {
    entries: HashMap<Pubkey, String>,
}

#[derive(Debug, Deserialize)]
struct ExclusionEntry {
    identity: String,
    #[serde(default)]
    reason: String,
}

impl ExclusionList {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a JSON array of `{ "identity": ..., "reason": ... }` rows.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading exclusion list {}", path.display()))?;
        let entries: Vec<ExclusionEntry> =
            serde_json::from_str(&raw).context("parsing exclusion list")?;

        let mut map = HashMap::new();
        for entry in entries {
            let identity = Pubkey::from_str(&entry.identity)
                .with_context(|| format!("invalid identity in exclusion list: {}", entry.identity))?;
            map.insert(identity, entry.reason);
        }
        info!("📋 Loaded {} exclusion override(s) from {}", map.len(), path.display());
        Ok(Self { entries: map })
    }

    pub fn contains(&self, identity: &Pubkey) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn reason(&self, identity: &Pubkey) -> Option<&str> {
        self.entries.get(identity).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
