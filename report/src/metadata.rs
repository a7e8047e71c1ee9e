use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use detector::ports::{ValidatorMetadata, ValidatorMetadataPort};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

/// Resolves identity -> vote account over RPC, with display names joined from
/// an optional operator-maintained JSON file (identity -> name).
pub struct RpcValidatorMetadata {
    rpc: RpcClient,
    names: HashMap<Pubkey, String>,
}

impl RpcValidatorMetadata {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            rpc: RpcClient::new(rpc_url.to_string()),
            names: HashMap::new(),
        }
    }

    pub async fn with_names_file(rpc_url: &str, path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading validator names {}", path.display()))?;
        let by_string: HashMap<String, String> =
            serde_json::from_str(&raw).context("parsing validator names")?;
        let mut names = HashMap::new();
        for (identity, name) in by_string {
            match Pubkey::from_str(&identity) {
                Ok(key) => {
                    names.insert(key, name);
                }
                Err(_) => warn!("⚠️ Skipping invalid identity in names file: {}", identity),
            }
        }
        info!("🏷️ Loaded {} validator name(s)", names.len());
        Ok(Self {
            rpc: RpcClient::new(rpc_url.to_string()),
            names,
        })
    }
}

#[async_trait::async_trait]
impl ValidatorMetadataPort for RpcValidatorMetadata {
    async fn resolve(&self, identities: &[Pubkey]) -> Result<HashMap<Pubkey, ValidatorMetadata>> {
        let vote_accounts = self
            .rpc
            .get_vote_accounts()
            .await
            .context("fetching vote accounts")?;

        let mut vote_by_identity: HashMap<Pubkey, Pubkey> = HashMap::new();
        for info in vote_accounts.current.iter().chain(vote_accounts.delinquent.iter()) {
            if let (Ok(identity), Ok(vote)) = (
                Pubkey::from_str(&info.node_pubkey),
                Pubkey::from_str(&info.vote_pubkey),
            ) {
                vote_by_identity.insert(identity, vote);
            }
        }

        let mut resolved = HashMap::new();
        for identity in identities {
            resolved.insert(
                *identity,
                ValidatorMetadata {
                    vote_account: vote_by_identity.get(identity).copied(),
                    name: self.names.get(identity).cloned(),
                },
            );
        }
        Ok(resolved)
    }
}

/// Fixed mapping for tests and offline runs.
pub struct StaticValidatorMetadata {
    entries: HashMap<Pubkey, ValidatorMetadata>,
}

impl StaticValidatorMetadata {
    pub fn new(entries: HashMap<Pubkey, ValidatorMetadata>) -> Self {
        Self { entries }
    }
}

#[async_trait::async_trait]
impl ValidatorMetadataPort for StaticValidatorMetadata {
    async fn resolve(&self, identities: &[Pubkey]) -> Result<HashMap<Pubkey, ValidatorMetadata>> {
        Ok(identities
            .iter()
            .map(|identity| {
                (
                    *identity,
                    self.entries.get(identity).cloned().unwrap_or_default(),
                )
            })
            .collect())
    }
}
