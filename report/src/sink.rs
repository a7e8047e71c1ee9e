use std::path::Path;

use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use detector::ports::SandwichSink;
use sandwich_core::SandwichInstance;
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

/// Deterministic instance id: the same sandwich always maps to the same UUID,
/// so re-running a slot range upserts instead of duplicating audit rows.
pub fn instance_id(instance: &SandwichInstance) -> Uuid {
    let mut name = Vec::new();
    name.extend_from_slice(instance.frontrun.signature.as_bytes());
    name.extend_from_slice(instance.backrun.signature.as_bytes());
    for victim in &instance.victims {
        name.extend_from_slice(victim.signature.as_bytes());
    }
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, &name)
}

/// Append-only audit log in Postgres, one row per swap leg.
pub struct PostgresSandwichSink {
    pool: Pool,
}

impl PostgresSandwichSink {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SandwichSink for PostgresSandwichSink {
    async fn persist(&self, instances: &[SandwichInstance]) -> Result<()> {
        if instances.is_empty() {
            return Ok(());
        }
        let client = self.pool.get().await.context("acquiring db connection")?;
        let stmt = client
            .prepare_cached(
                "insert into sandwich_events \
                 (id, slot, leader, pool, role, sig, signer, input_amount, output_amount) \
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 on conflict do nothing",
            )
            .await?;

        for instance in instances {
            let id = instance_id(instance).to_string();
            let legs = std::iter::once(("FRONTRUN", &instance.frontrun))
                .chain(instance.victims.iter().map(|v| ("VICTIM", v)))
                .chain(std::iter::once(("BACKRUN", &instance.backrun)));
            for (role, swap) in legs {
                if let Err(e) = client
                    .execute(
                        &stmt,
                        &[
                            &id,
                            &(instance.slot as i64),
                            &instance.leader.to_string(),
                            &instance.pool.to_string(),
                            &role,
                            &swap.signature,
                            &swap.signer.to_string(),
                            &(swap.input_amount as i64),
                            &(swap.output_amount as i64),
                        ],
                    )
                    .await
                {
                    error!("Failed to persist sandwich {} at slot {}: {}", id, instance.slot, e);
                }
            }
        }
        Ok(())
    }
}

/// CSV fallback sink for runs without a database.
pub struct CsvSandwichSink {
    path: String,
}

impl CsvSandwichSink {
    pub async fn new(output_dir: &str) -> Result<Self> {
        let dir = Path::new(output_dir);
        if !dir.exists() {
            create_dir_all(dir).await?;
        }
        let path = format!("{}/sandwiches.csv", output_dir);
        if !Path::new(&path).exists() {
            let header = "id,slot,leader,pool,role,sig,signer,input_amount,output_amount\n";
            let mut file = OpenOptions::new().create(true).write(true).open(&path).await?;
            file.write_all(header.as_bytes()).await?;
        }
        info!("🗄️ Audit log at {}", path);
        Ok(Self { path })
    }
}

#[async_trait::async_trait]
impl SandwichSink for CsvSandwichSink {
    async fn persist(&self, instances: &[SandwichInstance]) -> Result<()> {
        if instances.is_empty() {
            return Ok(());
        }
        let mut lines = String::new();
        for instance in instances {
            let id = instance_id(instance);
            let legs = std::iter::once(("FRONTRUN", &instance.frontrun))
                .chain(instance.victims.iter().map(|v| ("VICTIM", v)))
                .chain(std::iter::once(("BACKRUN", &instance.backrun)));
            for (role, swap) in legs {
                lines.push_str(&format!(
                    "{},{},{},{},{},{},{},{},{}\n",
                    id,
                    instance.slot,
                    instance.leader,
                    instance.pool,
                    role,
                    swap.signature,
                    swap.signer,
                    swap.input_amount,
                    swap.output_amount,
                ));
            }
        }
        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(lines.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandwich_core::{SwapEvent, TradeDirection};
    use solana_sdk::pubkey::Pubkey;

    fn swap(idx: u32, sig: &str) -> SwapEvent {
        SwapEvent {
            pool: Pubkey::new_from_array([1u8; 32]),
            signer: Pubkey::new_unique(),
            wrapper_program: None,
            direction: TradeDirection::Buy,
            input_amount: 100,
            output_amount: 90,
            inclusion_index: idx,
            signature: sig.to_string(),
        }
    }

    fn instance() -> SandwichInstance {
        SandwichInstance {
            slot: 5000,
            leader: Pubkey::new_from_array([2u8; 32]),
            pool: Pubkey::new_from_array([1u8; 32]),
            frontrun: swap(1, "front-sig"),
            victims: vec![swap(2, "victim-sig")],
            backrun: swap(3, "back-sig"),
        }
    }

    #[test]
    fn test_instance_id_deterministic() {
        assert_eq!(instance_id(&instance()), instance_id(&instance()));
    }

    #[test]
    fn test_instance_id_changes_with_legs() {
        let base = instance();
        let mut other = instance();
        other.backrun.signature = "different".into();
        assert_ne!(instance_id(&base), instance_id(&other));
    }

    #[tokio::test]
    async fn test_csv_sink_appends_one_row_per_leg() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let sink = CsvSandwichSink::new(out).await.unwrap();
        sink.persist(&[instance()]).await.unwrap();
        sink.persist(&[instance()]).await.unwrap();

        let body = std::fs::read_to_string(format!("{}/sandwiches.csv", out)).unwrap();
        // header + 2 instances x 3 legs
        assert_eq!(body.lines().count(), 7);
        assert!(body.contains("FRONTRUN"));
        assert!(body.contains("VICTIM"));
        assert!(body.contains("BACKRUN"));
    }
}
