use std::path::Path;

use anyhow::Result;
use sandwich_core::ValidatorReportRecord;
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

const HEADER: &str = "identity,vote_account,name,sc,sc_p,sc_raw,sc_p_raw,slots,\
sc_p_lower,sc_p_upper,sc_lower,sc_upper,sc_p_flag,sc_flag\n";

/// Async CSV writer for the two report views.
pub struct ReportCsvWriter {
    full_path: String,
    filtered_path: String,
}

impl ReportCsvWriter {
    pub async fn new(output_dir: &str) -> Result<Self> {
        let path = Path::new(output_dir);
        if !path.exists() {
            create_dir_all(path).await?;
        }
        Ok(Self {
            full_path: format!("{}/validators_full.csv", output_dir),
            filtered_path: format!("{}/validators_flagged.csv", output_dir),
        })
    }

    pub async fn write_full(&self, records: &[ValidatorReportRecord]) -> Result<()> {
        write_records(&self.full_path, records.iter()).await?;
        info!("📄 Wrote {} record(s) to {}", records.len(), self.full_path);
        Ok(())
    }

    pub async fn write_filtered(&self, records: &[&ValidatorReportRecord]) -> Result<()> {
        write_records(&self.filtered_path, records.iter().copied()).await?;
        info!("📄 Wrote {} flagged record(s) to {}", records.len(), self.filtered_path);
        Ok(())
    }
}

async fn write_records<'a>(
    path: &str,
    records: impl Iterator<Item = &'a ValidatorReportRecord>,
) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(HEADER.as_bytes()).await?;
    for record in records {
        file.write_all(format_row(record).as_bytes()).await?;
    }
    file.flush().await?;
    Ok(())
}

fn format_row(record: &ValidatorReportRecord) -> String {
    format!(
        "{},{},\"{}\",{:.6},{:.6},{:.3},{:.3},{},{:.6},{:.6},{:.6},{:.6},{},{}\n",
        record.identity,
        record
            .vote_account
            .map(|v| v.to_string())
            .unwrap_or_default(),
        record
            .name
            .as_deref()
            .unwrap_or("")
            .replace('"', "'"),
        record.sc,
        record.sc_p,
        record.sc_raw,
        record.sc_p_raw,
        record.slots,
        record.sc_p_lower,
        record.sc_p_upper,
        record.sc_lower,
        record.sc_upper,
        record.sc_p_flag,
        record.sc_flag,
    )
}
