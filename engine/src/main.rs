use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{error, info};

use detector::ports::{SandwichSink, ValidatorMetadataPort};
use report::metadata::RpcValidatorMetadata;
use report::sink::{CsvSandwichSink, PostgresSandwichSink};

mod config;
mod decode;
mod ingest;
mod metrics;
mod pipeline;
mod telemetry;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // 1. Logging first, everything else reports through it
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    info!("🥪 Sandwich Sentinel starting [Composition Root]...");

    // 2. Unified Configuration Layer (Fail Fast: a bad confidence level or
    // smear curve must never reach the aggregation stage)
    let config = match config::RunConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ CRITICAL: Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "✅ Config Loaded & Validated: RPC={}, slots {}..={}, confidence {}",
        config.rpc_url, config.start_slot, config.end_slot, config.confidence_level
    );

    sandwich_core::telemetry::init_metrics();
    tokio::spawn(telemetry::serve_metrics(config.metrics_port));

    // 3. Adapters (Infrastructure Layer)
    let source = Arc::new(ingest::RpcBlockSource::new(
        &config.rpc_url,
        decode::default_decoders(),
    ));

    let sink: Arc<dyn SandwichSink> = match &config.database_url {
        Some(url) => match build_pg_pool(url) {
            Ok(pool) => {
                info!("🐘 Audit log -> Postgres");
                Arc::new(PostgresSandwichSink::new(pool))
            }
            Err(e) => {
                error!("❌ Postgres init failed: {}. Falling back to CSV audit log.", e);
                csv_sink(&config.output_dir).await
            }
        },
        None => csv_sink(&config.output_dir).await,
    };

    let metadata: Arc<dyn ValidatorMetadataPort> = match &config.validator_names_path {
        Some(path) => {
            match RpcValidatorMetadata::with_names_file(&config.rpc_url, std::path::Path::new(path))
                .await
            {
                Ok(meta) => Arc::new(meta),
                Err(e) => {
                    error!("❌ Failed to load validator names: {}. Continuing without names.", e);
                    Arc::new(RpcValidatorMetadata::new(&config.rpc_url))
                }
            }
        }
        None => Arc::new(RpcValidatorMetadata::new(&config.rpc_url)),
    };

    let run_metrics = Arc::new(metrics::RunMetrics::new());

    // 4. The batch run itself
    match pipeline::run(&config, source, sink, metadata, Arc::clone(&run_metrics)).await {
        Ok(summary) => {
            run_metrics.print_summary(summary.validators_evaluated, summary.validators_flagged);
            info!(
                "🏁 Done: {}/{} slots produced blocks, {} flagged validator(s)",
                summary.blocks_processed, summary.slots_requested, summary.validators_flagged
            );
        }
        Err(e) => {
            error!("💥 Run failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn csv_sink(output_dir: &str) -> Arc<dyn SandwichSink> {
    match CsvSandwichSink::new(output_dir).await {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            error!("❌ CRITICAL: Cannot open audit log: {}", e);
            std::process::exit(1);
        }
    }
}

fn build_pg_pool(database_url: &str) -> anyhow::Result<deadpool_postgres::Pool> {
    let pg_config: tokio_postgres::Config = database_url.parse()?;
    let manager = deadpool_postgres::Manager::new(pg_config, tokio_postgres::NoTls);
    Ok(deadpool_postgres::Pool::builder(manager).max_size(8).build()?)
}
