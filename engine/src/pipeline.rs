use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use detector::ports::{BlockSource, SandwichSink, TelemetryPort, ValidatorMetadataPort};
use detector::scan::ScanConfig;
use detector::AnalysisRun;
use report::assembler::ReportAssembler;
use report::exclusions::ExclusionList;
use report::recorder::ReportCsvWriter;
use sandwich_core::{telemetry, AnalysisError, BlockDetection, SandwichInstance};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::metrics::RunMetrics;

#[derive(Debug)]
pub struct RunSummary {
    pub slots_requested: u64,
    pub blocks_processed: u64,
    pub blocks_skipped: u64,
    pub blocks_malformed: u64,
    pub sandwiches: u64,
    pub validators_evaluated: usize,
    pub validators_flagged: usize,
    pub dropped_credit: f64,
}

enum SlotOutcome {
    Missing,
    Malformed(String),
    Scanned {
        detection: BlockDetection,
        instances: Vec<SandwichInstance>,
    },
}

/// One full batch run: leader schedule, parallel fetch+scan, ordered fold,
/// flagging, report assembly and audit persistence.
pub async fn run(
    config: &RunConfig,
    source: Arc<dyn BlockSource>,
    sink: Arc<dyn SandwichSink>,
    metadata: Arc<dyn ValidatorMetadataPort>,
    metrics: Arc<RunMetrics>,
) -> Result<RunSummary> {
    let started = std::time::Instant::now();
    let slot_count = config.slot_count();

    // 1. Leader schedule for the whole range
    info!(
        "📅 Fetching leader schedule for slots {}..={}",
        config.start_slot, config.end_slot
    );
    let leaders = source
        .slot_leaders(config.start_slot, slot_count)
        .await
        .context("fetching leader schedule")?;
    if leaders.len() as u64 != slot_count {
        return Err(anyhow!(
            "leader schedule length {} does not cover {} slots",
            leaders.len(),
            slot_count
        ));
    }

    let analysis = Arc::new(AnalysisRun::new(
        ScanConfig::default(),
        config
            .smear_config()
            .map_err(AnalysisError::ConfigurationError)?,
        Some(metrics.clone() as Arc<dyn TelemetryPort>),
    )?);

    // 2. Fan out fetch + scan; blocks are independent, so this is the
    // embarrassingly parallel stage
    let mut set: JoinSet<(u64, Result<SlotOutcome>)> = JoinSet::new();
    let mut outcomes: BTreeMap<u64, Result<SlotOutcome>> = BTreeMap::new();
    for (offset, leader) in leaders.iter().enumerate() {
        let slot = config.start_slot + offset as u64;
        let leader = *leader;
        let source = Arc::clone(&source);
        let analysis = Arc::clone(&analysis);
        set.spawn(async move {
            let outcome = match source.fetch_block(slot, leader).await {
                Ok(Some(block)) => {
                    let instances = analysis.scan(&block);
                    Ok(SlotOutcome::Scanned {
                        detection: BlockDetection {
                            slot,
                            leader,
                            sandwich_count: instances.len() as u32,
                        },
                        instances,
                    })
                }
                Ok(None) => Ok(SlotOutcome::Missing),
                Err(e) => match e.downcast_ref::<AnalysisError>() {
                    Some(AnalysisError::MalformedBlock { reason, .. }) => {
                        Ok(SlotOutcome::Malformed(reason.clone()))
                    }
                    _ => Err(e),
                },
            };
            (slot, outcome)
        });
        if set.len() >= config.max_concurrent_fetches {
            if let Some(joined) = set.join_next().await {
                let (slot, outcome) = joined.context("scan worker panicked")?;
                outcomes.insert(slot, outcome);
            }
        }
    }
    while let Some(joined) = set.join_next().await {
        let (slot, outcome) = joined.context("scan worker panicked")?;
        outcomes.insert(slot, outcome);
    }

    // 3. Ordered fold: the serialization point of the whole pipeline
    let mut all_instances: Vec<SandwichInstance> = Vec::new();
    let mut processed = 0u64;
    let mut skipped = 0u64;
    let mut malformed = 0u64;
    for (slot, outcome) in outcomes {
        match outcome.with_context(|| format!("processing slot {}", slot))? {
            SlotOutcome::Missing => {
                skipped += 1;
                metrics.log_skipped_slot();
            }
            SlotOutcome::Malformed(reason) => {
                // Rejected whole; no partial aggregation from a bad block
                malformed += 1;
                metrics.log_malformed_block();
                warn!("🧱 Rejected block at slot {}: {}", slot, reason);
            }
            SlotOutcome::Scanned { detection, instances } => {
                processed += 1;
                analysis.record(detection)?;
                all_instances.extend(instances);
            }
        }
    }

    // 4. Audit log before any reporting
    if !all_instances.is_empty() {
        info!("🗄️ Persisting {} sandwich instance(s)", all_instances.len());
        sink.persist(&all_instances)
            .await
            .context("persisting sandwich instances")?;
    }

    // 5. Baseline, flags, report
    let analysis = Arc::try_unwrap(analysis)
        .map_err(|_| anyhow!("scan workers still hold the analysis run"))?;
    let output = analysis.finalize(config.flag_config())?;
    info!(
        "📊 Cluster baseline: {}/{} inclusive blocks ({:.4}), mean {:.4} ± {:.4} per block",
        output.baseline.sandwich_inclusive_blocks,
        output.baseline.total_blocks,
        output.baseline.proportion,
        output.baseline.mean_sandwiches_per_block,
        output.baseline.std_dev_sandwiches_per_block,
    );

    let identities: Vec<_> = output.verdicts.iter().map(|v| v.identity).collect();
    let resolved = metadata
        .resolve(&identities)
        .await
        .unwrap_or_else(|e| {
            warn!("⚠️ Metadata resolution failed ({}); reporting identities only", e);
            Default::default()
        });

    let exclusions = match &config.exclusion_list_path {
        Some(path) => ExclusionList::from_file(std::path::Path::new(path)).await?,
        None => ExclusionList::empty(),
    };
    let assembler = ReportAssembler::new(config.min_slots, exclusions);
    let records = assembler.assemble(&output.verdicts, &resolved);
    let flagged = assembler.filtered(&records);

    let writer = ReportCsvWriter::new(&config.output_dir).await?;
    writer.write_full(&records).await?;
    writer.write_filtered(&flagged).await?;

    let flagged_count = flagged.len();
    telemetry::VALIDATORS_EVALUATED.set(records.len() as i64);
    telemetry::VALIDATORS_FLAGGED.set(flagged_count as i64);

    info!(
        "✅ Run complete in {:.1}s: {} blocks, {} sandwiches, {}/{} validators flagged",
        started.elapsed().as_secs_f64(),
        processed,
        all_instances.len(),
        flagged_count,
        records.len(),
    );

    Ok(RunSummary {
        slots_requested: slot_count,
        blocks_processed: processed,
        blocks_skipped: skipped,
        blocks_malformed: malformed,
        sandwiches: all_instances.len() as u64,
        validators_evaluated: records.len(),
        validators_flagged: flagged_count,
        dropped_credit: output.dropped_credit.total(),
    })
}
