use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::app::ports::CanonicalOutputPort;
use crate::config::SourceCatalog;
use crate::metrics::ReconcileMetrics;
use crate::pipeline::{reconcile, CanonicalRecord, ReconcileStats};

/// One source file to reconcile with the named catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileJob {
    pub source_id: String,
    pub input: PathBuf,
}

impl ReconcileJob {
    pub fn new(source_id: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            source_id: source_id.into(),
            input: input.into(),
        }
    }

    /// Parse `source_id=path`
    pub fn parse(spec: &str) -> Result<Self> {
        let (source_id, path) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("job '{}' must look like <source_id>=<path>", spec))?;
        let source_id = source_id.trim();
        let path = path.trim();
        if source_id.is_empty() || path.is_empty() {
            return Err(anyhow!("job '{}' must look like <source_id>=<path>", spec));
        }
        Ok(Self::new(source_id, path))
    }
}

/// Outcome of one completed source
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub source_id: String,
    pub input: PathBuf,
    pub stats: ReconcileStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Reconciles source files and hands the finished records to the output port.
///
/// The engine is synchronous and runs on the blocking pool. Separate sources
/// share nothing but the read-only catalog, so a batch runs them concurrently.
#[derive(Clone)]
pub struct ReconcileUseCase {
    catalog: Arc<SourceCatalog>,
    output_port: Arc<dyn CanonicalOutputPort>,
}

impl ReconcileUseCase {
    pub fn new(catalog: Arc<SourceCatalog>, output_port: Arc<dyn CanonicalOutputPort>) -> Self {
        Self {
            catalog,
            output_port,
        }
    }

    /// Reconcile one file end to end
    pub async fn reconcile_file(&self, job: &ReconcileJob) -> Result<ReconcileReport> {
        let config = self.catalog.get(&job.source_id)?.clone();
        let path = job.input.clone();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Starting reconciliation for source {} from {}",
            job.source_id,
            job.input.display()
        );

        let outcome = tokio::task::spawn_blocking(move || -> Result<(Vec<CanonicalRecord>, ReconcileStats)> {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            let reconciliation = reconcile(BufReader::new(file), &config)?;
            let stats = reconciliation.stats().clone();
            Ok((reconciliation.collect(), stats))
        })
        .await
        .context("reconciliation task did not complete")?;

        let (records, stats) = match outcome {
            Ok(done) => done,
            Err(e) => {
                error!("Reconciliation failed for source {}: {:#}", job.source_id, e);
                ReconcileMetrics::record_source_failed(&job.source_id);
                return Err(e);
            }
        };

        if let Err(e) = self.output_port.write_records(&job.source_id, &records).await {
            error!("Failed to write records for source {}: {:#}", job.source_id, e);
            ReconcileMetrics::record_source_failed(&job.source_id);
            return Err(e);
        }

        let duration = start.elapsed();
        ReconcileMetrics::record_source_reconciled(&job.source_id, &stats, duration.as_secs_f64());

        if stats.duplicate_evidence > 0 {
            warn!(
                "Source {} had {} duplicate evidence entries across {} pairs",
                job.source_id,
                stats.duplicate_evidence,
                stats.duplicate_ids.len()
            );
        }
        info!(
            "Reconciliation completed for {}: {} records in {:.2}ms",
            job.source_id,
            stats.records_emitted,
            duration.as_secs_f64() * 1000.0
        );

        Ok(ReconcileReport {
            source_id: job.source_id.clone(),
            input: job.input.clone(),
            stats,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Reconcile several sources concurrently. Results come back in job order;
    /// one failing source does not stop the others. Output is keyed by source
    /// id, so every job naming a source that appears more than once fails
    /// without running.
    pub async fn reconcile_all(&self, jobs: Vec<ReconcileJob>) -> Vec<(ReconcileJob, Result<ReconcileReport>)> {
        let batch_size = jobs.len();
        info!("Starting reconciliation batch of {} sources", batch_size);
        ReconcileMetrics::record_batch(batch_size);

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for job in &jobs {
            *seen.entry(job.source_id.as_str()).or_default() += 1;
        }
        let repeated: Vec<String> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(source_id, _)| source_id.to_string())
            .collect();

        let mut handles = Vec::with_capacity(batch_size);
        for job in jobs {
            if repeated.contains(&job.source_id) {
                warn!(
                    "Source {} appears more than once in the batch; skipping {}",
                    job.source_id,
                    job.input.display()
                );
                handles.push((job, None));
                continue;
            }
            let use_case = self.clone();
            let task_job = job.clone();
            let handle = tokio::spawn(async move { use_case.reconcile_file(&task_job).await });
            handles.push((job, Some(handle)));
        }

        let mut results = Vec::with_capacity(batch_size);
        for (job, handle) in handles {
            let result = match handle {
                None => Err(anyhow!(
                    "source {} appears more than once in the batch",
                    job.source_id
                )),
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!("Reconciliation task for {} aborted: {}", job.source_id, e);
                        ReconcileMetrics::record_source_failed(&job.source_id);
                        Err(anyhow!("reconciliation task for {} aborted: {}", job.source_id, e))
                    }
                },
            };
            results.push((job, result));
        }

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            warn!(
                "Reconciliation batch had {} failures out of {} sources",
                failed, batch_size
            );
        } else {
            debug!("Reconciliation batch of {} sources succeeded", batch_size);
        }

        results
    }
}
