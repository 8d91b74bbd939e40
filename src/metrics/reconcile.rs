//! Reconcile Phase Metrics
//!
//! Row and record throughput plus the non-fatal outcomes of each pass:
//! skipped rows, duplicate evidence and numeric coercion fallbacks.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::pipeline::ReconcileStats;

/// Metrics collection for the Reconcile phase
pub struct ReconcileMetrics;

impl ReconcileMetrics {
    /// Record a completed pass over one source
    pub fn record_source_reconciled(source_id: &str, stats: &ReconcileStats, duration_secs: f64) {
        let source = source_id.to_string();
        ::metrics::counter!(phase_metric!(counter, "reconcile", "sources_reconciled"), "source_id" => source.clone())
            .increment(1);
        ::metrics::counter!(phase_metric!(counter, "reconcile", "rows_read"), "source_id" => source.clone())
            .increment(stats.rows_read as u64);
        ::metrics::counter!(phase_metric!(counter, "reconcile", "rows_skipped"), "source_id" => source.clone())
            .increment(stats.rows_skipped as u64);
        ::metrics::counter!(phase_metric!(counter, "reconcile", "edges_filtered"), "source_id" => source.clone())
            .increment(stats.edges_filtered as u64);
        ::metrics::counter!(phase_metric!(counter, "reconcile", "duplicate_evidence"), "source_id" => source.clone())
            .increment(stats.duplicate_evidence as u64);
        ::metrics::counter!(phase_metric!(counter, "reconcile", "coercion_fallbacks"), "source_id" => source.clone())
            .increment(stats.coercion_fallbacks as u64);
        ::metrics::counter!(phase_metric!(counter, "reconcile", "records_emitted"), "source_id" => source.clone())
            .increment(stats.records_emitted as u64);
        ::metrics::histogram!(phase_metric!(histogram, "reconcile", "duration_seconds"), "source_id" => source.clone())
            .record(duration_secs);
        if stats.records_emitted > 0 {
            ::metrics::histogram!(phase_metric!(histogram, "reconcile", "evidence_per_record"), "source_id" => source)
                .record(stats.evidence_entries as f64 / stats.records_emitted as f64);
        }
    }

    /// Record a source that failed with malformed input or a config error
    pub fn record_source_failed(source_id: &str) {
        ::metrics::counter!(phase_metric!(counter, "reconcile", "sources_failed"), "source_id" => source_id.to_string())
            .increment(1);
    }

    /// Record the size of a concurrent batch
    pub fn record_batch(jobs: usize) {
        ::metrics::counter!(phase_metric!(counter, "reconcile", "batches")).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "reconcile", "batch_jobs")).set(jobs as f64);
    }
}

impl PhaseMetrics for ReconcileMetrics {
    fn phase_name() -> &'static str {
        "reconcile"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "sources_reconciled"),
                metric_type: MetricType::Counter,
                help: "Total number of source files reconciled to completion",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "sources_failed"),
                metric_type: MetricType::Counter,
                help: "Total number of source files abandoned on a fatal error",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "rows_read"),
                metric_type: MetricType::Counter,
                help: "Data rows or graph edges consumed",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "rows_skipped"),
                metric_type: MetricType::Counter,
                help: "Rows dropped because an interactor had no usable identifier",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "edges_filtered"),
                metric_type: MetricType::Counter,
                help: "Graph edges excluded by interaction label",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "duplicate_evidence"),
                metric_type: MetricType::Counter,
                help: "Structurally identical evidence entries suppressed",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "coercion_fallbacks"),
                metric_type: MetricType::Counter,
                help: "Declared numeric values that were not numbers and became zero",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "records_emitted"),
                metric_type: MetricType::Counter,
                help: "Canonical interaction records emitted",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(counter, "reconcile", "batches"),
                metric_type: MetricType::Counter,
                help: "Concurrent multi-source batches started",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "reconcile", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of one full reconciliation pass",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "reconcile", "evidence_per_record"),
                metric_type: MetricType::Histogram,
                help: "Mean evidence entries per canonical record in a pass",
                labels: vec!["source_id"],
            },
            MetricDoc {
                name: phase_metric!(gauge, "reconcile", "batch_jobs"),
                metric_type: MetricType::Gauge,
                help: "Sources in the most recent batch",
                labels: vec![],
            },
        ]
    }
}
