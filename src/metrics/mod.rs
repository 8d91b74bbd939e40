//! Metrics infrastructure for reconciliation
//!
//! Names are built with [`phase_metric!`]. Only the `metrics` facade is used
//! here: until a recorder is installed by the host process, every emission
//! is a no-op.

pub mod reconcile;

pub use reconcile::ReconcileMetrics;

use std::sync::Once;
use tracing::{debug, info};

static INIT: Once = Once::new();

/// Describe every metric to the installed recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let described = describe_phase::<ReconcileMetrics>();
        info!("Described {} reconciliation metrics", described);
    });
}

/// A phase's metric documentation, handed to the recorder at startup
pub trait PhaseMetrics {
    /// Phase name used as the metric prefix
    fn phase_name() -> &'static str;

    /// Documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

fn describe_phase<T: PhaseMetrics>() -> usize {
    let docs = T::metrics_documentation();
    for doc in &docs {
        match doc.metric_type {
            MetricType::Counter => ::metrics::describe_counter!(doc.name, doc.help),
            MetricType::Histogram => ::metrics::describe_histogram!(doc.name, doc.help),
            MetricType::Gauge => ::metrics::describe_gauge!(doc.name, doc.help),
        }
        debug!(
            "{} metric {} ({:?}, labels {:?}): {}",
            T::phase_name(),
            doc.name,
            doc.metric_type,
            doc.labels,
            doc.help
        );
    }
    docs.len()
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Build a metric name following `biointeract_{phase}_{name}[_total]`
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("biointeract_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("biointeract_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("biointeract_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
