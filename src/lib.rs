pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod infra;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::{SourceCatalog, SourceConfig};
pub use error::{ReconcileError, Result};
pub use pipeline::{reconcile, CanonicalRecord, ReconcileStats, Reconciliation, RecordAssembler};
