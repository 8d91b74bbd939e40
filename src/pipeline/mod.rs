// Reconciliation pipeline: per-stage processing and the per-source assembler

pub mod assembler;
pub mod processing;

pub use assembler::{reconcile, ReconcileStats, Reconciliation, RecordAssembler};
pub use processing::conflation::CanonicalRecord;
