use async_trait::async_trait;

use crate::pipeline::CanonicalRecord;

/// Durable destination for finished canonical records, keyed by their `id`
#[async_trait]
pub trait CanonicalOutputPort: Send + Sync {
    async fn write_records(&self, source_id: &str, records: &[CanonicalRecord]) -> anyhow::Result<()>;
}
