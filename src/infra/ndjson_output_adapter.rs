use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::app::ports::CanonicalOutputPort;
use crate::pipeline::CanonicalRecord;

/// Writes one JSON line per canonical record to `<output_dir>/<source_id>.ndjson`.
/// Each run replaces the file for its source.
pub struct NdjsonOutputAdapter {
    pub output_dir: PathBuf,
}

impl NdjsonOutputAdapter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_path(&self, source_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.ndjson", source_id))
    }

    async fn ensure_output_directory(&self, file_path: &Path) -> anyhow::Result<()> {
        if let Some(parent_dir) = file_path.parent() {
            if !parent_dir.exists() {
                tokio::fs::create_dir_all(parent_dir).await.map_err(|e| {
                    anyhow::anyhow!("Failed to create output directory {:?}: {}", parent_dir, e)
                })?;
                debug!("Created output directory: {:?}", parent_dir);
            }
        }
        Ok(())
    }

    fn record_to_json_line(record: &CanonicalRecord) -> anyhow::Result<String> {
        let json_record = serde_json::to_string(record).map_err(|e| {
            anyhow::anyhow!("Failed to serialize canonical record {}: {}", record.id, e)
        })?;
        Ok(format!("{}\n", json_record))
    }
}

#[async_trait]
impl CanonicalOutputPort for NdjsonOutputAdapter {
    async fn write_records(&self, source_id: &str, records: &[CanonicalRecord]) -> anyhow::Result<()> {
        let output_path = self.output_path(source_id);
        self.ensure_output_directory(&output_path).await?;

        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&Self::record_to_json_line(record)?);
        }

        let mut file = File::create(&output_path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open output file {:?}: {}", output_path, e))?;
        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write to output file {:?}: {}", output_path, e))?;
        file.flush()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to flush output file {:?}: {}", output_path, e))?;

        debug!(
            "Wrote {} canonical records for {} to {:?}",
            records.len(),
            source_id,
            output_path
        );
        Ok(())
    }
}
