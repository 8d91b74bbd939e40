use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Malformed input for source '{source_id}': {reason}")]
    MalformedInput { source_id: String, reason: String },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconcileError {
    pub fn malformed(source_id: &str, reason: impl Into<String>) -> Self {
        ReconcileError::MalformedInput {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
