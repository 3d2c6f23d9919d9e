use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the recorder and query engine.
///
/// Degraded-mode conditions (corrupt stats file, malformed config, failed
/// original read, failed cost lookup) never show up here; they are logged
/// and replaced with a safe default where they happen.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Invalid date format: '{input}'")]
    InvalidDateFormat { input: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to write stats file {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize stats document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stats file task failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

impl StatsError {
    pub fn validation(message: impl Into<String>) -> Self {
        StatsError::Validation(message.into())
    }

    /// True for errors caused by bad caller input rather than the environment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StatsError::Validation(_) | StatsError::InvalidDateFormat { .. }
        )
    }
}

pub type StatsResult<T> = Result<T, StatsError>;
