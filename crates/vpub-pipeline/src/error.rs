//! Pipeline error types.

use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by the processing controller and the migration
/// orchestrator.
///
/// Sub-phase failures inside a running pipeline are not raised through
/// here; they land in the corresponding sub-phase state and are observable
/// through events. This type covers operations with a direct caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("A migration run is already in progress")]
    MigrationAlreadyRunning,

    #[error("Media error: {0}")]
    Media(#[from] vpub_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] vpub_storage::StorageError),

    #[error("Batch error: {0}")]
    Batch(#[from] vpub_batch::BatchError),

    #[error("Publish error: {0}")]
    Publish(#[from] vpub_publish::PublishError),

    #[error("Manifest parse error: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
