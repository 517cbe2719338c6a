//! Publishing error types.

use thiserror::Error;

/// Result type for publishing operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors from an index service.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The video is already published at this index.
    #[error("Video already exists on the index")]
    Duplicate,

    #[error("Video not found on the index")]
    NotFound,

    #[error("Index request failed: {0}")]
    Request(String),
}

impl IndexError {
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }
}

/// Errors from the publish coordinator.
///
/// Single-destination failures are not raised through here; they are
/// recorded as `PublishOutcome { ok: false }` so sibling destinations keep
/// processing. Only validation and manifest-level failures abort a save.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No manifest has been uploaded yet")]
    NoManifestReference,

    #[error("Storage error: {0}")]
    Storage(#[from] vpub_storage::StorageError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Playlist error: {0}")]
    Playlist(String),
}

impl PublishError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn playlist(msg: impl Into<String>) -> Self {
        Self::Playlist(msg.into())
    }
}
