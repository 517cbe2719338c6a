//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path not found under {root}: {path}")]
    PathNotFound { root: String, path: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid batch for upload: {0}")]
    InvalidBatch(String),
}

impl StorageError {
    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn not_found(reference: impl Into<String>) -> Self {
        Self::NotFound(reference.into())
    }
}
