//! Error types for transcoding operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while driving the external encoder.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Encoder already running for this session")]
    AlreadyEncoding,

    #[error("Encoder failed: {0}")]
    EncoderFailed(String),

    #[error("Input could not be decoded: {0}")]
    DecodeFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn encoder_failed(msg: impl Into<String>) -> Self {
        Self::EncoderFailed(msg.into())
    }

    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }
}
