//! Batch allocation error types.

use thiserror::Error;

use vpub_models::BatchId;

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors from the allocation lifecycle.
///
/// `NotFound` and `Rejected` are fatal to the current save attempt but not
/// to the editing session; callers offer distinct recovery actions
/// (create a new allocation vs. update/top up the existing one).
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch {0} not found on the network")]
    NotFound(BatchId),

    #[error("Batch {0} exists but is not usable")]
    Rejected(BatchId),

    #[error("Payment confirmation declined")]
    ConfirmationDeclined,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Allocation service error: {0}")]
    Service(String),
}

impl BatchError {
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }
}
