//! Postage batch (storage-capacity allocation) models.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier of a capacity allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub String);

impl BatchId {
    /// Create from an existing string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BatchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A provisioned unit of storage capacity.
///
/// A video references at most one batch at a time. Batches may be shared
/// across videos by identifier only; the mutable state below is always the
/// allocation service's view, never a local copy kept alive across videos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Allocation identifier
    pub id: BatchId,

    /// Bucket depth; capacity is `2^depth` chunks
    pub depth: u8,

    /// Amount paid per chunk, determines the time-to-live
    pub amount: u64,

    /// Whether the allocation is usable for uploads
    pub usable: bool,

    /// Whether the allocation is visible on the network
    pub exists: bool,

    /// Remaining time-to-live in seconds; negative means expired
    pub ttl: i64,
}

impl Batch {
    /// Remaining time-to-live, `None` once expired.
    pub fn ttl_duration(&self) -> Option<Duration> {
        u64::try_from(self.ttl).ok().map(Duration::from_secs)
    }

    /// Whether the batch can back a new upload right now.
    pub fn is_ready(&self) -> bool {
        self.exists && self.usable && self.ttl > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_batch_is_not_ready() {
        let batch = Batch {
            id: BatchId::new("b1"),
            depth: 20,
            amount: 1000,
            usable: true,
            exists: true,
            ttl: 0,
        };
        assert!(!batch.is_ready());
        assert_eq!(batch.ttl_duration(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn test_unusable_batch_is_not_ready() {
        let batch = Batch {
            id: BatchId::new("b1"),
            depth: 20,
            amount: 1000,
            usable: false,
            exists: true,
            ttl: 86_400,
        };
        assert!(!batch.is_ready());
    }
}
