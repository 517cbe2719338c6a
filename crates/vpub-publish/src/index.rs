//! Index service client interface.

use async_trait::async_trait;

use vpub_models::Reference;

use crate::error::IndexError;

/// A video record as known to an index service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexVideo {
    /// Id assigned by the index
    pub id: String,
    /// Manifest reference the index currently points at
    pub reference: Reference,
}

/// Index service client.
///
/// Concrete HTTP implementations live with the caller; the coordinator only
/// needs this surface.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Publish a new video. Returns the index-assigned id.
    async fn create_video(&self, reference: &Reference) -> Result<String, IndexError>;

    /// Point an already-published video at a new manifest reference.
    async fn update_video(&self, id: &str, reference: &Reference) -> Result<(), IndexError>;

    /// Unpublish a video.
    async fn delete_video(&self, id: &str) -> Result<(), IndexError>;

    /// Look up the index record for a manifest reference, if any.
    async fn fetch_video_from_hash(
        &self,
        reference: &Reference,
    ) -> Result<Option<IndexVideo>, IndexError>;

    /// Whether the index considers the manifest at `reference` valid.
    async fn fetch_hash_validation(&self, reference: &Reference) -> Result<bool, IndexError>;
}
