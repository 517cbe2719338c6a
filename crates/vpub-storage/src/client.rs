//! Storage network client interface.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use vpub_models::{BatchId, Reference};

use crate::error::StorageResult;

/// Byte-level progress callback, 0-100.
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// Options for a single upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Allocation paying for the upload
    pub batch_id: BatchId,

    /// MIME type of the payload
    pub content_type: String,

    /// Pin the content on the local node
    pub pin: bool,
}

impl UploadOptions {
    pub fn new(batch_id: BatchId, content_type: impl Into<String>) -> Self {
        Self {
            batch_id,
            content_type: content_type.into(),
            pin: false,
        }
    }

    pub fn with_pin(mut self, pin: bool) -> Self {
        self.pin = pin;
        self
    }
}

/// Metadata about stored content.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Content address
    pub reference: Reference,
    /// Size in bytes
    pub size: u64,
    /// MIME type, when recorded
    pub content_type: Option<String>,
}

/// Content-addressed storage network client.
///
/// Implementations must invoke `progress` monotonically from 0 to 100, honor
/// `cancel` mid-transfer, and return a reference only after the network has
/// confirmed receipt. On an ambiguous network failure they must return an
/// error, never a fabricated reference.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Stream a payload to storage.
    async fn upload(
        &self,
        data: &[u8],
        opts: &UploadOptions,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> StorageResult<Reference>;

    /// Fetch content, optionally a named path under a root manifest.
    async fn download(
        &self,
        root: &Reference,
        path: Option<&str>,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<u8>>;

    /// Stat stored content.
    async fn stat(&self, reference: &Reference) -> StorageResult<Option<ObjectInfo>>;

    /// Pin content on the node.
    async fn pin(&self, reference: &Reference) -> StorageResult<()>;

    /// Unpin content.
    async fn unpin(&self, reference: &Reference) -> StorageResult<()>;

    /// Offer content for network-wide availability.
    async fn offer(&self, reference: &Reference) -> StorageResult<()>;

    /// Withdraw a previous offer.
    async fn cancel_offer(&self, reference: &Reference) -> StorageResult<()>;
}
