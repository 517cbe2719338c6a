//! Upload coordinator.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vpub_models::Reference;

use crate::client::{ProgressFn, StorageClient, UploadOptions};
use crate::error::{StorageError, StorageResult};

/// Coordinates transfers against the storage network.
///
/// Wraps the raw client with monotonic progress clamping and an explicit
/// cancellation check, so callers observe progress that only moves forward
/// and never receive a reference for a cancelled transfer.
#[derive(Clone)]
pub struct UploadCoordinator {
    client: Arc<dyn StorageClient>,
}

impl UploadCoordinator {
    pub fn new(client: Arc<dyn StorageClient>) -> Self {
        Self { client }
    }

    /// Stream a payload to storage, reporting 0-100 progress.
    ///
    /// The returned reference is only produced after the network confirms
    /// receipt; a cancelled transfer yields [`StorageError::Cancelled`] and
    /// no reference.
    pub async fn upload(
        &self,
        data: &[u8],
        opts: &UploadOptions,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> StorageResult<Reference> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }

        debug!(
            size = data.len(),
            batch_id = %opts.batch_id,
            content_type = %opts.content_type,
            "Starting upload"
        );

        let progress = progress.map(monotonic);
        let reference = self.client.upload(data, opts, progress, cancel).await?;

        if cancel.is_cancelled() {
            // The client raced cancellation; drop the reference so nothing
            // partial is recorded.
            return Err(StorageError::Cancelled);
        }

        info!(reference = %reference, size = data.len(), "Upload confirmed");
        Ok(reference)
    }

    /// Fetch a named path under a root manifest, used by migration to
    /// re-fetch an original source.
    pub async fn download_path(
        &self,
        root: &Reference,
        path: &str,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        debug!(root = %root, path, "Downloading path");
        self.client
            .download(root, Some(path), progress.map(monotonic), cancel)
            .await
    }

    /// Fetch root content.
    pub async fn download(
        &self,
        reference: &Reference,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        self.client
            .download(reference, None, progress.map(monotonic), cancel)
            .await
    }

    /// Pin content on the node.
    pub async fn pin(&self, reference: &Reference) -> StorageResult<()> {
        self.client.pin(reference).await
    }

    /// Unpin content.
    pub async fn unpin(&self, reference: &Reference) -> StorageResult<()> {
        self.client.unpin(reference).await
    }

    /// Offer content for network-wide availability.
    pub async fn offer(&self, reference: &Reference) -> StorageResult<()> {
        self.client.offer(reference).await
    }

    /// Withdraw a previous offer.
    pub async fn cancel_offer(&self, reference: &Reference) -> StorageResult<()> {
        self.client.cancel_offer(reference).await
    }
}

/// Wrap a progress callback so reported percentages never decrease.
fn monotonic(inner: ProgressFn) -> ProgressFn {
    let last = Arc::new(std::sync::Mutex::new(0.0f32));
    Arc::new(move |percent: f32| {
        let mut last = last.lock().unwrap_or_else(|p| p.into_inner());
        let clamped = percent.clamp(0.0, 100.0).max(*last);
        *last = clamped;
        inner(clamped);
    })
}
