//! In-memory storage client for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use vpub_models::Reference;

use crate::client::{ObjectInfo, ProgressFn, StorageClient, UploadOptions};
use crate::error::{StorageError, StorageResult};

/// Number of progress steps reported per transfer.
const PROGRESS_STEPS: u32 = 4;

/// Content-addressed store backed by hash maps.
///
/// References are deterministic (`mem-N`), transfers report progress in
/// fixed steps, and failures can be injected per call. Shared by tests in
/// the dependent crates.
#[derive(Default)]
pub struct MemoryStorageClient {
    blobs: Mutex<HashMap<Reference, (Vec<u8>, String)>>,
    paths: Mutex<HashMap<(Reference, String), Vec<u8>>>,
    pinned: Mutex<HashSet<Reference>>,
    offered: Mutex<HashSet<Reference>>,
    next_ref: AtomicU64,
    upload_count: AtomicU64,
    fail_next: Mutex<Option<String>>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a named path under a root reference.
    pub fn put_path(&self, root: &Reference, path: &str, data: Vec<u8>) {
        self.paths
            .lock()
            .unwrap()
            .insert((root.clone(), path.to_string()), data);
    }

    /// Make the next upload fail with the given message.
    pub fn fail_next_upload(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    /// Number of stored blobs.
    pub fn stored_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    /// Total uploads performed.
    pub fn upload_count(&self) -> u64 {
        self.upload_count.load(Ordering::SeqCst)
    }

    /// Whether a reference is currently pinned.
    pub fn is_pinned(&self, reference: &Reference) -> bool {
        self.pinned.lock().unwrap().contains(reference)
    }

    /// Whether a reference is currently offered.
    pub fn is_offered(&self, reference: &Reference) -> bool {
        self.offered.lock().unwrap().contains(reference)
    }

    fn report_progress(progress: &Option<ProgressFn>, cancel: &CancellationToken) -> StorageResult<()> {
        for step in 1..=PROGRESS_STEPS {
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            if let Some(p) = progress {
                p(step as f32 * 100.0 / PROGRESS_STEPS as f32);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn upload(
        &self,
        data: &[u8],
        opts: &UploadOptions,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> StorageResult<Reference> {
        self.upload_count.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(StorageError::upload_failed(message));
        }

        Self::report_progress(&progress, cancel)?;

        let n = self.next_ref.fetch_add(1, Ordering::SeqCst);
        let reference = Reference::new(format!("mem-{:04}", n));
        self.blobs.lock().unwrap().insert(
            reference.clone(),
            (data.to_vec(), opts.content_type.clone()),
        );
        Ok(reference)
    }

    async fn download(
        &self,
        root: &Reference,
        path: Option<&str>,
        progress: Option<ProgressFn>,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<u8>> {
        Self::report_progress(&progress, cancel)?;

        match path {
            Some(path) => self
                .paths
                .lock()
                .unwrap()
                .get(&(root.clone(), path.to_string()))
                .cloned()
                .ok_or_else(|| StorageError::PathNotFound {
                    root: root.to_string(),
                    path: path.to_string(),
                }),
            None => self
                .blobs
                .lock()
                .unwrap()
                .get(root)
                .map(|(data, _)| data.clone())
                .ok_or_else(|| StorageError::not_found(root.to_string())),
        }
    }

    async fn stat(&self, reference: &Reference) -> StorageResult<Option<ObjectInfo>> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(reference)
            .map(|(data, content_type)| ObjectInfo {
                reference: reference.clone(),
                size: data.len() as u64,
                content_type: Some(content_type.clone()),
            }))
    }

    async fn pin(&self, reference: &Reference) -> StorageResult<()> {
        self.pinned.lock().unwrap().insert(reference.clone());
        Ok(())
    }

    async fn unpin(&self, reference: &Reference) -> StorageResult<()> {
        self.pinned.lock().unwrap().remove(reference);
        Ok(())
    }

    async fn offer(&self, reference: &Reference) -> StorageResult<()> {
        self.offered.lock().unwrap().insert(reference.clone());
        Ok(())
    }

    async fn cancel_offer(&self, reference: &Reference) -> StorageResult<()> {
        self.offered.lock().unwrap().remove(reference);
        Ok(())
    }
}
