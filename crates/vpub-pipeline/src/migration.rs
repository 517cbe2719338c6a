//! Bulk manifest migration.
//!
//! Re-saves every video whose manifest predates the current schema version:
//! download the manifest if it is not already resident, make sure a usable
//! allocation backs it, upload the migrated manifest, and finally swap the
//! old references out of the channel playlist in a single write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vpub_batch::{calc_batch_size_for_sources, BatchAllocator, SourceEstimate};
use vpub_models::{AdaptiveSource, MigrationStatus, MigrationStep, Reference, VideoManifest};
use vpub_publish::{PlaylistReplaceOp, PlaylistVideo, PublishCoordinator};
use vpub_storage::{ProgressFn, UploadCoordinator, UploadOptions};

use crate::error::{PipelineError, PipelineResult};
use crate::logging::SessionLogger;

/// One candidate video for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationVideo {
    /// Current (pre-migration) manifest reference
    pub reference: Reference,

    /// Resident manifest, when the caller already holds it. Absent manifests
    /// are downloaded during the run.
    pub manifest: Option<VideoManifest>,
}

impl MigrationVideo {
    pub fn new(reference: Reference, manifest: Option<VideoManifest>) -> Self {
        Self {
            reference,
            manifest,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Videos re-saved at the current schema version
    pub migrated: usize,
    /// Videos that failed partway; their old manifests stay untouched
    pub failed: usize,
    /// Videos already at the current version, left alone
    pub skipped: usize,
}

/// Lifecycle of the orchestrator as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationRunState {
    /// No run in progress
    Idle,
    /// Filtering candidates and seeding the status map
    Loading,
    /// Per-video migrations in flight
    Migrating,
}

/// Pure filter: which of the resident manifests actually need migration.
/// Videos without a resident manifest stay in (the version is only known
/// after download).
pub fn videos_needing_migration(videos: Vec<MigrationVideo>) -> (Vec<MigrationVideo>, usize) {
    let total = videos.len();
    let candidates: Vec<MigrationVideo> = videos
        .into_iter()
        .filter(|v| v.manifest.as_ref().map_or(true, |m| m.needs_migration()))
        .collect();
    let skipped = total - candidates.len();
    (candidates, skipped)
}

/// Drives one migration run across a set of videos.
///
/// Single-flight: a second `migrate` call while one is running fails fast.
/// Per-video progress lives in a status map keyed by the original
/// reference; one failed video never blocks its siblings.
pub struct MigrationOrchestrator {
    uploader: UploadCoordinator,
    allocator: BatchAllocator,
    publisher: Arc<PublishCoordinator>,
    channel_playlist: String,
    run_state: Mutex<MigrationRunState>,
    statuses: Arc<Mutex<HashMap<Reference, MigrationStatus>>>,
}

impl MigrationOrchestrator {
    pub fn new(
        uploader: UploadCoordinator,
        allocator: BatchAllocator,
        publisher: Arc<PublishCoordinator>,
        channel_playlist: impl Into<String>,
    ) -> Self {
        Self {
            uploader,
            allocator,
            publisher,
            channel_playlist: channel_playlist.into(),
            run_state: Mutex::new(MigrationRunState::Idle),
            statuses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current lifecycle state of the orchestrator.
    pub fn run_state(&self) -> MigrationRunState {
        *self.lock_run_state()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.run_state() != MigrationRunState::Idle
    }

    /// Current per-video statuses, keyed by original reference.
    pub fn statuses(&self) -> HashMap<Reference, MigrationStatus> {
        self.lock_statuses().clone()
    }

    /// Migrate every outdated video, then patch the channel playlist once.
    ///
    /// Videos run concurrently; each settles independently. The playlist
    /// swap covers exactly the videos that completed, so survivors are
    /// published even when siblings fail.
    pub async fn migrate(
        &self,
        videos: Vec<MigrationVideo>,
        cancel: &CancellationToken,
    ) -> PipelineResult<MigrationReport> {
        {
            let mut run_state = self.lock_run_state();
            if *run_state != MigrationRunState::Idle {
                return Err(PipelineError::MigrationAlreadyRunning);
            }
            *run_state = MigrationRunState::Loading;
        }
        let _guard = RunGuard(&self.run_state);

        let (candidates, skipped) = videos_needing_migration(videos);
        info!(
            candidates = candidates.len(),
            skipped, "Starting migration run"
        );

        {
            let mut statuses = self.lock_statuses();
            statuses.clear();
            for video in &candidates {
                statuses.insert(video.reference.clone(), MigrationStatus::downloading());
            }
        }
        *self.lock_run_state() = MigrationRunState::Migrating;

        let results = join_all(
            candidates
                .into_iter()
                .map(|video| self.migrate_one(video, cancel)),
        )
        .await;

        let mut report = MigrationReport {
            skipped,
            ..MigrationReport::default()
        };
        let mut ops = Vec::new();
        for result in results {
            match result {
                Some(op) => {
                    report.migrated += 1;
                    ops.push(op);
                }
                None => report.failed += 1,
            }
        }

        if !ops.is_empty() {
            self.publisher
                .patch_playlist(&self.channel_playlist, &ops)
                .await?;
        }

        info!(
            migrated = report.migrated,
            failed = report.failed,
            skipped = report.skipped,
            "Migration run finished"
        );
        Ok(report)
    }

    /// Migrate one video. Returns the playlist swap to queue, or `None` on
    /// failure (the failure is recorded in the status map).
    async fn migrate_one(
        &self,
        video: MigrationVideo,
        cancel: &CancellationToken,
    ) -> Option<PlaylistReplaceOp> {
        let reference = video.reference.clone();
        let logger = SessionLogger::new(&reference, "migration");

        let manifest = match self.resident_or_downloaded(&video, cancel).await {
            Ok(manifest) => manifest,
            Err(e) => {
                logger.log_error(&format!("manifest fetch failed: {}", e));
                self.fail(&reference, e.to_string());
                return None;
            }
        };

        if !manifest.needs_migration() {
            // Resident copies were filtered up front; this one was only
            // known to be current after download.
            self.set_step(&reference, MigrationStep::Done);
            return None;
        }

        // Older manifests can lose the original rendition's standalone
        // reference; the bytes then only survive path-addressed under the
        // old manifest root. Re-fetch them before sizing the allocation.
        let original = match self.fetch_lost_original(&reference, &manifest, cancel).await {
            Ok(original) => original,
            Err(e) => {
                logger.log_error(&format!("original re-fetch failed: {}", e));
                self.fail(&reference, e.to_string());
                return None;
            }
        };

        self.set_step(&reference, MigrationStep::BatchId);
        let extra = original.as_ref().map_or(0, |bytes| bytes.len() as u64);
        let manifest = match self.ensure_batch(manifest, extra, cancel).await {
            Ok(manifest) => manifest,
            Err(e) => {
                logger.log_error(&format!("batch check failed: {}", e));
                self.fail(&reference, e.to_string());
                return None;
            }
        };

        self.set_step(&reference, MigrationStep::Saving);
        let manifest = if let Some(bytes) = original {
            match self.restore_original_source(manifest, bytes, cancel).await {
                Ok(manifest) => manifest,
                Err(e) => {
                    logger.log_error(&format!("original re-save failed: {}", e));
                    self.fail(&reference, e.to_string());
                    return None;
                }
            }
        } else {
            manifest
        };
        let migrated = manifest.migrated();
        let new_reference = match self.upload_manifest(&migrated, cancel).await {
            Ok(new_reference) => new_reference,
            Err(e) => {
                logger.log_error(&format!("manifest re-save failed: {}", e));
                self.fail(&reference, e.to_string());
                return None;
            }
        };

        self.set_step(&reference, MigrationStep::Done);
        logger.log_completion(&format!("re-saved as {}", new_reference));

        Some(PlaylistReplaceOp {
            remove: reference,
            add: PlaylistVideo::new(new_reference, migrated.title),
        })
    }

    async fn resident_or_downloaded(
        &self,
        video: &MigrationVideo,
        cancel: &CancellationToken,
    ) -> PipelineResult<VideoManifest> {
        if let Some(manifest) = &video.manifest {
            self.set_progress(&video.reference, 100.0);
            return Ok(manifest.clone());
        }

        let progress = self.download_progress(&video.reference);
        let bytes = self
            .uploader
            .download(&video.reference, Some(progress), cancel)
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// When only transcoded renditions survive in the source list, pull the
    /// original's bytes from under the old manifest root. Returns `None`
    /// when the original is still referenced directly.
    async fn fetch_lost_original(
        &self,
        root: &Reference,
        manifest: &VideoManifest,
        cancel: &CancellationToken,
    ) -> PipelineResult<Option<Vec<u8>>> {
        let has_original = manifest
            .sources
            .iter()
            .any(|s| s.quality == manifest.original_quality);
        if has_original {
            return Ok(None);
        }

        let path = source_path(&manifest.original_quality);
        let progress = self.download_progress(root);
        let bytes = self
            .uploader
            .download_path(root, &path, Some(progress), cancel)
            .await?;
        Ok(Some(bytes))
    }

    /// Re-upload a recovered original rendition against the manifest's
    /// allocation and put its reference back into the source list.
    async fn restore_original_source(
        &self,
        mut manifest: VideoManifest,
        bytes: Vec<u8>,
        cancel: &CancellationToken,
    ) -> PipelineResult<VideoManifest> {
        let batch_id = manifest
            .batch_id
            .clone()
            .ok_or_else(|| PipelineError::validation("manifest has no batch"))?;
        let content_type = manifest
            .sources
            .first()
            .map(|s| s.content_type.clone())
            .unwrap_or_else(|| "video/mp4".to_string());

        let opts = UploadOptions::new(batch_id, &content_type);
        let reference = self.uploader.upload(&bytes, &opts, None, cancel).await?;

        let size = bytes.len() as u64;
        let bitrate = if manifest.duration > 0.0 {
            (size as f64 * 8.0 / manifest.duration) as u64
        } else {
            0
        };
        AdaptiveSource::upsert(
            &mut manifest.sources,
            AdaptiveSource {
                quality: manifest.original_quality.clone(),
                content_type,
                reference,
                size,
                bitrate,
            },
        );
        Ok(manifest)
    }

    /// Keep the manifest's allocation when it is still usable; otherwise
    /// create a fresh one sized from the recorded sources plus any original
    /// rendition pending re-upload.
    async fn ensure_batch(
        &self,
        mut manifest: VideoManifest,
        pending_original: u64,
        cancel: &CancellationToken,
    ) -> PipelineResult<VideoManifest> {
        if let Some(id) = &manifest.batch_id {
            let loaded = self.allocator.load_batches(std::slice::from_ref(id)).await?;
            if !loaded.usable.is_empty() {
                return Ok(manifest);
            }
            warn!(batch_id = %id, "Manifest batch unusable, recreating");
        }

        let mut estimates: Vec<SourceEstimate> =
            manifest.sources.iter().map(SourceEstimate::from).collect();
        if pending_original > 0 {
            estimates.push(SourceEstimate::new(pending_original, 0));
        }
        let size = calc_batch_size_for_sources(&estimates, manifest.duration);

        let created = self.allocator.create_batch_for_size(size).await?;
        let ready = self.allocator.wait_batch_propagation(&created, cancel).await?;
        manifest.batch_id = Some(ready.id);
        Ok(manifest)
    }

    async fn upload_manifest(
        &self,
        manifest: &VideoManifest,
        cancel: &CancellationToken,
    ) -> PipelineResult<Reference> {
        let batch_id = manifest
            .batch_id
            .clone()
            .ok_or_else(|| PipelineError::validation("migrated manifest has no batch"))?;
        let bytes = serde_json::to_vec(manifest)?;
        let opts = UploadOptions::new(batch_id, "application/json");
        Ok(self.uploader.upload(&bytes, &opts, None, cancel).await?)
    }

    fn download_progress(&self, reference: &Reference) -> ProgressFn {
        let statuses = Arc::clone(&self.statuses);
        let reference = reference.clone();
        Arc::new(move |percent: f32| {
            let mut statuses = statuses.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(status) = statuses.get_mut(&reference) {
                status.download_progress = percent.clamp(0.0, 100.0);
            }
        })
    }

    fn lock_statuses(&self) -> std::sync::MutexGuard<'_, HashMap<Reference, MigrationStatus>> {
        self.statuses.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_run_state(&self) -> std::sync::MutexGuard<'_, MigrationRunState> {
        self.run_state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_step(&self, reference: &Reference, step: MigrationStep) {
        if let Some(status) = self.lock_statuses().get_mut(reference) {
            status.status = step;
        }
    }

    fn set_progress(&self, reference: &Reference, percent: f32) {
        if let Some(status) = self.lock_statuses().get_mut(reference) {
            status.download_progress = percent;
        }
    }

    fn fail(&self, reference: &Reference, error: String) {
        let mut statuses = self.lock_statuses();
        let entry = statuses
            .entry(reference.clone())
            .or_insert_with(MigrationStatus::downloading);
        entry.status = MigrationStep::Error;
        entry.error = Some(error);
    }
}

/// Path of a rendition under its manifest root, by quality name.
fn source_path(quality: &str) -> String {
    format!("sources/{}", quality)
}

/// Returns the orchestrator to idle when the run ends, on every exit path.
struct RunGuard<'a>(&'a Mutex<MigrationRunState>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = MigrationRunState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use vpub_batch::{
        AllocationService, BatchAllocatorConfig, BatchError, BatchResult, PaymentConfirmer,
    };
    use vpub_models::{AdaptiveSource, Batch, BatchId};
    use vpub_publish::{IndexClient, Playlist};
    use vpub_publish::testing::MemoryPlaylistStore;
    use vpub_storage::MemoryStorageClient;

    /// Service that knows a fixed set of batches and refuses to create more.
    struct FixedService {
        usable: Vec<BatchId>,
        fetch_delay: Duration,
    }

    #[async_trait]
    impl AllocationService for FixedService {
        async fn fetch_batch(&self, id: &BatchId) -> BatchResult<Option<Batch>> {
            tokio::time::sleep(self.fetch_delay).await;
            if self.usable.contains(id) {
                Ok(Some(Batch {
                    id: id.clone(),
                    depth: 20,
                    amount: 1000,
                    usable: true,
                    exists: true,
                    ttl: 86_400,
                }))
            } else {
                Ok(None)
            }
        }

        async fn fetch_batches(&self) -> BatchResult<Vec<Batch>> {
            Ok(Vec::new())
        }

        async fn create_batch(&self, _depth: u8, _amount: u64) -> BatchResult<BatchId> {
            Err(BatchError::service("out of funds"))
        }

        async fn topup_batch(&self, _id: &BatchId, _amount: u64) -> BatchResult<()> {
            Ok(())
        }

        async fn dilute_batch(&self, _id: &BatchId, _depth: u8) -> BatchResult<()> {
            Ok(())
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl PaymentConfirmer for AcceptAll {
        async fn wait_payment_confirmation(&self, _depth: u8, _amount: u64) -> bool {
            true
        }
    }

    struct Fixture {
        orchestrator: Arc<MigrationOrchestrator>,
        storage: Arc<MemoryStorageClient>,
        playlists: Arc<MemoryPlaylistStore>,
    }

    fn fixture(usable: Vec<BatchId>, fetch_delay: Duration) -> Fixture {
        let storage = Arc::new(MemoryStorageClient::new());
        let uploader = UploadCoordinator::new(storage.clone());

        let allocator = BatchAllocator::new(
            Arc::new(FixedService {
                usable,
                fetch_delay,
            }),
            Arc::new(AcceptAll),
            BatchAllocatorConfig {
                poll_interval: Duration::from_millis(1),
                not_found_timeout: Duration::from_millis(20),
                propagation_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );

        let playlists = Arc::new(MemoryPlaylistStore::new());
        let mut channel = Playlist::new("channel", "Channel");
        channel.batch_id = Some(BatchId::new("playlist-batch"));
        playlists.insert(channel);

        let indexes: HashMap<String, Arc<dyn IndexClient>> = HashMap::new();
        let publisher = Arc::new(PublishCoordinator::new(
            uploader.clone(),
            indexes,
            playlists.clone(),
        ));

        Fixture {
            orchestrator: Arc::new(MigrationOrchestrator::new(
                uploader,
                allocator,
                publisher,
                "channel",
            )),
            storage,
            playlists,
        }
    }

    fn old_manifest(title: &str, batch: &str) -> VideoManifest {
        let mut manifest = VideoManifest::new(title, 120.0, "720p");
        manifest.v = 1;
        manifest.batch_id = Some(BatchId::new(batch));
        manifest.sources = vec![AdaptiveSource {
            quality: "720p".to_string(),
            content_type: "video/mp4".to_string(),
            reference: Reference::new(format!("{}-720", title)),
            size: 1024,
            bitrate: 2_000_000,
        }];
        manifest
    }

    fn seed_playlist(f: &Fixture, references: &[Reference]) {
        let mut channel = f.playlists.get("channel").unwrap();
        for reference in references {
            channel.replace_or_insert(
                PlaylistVideo::new(reference.clone(), reference.as_str()),
                None,
            );
        }
        f.playlists.insert(channel);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_siblings() {
        // Four videos hold usable batches; video3's batch is gone and the
        // service cannot create a replacement.
        let usable: Vec<BatchId> = [1, 2, 4, 5]
            .iter()
            .map(|n| BatchId::new(format!("good-{}", n)))
            .collect();
        let f = fixture(usable, Duration::ZERO);

        let videos: Vec<MigrationVideo> = (1..=5)
            .map(|n| {
                let batch = if n == 3 {
                    "gone".to_string()
                } else {
                    format!("good-{}", n)
                };
                MigrationVideo::new(
                    Reference::new(format!("video{}", n)),
                    Some(old_manifest(&format!("video{}", n), &batch)),
                )
            })
            .collect();
        let old_refs: Vec<Reference> = videos.iter().map(|v| v.reference.clone()).collect();
        seed_playlist(&f, &old_refs);

        let cancel = CancellationToken::new();
        let report = f.orchestrator.migrate(videos, &cancel).await.unwrap();

        assert_eq!(report.migrated, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);

        let statuses = f.orchestrator.statuses();
        assert_eq!(
            statuses[&Reference::new("video3")].status,
            MigrationStep::Error
        );
        for n in [1, 2, 4, 5] {
            assert_eq!(
                statuses[&Reference::new(format!("video{}", n))].status,
                MigrationStep::Done
            );
        }

        // One playlist write covering exactly the survivors.
        assert_eq!(f.playlists.save_count(), 1);
        let channel = f.playlists.get("channel").unwrap();
        assert_eq!(channel.videos.len(), 5);
        assert!(channel.contains(&Reference::new("video3")));
        for n in [1, 2, 4, 5] {
            assert!(!channel.contains(&Reference::new(format!("video{}", n))));
        }
    }

    #[tokio::test]
    async fn test_current_manifests_are_skipped() {
        let f = fixture(vec![BatchId::new("good-1")], Duration::ZERO);

        let mut current = old_manifest("video1", "good-1");
        current.v = vpub_models::CURRENT_MANIFEST_VERSION;
        let videos = vec![MigrationVideo::new(Reference::new("video1"), Some(current))];

        let cancel = CancellationToken::new();
        let report = f.orchestrator.migrate(videos, &cancel).await.unwrap();

        assert_eq!(report, MigrationReport {
            migrated: 0,
            failed: 0,
            skipped: 1,
        });
        assert!(f.orchestrator.statuses().is_empty());
        assert_eq!(f.playlists.save_count(), 0);
        assert_eq!(f.storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_second_run_fails_fast() {
        let f = fixture(vec![BatchId::new("good-1")], Duration::from_millis(100));

        let videos = vec![MigrationVideo::new(
            Reference::new("video1"),
            Some(old_manifest("video1", "good-1")),
        )];

        let orchestrator = f.orchestrator.clone();
        let slow = tokio::spawn(async move {
            let cancel = CancellationToken::new();
            orchestrator.migrate(videos, &cancel).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.orchestrator.is_running());
        assert_eq!(f.orchestrator.run_state(), MigrationRunState::Migrating);

        let cancel = CancellationToken::new();
        let err = f.orchestrator.migrate(vec![], &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::MigrationAlreadyRunning));

        slow.await.unwrap().unwrap();
        assert!(!f.orchestrator.is_running());
        assert_eq!(f.orchestrator.run_state(), MigrationRunState::Idle);
    }

    #[tokio::test]
    async fn test_missing_manifest_is_downloaded_first() {
        let f = fixture(vec![BatchId::new("good-1")], Duration::ZERO);

        // Seed the stored manifest through a real upload.
        let bytes = serde_json::to_vec(&old_manifest("video1", "good-1")).unwrap();
        let cancel = CancellationToken::new();
        let uploader = UploadCoordinator::new(f.storage.clone());
        let reference = uploader
            .upload(
                &bytes,
                &UploadOptions::new(BatchId::new("good-1"), "application/json"),
                None,
                &cancel,
            )
            .await
            .unwrap();
        seed_playlist(&f, std::slice::from_ref(&reference));

        let videos = vec![MigrationVideo::new(reference.clone(), None)];
        let report = f.orchestrator.migrate(videos, &cancel).await.unwrap();

        assert_eq!(report.migrated, 1);
        let statuses = f.orchestrator.statuses();
        assert_eq!(statuses[&reference].status, MigrationStep::Done);
        assert_eq!(statuses[&reference].download_progress, 100.0);
        assert!(!f.playlists.get("channel").unwrap().contains(&reference));
    }

    #[tokio::test]
    async fn test_lost_original_source_is_refetched() {
        let f = fixture(vec![BatchId::new("good-1")], Duration::ZERO);

        // Only the 480p rendition survives as a standalone reference; the
        // original 720p bytes live path-addressed under the manifest root.
        let root = Reference::new("video1");
        let mut manifest = old_manifest("video1", "good-1");
        manifest.sources[0].quality = "480p".to_string();
        f.storage.put_path(&root, "sources/720p", vec![7u8; 2048]);
        seed_playlist(&f, std::slice::from_ref(&root));

        let cancel = CancellationToken::new();
        let report = f
            .orchestrator
            .migrate(vec![MigrationVideo::new(root.clone(), Some(manifest))], &cancel)
            .await
            .unwrap();
        assert_eq!(report.migrated, 1);

        // Two uploads: the recovered original, then the migrated manifest.
        assert_eq!(f.storage.upload_count(), 2);

        let channel = f.playlists.get("channel").unwrap();
        assert!(!channel.contains(&root));
        let new_reference = channel.videos[0].reference.clone();

        let uploader = UploadCoordinator::new(f.storage.clone());
        let bytes = uploader.download(&new_reference, None, &cancel).await.unwrap();
        let migrated: VideoManifest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(migrated.sources.len(), 2);
        let original = migrated
            .sources
            .iter()
            .find(|s| s.quality == "720p")
            .unwrap();
        assert_eq!(original.size, 2048);
    }

    #[tokio::test]
    async fn test_undecodable_manifest_fails_that_video() {
        let f = fixture(vec![], Duration::ZERO);

        let cancel = CancellationToken::new();
        let uploader = UploadCoordinator::new(f.storage.clone());
        let reference = uploader
            .upload(
                b"not json",
                &UploadOptions::new(BatchId::new("b"), "application/json"),
                None,
                &cancel,
            )
            .await
            .unwrap();

        let report = f
            .orchestrator
            .migrate(vec![MigrationVideo::new(reference.clone(), None)], &cancel)
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        let statuses = f.orchestrator.statuses();
        assert_eq!(statuses[&reference].status, MigrationStep::Error);
        assert!(statuses[&reference].error.is_some());
    }
}
