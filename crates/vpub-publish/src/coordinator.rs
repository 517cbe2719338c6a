//! Publish coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vpub_models::{
    DestinationSource, PublishDestination, PublishKind, PublishOutcome, Reference, VideoManifest,
};
use vpub_storage::{UploadCoordinator, UploadOptions};

use crate::error::{IndexError, PublishError, PublishResult};
use crate::index::IndexClient;
use crate::playlist::{PlaylistStore, PlaylistVideo};

/// Resource handling flags for a fresh save.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Offer the new manifest for network-wide availability
    pub offer_resources: bool,
    /// Pin the new manifest on the node
    pub pin_resources: bool,
}

/// One deferred playlist membership swap, applied by [`PublishCoordinator::patch_playlist`].
#[derive(Debug, Clone)]
pub struct PlaylistReplaceOp {
    /// Reference to remove
    pub remove: Reference,
    /// Entry to insert in its place
    pub add: PlaylistVideo,
}

#[derive(Default)]
struct PublishState {
    manifest_reference: Option<Reference>,
    previous_reference: Option<Reference>,
    last_manifest_bytes: Option<Vec<u8>>,
    last_title: Option<String>,
    outcomes: HashMap<(DestinationSource, String), PublishOutcome>,
}

/// Fans a finalized manifest out to a set of destinations.
///
/// Owned per editing session, like the processing controller. Destination
/// outcomes are cumulative: a retry overwrites the stored outcome for its
/// destination. The expensive manifest upload happens once per content
/// change; per-destination retries reuse the uploaded reference.
pub struct PublishCoordinator {
    uploader: UploadCoordinator,
    indexes: HashMap<String, Arc<dyn IndexClient>>,
    playlists: Arc<dyn PlaylistStore>,
    state: Mutex<PublishState>,
}

impl PublishCoordinator {
    pub fn new(
        uploader: UploadCoordinator,
        indexes: HashMap<String, Arc<dyn IndexClient>>,
        playlists: Arc<dyn PlaylistStore>,
    ) -> Self {
        Self {
            uploader,
            indexes,
            playlists,
            state: Mutex::new(PublishState::default()),
        }
    }

    /// Manifest reference from the last successful save, if any.
    pub async fn manifest_reference(&self) -> Option<Reference> {
        self.state.lock().await.manifest_reference.clone()
    }

    /// All outcomes recorded so far, one per destination.
    pub async fn outcomes(&self) -> Vec<PublishOutcome> {
        self.state.lock().await.outcomes.values().cloned().collect()
    }

    /// Destinations whose last attempt failed, for retry UIs.
    pub async fn failed_destinations(&self) -> Vec<PublishDestination> {
        self.state
            .lock()
            .await
            .outcomes
            .values()
            .filter(|o| !o.ok)
            .map(|o| o.destination.clone())
            .collect()
    }

    /// Upload the serialized manifest, returning its reference.
    ///
    /// Re-publishing unchanged content reuses the previous reference without
    /// another upload. Validation runs before any network call.
    pub async fn save_manifest(&self, manifest: &VideoManifest) -> PublishResult<Reference> {
        validate(manifest)?;

        let bytes = serde_json::to_vec(manifest)
            .map_err(|e| PublishError::validation(format!("manifest serialization: {}", e)))?;

        let mut state = self.state.lock().await;
        if let (Some(last), Some(reference)) =
            (&state.last_manifest_bytes, &state.manifest_reference)
        {
            if *last == bytes {
                debug!(reference = %reference, "Manifest unchanged, reusing reference");
                return Ok(reference.clone());
            }
        }
        // Hold the lock across the upload so two concurrent saves cannot
        // interleave their superseded-reference bookkeeping.
        let batch_id = manifest
            .batch_id
            .clone()
            .ok_or_else(|| PublishError::validation("video has no batch"))?;

        let opts = UploadOptions::new(batch_id, "application/json");
        let cancel = CancellationToken::new();
        let reference = self.uploader.upload(&bytes, &opts, None, &cancel).await?;

        info!(reference = %reference, title = %manifest.title, "Manifest uploaded");
        state.previous_reference = state.manifest_reference.replace(reference.clone());
        state.last_manifest_bytes = Some(bytes);
        state.last_title = Some(manifest.title.clone());
        Ok(reference)
    }

    /// Save the manifest, sync resource pin/offer state, then fan out to
    /// every destination.
    ///
    /// Fan-out is best-effort: one destination's failure is recorded as a
    /// failed outcome and does not block the others. Returns this attempt's
    /// outcomes in destination order.
    pub async fn save_video_to(
        &self,
        manifest: &VideoManifest,
        destinations: &[PublishDestination],
        opts: &SaveOptions,
    ) -> PublishResult<Vec<PublishOutcome>> {
        let reference = self.save_manifest(manifest).await?;

        // Resource state only moves once the manifest step has succeeded.
        self.sync_resources(&reference, opts).await;

        let mut outcomes = Vec::with_capacity(destinations.len());
        for destination in destinations {
            let outcome = self.apply_destination(destination, &reference).await;
            self.record_outcome(outcome.clone()).await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Retry exactly one destination, reusing the already-uploaded manifest.
    ///
    /// Never re-uploads the manifest and never touches pin/offer state.
    pub async fn re_save_to(
        &self,
        destination: &PublishDestination,
    ) -> PublishResult<PublishOutcome> {
        let reference = self
            .manifest_reference()
            .await
            .ok_or(PublishError::NoManifestReference)?;

        let outcome = self.apply_destination(destination, &reference).await;
        self.record_outcome(outcome.clone()).await;
        Ok(outcome)
    }

    /// Apply a set of deferred membership swaps in a single playlist write.
    ///
    /// Bulk migration queues one op per migrated video and calls this once
    /// after the whole batch settles, bounding playlist writes to one per
    /// run.
    pub async fn patch_playlist(
        &self,
        playlist_id: &str,
        ops: &[PlaylistReplaceOp],
    ) -> PublishResult<Reference> {
        let mut playlist = self.playlists.load(playlist_id).await?;
        for op in ops {
            playlist.replace_or_insert(op.add.clone(), Some(&op.remove));
        }
        let batch_id = playlist
            .batch_id
            .clone()
            .ok_or_else(|| PublishError::playlist("playlist has no batch"))?;
        let root = self.playlists.save(&playlist, &batch_id).await?;
        info!(playlist = playlist_id, ops = ops.len(), root = %root, "Playlist patched");
        Ok(root)
    }

    async fn sync_resources(&self, reference: &Reference, opts: &SaveOptions) {
        let superseded = {
            let mut state = self.state.lock().await;
            match &state.previous_reference {
                Some(previous) if previous != reference => state.previous_reference.clone(),
                _ => None,
            }
        };

        // Best-effort: resource bookkeeping failures are logged, never fatal
        // to the save.
        if let Some(old) = &superseded {
            if let Err(e) = self.uploader.unpin(old).await {
                warn!(reference = %old, "Failed to unpin superseded manifest: {}", e);
            }
            if let Err(e) = self.uploader.cancel_offer(old).await {
                warn!(reference = %old, "Failed to revoke offer on superseded manifest: {}", e);
            }
        }
        if opts.pin_resources {
            if let Err(e) = self.uploader.pin(reference).await {
                warn!(reference = %reference, "Failed to pin manifest: {}", e);
            }
        }
        if opts.offer_resources {
            if let Err(e) = self.uploader.offer(reference).await {
                warn!(reference = %reference, "Failed to offer manifest: {}", e);
            }
        }
    }

    async fn record_outcome(&self, outcome: PublishOutcome) {
        let key = (
            outcome.destination.source,
            outcome.destination.identifier.clone(),
        );
        self.state.lock().await.outcomes.insert(key, outcome);
    }

    async fn apply_destination(
        &self,
        destination: &PublishDestination,
        reference: &Reference,
    ) -> PublishOutcome {
        let kind = if destination.add {
            PublishKind::Add
        } else {
            PublishKind::Remove
        };

        let result = match destination.source {
            DestinationSource::Index => self.apply_index(destination, reference).await,
            DestinationSource::Playlist => self.apply_playlist(destination, reference).await,
        };

        let ok = match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    destination = %destination.identifier,
                    source = %destination.source,
                    "Publish step failed: {}", e
                );
                false
            }
        };

        PublishOutcome {
            destination: destination.clone(),
            ok,
            kind,
        }
    }

    async fn apply_index(
        &self,
        destination: &PublishDestination,
        reference: &Reference,
    ) -> PublishResult<()> {
        let index = self
            .indexes
            .get(&destination.identifier)
            .ok_or_else(|| IndexError::request(format!("unknown index: {}", destination.identifier)))?;

        if destination.add {
            match &destination.video_id {
                Some(id) => match index.update_video(id, reference).await {
                    Ok(()) | Err(IndexError::Duplicate) => Ok(()),
                    Err(e) => Err(e.into()),
                },
                None => match index.create_video(reference).await {
                    Ok(_) => Ok(()),
                    // An at-least-once retry can race a previous success;
                    // already-published counts as published.
                    Err(IndexError::Duplicate) => Ok(()),
                    Err(e) => Err(e.into()),
                },
            }
        } else {
            let id = match &destination.video_id {
                Some(id) => Some(id.clone()),
                None => index
                    .fetch_video_from_hash(reference)
                    .await?
                    .map(|v| v.id),
            };
            match id {
                Some(id) => match index.delete_video(&id).await {
                    Ok(()) | Err(IndexError::NotFound) => Ok(()),
                    Err(e) => Err(e.into()),
                },
                // Nothing to remove.
                None => Ok(()),
            }
        }
    }

    async fn apply_playlist(
        &self,
        destination: &PublishDestination,
        reference: &Reference,
    ) -> PublishResult<()> {
        let mut playlist = self.playlists.load(&destination.identifier).await?;

        if destination.add {
            let (previous, title) = {
                let state = self.state.lock().await;
                (
                    state.previous_reference.clone(),
                    state.last_title.clone().unwrap_or_default(),
                )
            };
            playlist.replace_or_insert(
                PlaylistVideo::new(reference.clone(), title),
                previous.as_ref(),
            );
        } else {
            playlist.remove(reference);
        }

        let batch_id = playlist
            .batch_id
            .clone()
            .ok_or_else(|| PublishError::playlist("playlist has no batch"))?;
        self.playlists.save(&playlist, &batch_id).await?;
        Ok(())
    }
}

/// Local validation, checked before any network call.
fn validate(manifest: &VideoManifest) -> PublishResult<()> {
    if manifest.title.trim().is_empty() {
        return Err(PublishError::validation("video has no title"));
    }
    if manifest.duration <= 0.0 {
        return Err(PublishError::validation("video has no duration"));
    }
    if manifest.batch_id.is_none() {
        return Err(PublishError::validation("video has no batch"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::Playlist;
    use crate::testing::{MemoryIndexClient, MemoryPlaylistStore};
    use vpub_models::BatchId;
    use vpub_storage::MemoryStorageClient;

    struct Fixture {
        coordinator: PublishCoordinator,
        storage: Arc<MemoryStorageClient>,
        indexes: HashMap<String, Arc<MemoryIndexClient>>,
        playlists: Arc<MemoryPlaylistStore>,
    }

    fn fixture(index_ids: &[&str]) -> Fixture {
        let storage = Arc::new(MemoryStorageClient::new());
        let uploader = UploadCoordinator::new(storage.clone());

        let mut indexes = HashMap::new();
        let mut typed: HashMap<String, Arc<dyn IndexClient>> = HashMap::new();
        for id in index_ids {
            let client = Arc::new(MemoryIndexClient::new());
            indexes.insert(id.to_string(), client.clone());
            typed.insert(id.to_string(), client);
        }

        let playlists = Arc::new(MemoryPlaylistStore::new());
        let mut channel = Playlist::new("channel", "Channel");
        channel.batch_id = Some(BatchId::new("playlist-batch"));
        playlists.insert(channel);

        Fixture {
            coordinator: PublishCoordinator::new(uploader, typed, playlists.clone()),
            storage,
            indexes,
            playlists,
        }
    }

    fn manifest() -> VideoManifest {
        let mut manifest = VideoManifest::new("My video", 120.0, "720p");
        manifest.batch_id = Some(BatchId::new("video-batch"));
        manifest
    }

    fn index_destination(identifier: &str) -> PublishDestination {
        PublishDestination {
            source: DestinationSource::Index,
            identifier: identifier.to_string(),
            video_id: None,
            add: true,
        }
    }

    fn playlist_destination(identifier: &str) -> PublishDestination {
        PublishDestination {
            source: DestinationSource::Playlist,
            identifier: identifier.to_string(),
            video_id: None,
            add: true,
        }
    }

    #[tokio::test]
    async fn test_validation_blocks_before_any_network_call() {
        let f = fixture(&["index"]);
        let mut invalid = manifest();
        invalid.title = String::new();

        let err = f
            .coordinator
            .save_video_to(&invalid, &[index_destination("index")], &SaveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Validation(_)));
        assert_eq!(f.storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn test_destination_independence() {
        let f = fixture(&["a", "b", "c"]);
        f.indexes["b"].fail_requests(true);

        let outcomes = f
            .coordinator
            .save_video_to(
                &manifest(),
                &[
                    index_destination("a"),
                    index_destination("b"),
                    index_destination("c"),
                ],
                &SaveOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            outcomes.iter().map(|o| o.ok).collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }

    #[tokio::test]
    async fn test_known_video_id_updates_instead_of_creating() {
        let storage = Arc::new(MemoryStorageClient::new());
        let uploader = UploadCoordinator::new(storage);

        let mut mock = crate::index::MockIndexClient::new();
        mock.expect_update_video()
            .withf(|id, _| id == "vid-1")
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_create_video().never();

        let mut indexes: HashMap<String, Arc<dyn IndexClient>> = HashMap::new();
        indexes.insert("index".to_string(), Arc::new(mock));
        let coordinator = PublishCoordinator::new(
            uploader,
            indexes,
            Arc::new(MemoryPlaylistStore::new()),
        );

        let destination = PublishDestination {
            source: DestinationSource::Index,
            identifier: "index".to_string(),
            video_id: Some("vid-1".to_string()),
            add: true,
        };
        let outcomes = coordinator
            .save_video_to(&manifest(), &[destination], &SaveOptions::default())
            .await
            .unwrap();
        assert!(outcomes[0].ok);
    }

    #[tokio::test]
    async fn test_duplicate_create_counts_as_published() {
        let f = fixture(&["index"]);
        f.indexes["index"].duplicate_on_create(true);

        let outcomes = f
            .coordinator
            .save_video_to(&manifest(), &[index_destination("index")], &SaveOptions::default())
            .await
            .unwrap();
        assert!(outcomes[0].ok);
    }

    #[tokio::test]
    async fn test_re_save_reuses_manifest_upload() {
        let f = fixture(&["index"]);
        f.indexes["index"].fail_requests(true);

        let outcomes = f
            .coordinator
            .save_video_to(&manifest(), &[index_destination("index")], &SaveOptions::default())
            .await
            .unwrap();
        assert!(!outcomes[0].ok);
        assert_eq!(f.storage.upload_count(), 1);

        // Retry twice with no intervening change: same outcome, and the
        // manifest is never re-uploaded.
        f.indexes["index"].fail_requests(false);
        let first = f
            .coordinator
            .re_save_to(&index_destination("index"))
            .await
            .unwrap();
        let second = f
            .coordinator
            .re_save_to(&index_destination("index"))
            .await
            .unwrap();
        assert_eq!(first.ok, second.ok);
        assert_eq!(f.storage.upload_count(), 1);

        // The cumulative record was overwritten, not appended.
        let outcomes = f.coordinator.outcomes().await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].ok);
    }

    #[tokio::test]
    async fn test_re_save_without_manifest_is_an_error() {
        let f = fixture(&["index"]);
        let err = f
            .coordinator
            .re_save_to(&index_destination("index"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::NoManifestReference));
    }

    #[tokio::test]
    async fn test_unchanged_manifest_is_not_re_uploaded() {
        let f = fixture(&["index"]);
        let m = manifest();

        let first = f.coordinator.save_manifest(&m).await.unwrap();
        let second = f.coordinator.save_manifest(&m).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.storage.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_playlist_add_and_swap_on_new_save() {
        let f = fixture(&[]);
        let mut m = manifest();

        f.coordinator
            .save_video_to(&m, &[playlist_destination("channel")], &SaveOptions::default())
            .await
            .unwrap();
        let channel = f.playlists.get("channel").unwrap();
        assert_eq!(channel.videos.len(), 1);
        let first_added_at = channel.videos[0].added_at;

        // A content change produces a new reference; the playlist entry is
        // swapped, keeping its original added_at.
        m.description = "now with a description".to_string();
        f.coordinator
            .save_video_to(&m, &[playlist_destination("channel")], &SaveOptions::default())
            .await
            .unwrap();

        let channel = f.playlists.get("channel").unwrap();
        assert_eq!(channel.videos.len(), 1);
        assert_eq!(channel.videos[0].added_at, first_added_at);
        assert_eq!(f.playlists.save_count(), 2);
    }

    #[tokio::test]
    async fn test_playlist_remove() {
        let f = fixture(&[]);
        let m = manifest();

        f.coordinator
            .save_video_to(&m, &[playlist_destination("channel")], &SaveOptions::default())
            .await
            .unwrap();

        let mut remove = playlist_destination("channel");
        remove.add = false;
        let outcome = f.coordinator.re_save_to(&remove).await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.kind, PublishKind::Remove);
        assert!(f.playlists.get("channel").unwrap().videos.is_empty());
    }

    #[tokio::test]
    async fn test_pin_and_offer_follow_flags() {
        let f = fixture(&[]);
        let opts = SaveOptions {
            offer_resources: true,
            pin_resources: true,
        };

        let outcomes = f
            .coordinator
            .save_video_to(&manifest(), &[], &opts)
            .await
            .unwrap();
        assert!(outcomes.is_empty());

        let reference = f.coordinator.manifest_reference().await.unwrap();
        assert!(f.storage.is_pinned(&reference));
        assert!(f.storage.is_offered(&reference));
    }

    #[tokio::test]
    async fn test_superseded_manifest_is_unpinned() {
        let f = fixture(&[]);
        let opts = SaveOptions {
            offer_resources: true,
            pin_resources: true,
        };
        let mut m = manifest();

        f.coordinator.save_video_to(&m, &[], &opts).await.unwrap();
        let old = f.coordinator.manifest_reference().await.unwrap();

        m.description = "v2".to_string();
        f.coordinator.save_video_to(&m, &[], &opts).await.unwrap();
        let new = f.coordinator.manifest_reference().await.unwrap();

        assert_ne!(old, new);
        assert!(!f.storage.is_pinned(&old));
        assert!(!f.storage.is_offered(&old));
        assert!(f.storage.is_pinned(&new));
    }
}
