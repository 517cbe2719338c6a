//! In-memory index and playlist doubles for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use vpub_models::{BatchId, Reference};

use crate::error::{IndexError, PublishError, PublishResult};
use crate::index::{IndexClient, IndexVideo};
use crate::playlist::{Playlist, PlaylistStore};

/// Index double keeping published videos in a map.
#[derive(Default)]
pub struct MemoryIndexClient {
    by_id: Mutex<HashMap<String, Reference>>,
    next_id: AtomicU64,
    fail_requests: AtomicBool,
    duplicate_on_create: AtomicBool,
}

impl MemoryIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request fail with a transport error.
    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Make `create_video` report the video as already published.
    pub fn duplicate_on_create(&self, duplicate: bool) {
        self.duplicate_on_create.store(duplicate, Ordering::SeqCst);
    }

    /// Number of published videos.
    pub fn published_count(&self) -> usize {
        self.by_id.lock().unwrap().len()
    }

    fn check_failure(&self) -> Result<(), IndexError> {
        if self.fail_requests.load(Ordering::SeqCst) {
            Err(IndexError::request("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IndexClient for MemoryIndexClient {
    async fn create_video(&self, reference: &Reference) -> Result<String, IndexError> {
        self.check_failure()?;
        if self.duplicate_on_create.load(Ordering::SeqCst) {
            return Err(IndexError::Duplicate);
        }
        let mut by_id = self.by_id.lock().unwrap();
        if by_id.values().any(|r| r == reference) {
            return Err(IndexError::Duplicate);
        }
        let id = format!("idx-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        by_id.insert(id.clone(), reference.clone());
        Ok(id)
    }

    async fn update_video(&self, id: &str, reference: &Reference) -> Result<(), IndexError> {
        self.check_failure()?;
        let mut by_id = self.by_id.lock().unwrap();
        match by_id.get_mut(id) {
            Some(current) => {
                *current = reference.clone();
                Ok(())
            }
            None => Err(IndexError::NotFound),
        }
    }

    async fn delete_video(&self, id: &str) -> Result<(), IndexError> {
        self.check_failure()?;
        match self.by_id.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(IndexError::NotFound),
        }
    }

    async fn fetch_video_from_hash(
        &self,
        reference: &Reference,
    ) -> Result<Option<IndexVideo>, IndexError> {
        self.check_failure()?;
        Ok(self
            .by_id
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r)| *r == reference)
            .map(|(id, r)| IndexVideo {
                id: id.clone(),
                reference: r.clone(),
            }))
    }

    async fn fetch_hash_validation(&self, reference: &Reference) -> Result<bool, IndexError> {
        self.check_failure()?;
        Ok(self.by_id.lock().unwrap().values().any(|r| r == reference))
    }
}

/// Playlist store double keeping playlists in a map.
#[derive(Default)]
pub struct MemoryPlaylistStore {
    playlists: Mutex<HashMap<String, Playlist>>,
    saves: AtomicU64,
    next_root: AtomicU64,
}

impl MemoryPlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a playlist.
    pub fn insert(&self, playlist: Playlist) {
        self.playlists
            .lock()
            .unwrap()
            .insert(playlist.id.clone(), playlist);
    }

    /// Current state of a playlist.
    pub fn get(&self, id: &str) -> Option<Playlist> {
        self.playlists.lock().unwrap().get(id).cloned()
    }

    /// Number of writes performed.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaylistStore for MemoryPlaylistStore {
    async fn load(&self, id: &str) -> PublishResult<Playlist> {
        self.playlists
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| PublishError::playlist(format!("unknown playlist: {}", id)))
    }

    async fn save(&self, playlist: &Playlist, _batch_id: &BatchId) -> PublishResult<Reference> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.playlists
            .lock()
            .unwrap()
            .insert(playlist.id.clone(), playlist.clone());
        let n = self.next_root.fetch_add(1, Ordering::SeqCst);
        Ok(Reference::new(format!("playlist-root-{}", n)))
    }
}
