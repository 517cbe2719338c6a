//! Playlist model and store interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vpub_models::{BatchId, Reference};

use crate::error::PublishResult;

/// One video entry in a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistVideo {
    /// Manifest reference
    pub reference: Reference,

    /// Title at the time of adding
    pub title: String,

    /// When the video was first added to the playlist
    pub added_at: DateTime<Utc>,

    /// When the video was first published, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl PlaylistVideo {
    pub fn new(reference: Reference, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            reference,
            title: title.into(),
            added_at: now,
            published_at: Some(now),
        }
    }
}

/// A playlist: an ordered video list stored as a mutable feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// Playlist identifier (feed topic)
    pub id: String,

    /// Display name
    pub name: String,

    /// Member videos, deduplicated by reference
    pub videos: Vec<PlaylistVideo>,

    /// Allocation backing playlist updates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
}

impl Playlist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            videos: Vec::new(),
            batch_id: None,
        }
    }

    /// Insert a video, or replace the entry carrying `replacing` (or the
    /// same reference), preserving the replaced entry's `added_at` and
    /// `published_at`. Deduplicates by reference afterwards.
    ///
    /// Migration uses the `replacing` form to swap an old reference for a
    /// new one without losing provenance.
    pub fn replace_or_insert(&mut self, video: PlaylistVideo, replacing: Option<&Reference>) {
        let target = self.videos.iter_mut().find(|v| {
            v.reference == video.reference || Some(&v.reference) == replacing
        });

        match target {
            Some(existing) => {
                let added_at = existing.added_at;
                let published_at = existing.published_at;
                *existing = video;
                existing.added_at = added_at;
                existing.published_at = published_at;
            }
            None => self.videos.push(video),
        }

        self.dedupe();
    }

    /// Remove a video by reference. No-op when absent.
    pub fn remove(&mut self, reference: &Reference) {
        self.videos.retain(|v| &v.reference != reference);
    }

    /// Whether a reference is a member.
    pub fn contains(&self, reference: &Reference) -> bool {
        self.videos.iter().any(|v| &v.reference == reference)
    }

    fn dedupe(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.videos.retain(|v| seen.insert(v.reference.clone()));
    }
}

/// Playlist/profile store.
///
/// The concrete feed builder/writer is an external collaborator; the
/// coordinator only needs load and save.
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Load the current playlist state.
    async fn load(&self, id: &str) -> PublishResult<Playlist>;

    /// Write the playlist, paying with `batch_id`. Returns the new feed
    /// root reference.
    async fn save(&self, playlist: &Playlist, batch_id: &BatchId) -> PublishResult<Reference>;
}
