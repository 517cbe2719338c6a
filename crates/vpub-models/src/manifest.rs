//! Versioned video manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::BatchId;
use crate::reference::Reference;
use crate::source::AdaptiveSource;

/// Current manifest schema version. Manifests below this version are picked
/// up by the bulk migration orchestrator.
pub const CURRENT_MANIFEST_VERSION: u32 = 2;

/// Structured video metadata plus pointers to its adaptive sources.
///
/// Uploading the serialized manifest yields the content reference that acts
/// as the video's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoManifest {
    /// Manifest schema version
    pub v: u32,

    /// Video title
    pub title: String,

    /// Video description
    #[serde(default)]
    pub description: String,

    /// Duration in seconds
    pub duration: f64,

    /// Quality of the original upload (highest-priority source)
    pub original_quality: String,

    /// Thumbnail reference, if one was uploaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Reference>,

    /// Adaptive sources, ordered, one per quality
    pub sources: Vec<AdaptiveSource>,

    /// Allocation backing the video's content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl VideoManifest {
    /// Create a manifest at the current schema version.
    pub fn new(title: impl Into<String>, duration: f64, original_quality: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            v: CURRENT_MANIFEST_VERSION,
            title: title.into(),
            description: String::new(),
            duration,
            original_quality: original_quality.into(),
            thumbnail: None,
            sources: Vec::new(),
            batch_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this manifest was written by an older schema version.
    pub fn needs_migration(&self) -> bool {
        self.v < CURRENT_MANIFEST_VERSION
    }

    /// Bump to the current schema version, refreshing the update timestamp.
    pub fn migrated(mut self) -> Self {
        self.v = CURRENT_MANIFEST_VERSION;
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manifest_is_current() {
        let manifest = VideoManifest::new("Test", 120.0, "720p");
        assert_eq!(manifest.v, CURRENT_MANIFEST_VERSION);
        assert!(!manifest.needs_migration());
    }

    #[test]
    fn test_old_manifest_needs_migration() {
        let mut manifest = VideoManifest::new("Test", 120.0, "720p");
        manifest.v = 1;
        assert!(manifest.needs_migration());
        assert!(!manifest.migrated().needs_migration());
    }

    #[test]
    fn test_manifest_round_trips_through_json() {
        let manifest = VideoManifest::new("Test", 120.0, "720p");
        let json = serde_json::to_string(&manifest).unwrap();
        let back: VideoManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }
}
