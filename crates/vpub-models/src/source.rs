//! Adaptive source models.

use serde::{Deserialize, Serialize};

use crate::reference::Reference;

/// One encoded rendition of a video at a given quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveSource {
    /// Quality label (e.g. "720p")
    pub quality: String,

    /// MIME type of the encoded payload
    pub content_type: String,

    /// Content address of the uploaded rendition
    pub reference: Reference,

    /// Payload size in bytes
    pub size: u64,

    /// Average bitrate in bits per second
    pub bitrate: u64,
}

impl AdaptiveSource {
    /// Insert or replace a source in a quality-deduplicated list.
    ///
    /// A video owns at most one source per quality; a re-encode at the same
    /// quality replaces the previous entry in place, preserving list order.
    pub fn upsert(sources: &mut Vec<AdaptiveSource>, source: AdaptiveSource) {
        match sources.iter_mut().find(|s| s.quality == source.quality) {
            Some(existing) => *existing = source,
            None => sources.push(source),
        }
    }
}

/// Derive a quality label from a vertical resolution.
pub fn quality_from_height(height: u32) -> String {
    format!("{}p", height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(quality: &str, reference: &str) -> AdaptiveSource {
        AdaptiveSource {
            quality: quality.to_string(),
            content_type: "video/mp4".to_string(),
            reference: Reference::new(reference),
            size: 1024,
            bitrate: 1_000_000,
        }
    }

    #[test]
    fn test_upsert_deduplicates_by_quality() {
        let mut sources = vec![source("720p", "a"), source("480p", "b")];

        AdaptiveSource::upsert(&mut sources, source("720p", "c"));

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].reference.as_str(), "c");
        assert_eq!(sources[1].reference.as_str(), "b");
    }

    #[test]
    fn test_upsert_appends_new_quality() {
        let mut sources = vec![source("720p", "a")];

        AdaptiveSource::upsert(&mut sources, source("1080p", "d"));

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].quality, "1080p");
    }

    #[test]
    fn test_quality_label() {
        assert_eq!(quality_from_height(720), "720p");
    }
}
