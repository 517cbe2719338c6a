//! Publish destinations and outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of service a video can be published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSource {
    /// An index service (global discovery)
    Index,
    /// A playlist (channel or user-curated list)
    Playlist,
}

impl DestinationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationSource::Index => "index",
            DestinationSource::Playlist => "playlist",
        }
    }
}

impl fmt::Display for DestinationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A desired membership state for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublishDestination {
    /// Destination kind
    pub source: DestinationSource,

    /// Index URL or playlist identifier
    pub identifier: String,

    /// Video id previously assigned by this destination, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,

    /// `true` to publish, `false` to unpublish
    pub add: bool,
}

impl PublishDestination {
    /// Key identifying the destination across retries.
    pub fn key(&self) -> (DestinationSource, &str) {
        (self.source, self.identifier.as_str())
    }
}

/// Direction of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishKind {
    Add,
    Remove,
}

/// One outcome per destination per publish attempt.
///
/// Outcomes are cumulative across retries: a later retry overwrites the
/// stored outcome for its destination, it never appends a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// The destination this outcome belongs to
    pub destination: PublishDestination,

    /// Whether the attempt succeeded
    pub ok: bool,

    /// Whether the attempt was an add or a remove
    pub kind: PublishKind,
}
