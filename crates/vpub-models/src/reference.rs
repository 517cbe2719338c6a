//! Content references and video identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque content address on the storage network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(pub String);

impl Reference {
    /// Create from an existing string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Reference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Reference {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of the video an editing session is working on.
///
/// Empty until the first save produces a manifest reference. Every save
/// produces a new reference, so an identity change invalidates any in-flight
/// pipeline for the old identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoIdentity(Option<Reference>);

impl VideoIdentity {
    /// Identity of a video that has never been saved.
    pub fn unsaved() -> Self {
        Self(None)
    }

    /// Identity of a saved video.
    pub fn saved(reference: Reference) -> Self {
        Self(Some(reference))
    }

    /// The manifest reference, if the video has been saved.
    pub fn reference(&self) -> Option<&Reference> {
        self.0.as_ref()
    }

    /// True for a not-yet-saved video.
    pub fn is_unsaved(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Display for VideoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(r) => write!(f, "{}", r),
            None => write!(f, "<unsaved>"),
        }
    }
}

impl From<Reference> for VideoIdentity {
    fn from(r: Reference) -> Self {
        Self::saved(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsaved_identity_is_empty() {
        let id = VideoIdentity::unsaved();
        assert!(id.is_unsaved());
        assert!(id.reference().is_none());
    }

    #[test]
    fn test_identity_equality_tracks_reference() {
        let a = VideoIdentity::saved(Reference::new("abc"));
        let b = VideoIdentity::saved(Reference::new("abc"));
        let c = VideoIdentity::saved(Reference::new("def"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, VideoIdentity::unsaved());
    }
}
