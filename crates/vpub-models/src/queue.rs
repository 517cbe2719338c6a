//! Upload queue entries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reference::Reference;

/// One in-flight or completed transfer.
///
/// The pipeline keeps one entry per adaptive source plus one for the
/// thumbnail, keyed by `name`: at most one entry per name exists at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Entry identifier, stable across progress updates
    pub id: Uuid,

    /// Transfer name (source quality or "thumbnail")
    pub name: String,

    /// Payload size in bytes
    pub size: u64,

    /// Percentage 0-100 while active, `None` while queued
    pub completion: Option<f32>,

    /// Content address, present only after confirmed receipt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,

    /// Error message for a failed transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueEntry {
    /// Create a queued, unstarted entry.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            size,
            completion: None,
            reference: None,
            error: None,
        }
    }

    /// True once a reference has been recorded.
    pub fn is_completed(&self) -> bool {
        self.reference.is_some()
    }

    /// Record progress, never decreasing and never past 100.
    pub fn set_completion(&mut self, percent: f32) {
        let clamped = percent.clamp(0.0, 100.0);
        match self.completion {
            Some(current) if current > clamped => {}
            _ => self.completion = Some(clamped),
        }
    }

    /// Record terminal success.
    pub fn complete(&mut self, reference: Reference) {
        self.completion = Some(100.0);
        self.reference = Some(reference);
        self.error = None;
    }

    /// Record a failure; a later resume clears it via `set_completion`.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }
}
