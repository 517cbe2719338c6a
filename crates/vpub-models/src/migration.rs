//! Bulk migration status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-video step during a bulk migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationStep {
    /// Re-fetching the original source
    Downloading,
    /// Re-validating or recreating the batch
    BatchId,
    /// Re-saving the manifest
    Saving,
    /// Migration of this video completed
    Done,
    /// Migration of this video failed
    Error,
}

impl MigrationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStep::Downloading => "downloading",
            MigrationStep::BatchId => "batchId",
            MigrationStep::Saving => "saving",
            MigrationStep::Done => "done",
            MigrationStep::Error => "error",
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of one video through the migration pipeline, keyed by the
/// video's original reference in the orchestrator's status map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationStatus {
    /// Download percentage 0-100, meaningful while `Downloading`
    pub download_progress: f32,

    /// Current step
    pub status: MigrationStep,

    /// Error message when `status == Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationStatus {
    /// Initial status for a video entering the run.
    pub fn downloading() -> Self {
        Self {
            download_progress: 0.0,
            status: MigrationStep::Downloading,
            error: None,
        }
    }

    /// Terminal failure status.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            download_progress: 0.0,
            status: MigrationStep::Error,
            error: Some(error.into()),
        }
    }
}
