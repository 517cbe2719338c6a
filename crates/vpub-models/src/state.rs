//! Pipeline sub-phase states.
//!
//! Each sub-phase carries exactly one tagged state; the top-level phase is
//! derived by a pure function so inconsistent flag combinations cannot be
//! represented.

use serde::{Deserialize, Serialize};

use crate::batch::BatchId;

/// Transcoding sub-phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum EncodingState {
    #[default]
    Idle,
    /// Decoding input metadata, no progress yet
    Loading,
    /// Encoding, percentage 0-100
    Progress { percent: f32 },
    Done,
    Error { message: String },
}

/// Batch allocation sub-phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum BatchState {
    #[default]
    Idle,
    /// A new allocation is being created
    Creating,
    /// An existing allocation is being topped up or diluted
    Updating,
    /// Looking up the current allocation
    Fetching,
    /// Waiting for the allocation to become visible/usable
    Propagation,
    /// The allocation never became visible
    NotFound,
    /// The allocation exists but is flagged unusable
    Rejected,
    /// The allocation is usable
    Ready { id: BatchId },
}

impl BatchState {
    /// True when an allocation is usable for uploads.
    pub fn is_ready(&self) -> bool {
        matches!(self, BatchState::Ready { .. })
    }

    /// True for the two allocation-fatal terminal states.
    pub fn is_failed(&self) -> bool {
        matches!(self, BatchState::NotFound | BatchState::Rejected)
    }
}

/// Upload sub-phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum UploadState {
    #[default]
    Idle,
    /// Uploading, overall percentage 0-100
    Progress { percent: f32 },
    Done,
    Error { message: String },
}

/// Derived top-level pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Idle,
    Encoding,
    Batch,
    Uploading,
    Ready,
    Error,
}

impl PipelinePhase {
    /// Compute the top-level phase from the three sub-phase states.
    ///
    /// Pure: the sub-phase states are the single source of truth.
    pub fn derive(encoding: &EncodingState, batch: &BatchState, upload: &UploadState) -> Self {
        if matches!(encoding, EncodingState::Error { .. })
            || matches!(upload, UploadState::Error { .. })
            || batch.is_failed()
        {
            return PipelinePhase::Error;
        }
        match encoding {
            EncodingState::Idle => return PipelinePhase::Idle,
            EncodingState::Loading | EncodingState::Progress { .. } => {
                return PipelinePhase::Encoding
            }
            EncodingState::Done => {}
            EncodingState::Error { .. } => unreachable!("handled above"),
        }
        match upload {
            UploadState::Done => PipelinePhase::Ready,
            UploadState::Progress { .. } => PipelinePhase::Uploading,
            UploadState::Idle => PipelinePhase::Batch,
            UploadState::Error { .. } => unreachable!("handled above"),
        }
    }
}
