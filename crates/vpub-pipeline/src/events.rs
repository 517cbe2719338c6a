//! Pipeline event stream.

use tokio::sync::broadcast;

use vpub_models::{
    BatchState, EncodingState, PipelinePhase, QueueEntry, UploadState, VideoIdentity,
};

/// Buffer size for the broadcast event channel. A slow subscriber lags and
/// skips rather than blocking the pipeline.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One observable pipeline state change.
///
/// Every event carries the identity it belongs to; subscribers working on a
/// different video filter by it.
#[derive(Debug, Clone)]
pub struct PipelineEvent {
    pub identity: VideoIdentity,
    pub change: PipelineChange,
}

/// What changed.
#[derive(Debug, Clone)]
pub enum PipelineChange {
    /// Transcoding sub-phase moved
    Encoding(EncodingState),
    /// Input duration decoded, in seconds
    DurationDecoded { seconds: f64 },
    /// Input aspect ratio decoded (width / height)
    AspectRatioDecoded { ratio: f32 },
    /// Batch sub-phase moved
    Batch(BatchState),
    /// Upload sub-phase moved
    Upload(UploadState),
    /// The transfer ledger changed (entry added, progressed or settled)
    Queue(Vec<QueueEntry>),
    /// The derived top-level phase changed
    Phase(PipelinePhase),
}

/// Subscriber handle, re-exported for callers that store one.
pub type PipelineEvents = broadcast::Receiver<PipelineEvent>;
