//! Shared data models for the vpub publishing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Content references and video identity
//! - Adaptive sources and the versioned video manifest
//! - Postage batches (storage-capacity allocations)
//! - Upload queue entries
//! - Publish destinations and outcomes
//! - Bulk migration status
//! - Per-sub-phase pipeline states and the derived top-level phase

pub mod batch;
pub mod manifest;
pub mod migration;
pub mod publish;
pub mod queue;
pub mod reference;
pub mod source;
pub mod state;

// Re-export common types
pub use batch::{Batch, BatchId};
pub use manifest::{VideoManifest, CURRENT_MANIFEST_VERSION};
pub use migration::{MigrationStatus, MigrationStep};
pub use publish::{DestinationSource, PublishDestination, PublishKind, PublishOutcome};
pub use queue::QueueEntry;
pub use reference::{Reference, VideoIdentity};
pub use source::AdaptiveSource;
pub use state::{BatchState, EncodingState, PipelinePhase, UploadState};
