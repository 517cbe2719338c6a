//! Session pipeline orchestration for vpub.
//!
//! This crate provides:
//! - The `ProcessingController`: one editing session's encode → batch →
//!   upload pipeline, with an identity guard, a transfer ledger and a
//!   broadcast event stream
//! - Resume operations for the batch and upload phases
//! - The `MigrationOrchestrator`: bulk re-save of outdated manifests with
//!   one deferred playlist patch
//! - Configuration and tracing setup

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod logging;
pub mod migration;

pub use config::PipelineConfig;
pub use controller::{ProcessingController, THUMBNAIL_NAME};
pub use error::{PipelineError, PipelineResult};
pub use events::{PipelineChange, PipelineEvent, PipelineEvents};
pub use logging::SessionLogger;
pub use migration::{
    videos_needing_migration, MigrationOrchestrator, MigrationReport, MigrationRunState,
    MigrationVideo,
};
