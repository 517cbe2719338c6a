//! Upload coordination over the content-addressed storage network.
//!
//! This crate provides:
//! - The `StorageClient` trait (the concrete network client is an external
//!   collaborator; only the interface lives here)
//! - The `UploadCoordinator` with byte-level progress, cancellation and a
//!   confirmed-receipt guarantee
//! - Path download for migration re-fetches
//! - Pin/offer resource operations
//! - An in-memory client for tests

pub mod client;
pub mod coordinator;
pub mod error;
pub mod memory;

pub use client::{ObjectInfo, ProgressFn, StorageClient, UploadOptions};
pub use coordinator::UploadCoordinator;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorageClient;
