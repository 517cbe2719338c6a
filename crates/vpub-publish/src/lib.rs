//! Multi-destination publishing.
//!
//! This crate provides:
//! - The `IndexClient` and `PlaylistStore` traits (concrete HTTP/feed
//!   clients are external collaborators)
//! - Playlist membership updates with reference deduplication and
//!   timestamp-preserving replacement
//! - The `PublishCoordinator`: manifest upload, resource pin/offer
//!   handling, best-effort destination fan-out with one cumulative outcome
//!   per destination, and the retry-without-re-upload path
//! - In-memory index/playlist doubles for tests

pub mod coordinator;
pub mod error;
pub mod index;
pub mod playlist;
pub mod testing;

pub use coordinator::{PlaylistReplaceOp, PublishCoordinator, SaveOptions};
pub use error::{IndexError, PublishError, PublishResult};
pub use index::{IndexClient, IndexVideo};
pub use playlist::{Playlist, PlaylistStore, PlaylistVideo};
