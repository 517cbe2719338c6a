//! Transcoder adapter for the vpub publishing pipeline.
//!
//! This crate provides:
//! - The `TranscoderBackend` trait wrapping an external encoder
//! - Decode/encode event types (duration, aspect ratio, progress, outputs)
//! - An adapter with cancellation and a no-events-after-stop guarantee
//! - Monotonic progress enforcement

pub mod adapter;
pub mod backend;
pub mod error;
pub mod event;

pub use adapter::TranscoderAdapter;
pub use backend::{EncodeInput, TranscoderBackend};
pub use error::{MediaError, MediaResult};
pub use event::{EncodeEvent, EncodedOutput};
