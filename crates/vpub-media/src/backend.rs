//! Black-box encoder backend.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::MediaResult;
use crate::event::EncodeEvent;

/// Raw input media handed to the encoder.
#[derive(Debug, Clone)]
pub struct EncodeInput {
    /// Original file name (used to name outputs)
    pub file_name: String,

    /// Raw media bytes
    pub data: Vec<u8>,
}

impl EncodeInput {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// Input size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// External encoder, treated as a black box that emits events and produces
/// named output files.
///
/// Implementations run the whole decode+transcode job, sending events on
/// `events` in issuance order and honoring `cancel` promptly. A slow-to-cancel
/// backend is tolerated: the adapter drops events from a stopped job, so
/// backends only need best-effort cancellation.
#[async_trait]
pub trait TranscoderBackend: Send + Sync {
    async fn run(
        &self,
        input: EncodeInput,
        events: mpsc::Sender<EncodeEvent>,
        cancel: CancellationToken,
    ) -> MediaResult<()>;
}
