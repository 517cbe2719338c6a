//! Encoder events.

use vpub_models::source::quality_from_height;

/// One encoded output file produced by the encoder.
#[derive(Debug, Clone)]
pub struct EncodedOutput {
    /// Output file name as emitted by the encoder
    pub name: String,

    /// Quality label derived from the output resolution
    pub quality: String,

    /// MIME type of the payload
    pub content_type: String,

    /// Raw encoded bytes
    pub data: Vec<u8>,

    /// Average bitrate in bits per second
    pub bitrate: u64,
}

impl EncodedOutput {
    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Build an output labelled from its vertical resolution.
    pub fn for_height(name: impl Into<String>, height: u32, data: Vec<u8>, bitrate: u64) -> Self {
        Self {
            name: name.into(),
            quality: quality_from_height(height),
            content_type: "video/mp4".to_string(),
            data,
            bitrate,
        }
    }
}

/// Events emitted while decoding and transcoding, in issuance order:
/// duration, aspect ratio, zero or more progress updates, then one
/// `FileCompleted` per output followed by `Completed`, or `Failed`.
#[derive(Debug, Clone)]
pub enum EncodeEvent {
    /// Input duration decoded, in seconds
    DurationDecoded { seconds: f64 },

    /// Input aspect ratio decoded (width / height)
    AspectRatioDecoded { ratio: f32 },

    /// Overall encode progress, 0-100
    Progress { percent: f32 },

    /// One output file finished encoding
    FileCompleted(EncodedOutput),

    /// All outputs produced
    Completed,

    /// The encoder failed; no further events follow
    Failed { message: String },
}
