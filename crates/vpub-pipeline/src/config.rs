//! Pipeline configuration.

use std::time::Duration;

use vpub_batch::BatchAllocatorConfig;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Batch allocator tuning
    pub allocator: BatchAllocatorConfig,
    /// Pin uploaded content on the local node
    pub pin_uploads: bool,
    /// Playlist receiving migrated videos
    pub channel_playlist: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            allocator: BatchAllocatorConfig::default(),
            pin_uploads: false,
            channel_playlist: "channel".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = BatchAllocatorConfig::default();
        Self {
            allocator: BatchAllocatorConfig {
                poll_interval: Duration::from_secs(
                    std::env::var("VPUB_BATCH_POLL_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.poll_interval.as_secs()),
                ),
                not_found_timeout: Duration::from_secs(
                    std::env::var("VPUB_BATCH_NOT_FOUND_TIMEOUT_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.not_found_timeout.as_secs()),
                ),
                propagation_timeout: Duration::from_secs(
                    std::env::var("VPUB_BATCH_PROPAGATION_TIMEOUT_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.propagation_timeout.as_secs()),
                ),
                price_per_block: std::env::var("VPUB_PRICE_PER_BLOCK")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.price_per_block),
                ttl_blocks: std::env::var("VPUB_BATCH_TTL_BLOCKS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.ttl_blocks),
            },
            pin_uploads: std::env::var("VPUB_PIN_UPLOADS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            channel_playlist: std::env::var("VPUB_CHANNEL_PLAYLIST")
                .unwrap_or_else(|_| "channel".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(!config.pin_uploads);
        assert_eq!(config.channel_playlist, "channel");
        assert_eq!(config.allocator.poll_interval, Duration::from_secs(2));
    }
}
