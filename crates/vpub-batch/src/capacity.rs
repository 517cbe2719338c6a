//! Pure capacity math.

use vpub_models::AdaptiveSource;

/// Chunk size on the storage network, in bytes.
pub const CHUNK_SIZE: u64 = 4096;

/// Smallest depth the network accepts.
pub const MIN_DEPTH: u8 = 17;

/// Largest depth worth considering; `2^41 * 4096` is multiple petabytes.
pub const MAX_DEPTH: u8 = 41;

/// Headroom multiplier for the manifest, thumbnail and chunk overhead.
const HEADROOM_NUM: u64 = 12;
const HEADROOM_DEN: u64 = 10;

/// Size/bitrate of one encoded source, for capacity estimation.
///
/// Uploaded and not-yet-uploaded renditions both reduce to this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceEstimate {
    /// Encoded size in bytes, 0 when not yet known
    pub size: u64,
    /// Average bitrate in bits per second
    pub bitrate: u64,
}

impl SourceEstimate {
    pub fn new(size: u64, bitrate: u64) -> Self {
        Self { size, bitrate }
    }
}

impl From<&AdaptiveSource> for SourceEstimate {
    fn from(source: &AdaptiveSource) -> Self {
        Self {
            size: source.size,
            bitrate: source.bitrate,
        }
    }
}

/// Capacity in bytes of an allocation at the given depth.
pub fn batch_capacity(depth: u8) -> u64 {
    CHUNK_SIZE.saturating_mul(1u64 << depth.min(MAX_DEPTH))
}

/// Allocation parameters derived from a required capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthAmount {
    pub depth: u8,
    pub amount: u64,
}

/// Estimate the capacity required for a set of encoded sources.
///
/// Sources without a recorded size fall back to `bitrate / 8 * duration`.
/// A 20% headroom covers the manifest and thumbnail.
pub fn calc_batch_size_for_sources(sources: &[SourceEstimate], duration_hint: f64) -> u64 {
    let total: u64 = sources
        .iter()
        .map(|s| {
            if s.size > 0 {
                s.size
            } else {
                ((s.bitrate as f64 / 8.0) * duration_hint.max(0.0)) as u64
            }
        })
        .sum();

    total.saturating_mul(HEADROOM_NUM) / HEADROOM_DEN
}

/// Map a required capacity to allocation parameters.
///
/// Monotonic: a larger size never produces a smaller depth or amount. The
/// resulting capacity always covers the requested size (no
/// under-provisioning).
pub fn calc_depth_amount(size_bytes: u64, price_per_block: u64, ttl_blocks: u64) -> DepthAmount {
    let mut depth = MIN_DEPTH;
    while depth < MAX_DEPTH && batch_capacity(depth) < size_bytes {
        depth += 1;
    }

    DepthAmount {
        depth,
        amount: price_per_block.saturating_mul(ttl_blocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_never_under_provisions() {
        for size in [0u64, 1, CHUNK_SIZE, 50 * 1024 * 1024, 10 * 1024 * 1024 * 1024] {
            let da = calc_depth_amount(size, 24_000, 1000);
            assert!(
                batch_capacity(da.depth) >= size,
                "depth {} under-provisions {} bytes",
                da.depth,
                size
            );
            assert!(da.depth >= MIN_DEPTH);
        }
    }

    #[test]
    fn test_depth_is_monotonic_in_size() {
        let mut last_depth = 0;
        for mb in [1u64, 10, 100, 1000, 10_000] {
            let da = calc_depth_amount(mb * 1024 * 1024, 24_000, 1000);
            assert!(da.depth >= last_depth);
            last_depth = da.depth;
        }
    }

    #[test]
    fn test_size_estimate_uses_recorded_sizes() {
        let sources = vec![SourceEstimate::new(50 * 1024 * 1024, 0)];
        let size = calc_batch_size_for_sources(&sources, 0.0);
        // 50MB plus 20% headroom.
        assert!(size >= 50 * 1024 * 1024);
        assert_eq!(size, 50 * 1024 * 1024 * 12 / 10);
    }

    #[test]
    fn test_size_estimate_falls_back_to_bitrate() {
        // 2 Mbit/s for 100 seconds = 25 MB before headroom.
        let sources = vec![SourceEstimate::new(0, 2_000_000)];
        let size = calc_batch_size_for_sources(&sources, 100.0);
        assert_eq!(size, 25_000_000 * 12 / 10);
    }

    #[test]
    fn test_estimate_from_adaptive_source() {
        let source = vpub_models::AdaptiveSource {
            quality: "720p".to_string(),
            content_type: "video/mp4".to_string(),
            reference: vpub_models::Reference::new("r"),
            size: 1024,
            bitrate: 2_000_000,
        };
        let estimate = SourceEstimate::from(&source);
        assert_eq!(estimate.size, 1024);
        assert_eq!(estimate.bitrate, 2_000_000);
    }
}
