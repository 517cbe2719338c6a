//! Postage batch allocation lifecycle.
//!
//! This crate provides:
//! - The `AllocationService` trait (managed gateway and self-hosted node
//!   both implement it; the allocator works uniformly against either)
//! - The `PaymentConfirmer` trait (caller-supplied confirmation prompt)
//! - Pure capacity math (`calc_batch_size_for_sources`, `calc_depth_amount`)
//! - Creation with payment confirmation and propagation polling
//! - The not-found / rejected failure taxonomy

pub mod allocator;
pub mod capacity;
pub mod error;
pub mod service;

pub use allocator::{BatchAllocator, BatchAllocatorConfig, LoadedBatches};
pub use capacity::{
    batch_capacity, calc_batch_size_for_sources, calc_depth_amount, DepthAmount, SourceEstimate,
};
pub use error::{BatchError, BatchResult};
pub use service::{AllocationService, PaymentConfirmer};
