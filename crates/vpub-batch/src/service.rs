//! Allocation service and payment confirmation interfaces.

use async_trait::async_trait;

use vpub_models::{Batch, BatchId};

use crate::error::BatchResult;

/// Storage-capacity allocation service.
///
/// Two concrete implementations exist outside this crate: a managed gateway
/// and a self-hosted node. The allocator works uniformly against either.
#[async_trait]
pub trait AllocationService: Send + Sync {
    /// Fetch the current state of one allocation; `None` when the network
    /// does not know the id.
    async fn fetch_batch(&self, id: &BatchId) -> BatchResult<Option<Batch>>;

    /// Fetch all allocations owned by the caller.
    async fn fetch_batches(&self) -> BatchResult<Vec<Batch>>;

    /// Request a new allocation. Returns the id; visibility and usability
    /// follow after propagation.
    async fn create_batch(&self, depth: u8, amount: u64) -> BatchResult<BatchId>;

    /// Top up an existing allocation's amount (extends its TTL).
    async fn topup_batch(&self, id: &BatchId, amount: u64) -> BatchResult<()>;

    /// Dilute an existing allocation to a larger depth (more capacity).
    async fn dilute_batch(&self, id: &BatchId, depth: u8) -> BatchResult<()>;
}

/// Caller-supplied payment confirmation prompt.
///
/// Awaited before any paid allocation creation; returning `false` aborts
/// the creation with no service call made.
#[async_trait]
pub trait PaymentConfirmer: Send + Sync {
    async fn wait_payment_confirmation(&self, depth: u8, amount: u64) -> bool;
}
