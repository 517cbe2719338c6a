//! Batch allocator.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vpub_models::{Batch, BatchId};

use crate::capacity::{calc_batch_size_for_sources, calc_depth_amount, DepthAmount, SourceEstimate};
use crate::error::{BatchError, BatchResult};
use crate::service::{AllocationService, PaymentConfirmer};

/// Allocator tuning.
#[derive(Debug, Clone)]
pub struct BatchAllocatorConfig {
    /// Interval between propagation polls
    pub poll_interval: Duration,
    /// How long a created allocation may stay invisible before it is
    /// declared not found
    pub not_found_timeout: Duration,
    /// How long a visible allocation may stay unusable before it is
    /// declared rejected
    pub propagation_timeout: Duration,
    /// Network price per block, used for amount calculation
    pub price_per_block: u64,
    /// Time-to-live of new allocations, in blocks
    pub ttl_blocks: u64,
}

impl Default for BatchAllocatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            not_found_timeout: Duration::from_secs(60),
            propagation_timeout: Duration::from_secs(300),
            price_per_block: 24_000,
            // One year at a 5 second block time.
            ttl_blocks: 365 * 24 * 3600 / 5,
        }
    }
}

/// Result of loading known allocation ids.
///
/// Missing and unusable allocations are reported, not fatal; the caller
/// decides whether to create a new one or update an existing one.
#[derive(Debug, Default)]
pub struct LoadedBatches {
    /// Allocations ready to back uploads
    pub usable: Vec<Batch>,
    /// Ids the network no longer knows
    pub missing: Vec<BatchId>,
    /// Allocations that exist but cannot back uploads (expired or rejected)
    pub unusable: Vec<Batch>,
}

/// Manages the lifecycle of storage-capacity allocations.
#[derive(Clone)]
pub struct BatchAllocator {
    service: Arc<dyn AllocationService>,
    confirmer: Arc<dyn PaymentConfirmer>,
    config: BatchAllocatorConfig,
}

impl BatchAllocator {
    pub fn new(
        service: Arc<dyn AllocationService>,
        confirmer: Arc<dyn PaymentConfirmer>,
        config: BatchAllocatorConfig,
    ) -> Self {
        Self {
            service,
            confirmer,
            config,
        }
    }

    /// Fetch current state for known allocation ids, classifying each as
    /// usable, missing or unusable.
    pub async fn load_batches(&self, ids: &[BatchId]) -> BatchResult<LoadedBatches> {
        let mut loaded = LoadedBatches::default();

        for id in ids {
            match self.service.fetch_batch(id).await? {
                Some(batch) if batch.is_ready() => loaded.usable.push(batch),
                Some(batch) => {
                    warn!(batch_id = %id, ttl = batch.ttl, usable = batch.usable, "Batch not usable");
                    loaded.unusable.push(batch);
                }
                None => {
                    warn!(batch_id = %id, "Batch no longer exists");
                    loaded.missing.push(id.clone());
                }
            }
        }

        Ok(loaded)
    }

    /// Estimate the capacity required for a set of sources.
    pub fn size_for_sources(&self, sources: &[SourceEstimate], duration_hint: f64) -> u64 {
        calc_batch_size_for_sources(sources, duration_hint)
    }

    /// Allocation parameters for a required capacity.
    pub fn depth_amount_for_size(&self, size_bytes: u64) -> DepthAmount {
        calc_depth_amount(size_bytes, self.config.price_per_block, self.config.ttl_blocks)
    }

    /// Request a new allocation sized to at least `size_bytes`.
    ///
    /// Payment confirmation is awaited first; a decline aborts cleanly with
    /// no allocation created. The returned batch has not propagated yet;
    /// follow with [`wait_batch_propagation`](Self::wait_batch_propagation).
    pub async fn create_batch_for_size(&self, size_bytes: u64) -> BatchResult<Batch> {
        let DepthAmount { depth, amount } = self.depth_amount_for_size(size_bytes);

        debug!(size_bytes, depth, amount, "Requesting payment confirmation");
        if !self.confirmer.wait_payment_confirmation(depth, amount).await {
            info!(depth, amount, "Payment confirmation declined");
            return Err(BatchError::ConfirmationDeclined);
        }

        let id = self.service.create_batch(depth, amount).await?;
        info!(batch_id = %id, depth, amount, "Batch created");

        Ok(Batch {
            id,
            depth,
            amount,
            usable: false,
            exists: false,
            ttl: (self.config.ttl_blocks * 5) as i64,
        })
    }

    /// Poll until the allocation is visible and usable on the network.
    ///
    /// Observed states, in order: creating, propagation, then usable or one
    /// of the two terminal failures. An allocation that never becomes
    /// visible within the not-found window yields [`BatchError::NotFound`];
    /// one that stays unusable past the propagation window yields
    /// [`BatchError::Rejected`]. Cancellation leaves the allocation's
    /// existence state queryable; creation already happened, nothing is
    /// rolled back.
    pub async fn wait_batch_propagation(
        &self,
        batch: &Batch,
        cancel: &CancellationToken,
    ) -> BatchResult<Batch> {
        let started = tokio::time::Instant::now();
        let mut seen_on_network = batch.exists;

        loop {
            if cancel.is_cancelled() {
                return Err(BatchError::Cancelled);
            }

            match self.service.fetch_batch(&batch.id).await? {
                Some(current) if current.usable => {
                    info!(batch_id = %batch.id, "Batch propagated and usable");
                    return Ok(current);
                }
                Some(current) => {
                    seen_on_network = true;
                    if started.elapsed() >= self.config.propagation_timeout {
                        warn!(batch_id = %batch.id, ttl = current.ttl, "Batch rejected");
                        return Err(BatchError::Rejected(batch.id.clone()));
                    }
                    debug!(batch_id = %batch.id, "Batch visible, awaiting usability");
                }
                None => {
                    let window = if seen_on_network {
                        // Dropped out after being visible: treat like the
                        // propagation window rather than failing instantly.
                        self.config.propagation_timeout
                    } else {
                        self.config.not_found_timeout
                    };
                    if started.elapsed() >= window {
                        warn!(batch_id = %batch.id, "Batch never became visible");
                        return Err(BatchError::NotFound(batch.id.clone()));
                    }
                    debug!(batch_id = %batch.id, "Batch not yet visible");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = cancel.cancelled() => return Err(BatchError::Cancelled),
            }
        }
    }

    /// Top up an allocation's amount, extending its TTL.
    pub async fn topup(&self, id: &BatchId, amount: u64) -> BatchResult<()> {
        self.service.topup_batch(id, amount).await
    }

    /// Dilute an allocation to cover at least `size_bytes`.
    pub async fn dilute_for_size(&self, id: &BatchId, size_bytes: u64) -> BatchResult<()> {
        let DepthAmount { depth, .. } = self.depth_amount_for_size(size_bytes);
        self.service.dilute_batch(id, depth).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Service whose fetch answers follow a script, one per poll.
    struct ScriptedService {
        fetch_script: Mutex<Vec<Option<Batch>>>,
        created: Mutex<Vec<(u8, u64)>>,
    }

    impl ScriptedService {
        fn new(script: Vec<Option<Batch>>) -> Self {
            Self {
                fetch_script: Mutex::new(script),
                created: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AllocationService for ScriptedService {
        async fn fetch_batch(&self, id: &BatchId) -> BatchResult<Option<Batch>> {
            let mut script = self.fetch_script.lock().unwrap();
            if script.is_empty() {
                return Ok(None);
            }
            let mut answer = script.remove(0);
            if let Some(batch) = answer.as_mut() {
                batch.id = id.clone();
            }
            Ok(answer)
        }

        async fn fetch_batches(&self) -> BatchResult<Vec<Batch>> {
            Ok(Vec::new())
        }

        async fn create_batch(&self, depth: u8, amount: u64) -> BatchResult<BatchId> {
            self.created.lock().unwrap().push((depth, amount));
            Ok(BatchId::new("created-1"))
        }

        async fn topup_batch(&self, _id: &BatchId, _amount: u64) -> BatchResult<()> {
            Ok(())
        }

        async fn dilute_batch(&self, _id: &BatchId, _depth: u8) -> BatchResult<()> {
            Ok(())
        }
    }

    struct Confirmer {
        accept: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PaymentConfirmer for Confirmer {
        async fn wait_payment_confirmation(&self, _depth: u8, _amount: u64) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.accept
        }
    }

    fn fast_config() -> BatchAllocatorConfig {
        BatchAllocatorConfig {
            poll_interval: Duration::from_millis(1),
            not_found_timeout: Duration::from_millis(20),
            propagation_timeout: Duration::from_millis(50),
            ..Default::default()
        }
    }

    fn batch(usable: bool, ttl: i64) -> Batch {
        Batch {
            id: BatchId::new("b"),
            depth: 20,
            amount: 1000,
            usable,
            exists: true,
            ttl,
        }
    }

    fn allocator(service: Arc<ScriptedService>, accept: bool) -> BatchAllocator {
        BatchAllocator::new(
            service,
            Arc::new(Confirmer {
                accept,
                calls: AtomicU32::new(0),
            }),
            fast_config(),
        )
    }

    #[tokio::test]
    async fn test_declined_confirmation_creates_nothing() {
        let service = Arc::new(ScriptedService::new(vec![]));
        let allocator = allocator(service.clone(), false);

        let err = allocator
            .create_batch_for_size(50 * 1024 * 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::ConfirmationDeclined));
        assert!(service.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_requests_confirmed_parameters() {
        let service = Arc::new(ScriptedService::new(vec![]));
        let allocator = allocator(service.clone(), true);

        let created = allocator
            .create_batch_for_size(50 * 1024 * 1024)
            .await
            .unwrap();

        let requested = service.created.lock().unwrap();
        assert_eq!(requested.len(), 1);
        assert_eq!(requested[0].0, created.depth);
        assert!(crate::capacity::batch_capacity(created.depth) >= 50 * 1024 * 1024);
        assert!(!created.usable);
    }

    #[tokio::test]
    async fn test_propagation_polls_until_usable() {
        let service = Arc::new(ScriptedService::new(vec![
            None,
            Some(batch(false, 1000)),
            Some(batch(true, 1000)),
        ]));
        let allocator = allocator(service, true);
        let pending = batch(false, 1000);

        let cancel = CancellationToken::new();
        let propagated = allocator
            .wait_batch_propagation(&pending, &cancel)
            .await
            .unwrap();
        assert!(propagated.usable);
    }

    #[tokio::test]
    async fn test_invisible_batch_is_not_found() {
        let allocator = allocator(Arc::new(ScriptedService::new(vec![])), true);
        let mut pending = batch(false, 1000);
        pending.exists = false;

        let cancel = CancellationToken::new();
        let err = allocator
            .wait_batch_propagation(&pending, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stuck_unusable_batch_is_rejected() {
        // Visible on every poll, never usable.
        let script: Vec<Option<Batch>> = (0..200).map(|_| Some(batch(false, 1000))).collect();
        let allocator = allocator(Arc::new(ScriptedService::new(script)), true);

        let cancel = CancellationToken::new();
        let err = allocator
            .wait_batch_propagation(&batch(false, 1000), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_cancelled_wait_returns_cancelled() {
        let script: Vec<Option<Batch>> = (0..200).map(|_| Some(batch(false, 1000))).collect();
        let allocator = allocator(Arc::new(ScriptedService::new(script)), true);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = allocator
            .wait_batch_propagation(&batch(false, 1000), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Cancelled));
    }

    #[tokio::test]
    async fn test_load_batches_classifies() {
        let service = Arc::new(ScriptedService::new(vec![
            Some(batch(true, 1000)),
            None,
            Some(batch(true, 0)),
        ]));
        let allocator = allocator(service, true);

        let loaded = allocator
            .load_batches(&[BatchId::new("a"), BatchId::new("b"), BatchId::new("c")])
            .await
            .unwrap();

        assert_eq!(loaded.usable.len(), 1);
        assert_eq!(loaded.missing, vec![BatchId::new("b")]);
        assert_eq!(loaded.unusable.len(), 1);
    }
}
