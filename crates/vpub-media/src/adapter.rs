//! Encoder adapter with cancellation and event filtering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{EncodeInput, TranscoderBackend};
use crate::error::{MediaError, MediaResult};
use crate::event::EncodeEvent;

/// Buffer size for encoder event channels.
const EVENT_CHANNEL_CAPACITY: usize = 64;

struct ActiveJob {
    generation: u64,
    cancel: CancellationToken,
    forwarder: JoinHandle<()>,
}

struct Inner {
    backend: Arc<dyn TranscoderBackend>,
    generation: AtomicU64,
    active: Mutex<Option<ActiveJob>>,
}

/// Adapter over a [`TranscoderBackend`].
///
/// Serializes encode jobs (one at a time), enforces monotonically
/// non-decreasing progress, and drops all events from a stopped job even
/// when the backend is slow to cancel. Staleness is decided by a job
/// generation counter, not by cancellation-token identity.
#[derive(Clone)]
pub struct TranscoderAdapter {
    inner: Arc<Inner>,
}

impl TranscoderAdapter {
    pub fn new(backend: Arc<dyn TranscoderBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                generation: AtomicU64::new(0),
                active: Mutex::new(None),
            }),
        }
    }

    /// Begin an asynchronous decode+transcode job.
    ///
    /// Returns the receiving end of the job's event stream. Calling this
    /// while a job is running is a caller error; the processing controller
    /// serializes jobs per identity.
    pub async fn start_encoding(
        &self,
        input: EncodeInput,
    ) -> MediaResult<mpsc::Receiver<EncodeEvent>> {
        let mut active = self.inner.active.lock().await;
        if active.is_some() {
            return Err(MediaError::AlreadyEncoding);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();

        let (backend_tx, backend_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        debug!(
            file = %input.file_name,
            size = input.size(),
            generation,
            "Starting encode job"
        );

        // Drive the backend; an error return is surfaced as a Failed event
        // so callers observe a single terminal event either way.
        let backend = Arc::clone(&self.inner.backend);
        let runner_tx = backend_tx.clone();
        let runner_cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.run(input, backend_tx, runner_cancel.clone()).await {
                if runner_cancel.is_cancelled() {
                    debug!("Encode job cancelled: {}", e);
                } else {
                    warn!("Encoder backend failed: {}", e);
                    let _ = runner_tx
                        .send(EncodeEvent::Failed {
                            message: e.to_string(),
                        })
                        .await;
                }
            }
        });

        let inner = Arc::clone(&self.inner);
        let forwarder = tokio::spawn(forward_events(inner, generation, backend_rx, out_tx));

        *active = Some(ActiveJob {
            generation,
            cancel,
            forwarder,
        });

        Ok(out_rx)
    }

    /// Cancel an in-progress job. No-op when idle.
    ///
    /// After this returns the stopped job's generation is stale, so its
    /// forwarder delivers nothing further even if the backend keeps running
    /// for a while.
    pub async fn stop_encoding(&self) {
        let mut active = self.inner.active.lock().await;
        if let Some(job) = active.take() {
            debug!(generation = job.generation, "Stopping encode job");
            // Invalidate before cancelling so in-flight events fail the
            // generation check rather than racing the token.
            self.inner
                .generation
                .fetch_add(1, Ordering::SeqCst);
            job.cancel.cancel();
            job.forwarder.abort();
        }
    }

    /// Whether a job is currently running.
    pub async fn is_encoding(&self) -> bool {
        self.inner.active.lock().await.is_some()
    }
}

/// Forward backend events to the consumer while the job generation is
/// current, clamping progress to be monotonic.
async fn forward_events(
    inner: Arc<Inner>,
    generation: u64,
    mut backend_rx: mpsc::Receiver<EncodeEvent>,
    out_tx: mpsc::Sender<EncodeEvent>,
) {
    let mut last_percent: f32 = 0.0;

    while let Some(event) = backend_rx.recv().await {
        if inner.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "Dropping event from stale encode job");
            break;
        }

        let terminal = matches!(event, EncodeEvent::Completed | EncodeEvent::Failed { .. });

        let event = match event {
            EncodeEvent::Progress { percent } => {
                let clamped = percent.clamp(0.0, 100.0).max(last_percent);
                last_percent = clamped;
                EncodeEvent::Progress { percent: clamped }
            }
            other => other,
        };

        if out_tx.send(event).await.is_err() {
            break;
        }

        if terminal {
            let mut active = inner.active.lock().await;
            if active.as_ref().map(|j| j.generation) == Some(generation) {
                *active = None;
            }
            break;
        }
    }
}
