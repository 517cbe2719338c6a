//! Processing controller.
//!
//! Owns one editing session's pipeline: transcode, ensure an allocation,
//! upload the outputs. Every spawned stage re-checks the session identity
//! before touching state, so work belonging to an abandoned identity can
//! never mutate the current session.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vpub_batch::{calc_batch_size_for_sources, BatchAllocator, BatchError, SourceEstimate};
use vpub_media::{EncodeEvent, EncodeInput, EncodedOutput, MediaError, TranscoderAdapter};
use vpub_models::{
    AdaptiveSource, Batch, BatchId, BatchState, EncodingState, PipelinePhase, QueueEntry,
    Reference, UploadState, VideoIdentity, VideoManifest,
};
use vpub_storage::{ProgressFn, StorageError, UploadCoordinator, UploadOptions};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::events::{PipelineChange, PipelineEvent, PipelineEvents, EVENT_CHANNEL_CAPACITY};
use crate::logging::SessionLogger;

/// Ledger name of the thumbnail transfer.
pub const THUMBNAIL_NAME: &str = "thumbnail";

#[derive(Clone)]
struct PendingThumbnail {
    content_type: String,
    data: Vec<u8>,
}

/// Mutable per-session state, guarded by one lock.
///
/// Never held across an await; async stages snapshot what they need, do the
/// slow work, then re-enter through the identity guard.
#[derive(Default)]
struct SessionState {
    identity: VideoIdentity,
    encoding: EncodingState,
    batch: BatchState,
    upload: UploadState,
    duration: Option<f64>,
    aspect_ratio: Option<f32>,
    original_quality: Option<String>,
    outputs: Vec<EncodedOutput>,
    sources: Vec<AdaptiveSource>,
    thumbnail: Option<PendingThumbnail>,
    thumbnail_reference: Option<Reference>,
    queue: Vec<QueueEntry>,
    current_batch: Option<Batch>,
    cancel: CancellationToken,
}

impl SessionState {
    /// Insert a fresh ledger entry for `name`, replacing any previous entry
    /// with the same name in place.
    fn upsert_queue(&mut self, name: &str, size: u64) {
        let fresh = QueueEntry::new(name, size);
        match self.queue.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = fresh,
            None => self.queue.push(fresh),
        }
    }

    fn queue_entry_mut(&mut self, name: &str) -> Option<&mut QueueEntry> {
        self.queue.iter_mut().find(|e| e.name == name)
    }

    /// Mean completion across the ledger, 0-100.
    fn overall_upload_percent(&self) -> f32 {
        if self.queue.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .queue
            .iter()
            .map(|e| e.completion.unwrap_or(0.0))
            .sum();
        sum / self.queue.len() as f32
    }

    fn phase(&self) -> PipelinePhase {
        PipelinePhase::derive(&self.encoding, &self.batch, &self.upload)
    }
}

struct ControllerInner {
    transcoder: TranscoderAdapter,
    allocator: BatchAllocator,
    uploader: UploadCoordinator,
    config: PipelineConfig,
    events: broadcast::Sender<PipelineEvent>,
    state: Mutex<SessionState>,
}

impl ControllerInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Run `f` against the session state only if `identity` is still the
    /// current one. Returns `None` for stale callers.
    fn with_state<R>(
        &self,
        identity: &VideoIdentity,
        f: impl FnOnce(&mut SessionState) -> R,
    ) -> Option<R> {
        let mut state = self.lock();
        if state.identity != *identity {
            debug!(identity = %identity, "Dropping mutation from stale session");
            return None;
        }
        Some(f(&mut state))
    }

    fn emit(&self, identity: &VideoIdentity, change: PipelineChange) {
        let _ = self.events.send(PipelineEvent {
            identity: identity.clone(),
            change,
        });
    }

    fn emit_phase(&self, state: &SessionState) {
        self.emit(&state.identity, PipelineChange::Phase(state.phase()));
    }

    fn set_encoding(&self, identity: &VideoIdentity, value: EncodingState) -> bool {
        self.with_state(identity, |s| {
            s.encoding = value.clone();
            self.emit(identity, PipelineChange::Encoding(value));
            self.emit_phase(s);
        })
        .is_some()
    }

    fn set_batch(&self, identity: &VideoIdentity, value: BatchState) -> bool {
        self.with_state(identity, |s| {
            s.batch = value.clone();
            self.emit(identity, PipelineChange::Batch(value));
            self.emit_phase(s);
        })
        .is_some()
    }

    fn set_upload(&self, identity: &VideoIdentity, value: UploadState) -> bool {
        self.with_state(identity, |s| {
            s.upload = value.clone();
            self.emit(identity, PipelineChange::Upload(value));
            self.emit_phase(s);
        })
        .is_some()
    }
}

/// One editing session's publishing pipeline.
///
/// Owned per session; two open editors hold two controllers. State is
/// observable through [`subscribe`](Self::subscribe) and the snapshot
/// accessors.
#[derive(Clone)]
pub struct ProcessingController {
    inner: Arc<ControllerInner>,
}

impl ProcessingController {
    pub fn new(
        transcoder: TranscoderAdapter,
        allocator: BatchAllocator,
        uploader: UploadCoordinator,
        config: PipelineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                transcoder,
                allocator,
                uploader,
                config,
                events,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Subscribe to state-change events. Any number of subscribers.
    pub fn subscribe(&self) -> PipelineEvents {
        self.inner.events.subscribe()
    }

    pub fn identity(&self) -> VideoIdentity {
        self.inner.lock().identity.clone()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.inner.lock().phase()
    }

    pub fn encoding_state(&self) -> EncodingState {
        self.inner.lock().encoding.clone()
    }

    pub fn batch_state(&self) -> BatchState {
        self.inner.lock().batch.clone()
    }

    pub fn upload_state(&self) -> UploadState {
        self.inner.lock().upload.clone()
    }

    /// Snapshot of the transfer ledger.
    pub fn queue(&self) -> Vec<QueueEntry> {
        self.inner.lock().queue.clone()
    }

    /// Sources uploaded so far.
    pub fn sources(&self) -> Vec<AdaptiveSource> {
        self.inner.lock().sources.clone()
    }

    pub fn duration(&self) -> Option<f64> {
        self.inner.lock().duration
    }

    pub fn aspect_ratio(&self) -> Option<f32> {
        self.inner.lock().aspect_ratio
    }

    pub fn current_batch(&self) -> Option<Batch> {
        self.inner.lock().current_batch.clone()
    }

    pub fn thumbnail_reference(&self) -> Option<Reference> {
        self.inner.lock().thumbnail_reference.clone()
    }

    /// Switch the session to a different video.
    ///
    /// All in-flight work for the previous identity is cancelled and the
    /// session state rebuilt from scratch; late results from the old
    /// identity fail the guard and are dropped.
    pub async fn set_identity(&self, identity: VideoIdentity) {
        {
            let mut state = self.inner.lock();
            if state.identity == identity {
                return;
            }
            state.cancel.cancel();
            *state = SessionState {
                identity: identity.clone(),
                ..SessionState::default()
            };
        }
        self.inner.transcoder.stop_encoding().await;
        info!(identity = %identity, "Session identity switched");
    }

    /// Abandon the current attempt, keeping the identity and any allocation
    /// already created (it is reusable and was paid for).
    pub async fn reset(&self) {
        let identity = {
            let mut state = self.inner.lock();
            state.cancel.cancel();
            let identity = state.identity.clone();
            let current_batch = state.current_batch.take();
            *state = SessionState {
                identity: identity.clone(),
                current_batch,
                ..SessionState::default()
            };
            identity
        };
        self.inner.transcoder.stop_encoding().await;
        debug!(identity = %identity, "Session reset");
    }

    /// Cancel in-flight work without clearing state. Resume operations
    /// re-arm cancellation.
    pub async fn stop(&self) {
        self.inner.lock().cancel.cancel();
        self.inner.transcoder.stop_encoding().await;
    }

    /// Adopt an existing allocation, e.g. from a previously saved manifest.
    /// It is re-validated against the network before any upload.
    pub fn use_batch(&self, batch: Batch) {
        self.inner.lock().current_batch = Some(batch);
    }

    /// Stage a thumbnail for upload alongside the sources.
    pub fn set_thumbnail(&self, content_type: impl Into<String>, data: Vec<u8>) {
        let mut state = self.inner.lock();
        let size = data.len() as u64;
        state.thumbnail = Some(PendingThumbnail {
            content_type: content_type.into(),
            data,
        });
        state.thumbnail_reference = None;
        state.upsert_queue(THUMBNAIL_NAME, size);
        if matches!(state.upload, UploadState::Done) {
            // A new thumbnail re-opens the upload phase.
            state.upload = UploadState::Idle;
        }
        let identity = state.identity.clone();
        self.inner
            .emit(&identity, PipelineChange::Queue(state.queue.clone()));
    }

    /// Feed the input video, starting the full pipeline: encode, ensure an
    /// allocation, upload.
    ///
    /// Returns immediately; progress is observable through events. Fails
    /// when an encode is already running for this session.
    pub async fn set_input(&self, file_name: &str, data: Vec<u8>) -> PipelineResult<()> {
        if data.is_empty() {
            return Err(PipelineError::validation("input file is empty"));
        }

        let identity = {
            let mut state = self.inner.lock();
            if matches!(
                state.encoding,
                EncodingState::Loading | EncodingState::Progress { .. }
            ) {
                return Err(PipelineError::Media(MediaError::AlreadyEncoding));
            }
            if state.cancel.is_cancelled() {
                state.cancel = CancellationToken::new();
            }
            // A new input restarts the pipeline; a staged thumbnail survives.
            state.encoding = EncodingState::Loading;
            state.upload = UploadState::Idle;
            state.duration = None;
            state.aspect_ratio = None;
            state.original_quality = None;
            state.outputs.clear();
            state.sources.clear();
            state.queue.retain(|e| e.name == THUMBNAIL_NAME);

            let identity = state.identity.clone();
            self.inner
                .emit(&identity, PipelineChange::Encoding(EncodingState::Loading));
            self.inner.emit_phase(&state);
            identity
        };

        let rx = match self
            .inner
            .transcoder
            .start_encoding(EncodeInput::new(file_name, data))
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                self.inner.set_encoding(&identity, EncodingState::Idle);
                return Err(e.into());
            }
        };

        let logger = SessionLogger::new(&identity, "publish_pipeline");
        logger.log_start(file_name);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(drive_pipeline(inner, identity, rx, logger));
        Ok(())
    }

    /// Recovery path for an allocation that exists but cannot back the
    /// upload (rejected or expiring): dilute it to cover the encoded
    /// outputs, top its amount up, and wait for it to become usable again.
    /// Continues into uploads on success.
    pub async fn update_batch(&self) -> PipelineResult<()> {
        let (identity, batch, size) = {
            let mut state = self.inner.lock();
            if !matches!(state.encoding, EncodingState::Done) {
                return Err(PipelineError::validation("encoding has not completed"));
            }
            let Some(batch) = state.current_batch.clone() else {
                return Err(PipelineError::validation("no allocation to update"));
            };
            if state.cancel.is_cancelled() {
                state.cancel = CancellationToken::new();
            }
            let estimates: Vec<SourceEstimate> = state
                .outputs
                .iter()
                .map(|o| SourceEstimate::new(o.size(), o.bitrate))
                .collect();
            let size = calc_batch_size_for_sources(&estimates, state.duration.unwrap_or(0.0));
            (state.identity.clone(), batch, size)
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let logger = SessionLogger::new(&identity, "batch_update");
            if !inner.set_batch(&identity, BatchState::Updating) {
                return;
            }
            if let Err(e) = inner.allocator.dilute_for_size(&batch.id, size).await {
                logger.log_error(&format!("dilute failed: {}", e));
                inner.set_batch(&identity, BatchState::Rejected);
                return;
            }
            if let Err(e) = inner.allocator.topup(&batch.id, batch.amount).await {
                logger.log_error(&format!("topup failed: {}", e));
                inner.set_batch(&identity, BatchState::Rejected);
                return;
            }
            let cancel = inner
                .with_state(&identity, |s| s.cancel.clone())
                .unwrap_or_default();
            if await_propagation(&inner, &identity, batch, &cancel).await {
                run_uploads(&inner, &identity, &logger).await;
            }
        });
        Ok(())
    }

    /// Re-enter the batch phase after a not-found/rejected outcome, then
    /// continue into uploads on success.
    pub async fn resume_batch_loading(&self) -> PipelineResult<()> {
        let identity = {
            let mut state = self.inner.lock();
            if !matches!(state.encoding, EncodingState::Done) {
                return Err(PipelineError::validation("encoding has not completed"));
            }
            if state.batch.is_ready() {
                return Err(PipelineError::validation("batch is already usable"));
            }
            if state.cancel.is_cancelled() {
                state.cancel = CancellationToken::new();
            }
            state.identity.clone()
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let logger = SessionLogger::new(&identity, "batch_resume");
            if ensure_batch(&inner, &identity).await {
                run_uploads(&inner, &identity, &logger).await;
            }
        });
        Ok(())
    }

    /// Re-run the upload phase, skipping transfers that already hold a
    /// confirmed reference.
    pub async fn resume_upload(&self) -> PipelineResult<()> {
        let identity = {
            let mut state = self.inner.lock();
            if !state.batch.is_ready() {
                return Err(PipelineError::validation("no usable batch"));
            }
            if matches!(state.upload, UploadState::Progress { .. }) {
                return Err(PipelineError::validation("upload already in progress"));
            }
            if state.cancel.is_cancelled() {
                state.cancel = CancellationToken::new();
            }
            // Claim the upload phase before the lock drops, so a second
            // resume arriving before the task runs hits the guard above.
            let percent = state.overall_upload_percent();
            state.upload = UploadState::Progress { percent };
            self.inner
                .emit(&state.identity, PipelineChange::Upload(state.upload.clone()));
            self.inner.emit_phase(&state);
            state.identity.clone()
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let logger = SessionLogger::new(&identity, "upload_resume");
            run_uploads(&inner, &identity, &logger).await;
        });
        Ok(())
    }

    /// Assemble the manifest from the session's collected results.
    ///
    /// Purely local validation: failures here mean required pipeline results
    /// are missing, and no network call has been made.
    pub fn build_manifest(
        &self,
        title: &str,
        description: &str,
    ) -> PipelineResult<VideoManifest> {
        let state = self.inner.lock();

        if title.trim().is_empty() {
            return Err(PipelineError::validation("video has no title"));
        }
        let duration = state
            .duration
            .ok_or_else(|| PipelineError::validation("video has no duration"))?;
        let batch_id: BatchId = match &state.batch {
            BatchState::Ready { id } => id.clone(),
            _ => return Err(PipelineError::validation("video has no usable batch")),
        };
        if state.sources.is_empty() {
            return Err(PipelineError::validation("video has no sources"));
        }
        let original_quality = state
            .original_quality
            .clone()
            .ok_or_else(|| PipelineError::validation("video has no original quality"))?;

        let mut manifest = VideoManifest::new(title, duration, original_quality);
        manifest.description = description.to_string();
        manifest.sources = state.sources.clone();
        manifest.thumbnail = state.thumbnail_reference.clone();
        manifest.batch_id = Some(batch_id);
        Ok(manifest)
    }
}

enum EventOutcome {
    Continue,
    EncodeDone,
    Abort,
}

/// Consume encoder events, then run the batch and upload phases.
async fn drive_pipeline(
    inner: Arc<ControllerInner>,
    identity: VideoIdentity,
    mut rx: mpsc::Receiver<EncodeEvent>,
    logger: SessionLogger,
) {
    while let Some(event) = rx.recv().await {
        match apply_encode_event(&inner, &identity, event, &logger) {
            EventOutcome::Continue => {}
            EventOutcome::EncodeDone => break,
            EventOutcome::Abort => return,
        }
    }

    // The channel can close without a terminal event when the job was
    // stopped; only proceed past a confirmed completion.
    let done = inner
        .with_state(&identity, |s| matches!(s.encoding, EncodingState::Done))
        .unwrap_or(false);
    if !done {
        return;
    }

    if ensure_batch(&inner, &identity).await {
        run_uploads(&inner, &identity, &logger).await;
    }
}

fn apply_encode_event(
    inner: &ControllerInner,
    identity: &VideoIdentity,
    event: EncodeEvent,
    logger: &SessionLogger,
) -> EventOutcome {
    inner
        .with_state(identity, |s| match event {
            EncodeEvent::DurationDecoded { seconds } => {
                s.duration = Some(seconds);
                inner.emit(identity, PipelineChange::DurationDecoded { seconds });
                EventOutcome::Continue
            }
            EncodeEvent::AspectRatioDecoded { ratio } => {
                s.aspect_ratio = Some(ratio);
                inner.emit(identity, PipelineChange::AspectRatioDecoded { ratio });
                EventOutcome::Continue
            }
            EncodeEvent::Progress { percent } => {
                s.encoding = EncodingState::Progress { percent };
                inner.emit(identity, PipelineChange::Encoding(s.encoding.clone()));
                inner.emit_phase(s);
                EventOutcome::Continue
            }
            EncodeEvent::FileCompleted(output) => {
                // The encoder emits the original-resolution rendition first.
                if s.original_quality.is_none() {
                    s.original_quality = Some(output.quality.clone());
                }
                s.upsert_queue(&output.name, output.size());
                s.outputs.push(output);
                inner.emit(identity, PipelineChange::Queue(s.queue.clone()));
                EventOutcome::Continue
            }
            EncodeEvent::Completed => {
                s.encoding = EncodingState::Done;
                inner.emit(identity, PipelineChange::Encoding(EncodingState::Done));
                inner.emit_phase(s);
                logger.log_progress("encoding completed");
                EventOutcome::EncodeDone
            }
            EncodeEvent::Failed { message } => {
                logger.log_error(&message);
                s.encoding = EncodingState::Error {
                    message: message.clone(),
                };
                inner.emit(identity, PipelineChange::Encoding(s.encoding.clone()));
                inner.emit_phase(s);
                EventOutcome::Abort
            }
        })
        .unwrap_or(EventOutcome::Abort)
}

/// Make sure a usable allocation backs the session. Re-validates an adopted
/// allocation first; otherwise creates one sized from the encoded outputs.
/// Returns true when the batch sub-phase reached `Ready`.
async fn ensure_batch(inner: &Arc<ControllerInner>, identity: &VideoIdentity) -> bool {
    let snapshot = inner.with_state(identity, |s| {
        let estimates: Vec<SourceEstimate> = s
            .outputs
            .iter()
            .map(|o| SourceEstimate::new(o.size(), o.bitrate))
            .collect();
        (
            s.current_batch.clone(),
            estimates,
            s.duration.unwrap_or(0.0),
            s.cancel.clone(),
        )
    });
    let Some((existing, estimates, duration, cancel)) = snapshot else {
        return false;
    };

    if let Some(batch) = existing {
        if !inner.set_batch(identity, BatchState::Fetching) {
            return false;
        }
        match inner
            .allocator
            .load_batches(std::slice::from_ref(&batch.id))
            .await
        {
            Ok(loaded) => {
                if let Some(usable) = loaded.usable.into_iter().next() {
                    let id = usable.id.clone();
                    inner.with_state(identity, |s| s.current_batch = Some(usable));
                    return inner.set_batch(identity, BatchState::Ready { id });
                }
                if let Some(pending) = loaded.unusable.into_iter().next() {
                    // Visible but not yet usable: give it the propagation
                    // window before declaring it rejected.
                    return await_propagation(inner, identity, pending, &cancel).await;
                }
                // Gone from the network; create a replacement below.
                inner.with_state(identity, |s| s.current_batch = None);
            }
            Err(e) => {
                warn!(identity = %identity, "Batch lookup failed: {}", e);
                inner.set_batch(identity, BatchState::NotFound);
                return false;
            }
        }
    }

    if !inner.set_batch(identity, BatchState::Creating) {
        return false;
    }
    let size = calc_batch_size_for_sources(&estimates, duration);
    match inner.allocator.create_batch_for_size(size).await {
        Ok(created) => {
            inner.with_state(identity, |s| s.current_batch = Some(created.clone()));
            await_propagation(inner, identity, created, &cancel).await
        }
        Err(BatchError::ConfirmationDeclined) => {
            info!(identity = %identity, "Batch payment declined, aborting save");
            inner.set_batch(identity, BatchState::Rejected);
            false
        }
        Err(BatchError::Cancelled) => false,
        Err(e) => {
            warn!(identity = %identity, "Batch creation failed: {}", e);
            inner.set_batch(identity, BatchState::NotFound);
            false
        }
    }
}

async fn await_propagation(
    inner: &Arc<ControllerInner>,
    identity: &VideoIdentity,
    batch: Batch,
    cancel: &CancellationToken,
) -> bool {
    if !inner.set_batch(identity, BatchState::Propagation) {
        return false;
    }
    match inner.allocator.wait_batch_propagation(&batch, cancel).await {
        Ok(ready) => {
            let id = ready.id.clone();
            inner.with_state(identity, |s| s.current_batch = Some(ready));
            inner.set_batch(identity, BatchState::Ready { id })
        }
        Err(BatchError::NotFound(_)) => {
            inner.set_batch(identity, BatchState::NotFound);
            false
        }
        Err(BatchError::Rejected(_)) => {
            inner.set_batch(identity, BatchState::Rejected);
            false
        }
        Err(BatchError::Cancelled) => false,
        Err(e) => {
            warn!(identity = %identity, "Batch propagation poll failed: {}", e);
            inner.set_batch(identity, BatchState::NotFound);
            false
        }
    }
}

/// Upload every output (and the staged thumbnail) that does not yet hold a
/// confirmed reference. Transfers that already completed are skipped, which
/// makes resuming after a failure cheap.
async fn run_uploads(
    inner: &Arc<ControllerInner>,
    identity: &VideoIdentity,
    logger: &SessionLogger,
) {
    let snapshot = inner.with_state(identity, |s| {
        let batch_id = match &s.batch {
            BatchState::Ready { id } => Some(id.clone()),
            _ => None,
        };
        let pending: Vec<EncodedOutput> = s
            .outputs
            .iter()
            .filter(|o| {
                !s.queue
                    .iter()
                    .any(|e| e.name == o.name && e.is_completed())
            })
            .cloned()
            .collect();
        let thumbnail = if s.thumbnail_reference.is_none() {
            s.thumbnail.clone()
        } else {
            None
        };
        (batch_id, pending, thumbnail, s.cancel.clone())
    });
    let Some((Some(batch_id), pending, thumbnail, cancel)) = snapshot else {
        return;
    };

    let percent = inner
        .with_state(identity, |s| s.overall_upload_percent())
        .unwrap_or(0.0);
    if !inner.set_upload(identity, UploadState::Progress { percent }) {
        return;
    }

    for output in pending {
        let opts = UploadOptions::new(batch_id.clone(), output.content_type.clone())
            .with_pin(inner.config.pin_uploads);
        let progress = file_progress(inner, identity, &output.name);

        match inner
            .uploader
            .upload(&output.data, &opts, Some(progress), &cancel)
            .await
        {
            Ok(reference) => {
                let current = inner.with_state(identity, |s| {
                    if let Some(entry) = s.queue_entry_mut(&output.name) {
                        entry.complete(reference.clone());
                    }
                    AdaptiveSource::upsert(
                        &mut s.sources,
                        AdaptiveSource {
                            quality: output.quality.clone(),
                            content_type: output.content_type.clone(),
                            reference,
                            size: output.size(),
                            bitrate: output.bitrate,
                        },
                    );
                    inner.emit(identity, PipelineChange::Queue(s.queue.clone()));
                });
                if current.is_none() {
                    return;
                }
            }
            Err(StorageError::Cancelled) => return,
            Err(e) => {
                fail_upload(inner, identity, &output.name, &e, logger);
                return;
            }
        }
    }

    if let Some(thumb) = thumbnail {
        let opts = UploadOptions::new(batch_id, thumb.content_type.clone())
            .with_pin(inner.config.pin_uploads);
        let progress = file_progress(inner, identity, THUMBNAIL_NAME);

        match inner
            .uploader
            .upload(&thumb.data, &opts, Some(progress), &cancel)
            .await
        {
            Ok(reference) => {
                let current = inner.with_state(identity, |s| {
                    if let Some(entry) = s.queue_entry_mut(THUMBNAIL_NAME) {
                        entry.complete(reference.clone());
                    }
                    s.thumbnail_reference = Some(reference);
                    inner.emit(identity, PipelineChange::Queue(s.queue.clone()));
                });
                if current.is_none() {
                    return;
                }
            }
            Err(StorageError::Cancelled) => return,
            Err(e) => {
                fail_upload(inner, identity, THUMBNAIL_NAME, &e, logger);
                return;
            }
        }
    }

    if inner.set_upload(identity, UploadState::Done) {
        logger.log_completion("all transfers confirmed");
    }
}

fn fail_upload(
    inner: &ControllerInner,
    identity: &VideoIdentity,
    name: &str,
    error: &StorageError,
    logger: &SessionLogger,
) {
    logger.log_error(&format!("upload of {} failed: {}", name, error));
    inner.with_state(identity, |s| {
        if let Some(entry) = s.queue_entry_mut(name) {
            entry.fail(error.to_string());
        }
        s.upload = UploadState::Error {
            message: error.to_string(),
        };
        inner.emit(identity, PipelineChange::Queue(s.queue.clone()));
        inner.emit(identity, PipelineChange::Upload(s.upload.clone()));
        inner.emit_phase(s);
    });
}

/// Per-file progress callback that also refreshes the overall percentage.
fn file_progress(
    inner: &Arc<ControllerInner>,
    identity: &VideoIdentity,
    name: &str,
) -> ProgressFn {
    let inner = Arc::clone(inner);
    let identity = identity.clone();
    let name = name.to_string();
    Arc::new(move |percent: f32| {
        inner.with_state(&identity, |s| {
            if let Some(entry) = s.queue_entry_mut(&name) {
                entry.set_completion(percent);
            }
            s.upload = UploadState::Progress {
                percent: s.overall_upload_percent(),
            };
            inner.emit(&identity, PipelineChange::Upload(s.upload.clone()));
            inner.emit(&identity, PipelineChange::Queue(s.queue.clone()));
        });
    })
}
