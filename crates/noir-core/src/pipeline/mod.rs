//! The job pipeline: owns every job and drives it through its states.
//!
//! ```text
//! detecting ──► selection_needed ──select_face──► ready ──► processing ──► done
//!     │                                             ▲            │
//!     └──────────────► ready / error                └── error ◄──┘
//! ```
//!
//! Detection runs concurrently (one task per job); enhancement runs strictly
//! one job at a time. Every adapter call is bounded by a per-stage timeout and
//! raced against the pipeline's cancellation token, which `reset` trips.

mod events;
mod job;
mod store;

pub use events::{BatchEvent, BatchSummary, JobOutcome, PipelineStatus};
pub use job::{ImageJob, JobSnapshot};

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::try_join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapters::{AdapterSet, RefineOptions, RefineRequest};
use crate::config::{Config, LimitsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::imaging::{Cropper, Preprocessor};
use crate::style::StyleConfig;
use crate::types::{FaceRegion, ImageFile, JobId, JobState};
use store::JobStore;

/// Failure reason recorded when the face locator errors or times out.
pub const DETECTION_FAILED_REASON: &str = "Face detection failed.";

/// Batch enhancement pipeline.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct JobPipeline {
    inner: Arc<Inner>,
}

struct Inner {
    store: JobStore,
    preprocessor: Preprocessor,
    cropper: Cropper,
    adapters: AdapterSet,
    limits: LimitsConfig,
    cancel: Mutex<CancellationToken>,
    detections: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes enhancement runs (batch or single job).
    run_lock: tokio::sync::Mutex<()>,
}

impl JobPipeline {
    pub fn new(config: &Config, adapters: AdapterSet) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: JobStore::new(),
                preprocessor: Preprocessor::new(
                    config.preprocess.clone(),
                    config.limits.max_file_size_mb,
                ),
                cropper: Cropper::new(config.crop.clone(), config.preprocess.jpeg_quality),
                adapters,
                limits: config.limits.clone(),
                cancel: Mutex::new(CancellationToken::new()),
                detections: Mutex::new(Vec::new()),
                run_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Preprocess `files` and create one job per file, in input order.
    ///
    /// All-or-nothing: if any file fails preprocessing no job is created and
    /// that file's error is returned. Face detection is dispatched for every
    /// new job before this returns; use [`settle`](Self::settle) to wait for it.
    ///
    /// An upload interrupted by [`reset`](Self::reset) creates no jobs and
    /// returns `Cancelled`.
    pub async fn ingest(&self, files: Vec<ImageFile>) -> PipelineResult<Vec<JobId>> {
        let inner = &self.inner;
        let token = inner.token();
        let processed =
            try_join_all(files.iter().map(|file| inner.preprocessor.preprocess(file))).await?;

        // Held until the jobs are in the store so reset cannot interleave.
        let current = inner.lock_cancel();
        if token.is_cancelled() {
            tracing::debug!("Dropping {} preprocessed file(s) after reset", processed.len());
            return Err(PipelineError::Cancelled);
        }
        let mut ids = Vec::with_capacity(processed.len());
        let mut handles = Vec::with_capacity(processed.len());

        for file in processed {
            let id = inner.store.allocate_id();
            inner.store.insert(ImageJob::new(id, file.clone()));
            tracing::debug!("Created {} for {}", id, file.name());

            let task_inner = inner.clone();
            let task_token = token.clone();
            handles.push(tokio::spawn(async move {
                task_inner.detect(id, file, task_token).await;
            }));
            ids.push(id);
        }

        inner.lock_detections().extend(handles);
        drop(current);
        tracing::info!("Ingested {} file(s)", ids.len());
        Ok(ids)
    }

    /// Preprocess `files` into jobs meant only as refinement references.
    ///
    /// All-or-nothing like [`ingest`](Self::ingest), but no face detection
    /// runs: each job is `ready` with its whole preprocessed image.
    pub async fn adopt_references(&self, files: Vec<ImageFile>) -> PipelineResult<Vec<JobId>> {
        let inner = &self.inner;
        let token = inner.token();
        let processed =
            try_join_all(files.iter().map(|file| inner.preprocessor.preprocess(file))).await?;

        let _current = inner.lock_cancel();
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let ids: Vec<JobId> = processed
            .into_iter()
            .map(|file| {
                let id = inner.store.allocate_id();
                tracing::debug!("Adopted {} as reference {}", file.name(), id);
                inner.store.insert(ImageJob::reference(id, file));
                id
            })
            .collect();
        Ok(ids)
    }

    /// Create a finished job from an already enhanced image.
    ///
    /// The file is used as is (no preprocessing, no detection) so that it can
    /// be refined without a prior batch run.
    pub fn adopt_enhanced(&self, file: ImageFile) -> JobId {
        let id = self.inner.store.allocate_id();
        tracing::debug!("Adopted {} as finished {}", file.name(), id);
        self.inner.store.insert(ImageJob::finished(id, file));
        id
    }

    /// Wait until every dispatched detection task has finished.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.lock_detections());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        tracing::error!("Detection task panicked: {e}");
                    }
                }
            }
        }
    }

    /// Choose which detected face to crop for a `selection_needed` job.
    ///
    /// An invalid index is rejected without changing the job. A crop failure
    /// is recorded on the job (state `error`), not returned. Returns the
    /// job's new state.
    pub async fn select_face(&self, id: JobId, index: usize) -> PipelineResult<JobState> {
        let inner = &self.inner;
        let (source, face) = inner
            .store
            .read(id, |job| -> PipelineResult<(ImageFile, FaceRegion)> {
                if job.state() != JobState::SelectionNeeded {
                    return Err(PipelineError::Validation(format!(
                        "{id} is {}, not awaiting face selection",
                        job.state()
                    )));
                }
                let face = job.faces().get(index).copied().ok_or_else(|| {
                    PipelineError::Validation(format!(
                        "face index {index} out of range ({} face(s) detected for {id})",
                        job.faces().len()
                    ))
                })?;
                Ok((job.source().clone(), face))
            })
            .ok_or(PipelineError::JobNotFound(id))??;

        let cropped = inner.cropper.crop(&source, &face).await;
        inner
            .store
            .update(id, |job| -> PipelineResult<JobState> {
                let applied = match cropped {
                    Ok(crop) => job.face_cropped(index, crop),
                    Err(e) => {
                        tracing::warn!("{id}: {e}");
                        job.fail(e.to_string())
                    }
                };
                applied.map_err(PipelineError::Validation)?;
                Ok(job.state())
            })
            .ok_or(PipelineError::JobNotFound(id))?
    }

    /// Enhance every `ready` or `error` job, one at a time, in creation order.
    ///
    /// Rejected without touching any job if a job is still detecting or
    /// awaiting face selection, or if nothing is eligible. A failing job is
    /// recorded and the batch moves on.
    pub async fn run_batch<F>(
        &self,
        style: &StyleConfig,
        mut on_event: F,
    ) -> PipelineResult<BatchSummary>
    where
        F: FnMut(BatchEvent),
    {
        style.validate().map_err(PipelineError::Validation)?;
        let _running = self.inner.try_run_lock()?;

        let eligible = self.inner.store.with_all(|jobs| {
            let pending = jobs.values().filter(|j| j.state().is_pending()).count();
            if pending > 0 {
                return Err(PipelineError::Validation(format!(
                    "{pending} job(s) still detecting faces or awaiting face selection"
                )));
            }
            let ids: Vec<JobId> = jobs
                .values()
                .filter(|j| j.state().is_batch_eligible())
                .map(|j| j.id())
                .collect();
            if ids.is_empty() {
                return Err(PipelineError::Validation(
                    "No jobs are ready for enhancement".to_string(),
                ));
            }
            Ok(ids)
        })?;

        let token = self.inner.token();
        let total = eligible.len();
        let mut summary = BatchSummary::default();
        tracing::info!("Enhancing {} job(s) with style {}", total, style.master_style);
        on_event(BatchEvent::Started { total });

        for (index, id) in eligible.into_iter().enumerate() {
            if token.is_cancelled() {
                tracing::info!("Batch abandoned after reset");
                break;
            }
            on_event(BatchEvent::JobStarted { index, total, id });
            let outcome = self.inner.enhance(id, style, &token).await;
            summary.record(&outcome);
            on_event(BatchEvent::JobFinished {
                index,
                total,
                id,
                outcome,
            });
        }

        tracing::info!(
            "Batch finished: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed
        );
        on_event(BatchEvent::Finished { summary });
        Ok(summary)
    }

    /// Re-run enhancement for one `ready`, `error`, or `done` job.
    pub async fn enhance_job(
        &self,
        id: JobId,
        style: &StyleConfig,
    ) -> PipelineResult<JobOutcome> {
        style.validate().map_err(PipelineError::Validation)?;
        let _running = self.inner.try_run_lock()?;

        let state = self
            .inner
            .store
            .read(id, |job| job.state())
            .ok_or(PipelineError::JobNotFound(id))?;
        if !matches!(state, JobState::Ready | JobState::Error | JobState::Done) {
            return Err(PipelineError::Validation(format!(
                "{id} is {state} and cannot be enhanced"
            )));
        }

        let token = self.inner.token();
        Ok(self.inner.enhance(id, style, &token).await)
    }

    /// Revise the result of a `done` job.
    ///
    /// References are other jobs' best images (result, else process input,
    /// else source). On success only this job's result changes; on failure
    /// nothing changes and `RefinementFailed` is returned.
    pub async fn refine(
        &self,
        id: JobId,
        instruction: &str,
        reference_ids: &[JobId],
        options: RefineOptions,
    ) -> PipelineResult<ImageFile> {
        let inner = &self.inner;
        if instruction.trim().is_empty() {
            return Err(PipelineError::Validation(
                "Refinement instruction must not be empty".to_string(),
            ));
        }

        let target = inner
            .store
            .read(id, |job| match (job.state(), job.result()) {
                (JobState::Done, Some(result)) => Ok(result.clone()),
                (state, _) => Err(PipelineError::Validation(format!(
                    "{id} is {state}; only finished jobs can be refined"
                ))),
            })
            .ok_or(PipelineError::JobNotFound(id))??;

        let references = reference_ids
            .iter()
            .map(|&rid| {
                inner
                    .store
                    .read(rid, |job| job.reference_image().clone())
                    .ok_or(PipelineError::JobNotFound(rid))
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let request = RefineRequest {
            target,
            references,
            instruction: instruction.trim().to_string(),
            options,
        };
        tracing::debug!(
            "Refining {} with {} reference(s) via {}",
            id,
            request.references.len(),
            inner.adapters.refiner.name()
        );

        let token = inner.token();
        let refined = guarded(
            &token,
            "refine",
            inner.limits.refine_timeout_ms,
            inner.adapters.refiner.refine(&request),
        )
        .await
        .map_err(PipelineError::refinement)?;

        inner
            .store
            .update(id, |job| job.replace_result(refined.clone()))
            .ok_or(PipelineError::JobNotFound(id))?
            .map_err(PipelineError::Validation)?;
        tracing::info!("Refined {}", id);
        Ok(refined)
    }

    /// Every job, in creation order.
    pub fn jobs(&self) -> Vec<ImageJob> {
        self.inner.store.all()
    }

    pub fn job(&self, id: JobId) -> Option<ImageJob> {
        self.inner.store.get(id)
    }

    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        self.inner
            .store
            .with_all(|jobs| jobs.values().map(ImageJob::snapshot).collect())
    }

    pub fn status(&self) -> PipelineStatus {
        self.inner.store.with_all(|jobs| {
            let mut status = PipelineStatus::default();
            for job in jobs.values() {
                status.count(job.state());
            }
            status
        })
    }

    /// Discard every job and abandon in-flight adapter calls.
    ///
    /// Late results for discarded jobs are dropped: their ids are gone and
    /// never reused.
    pub fn reset(&self) {
        let inner = &self.inner;
        let discarded = {
            let mut token = inner.lock_cancel();
            token.cancel();
            *token = CancellationToken::new();
            inner.lock_detections().clear();
            inner.store.clear()
        };
        tracing::info!("Reset pipeline, discarded {} job(s)", discarded);
    }
}

impl Inner {
    fn lock_cancel(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_detections(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.detections.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn token(&self) -> CancellationToken {
        self.lock_cancel().clone()
    }

    fn try_run_lock(&self) -> PipelineResult<tokio::sync::MutexGuard<'_, ()>> {
        self.run_lock.try_lock().map_err(|_| {
            PipelineError::Validation("An enhancement run is already in progress".to_string())
        })
    }

    /// Apply a transition to a job that may have been discarded meanwhile.
    fn apply(&self, id: JobId, f: impl FnOnce(&mut ImageJob) -> Result<(), String>) {
        match self.store.update(id, f) {
            None => tracing::debug!("Ignoring late result for discarded {}", id),
            Some(Err(e)) => tracing::debug!("Ignoring stale transition: {}", e),
            Some(Ok(())) => {}
        }
    }

    /// Locate faces for one job and move it out of `detecting`.
    async fn detect(&self, id: JobId, file: ImageFile, token: CancellationToken) {
        let located = guarded(
            &token,
            "detect",
            self.limits.detect_timeout_ms,
            self.adapters.locator.locate_faces(&file),
        )
        .await;

        let faces = match located {
            Ok(faces) => faces,
            Err(PipelineError::Cancelled) => {
                tracing::debug!("Detection for {} cancelled", id);
                return;
            }
            Err(e) => {
                tracing::warn!("{} ({}): {}", id, file.name(), e);
                self.apply(id, |job| job.fail(DETECTION_FAILED_REASON));
                return;
            }
        };

        tracing::debug!("{}: {} face(s) detected", id, faces.len());
        match faces.len() {
            0 => self.apply(id, |job| job.no_faces_found()),
            1 => {
                let face = faces[0];
                self.apply(id, |job| job.single_face_found(face));
                let cropped = self.cropper.crop(&file, &face).await;
                if token.is_cancelled() {
                    return;
                }
                match cropped {
                    Ok(crop) => self.apply(id, |job| job.face_cropped(0, crop)),
                    Err(e) => {
                        tracing::warn!("{}: {}", id, e);
                        self.apply(id, |job| job.fail(e.to_string()));
                    }
                }
            }
            _ => self.apply(id, |job| job.faces_need_selection(faces)),
        }
    }

    /// One enhancement step: `processing`, then `done` or `error`.
    async fn enhance(
        &self,
        id: JobId,
        style: &StyleConfig,
        token: &CancellationToken,
    ) -> JobOutcome {
        let input = match self.store.update(id, |job| job.begin_processing()) {
            Some(Ok(input)) => input,
            Some(Err(e)) => {
                tracing::debug!("Skipping {}: {}", id, e);
                return JobOutcome::Discarded;
            }
            None => return JobOutcome::Discarded,
        };

        let enhanced = guarded(
            token,
            "enhance",
            self.limits.enhance_timeout_ms,
            self.adapters.enhancer.enhance(&input, style),
        )
        .await;

        let (outcome, applied) = match enhanced {
            Ok(result) => (
                JobOutcome::Succeeded,
                self.store.update(id, |job| job.finish_processing(result)),
            ),
            Err(PipelineError::Cancelled) => return JobOutcome::Discarded,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!("Enhancement failed for {}: {}", id, reason);
                let applied = self
                    .store
                    .update(id, |job| job.fail_processing(reason.clone()));
                (JobOutcome::Failed { reason }, applied)
            }
        };

        match applied {
            Some(Ok(())) => outcome,
            Some(Err(e)) => {
                tracing::debug!("Ignoring stale transition: {}", e);
                JobOutcome::Discarded
            }
            None => {
                tracing::debug!("Ignoring late result for discarded {}", id);
                JobOutcome::Discarded
            }
        }
    }
}

/// Bound an adapter call by `timeout_ms` and abandon it on cancellation.
async fn guarded<T>(
    token: &CancellationToken,
    stage: &str,
    timeout_ms: u64,
    call: impl Future<Output = PipelineResult<T>>,
) -> PipelineResult<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PipelineError::Cancelled),
        result = tokio::time::timeout(Duration::from_millis(timeout_ms), call) => {
            result.unwrap_or_else(|_| {
                Err(PipelineError::Timeout {
                    stage: stage.to_string(),
                    timeout_ms,
                })
            })
        }
    }
}
