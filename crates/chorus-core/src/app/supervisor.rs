//! Supervisor - runs one job on its own tokio task.
//!
//! # Flow
//! 1. Claim the record's single worker slot
//! 2. Pending -> Running (or straight to Cancelled if already requested)
//! 3. Pull the synthesis stream, dropping segments, keeping the final audio;
//!    the cancel signal is checked after every item
//! 4. Encode and persist the artifact
//! 5. Record the terminal state
//!
//! Nothing that goes wrong in 3-4 escapes the task: it ends up as `Failed`
//! with a message on the record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::domain::{
    ExecutionError, JobError, JobRecord, JobStatus, StartOutcome, SynthesisOutput,
};
use crate::ports::{ArtifactStore, AudioEncoder, Clock, Synthesizer};

/// How a run ended when it did not fail.
#[derive(Debug)]
enum RunEnd {
    Produced(PathBuf),
    Cancelled,
}

pub struct Supervisor {
    synthesizer: Arc<dyn Synthesizer>,
    encoder: Arc<dyn AudioEncoder>,
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
}

impl Supervisor {
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        encoder: Arc<dyn AudioEncoder>,
        store: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            synthesizer,
            encoder,
            store,
            clock,
        }
    }

    /// Spawn the worker for `record` and return immediately.
    ///
    /// A record gets at most one worker; a second call is `AlreadyStarted`.
    pub fn start(self: &Arc<Self>, record: Arc<JobRecord>) -> Result<JoinHandle<()>, JobError> {
        if !record.claim_worker() {
            return Err(JobError::AlreadyStarted(record.id().clone()));
        }

        let this = Arc::clone(self);
        let span = info_span!("job", job_id = %record.id());
        let handle = tokio::spawn(
            async move {
                // Run on a nested task so a panicking engine is observed as a
                // JoinError here instead of leaving the record Running forever.
                let inner = {
                    let this = Arc::clone(&this);
                    let record = Arc::clone(&record);
                    tokio::spawn(async move { this.run(&record).await }.in_current_span())
                };
                if let Err(e) = inner.await
                    && e.is_panic()
                {
                    error!("worker panicked");
                    if let Err(e) = record.fail("worker panicked".to_string(), this.clock.now()) {
                        warn!(error = %e, "could not record panic");
                    }
                }
            }
            .instrument(span),
        );
        Ok(handle)
    }

    async fn run(&self, record: &JobRecord) {
        match record.begin(self.clock.now()) {
            Ok(StartOutcome::Started) => {}
            Ok(StartOutcome::Cancelled) => {
                info!("cancelled before start");
                return;
            }
            Err(e) => {
                warn!(error = %e, "job could not start");
                return;
            }
        }

        match self.execute(record).await {
            Ok(RunEnd::Produced(location)) => self.finish(record, location).await,
            Ok(RunEnd::Cancelled) => {
                self.discard_partial(record).await;
                if let Err(e) = record.mark_cancelled(self.clock.now()) {
                    warn!(error = %e, "could not record cancellation");
                }
                info!("cancelled while running");
            }
            Err(e) => {
                error!(error = %e, "job failed");
                if let Err(e) = record.fail(e.to_string(), self.clock.now()) {
                    warn!(error = %e, "could not record failure");
                }
            }
        }
    }

    async fn execute(&self, record: &JobRecord) -> Result<RunEnd, ExecutionError> {
        let cancel = record.cancel_signal().clone();
        let mut stream = self
            .synthesizer
            .synthesize(record.request(), cancel.clone())
            .await?;

        let mut audio = None;
        while let Some(item) = stream.next().await {
            if cancel.checkpoint().is_err() {
                return Ok(RunEnd::Cancelled);
            }
            match item? {
                SynthesisOutput::Segment(_) => continue,
                SynthesisOutput::Final(buffer) => {
                    audio = Some(buffer);
                    break;
                }
            }
        }
        // The engine may stop early on cancel without reporting anything.
        if cancel.checkpoint().is_err() {
            return Ok(RunEnd::Cancelled);
        }
        let audio = audio.ok_or(ExecutionError::NoResult)?;

        let bytes = self.encoder.encode(&audio, record.format())?;
        // Last chance to stay off the artifact path; eviction also lands here.
        if cancel.checkpoint().is_err() {
            return Ok(RunEnd::Cancelled);
        }
        let location = self.store.put(record.id(), record.format(), &bytes).await?;
        Ok(RunEnd::Produced(location))
    }

    async fn finish(&self, record: &JobRecord, location: PathBuf) {
        match record.complete(location.clone(), self.clock.now()) {
            Ok(JobStatus::Completed) => {
                let snap = record.snapshot();
                let elapsed = snap
                    .started_at
                    .zip(snap.completed_at)
                    .map(|(start, end)| (end - start).num_milliseconds())
                    .unwrap_or_default();
                info!(elapsed_ms = elapsed, location = %location.display(), "job completed");
            }
            Ok(_) => {
                // Cancel arrived while the artifact was being written.
                self.discard(record, &location).await;
                info!("cancelled after producing audio");
            }
            Err(e) => {
                warn!(error = %e, "could not record completion");
                self.discard(record, &location).await;
            }
        }
    }

    async fn discard_partial(&self, record: &JobRecord) {
        let location = self.store.location_for(record.id(), record.format());
        self.discard(record, &location).await;
    }

    async fn discard(&self, record: &JobRecord, location: &Path) {
        // After eviction the path may already hold a newer job's artifact.
        if record.is_evicted() {
            debug!(location = %location.display(), "record evicted, leaving artifact path alone");
            return;
        }
        if let Err(e) = self.store.delete(location).await {
            warn!(error = %e, location = %location.display(), "failed to delete artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::domain::{
        ArtifactError, AudioBuffer, AudioFormat, CancelSignal, JobId, SynthesisError,
        SynthesisRequest,
    };
    use crate::impls::{LocalArtifactStore, PcmEncoder, VecStream};
    use crate::ports::{ArtifactStore, SynthesisStream, SystemClock};

    /// Returns a canned list of outputs; can block until released.
    struct Scripted {
        outputs: Mutex<Option<Vec<Result<SynthesisOutput, SynthesisError>>>>,
        gate: Option<Arc<tokio::sync::Notify>>,
    }

    impl Scripted {
        fn new(outputs: Vec<Result<SynthesisOutput, SynthesisError>>) -> Self {
            Self {
                outputs: Mutex::new(Some(outputs)),
                gate: None,
            }
        }

        fn gated(outputs: Vec<Result<SynthesisOutput, SynthesisError>>, gate: Arc<tokio::sync::Notify>) -> Self {
            Self {
                outputs: Mutex::new(Some(outputs)),
                gate: Some(gate),
            }
        }
    }

    #[async_trait]
    impl Synthesizer for Scripted {
        async fn synthesize(
            &self,
            _request: &SynthesisRequest,
            _cancel: CancelSignal,
        ) -> Result<Box<dyn SynthesisStream>, SynthesisError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let outputs = self.outputs.lock().unwrap().take().unwrap_or_default();
            Ok(Box::new(VecStream::new(outputs)))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Synthesizer for Panicking {
        async fn synthesize(
            &self,
            _request: &SynthesisRequest,
            _cancel: CancelSignal,
        ) -> Result<Box<dyn SynthesisStream>, SynthesisError> {
            panic!("engine bug");
        }
    }

    fn final_audio() -> SynthesisOutput {
        SynthesisOutput::Final(AudioBuffer::new(8_000, vec![0.25; 80]))
    }

    fn supervisor(synth: impl Synthesizer + 'static, dir: &std::path::Path) -> Arc<Supervisor> {
        Arc::new(Supervisor::new(
            Arc::new(synth),
            Arc::new(PcmEncoder),
            Arc::new(LocalArtifactStore::new(dir)),
            Arc::new(SystemClock),
        ))
    }

    fn record(id: &str) -> Arc<JobRecord> {
        Arc::new(JobRecord::new(
            JobId::parse(id).unwrap(),
            SynthesisRequest::new("hello"),
            chrono::Utc::now(),
        ))
    }

    #[tokio::test]
    async fn keeps_only_final_output() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(
            Scripted::new(vec![
                Ok(SynthesisOutput::Segment(vec![9; 10])),
                Ok(SynthesisOutput::Segment(vec![9; 10])),
                Ok(final_audio()),
            ]),
            dir.path(),
        );
        let job = record("a");
        sup.start(Arc::clone(&job)).unwrap().await.unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Completed);
        let path = snap.result_location.unwrap();
        assert_eq!(path, dir.path().join("a.wav"));
        // 44-byte header + 80 samples * 2 bytes, no segment bytes
        assert_eq!(std::fs::read(path).unwrap().len(), 44 + 160);
    }

    #[tokio::test]
    async fn stream_without_final_fails_with_no_result() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(
            Scripted::new(vec![Ok(SynthesisOutput::Segment(vec![1]))]),
            dir.path(),
        );
        let job = record("a");
        sup.start(Arc::clone(&job)).unwrap().await.unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error_message.as_deref(), Some("no result produced"));
        assert!(snap.result_location.is_none());
    }

    #[tokio::test]
    async fn engine_error_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(
            Scripted::new(vec![Err(SynthesisError::Engine("out of memory".into()))]),
            dir.path(),
        );
        let job = record("a");
        sup.start(Arc::clone(&job)).unwrap().await.unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Failed);
        assert!(snap.error_message.unwrap().contains("out of memory"));
    }

    #[tokio::test]
    async fn encode_error_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(Scripted::new(vec![Ok(final_audio())]), dir.path());
        let job = Arc::new(JobRecord::new(
            JobId::parse("a").unwrap(),
            SynthesisRequest::new("hello").with_format(crate::domain::AudioFormat::Mp3),
            chrono::Utc::now(),
        ));
        sup.start(Arc::clone(&job)).unwrap().await.unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Failed);
        assert!(snap.error_message.unwrap().contains("mp3"));
    }

    #[tokio::test]
    async fn artifact_write_error_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(
            Scripted::new(vec![Ok(final_audio())]),
            &dir.path().join("missing"),
        );
        let job = record("a");
        sup.start(Arc::clone(&job)).unwrap().await.unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_runs_engine() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(Panicking, dir.path());
        let job = record("a");
        job.request_cancel(chrono::Utc::now());

        sup.start(Arc::clone(&job)).unwrap().await.unwrap();
        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Cancelled);
        assert!(snap.started_at.is_none());
        assert!(!dir.path().join("a.wav").exists());
    }

    #[tokio::test]
    async fn cancel_while_running_ends_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        let sup = supervisor(
            Scripted::gated(vec![Ok(final_audio())], Arc::clone(&gate)),
            dir.path(),
        );
        let job = record("a");
        let handle = sup.start(Arc::clone(&job)).unwrap();

        // wait until the worker is inside the engine
        while job.status() != JobStatus::Running {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(job.request_cancel(chrono::Utc::now()), JobStatus::Running);
        gate.notify_one();
        handle.await.unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Cancelled);
        assert!(snap.result_location.is_none());
        assert!(!dir.path().join("a.wav").exists());
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(Scripted::new(vec![Ok(final_audio())]), dir.path());
        let job = record("a");
        let handle = sup.start(Arc::clone(&job)).unwrap();
        assert!(matches!(
            sup.start(Arc::clone(&job)),
            Err(JobError::AlreadyStarted(_))
        ));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn panicking_engine_is_recorded_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(Panicking, dir.path());
        let job = record("a");
        sup.start(Arc::clone(&job)).unwrap().await.unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error_message.as_deref(), Some("worker panicked"));
    }

    /// Local store that requests cancellation of `record` right after a write.
    struct CancelOnPut {
        inner: LocalArtifactStore,
        record: Arc<JobRecord>,
    }

    #[async_trait]
    impl ArtifactStore for CancelOnPut {
        async fn ensure_ready(&self) -> Result<(), ArtifactError> {
            self.inner.ensure_ready().await
        }

        fn location_for(&self, id: &JobId, format: AudioFormat) -> PathBuf {
            self.inner.location_for(id, format)
        }

        async fn put(&self, id: &JobId, format: AudioFormat, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
            let path = self.inner.put(id, format, bytes).await?;
            self.record.request_cancel(chrono::Utc::now());
            Ok(path)
        }

        async fn read(&self, location: &Path) -> Result<Vec<u8>, ArtifactError> {
            self.inner.read(location).await
        }

        async fn delete(&self, location: &Path) -> Result<bool, ArtifactError> {
            self.inner.delete(location).await
        }
    }

    #[tokio::test]
    async fn cancel_during_artifact_write_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = record("a");
        let store = Arc::new(CancelOnPut {
            inner: LocalArtifactStore::new(dir.path()),
            record: Arc::clone(&job),
        });
        let sup = Arc::new(Supervisor::new(
            Arc::new(Scripted::new(vec![Ok(final_audio())])),
            Arc::new(PcmEncoder),
            store,
            Arc::new(SystemClock),
        ));
        sup.start(Arc::clone(&job)).unwrap().await.unwrap();

        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Cancelled);
        assert!(snap.result_location.is_none());
        assert!(snap.completed_at.is_some());
        assert!(!dir.path().join("a.wav").exists());
    }

    #[tokio::test]
    async fn evicted_worker_leaves_a_reused_artifact_path_alone() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        let sup = supervisor(
            Scripted::gated(vec![Ok(final_audio())], Arc::clone(&gate)),
            dir.path(),
        );
        let job = record("a");
        let handle = sup.start(Arc::clone(&job)).unwrap();

        while job.status() != JobStatus::Running {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // a newer job with the same id already owns the path
        let path = dir.path().join("a.wav");
        std::fs::write(&path, b"newer").unwrap();
        job.mark_evicted(chrono::Utc::now());
        gate.notify_one();
        handle.await.unwrap();

        assert_eq!(job.status(), JobStatus::Cancelled);
        assert_eq!(std::fs::read(&path).unwrap(), b"newer");
    }
}
