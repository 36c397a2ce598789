//! Job record and its read-only snapshot.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::cancel::CancelSignal;
use super::errors::TransitionError;
use super::ids::JobId;
use super::request::{AudioFormat, SynthesisRequest};
use super::state::{JobState, JobStatus, Transition};

/// One synthesis job.
///
/// Design:
/// - Identity, request and creation time are fixed at construction.
/// - `cancel` is the only thing writable from outside the worker.
/// - `state` changes only through `JobState::apply`, under a per-record
///   lock held for the length of one transition. The lock decides the
///   Pending race between the cancel path and the worker's start.
#[derive(Debug)]
pub struct JobRecord {
    id: JobId,
    request: Arc<SynthesisRequest>,
    created_at: DateTime<Utc>,
    cancel: CancelSignal,
    worker_claimed: AtomicBool,
    evicted: AtomicBool,
    state: Mutex<JobState>,
}

/// What the worker should do after trying to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Now `Running`; go ahead with inference.
    Started,
    /// Cancellation was already requested; the job is `Cancelled`.
    Cancelled,
}

impl JobRecord {
    pub fn new(id: JobId, request: SynthesisRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            request: Arc::new(request),
            created_at,
            cancel: CancelSignal::new(),
            worker_claimed: AtomicBool::new(false),
            evicted: AtomicBool::new(false),
            state: Mutex::new(JobState::new()),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn request(&self) -> &Arc<SynthesisRequest> {
        &self.request
    }

    pub fn format(&self) -> AudioFormat {
        self.request.format
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.is_requested()
    }

    pub fn status(&self) -> JobStatus {
        self.lock_state().status()
    }

    /// Consistent point-in-time copy of everything a reader may want.
    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.lock_state();
        JobSnapshot {
            id: self.id.clone(),
            format: self.request.format,
            status: state.status(),
            created_at: self.created_at,
            started_at: state.started_at(),
            completed_at: state.completed_at(),
            error_message: state.error_message().map(str::to_owned),
            result_location: state.result_location().cloned(),
            cancel_requested: self.cancel.is_requested(),
        }
    }

    /// Claim the single worker slot. Returns `false` if already claimed.
    pub fn claim_worker(&self) -> bool {
        self.worker_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Cancel path: set the flag, and if nothing has started yet, settle the
    /// job as `Cancelled` right away. A running job is left to its worker.
    ///
    /// Returns the status after the call.
    pub fn request_cancel(&self, now: DateTime<Utc>) -> JobStatus {
        self.cancel.request();
        let mut state = self.lock_state();
        if state.status() == JobStatus::Pending {
            // Pending -> Cancelled is always legal.
            let _ = state.apply(Transition::Cancel, now);
        }
        state.status()
    }

    /// Sweeper: the record has left the registry.
    ///
    /// Also requests cancellation so a live worker stops. Once evicted, the
    /// artifact path may belong to a new job with the same id, so the worker
    /// must not write or delete it any more.
    pub fn mark_evicted(&self, now: DateTime<Utc>) {
        self.evicted.store(true, Ordering::Release);
        self.request_cancel(now);
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    /// Worker entry: Pending -> Running, unless cancellation got there first.
    pub fn begin(&self, now: DateTime<Utc>) -> Result<StartOutcome, TransitionError> {
        let mut state = self.lock_state();
        if state.status() == JobStatus::Cancelled {
            return Ok(StartOutcome::Cancelled);
        }
        if self.cancel.is_requested() {
            state.apply(Transition::Cancel, now)?;
            return Ok(StartOutcome::Cancelled);
        }
        state.apply(Transition::Start, now)?;
        Ok(StartOutcome::Started)
    }

    /// Worker exit on success.
    ///
    /// Acts as the last checkpoint: if cancellation was requested while the
    /// artifact was being written, the job ends `Cancelled` instead and the
    /// caller must remove the artifact.
    pub fn complete(&self, location: PathBuf, now: DateTime<Utc>) -> Result<JobStatus, TransitionError> {
        let mut state = self.lock_state();
        if self.cancel.is_requested() {
            state.apply(Transition::Cancel, now)?;
        } else {
            state.apply(Transition::Complete { location }, now)?;
        }
        Ok(state.status())
    }

    pub fn fail(&self, message: String, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.lock_state().apply(Transition::Fail { message }, now)
    }

    pub fn mark_cancelled(&self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.lock_state().apply(Transition::Cancel, now)
    }

    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        // `apply` never leaves a half-written state, so a poisoned lock still
        // guards a consistent value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only view of a job at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub format: AudioFormat,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_location: Option<PathBuf>,
    pub cancel_requested: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> JobRecord {
        JobRecord::new(JobId::parse(id).unwrap(), SynthesisRequest::new("hi"), Utc::now())
    }

    #[test]
    fn new_record_is_pending() {
        let job = record("a");
        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Pending);
        assert!(!snap.cancel_requested);
        assert_eq!(snap.format, AudioFormat::Wav);
    }

    #[test]
    fn worker_slot_is_claimed_once() {
        let job = record("a");
        assert!(job.claim_worker());
        assert!(!job.claim_worker());
    }

    #[test]
    fn cancel_pending_settles_immediately() {
        let job = record("a");
        assert_eq!(job.request_cancel(Utc::now()), JobStatus::Cancelled);
        assert!(job.cancel_requested());
        assert!(job.snapshot().completed_at.is_some());
    }

    #[test]
    fn cancel_running_only_sets_flag() {
        let job = record("a");
        assert_eq!(job.begin(Utc::now()).unwrap(), StartOutcome::Started);
        assert_eq!(job.request_cancel(Utc::now()), JobStatus::Running);
        assert!(job.cancel_requested());
    }

    #[test]
    fn begin_after_cancel_reports_cancelled() {
        let job = record("a");
        job.request_cancel(Utc::now());
        assert_eq!(job.begin(Utc::now()).unwrap(), StartOutcome::Cancelled);
        assert_eq!(job.status(), JobStatus::Cancelled);
        assert!(job.snapshot().started_at.is_none());
    }

    #[test]
    fn complete_after_late_cancel_turns_into_cancelled() {
        let job = record("a");
        job.begin(Utc::now()).unwrap();
        job.request_cancel(Utc::now());
        let status = job.complete("a.wav".into(), Utc::now()).unwrap();
        assert_eq!(status, JobStatus::Cancelled);
        assert!(job.snapshot().result_location.is_none());
    }

    #[test]
    fn eviction_cancels_and_is_sticky() {
        let job = record("a");
        assert!(!job.is_evicted());
        job.mark_evicted(Utc::now());
        assert!(job.is_evicted());
        assert!(job.cancel_requested());
        assert_eq!(job.status(), JobStatus::Cancelled);
    }

    #[test]
    fn cancel_after_complete_keeps_completed() {
        let job = record("a");
        job.begin(Utc::now()).unwrap();
        job.complete("a.wav".into(), Utc::now()).unwrap();

        assert_eq!(job.request_cancel(Utc::now()), JobStatus::Completed);
        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.result_location, Some(PathBuf::from("a.wav")));
        assert!(snap.cancel_requested);
    }

    #[test]
    fn fail_records_message() {
        let job = record("a");
        job.begin(Utc::now()).unwrap();
        job.fail("engine exploded".into(), Utc::now()).unwrap();
        let snap = job.snapshot();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error_message.as_deref(), Some("engine exploded"));
    }
}
