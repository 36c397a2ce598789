//! Job state machine.
//!
//! State transitions:
//! - Pending -> Running -> Completed
//! - Pending -> Running -> Failed
//! - Pending -> Running -> Cancelled
//! - Pending -> Cancelled (cancelled before a worker picked it up)
//!
//! `JobState::apply` is the only place that changes a status. Every legal
//! edge is listed in its match; everything else is a `TransitionError`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, no worker has started inference yet.
    Pending,

    /// A worker is running inference.
    Running,

    /// Artifact written, ready for download.
    Completed,

    /// Inference or artifact serialization raised an error.
    Failed,

    /// Cancelled by the user.
    Cancelled,
}

impl JobStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Would `cancel` still affect a job in this state?
    pub fn is_cancellable(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested state change, with the data the target state needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Start,
    Complete { location: PathBuf },
    Fail { message: String },
    Cancel,
}

/// Payload-free tag of a `Transition`, used in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Start,
    Complete,
    Fail,
    Cancel,
}

impl Transition {
    pub fn kind(&self) -> TransitionKind {
        match self {
            Transition::Start => TransitionKind::Start,
            Transition::Complete { .. } => TransitionKind::Complete,
            Transition::Fail { .. } => TransitionKind::Fail,
            Transition::Cancel => TransitionKind::Cancel,
        }
    }
}

/// Mutable part of a job record.
///
/// Invariants (held by `apply`):
/// - `result_location` is `Some` iff `status == Completed`
/// - `error_message` is `Some` iff `status == Failed`
/// - a terminal status never changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    status: JobStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    result_location: Option<PathBuf>,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

impl JobState {
    pub fn new() -> Self {
        Self {
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
            result_location: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn result_location(&self) -> Option<&PathBuf> {
        self.result_location.as_ref()
    }

    /// Apply one transition at time `now`.
    ///
    /// On error the state is left untouched.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let from = self.status;
        match (from, transition) {
            (JobStatus::Pending, Transition::Start) => {
                self.status = JobStatus::Running;
                self.started_at = Some(now);
            }
            (JobStatus::Pending, Transition::Cancel) => {
                self.status = JobStatus::Cancelled;
                self.completed_at = Some(now);
            }
            (JobStatus::Running, Transition::Complete { location }) => {
                self.status = JobStatus::Completed;
                self.result_location = Some(location);
                self.completed_at = Some(now);
            }
            (JobStatus::Running, Transition::Fail { message }) => {
                self.status = JobStatus::Failed;
                // An empty message would break "error present iff Failed".
                self.error_message = Some(if message.is_empty() {
                    "unknown error".to_string()
                } else {
                    message
                });
                self.completed_at = Some(now);
            }
            (JobStatus::Running, Transition::Cancel) => {
                self.status = JobStatus::Cancelled;
                self.completed_at = Some(now);
            }
            (from, transition) => {
                return Err(TransitionError {
                    from,
                    transition: transition.kind(),
                });
            }
        }
        Ok(())
    }
}
