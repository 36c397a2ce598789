//! Error types shared across the crate.
//!
//! Errors are split by the layer that raises them. `ExecutionError` is the
//! worker boundary: everything below it is caught there and recorded on the
//! job, never returned to whoever started the job.

use std::path::PathBuf;

use thiserror::Error;

use super::ids::JobId;
use super::request::AudioFormat;
use super::state::{JobStatus, TransitionKind};

/// Registry and lifecycle errors surfaced to callers.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("task with step_id {0} already exists")]
    AlreadyExists(JobId),

    #[error("task {0} not found")]
    NotFound(JobId),

    #[error("task {0} already has a worker")]
    AlreadyStarted(JobId),

    #[error("invalid step_id {0:?}")]
    InvalidId(String),
}

/// Rejected state machine edge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition {transition:?} from {from:?}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub transition: TransitionKind,
}

/// Raised by the inference engine behind a `Synthesizer`.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis failed: {0}")]
    Engine(String),

    #[error("synthesis stream closed unexpectedly")]
    Disconnected,
}

/// Raised while turning an `AudioBuffer` into file bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("audio format {0} is not supported by this encoder")]
    Unsupported(AudioFormat),

    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("audio too long to encode ({0} samples)")]
    TooLong(usize),
}

/// Raised by an `ArtifactStore`.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact {0} not found")]
    NotFound(PathBuf),

    #[error("artifact io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::NotFound(path)
        } else {
            ArtifactError::Io { path, source }
        }
    }
}

/// Anything that can end a running job as `Failed`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("no result produced")]
    NoResult,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = ArtifactError::io(
            "/tmp/x.wav",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn other_io_errors_keep_source() {
        let err = ArtifactError::io(
            "/tmp/x.wav",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, ArtifactError::Io { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn no_result_message_is_stable() {
        assert_eq!(ExecutionError::NoResult.to_string(), "no result produced");
    }
}
