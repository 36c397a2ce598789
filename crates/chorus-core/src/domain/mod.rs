//! Domain model (ids, requests, job records, state machine, errors).

pub mod audio;
pub mod cancel;
pub mod errors;
pub mod ids;
pub mod job;
pub mod request;
pub mod state;

pub use audio::{AudioBuffer, SynthesisOutput};
pub use cancel::{CancelSignal, Cancelled};
pub use errors::{
    ArtifactError, EncodeError, ExecutionError, JobError, SynthesisError, TransitionError,
};
pub use ids::JobId;
pub use job::{JobRecord, JobSnapshot, StartOutcome};
pub use request::{AudioFormat, ReferenceAudio, SynthesisRequest};
pub use state::{JobState, JobStatus, Transition, TransitionKind};
