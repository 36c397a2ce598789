//! Synthesizer port - the inference engine.
//!
//! The engine is opaque and possibly slow. It reports progress as a stream of
//! `SynthesisOutput`s and is expected to look at the `CancelSignal` whenever
//! it can; nothing here can stop it preemptively.

use async_trait::async_trait;

use crate::domain::{CancelSignal, SynthesisError, SynthesisOutput, SynthesisRequest};

/// Pull-based output stream of one synthesis run.
#[async_trait]
pub trait SynthesisStream: Send {
    /// Next output, or `None` once the engine is done.
    async fn next(&mut self) -> Option<Result<SynthesisOutput, SynthesisError>>;
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Begin synthesizing `request`.
    ///
    /// The task path always consumes the stream non-streaming: segments are
    /// dropped and only the final merged audio is kept.
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: CancelSignal,
    ) -> Result<Box<dyn SynthesisStream>, SynthesisError>;
}
