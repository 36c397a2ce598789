//! ChannelStream - a `SynthesisStream` fed through a tokio mpsc channel.
//!
//! Engines that run on their own task (or a blocking thread) push outputs
//! into the sender; the worker pulls them out. Dropping the sender ends the
//! stream.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{SynthesisError, SynthesisOutput};
use crate::ports::SynthesisStream;

pub type OutputSender = mpsc::Sender<Result<SynthesisOutput, SynthesisError>>;

pub struct ChannelStream {
    rx: mpsc::Receiver<Result<SynthesisOutput, SynthesisError>>,
}

impl ChannelStream {
    /// Create a bounded channel and the stream reading from it.
    pub fn channel(capacity: usize) -> (OutputSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

#[async_trait]
impl SynthesisStream for ChannelStream {
    async fn next(&mut self) -> Option<Result<SynthesisOutput, SynthesisError>> {
        self.rx.recv().await
    }
}

/// A stream over a fixed list of outputs, mostly for tests and adapters
/// that already have everything in memory.
pub struct VecStream {
    items: std::vec::IntoIter<Result<SynthesisOutput, SynthesisError>>,
}

impl VecStream {
    pub fn new(items: Vec<Result<SynthesisOutput, SynthesisError>>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

#[async_trait]
impl SynthesisStream for VecStream {
    async fn next(&mut self) -> Option<Result<SynthesisOutput, SynthesisError>> {
        self.items.next()
    }
}
