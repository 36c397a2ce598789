//! Cooperative cancellation.
//!
//! A `CancelSignal` is set from outside the worker (the cancel path) and
//! observed inside it at explicit checkpoints. Once set it never clears.

use tokio_util::sync::CancellationToken;

/// Returned by `CancelSignal::checkpoint` once cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn request(&self) {
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Checkpoint for `?`-style early exit.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_requested() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once cancellation is requested.
    ///
    /// Lets an async synthesizer race its own work against cancellation.
    pub async fn requested(&self) {
        self.token.cancelled().await
    }
}
