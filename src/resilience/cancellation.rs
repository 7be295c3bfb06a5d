//! Cooperative cancellation shared by every probe suspension point.

use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal threaded through a health check invocation.
///
/// Clones observe the same signal. Cancelling is idempotent and wakes every
/// task currently waiting in [`CancellationToken::cancelled`].
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a new token that is not cancelled.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trigger cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the token is cancelled. Resolves immediately if it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
