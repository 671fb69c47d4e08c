//! # Cancellation Tokens
//!
//! A single cancellation signal threaded through every layer of a dispatched
//! pipeline. Any behavior or the terminal handler may observe the token and
//! abort early; cancellation surfaces as [`PipelineError::Cancelled`], never
//! as a generic failure.
//!
//! Built on `tokio::sync::watch` so waiters suspend cooperatively instead of
//! polling.

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::PipelineError;

/// Cooperative cancellation signal for one dispatch (or a tree of them).
///
/// Cloning is cheap and all clones observe the same signal. A token created
/// with [`CancellationToken::new`] starts un-cancelled and flips exactly once.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        // send_replace never fails; the sender keeps the channel open.
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Suspend until the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        while !*receiver.borrow_and_update() {
            if receiver.changed().await.is_err() {
                // Sender dropped without cancelling; treat as never-cancelled.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Observe the token, returning `Err(Cancelled)` when it has fired.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
