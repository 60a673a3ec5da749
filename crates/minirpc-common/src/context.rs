//! Cancellation and deadlines for calls.
//!
//! A [`Context`] carries an optional deadline and any number of cancel
//! tokens. Children inherit every token and the earlier of the two
//! deadlines, so cancelling a parent ends all of its children.
//!
//! # Example
//!
//! ```
//! use minirpc_common::{Context, ContextError};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let parent = Context::background().with_timeout(Duration::from_secs(5));
//! let child = parent.child();
//! parent.cancel();
//! assert_eq!(child.done().await, ContextError::Canceled);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, FutureExt};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::protocol::error::RpcError;

/// Why a context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    Canceled,
    DeadlineExceeded,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Canceled => f.write_str("context canceled"),
            ContextError::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

impl std::error::Error for ContextError {}

impl From<ContextError> for RpcError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => RpcError::Cancelled,
            ContextError::DeadlineExceeded => RpcError::CallTimeout,
        }
    }
}

/// Cancellation scope for one or more calls.
///
/// Cloning is cheap; clones share the same tokens.
#[derive(Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    tokens: Vec<watch::Receiver<bool>>,
    cancel: Option<Arc<watch::Sender<bool>>>,
}

impl Context {
    /// A context that is never done.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a cancellable child.
    pub fn child(&self) -> Self {
        let (tx, rx) = watch::channel(false);
        let mut tokens = self.tokens.clone();
        tokens.push(rx);
        Context {
            deadline: self.deadline,
            tokens,
            cancel: Some(Arc::new(tx)),
        }
    }

    /// Derives a cancellable child that expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a cancellable child that expires at `deadline`.
    ///
    /// The parent's deadline still applies if it is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut ctx = self.child();
        ctx.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        ctx
    }

    /// Cancels this context and every context derived from it.
    ///
    /// A no-op on [`Context::background`].
    pub fn cancel(&self) {
        if let Some(tx) = &self.cancel {
            tx.send_replace(true);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.tokens.iter().any(|rx| *rx.borrow()) {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        if let Some(err) = self.err() {
            return err;
        }

        let cancelled = async {
            if self.tokens.is_empty() {
                return future::pending::<()>().await;
            }
            let waits = self.tokens.iter().cloned().map(|mut rx| {
                async move {
                    // A dropped sender can no longer cancel.
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        future::pending::<()>().await;
                    }
                }
                .boxed()
            });
            future::select_all(waits).await;
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancelled => ContextError::Canceled,
            _ = expired => ContextError::DeadlineExceeded,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline)
            .field("tokens", &self.tokens.len())
            .field("err", &self.err())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_is_never_done() {
        let ctx = Context::background();
        ctx.cancel();
        assert_eq!(ctx.err(), None);
        let res = tokio::time::timeout(Duration::from_millis(50), ctx.done()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_timeout_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let started = std::time::Instant::now();
        assert_eq!(ctx.done().await, ContextError::DeadlineExceeded);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children_only() {
        let parent = Context::background().child();
        let child = parent.child();
        let sibling = Context::background().child();

        let waiter = {
            let child = child.clone();
            tokio::spawn(async move { child.done().await })
        };

        parent.cancel();
        assert_eq!(waiter.await.unwrap(), ContextError::Canceled);
        assert_eq!(parent.err(), Some(ContextError::Canceled));
        assert_eq!(sibling.err(), None);
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_reach_parent() {
        let parent = Context::background().child();
        let child = parent.child();
        child.cancel();
        assert_eq!(child.err(), Some(ContextError::Canceled));
        assert_eq!(parent.err(), None);
    }

    #[test]
    fn test_child_keeps_earlier_deadline() {
        let parent = Context::background().with_timeout(Duration::from_millis(10));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn test_context_error_maps_to_rpc_error() {
        assert_eq!(RpcError::from(ContextError::Canceled), RpcError::Cancelled);
        assert_eq!(
            RpcError::from(ContextError::DeadlineExceeded),
            RpcError::CallTimeout
        );
    }
}
