//! Cancellation scopes for blocking transport operations.
//!
//! Every suspension point (accepting a connection, accepting or opening a
//! stream, reading, writing) runs under a [`CancelScope`]. A scope can be
//! cancelled explicitly, can carry a deadline, or both. Interrupted calls
//! resolve to [`Interrupted`], which callers can tell apart from I/O faults.
//!
//! Accept loops use an unbounded scope tied to shutdown; individual reads
//! and writes use [`CancelScope::with_timeout`] on a child of that scope.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scoped operation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// A cancellation signal with an optional deadline.
///
/// Cloning a scope shares the same token. [`child`](Self::child) derives a
/// scope that is cancelled with its parent but can also be cancelled alone.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// A scope with no deadline that is only interrupted by [`cancel`](Self::cancel).
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A fresh scope that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::unbounded().child_with_timeout(timeout)
    }

    /// A child scope sharing this scope's cancellation and deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child scope whose deadline is the earlier of the parent's and
    /// `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let ours = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < ours => parent,
            _ => ours,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this scope and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once [`cancel`](Self::cancel) was called here or on a parent.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves when the scope is cancelled. Never resolves on deadline.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Drive `fut` to completion unless the scope is cancelled or its
    /// deadline passes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(Interrupted::Cancelled),
                res = tokio::time::timeout_at(deadline, fut) => {
                    res.map_err(|_| Interrupted::DeadlineExceeded)
                }
            },
            None => tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(Interrupted::Cancelled),
                out = fut => Ok(out),
            },
        }
    }
}
