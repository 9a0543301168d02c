//! Cancellation scopes.
//!
//! A scope owns one `CancellationToken`. Derived scopes hold a child
//! token, so cancelling any ancestor is observed by every descendant
//! through the token tree's listeners, including descendants created
//! after the ancestor was cancelled.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ContextError {
    /// Explicitly canceled (or its cancel handle was released).
    #[error("context canceled")]
    Canceled,

    /// The deadline of this context or an ancestor passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug)]
pub(crate) struct CancelScope {
    parent: Option<Arc<CancelScope>>,
    token: CancellationToken,
    /// Effective deadline: the earlier of our own and the parent's.
    deadline: Option<Instant>,
    /// First recorded cause; never overwritten.
    cause: OnceLock<ContextError>,
}

impl CancelScope {
    pub(crate) fn root() -> Self {
        Self {
            parent: None,
            token: CancellationToken::new(),
            deadline: None,
            cause: OnceLock::new(),
        }
    }

    pub(crate) fn child(parent: &Arc<CancelScope>, deadline: Option<Instant>) -> Self {
        let deadline = match (parent.deadline, deadline) {
            (Some(inherited), Some(own)) => Some(inherited.min(own)),
            (inherited, own) => inherited.or(own),
        };
        Self {
            parent: Some(Arc::clone(parent)),
            token: parent.token.child_token(),
            deadline,
            cause: OnceLock::new(),
        }
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn cancel(&self, cause: ContextError) {
        let _ = self.cause.set(cause);
        self.token.cancel();
    }

    pub(crate) fn err(&self) -> Option<ContextError> {
        if let Some(cause) = self.cause.get() {
            return Some(*cause);
        }
        if self.token.is_cancelled() {
            // Cancelled through an ancestor: report the ancestor's cause.
            let inherited = self
                .parent
                .as_ref()
                .and_then(|p| p.err())
                .unwrap_or(ContextError::Canceled);
            return Some(inherited);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel(ContextError::DeadlineExceeded);
                self.cause.get().copied()
            }
            _ => None,
        }
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub(crate) async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                        self.cancel(ContextError::DeadlineExceeded);
                    }
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

/// Releases a derived context.
///
/// `cancel` may be called any number of times. Dropping the handle
/// cancels the scope as well, so a scope is released on every exit
/// path of the code that created it.
#[derive(Debug)]
pub struct CancelHandle {
    scope: Arc<CancelScope>,
}

impl CancelHandle {
    pub(crate) fn new(scope: Arc<CancelScope>) -> Self {
        Self { scope }
    }

    /// Cancel the scope and everything derived from it.
    pub fn cancel(&self) {
        self.scope.cancel(ContextError::Canceled);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.scope.cancel(ContextError::Canceled);
    }
}
