//! Cancellable unit-of-work adapter.
//!
//! # Data Flow
//! ```text
//! execute(ctx, op)
//!     → spawn worker: op.run() → oneshot (single slot, never blocks)
//!     → race: worker result  vs  ctx.done()
//!         result first → return it unchanged
//!         ctx first    → op.cancel() → drain worker → Err(ctx.err())
//! ```
//!
//! # Design Decisions
//! - The worker is always drained before `execute` returns on the
//!   cancellation path, so nothing the operation owns outlives the call
//! - Completion wins a tie with cancellation
//! - On cancellation the operation's own error is discarded
//! - Dropping the `execute` future still signals `op.cancel()`

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::context::{Context, ContextError};
use crate::error::{Error, Result};

pub use self::http::HttpClient;

/// A blocking-style operation that can be asked to abort.
#[async_trait]
pub trait Cancellable: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Perform the operation. Called once, on a dedicated task.
    async fn run(&self) -> Result<Self::Output>;

    /// Ask a running operation to abort. Must be a no-op once `run`
    /// has produced its result.
    fn cancel(&self);
}

/// Calls `op.cancel()` on drop unless disarmed.
struct CancelOnDrop<O: Cancellable> {
    op: Option<Arc<O>>,
}

impl<O: Cancellable> CancelOnDrop<O> {
    fn disarm(&mut self) {
        self.op = None;
    }
}

impl<O: Cancellable> Drop for CancelOnDrop<O> {
    fn drop(&mut self) {
        if let Some(op) = self.op.take() {
            tracing::debug!("execute dropped before completion, cancelling operation");
            op.cancel();
        }
    }
}

/// Run `op` under `ctx`, returning as soon as the operation completes
/// or the context is done, whichever happens first.
pub async fn execute<O>(ctx: &Context, op: Arc<O>) -> Result<O::Output>
where
    O: Cancellable,
{
    let (tx, mut rx) = oneshot::channel();
    let worker = Arc::clone(&op);
    tokio::spawn(async move {
        // The receiver may be gone if the caller was dropped.
        let _ = tx.send(worker.run().await);
    });

    let mut guard = CancelOnDrop { op: Some(Arc::clone(&op)) };

    tokio::select! {
        biased;

        reported = &mut rx => {
            guard.disarm();
            reported.unwrap_or(Err(Error::WorkerLost))
        }
        _ = ctx.done() => {
            guard.disarm();
            op.cancel();
            // Drain: wait for the worker to acknowledge before returning.
            let _ = rx.await;
            let cause = ctx.err().unwrap_or(ContextError::Canceled);
            tracing::debug!(cause = %cause, "operation cancelled by context");
            Err(Error::Context(cause))
        }
    }
}
