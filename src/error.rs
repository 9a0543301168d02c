//! Error types shared by services, filters and the cancellable adapter.
//!
//! # Taxonomy
//! - Context errors: `Canceled` / `DeadlineExceeded`, produced only by
//!   [`crate::context`] and the cancellable adapter.
//! - Operation errors: opaque, domain specific, returned by terminal
//!   services or wrapped operations.
//! - Programming errors (e.g. a missing request carrier) are panics and
//!   never travel through this type.

use thiserror::Error;

pub use crate::context::ContextError;

/// Boxed, type-erased operation error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by a [`Service`](crate::service::Service) invocation.
#[derive(Debug, Error)]
pub enum Error {
    /// The execution context was canceled or its deadline passed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// A domain error reported by a service or wrapped operation.
    #[error("operation failed: {0}")]
    Operation(#[source] BoxError),

    /// The worker running a cancellable operation went away without
    /// reporting a result (it panicked or was aborted by the runtime).
    #[error("worker exited without reporting a result")]
    WorkerLost,
}

impl Error {
    /// Wrap any error as an operation error.
    pub fn operation<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Operation(err.into())
    }

    /// Returns true for `Canceled` / `DeadlineExceeded`.
    pub fn is_context(&self) -> bool {
        matches!(self, Error::Context(_))
    }

    /// The context error, if this is one.
    pub fn as_context(&self) -> Option<ContextError> {
        match self {
            Error::Context(e) => Some(*e),
            _ => None,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, Error>;
