//! Request identification.
//!
//! # Responsibilities
//! - Reuse the caller's `x-request-id` when present, otherwise mint a UUID v4
//! - Carry the ID in the context so logs and responses can reference it

use std::fmt;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::context::Context;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Identifier of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh random ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The caller-supplied ID, or a fresh one when missing or not ASCII.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .unwrap_or_else(Self::generate)
    }

    pub fn from_context(ctx: &Context) -> Option<&RequestId> {
        ctx.value::<RequestId>()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
