//! Composable services and filters with cancellable request contexts.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod filters;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod service;

pub use config::WeaveConfig;
pub use context::{CancelHandle, Context, ContextError};
pub use error::{Error, Result};
pub use http::{Endpoint, HttpServer};
pub use lifecycle::Shutdown;
pub use service::{apply, chain, BoxFilter, BoxService, Chain, Filter, Next, Service};
