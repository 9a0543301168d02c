//! HTTP surface: routing collaborator and request/response carrier.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs   (axum::serve, graceful shutdown)
//!     → endpoint.rs (axum route match → per-request Context)
//!         ctx += Params (params.rs), RequestId (request.rs), HttpExchange (exchange.rs)
//!     → filters → Service
//!     → endpoint.rs renders the ResponseWriter
//! ```

pub mod endpoint;
pub mod exchange;
pub mod params;
pub mod request;
pub mod server;

pub use endpoint::{Endpoint, EndpointService};
pub use exchange::{HttpExchange, ResponseWriter};
pub use params::Params;
pub use request::{RequestId, X_REQUEST_ID};
pub use server::HttpServer;
