//! HTTP server wiring.
//!
//! # Responsibilities
//! - Serve an [`Endpoint`] on an already bound listener
//! - Stop accepting and drain in-flight requests on shutdown
//!
//! Binding the listener and deciding when to shut down are the caller's job.

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::http::endpoint::Endpoint;

/// HTTP server for an endpoint.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            router: endpoint.into_router(),
        }
    }

    /// Apply the per-request settings of `config` to `endpoint` and wrap it.
    pub fn from_config(config: &ServerConfig, endpoint: Endpoint) -> Self {
        let mut endpoint = endpoint.body_limit(config.body_limit_bytes);
        if let Some(timeout) = config.request_timeout() {
            endpoint = endpoint.request_timeout(timeout);
        }
        Self::new(endpoint)
    }

    /// Serve until `shutdown` fires (or its sender is dropped).
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
