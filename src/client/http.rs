//! Outbound HTTP client whose calls are bounded by a [`Context`].
//!
//! Each request is one [`Cancellable`] round trip. Cancelling the round
//! trip drops the in-flight hyper future, which closes its connection;
//! `execute` then waits for that to happen before returning.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio_util::sync::CancellationToken;

use super::{execute, Cancellable};
use crate::config::ClientConfig;
use crate::context::Context;
use crate::error::{Error, Result};

/// HTTP client for calls made on behalf of a context.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client<HttpConnector, Body>,
}

impl HttpClient {
    /// Client with default connector settings.
    pub fn new() -> Self {
        Self::build(HttpConnector::new())
    }

    /// Client whose TCP connect phase is capped at `connect_timeout`.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        Self::build(connector)
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_connect_timeout(config.connect_timeout())
    }

    fn build(connector: HttpConnector) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            // Pooled connections would outlive a cancelled call.
            .pool_max_idle_per_host(0)
            .build(connector);
        Self { inner }
    }

    /// Send `request`, returning early with the context's error if `ctx`
    /// is cancelled first.
    pub async fn request(&self, ctx: &Context, request: Request<Body>) -> Result<Response<Incoming>> {
        let method = request.method().clone();
        let uri = request.uri().clone();
        tracing::debug!(method = %method, uri = %uri, "Sending request");

        let round_trip = Arc::new(RoundTrip {
            client: self.inner.clone(),
            request: Mutex::new(Some(request)),
            abort: CancellationToken::new(),
        });

        let result = execute(ctx, round_trip).await;
        match &result {
            Ok(response) => {
                tracing::debug!(method = %method, uri = %uri, status = %response.status(), "Request completed");
            }
            Err(e) => {
                tracing::warn!(method = %method, uri = %uri, error = %e, "Request failed");
            }
        }
        result
    }

    /// Convenience GET.
    pub async fn get(&self, ctx: &Context, uri: Uri) -> Result<Response<Incoming>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .map_err(Error::operation)?;
        self.request(ctx, request).await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect a response body, refusing bodies larger than `limit` bytes.
pub async fn read_body(response: Response<Incoming>, limit: usize) -> Result<Bytes> {
    axum::body::to_bytes(Body::new(response.into_body()), limit)
        .await
        .map_err(Error::operation)
}

struct RoundTrip {
    client: Client<HttpConnector, Body>,
    request: Mutex<Option<Request<Body>>>,
    abort: CancellationToken,
}

#[async_trait]
impl Cancellable for RoundTrip {
    type Output = Response<Incoming>;

    async fn run(&self) -> Result<Response<Incoming>> {
        let request = self
            .request
            .lock()
            .expect("round trip mutex poisoned")
            .take()
            .ok_or_else(|| Error::operation("round trip already sent"))?;

        tokio::select! {
            response = self.client.request(request) => response.map_err(Error::operation),
            _ = self.abort.cancelled() => Err(Error::operation("round trip aborted")),
        }
    }

    fn cancel(&self) {
        self.abort.cancel();
    }
}
