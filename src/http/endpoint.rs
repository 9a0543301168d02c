//! Route registration and per-request dispatch.
//!
//! # Responsibilities
//! - Register `(method, path pattern) → Service` on an axum router
//! - Create the per-request root context (cancellable, optionally with a deadline)
//! - Store params, request ID and the exchange in that context
//! - Render the response writer, mapping service errors to status codes
//! - Reject undecodable path parameters with 400 before the service runs
//!
//! # Design Decisions
//! - Path matching is axum's; patterns use its syntax (`/hello/{name}`)
//! - Endpoint-wide filters wrap every route, outermost first
//! - The request context is released when the request future ends,
//!   including when a disconnecting client drops it
//! - An endpoint can itself run as a [`Service`] ([`Endpoint::into_service`]);
//!   its request contexts then derive from the caller's

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, MatchedPath, RawPathParams},
    http::{HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::exchange::{HttpExchange, ResponseWriter};
use crate::http::params::Params;
use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::service::{BoxService, Chain, Filter, Service};

/// Default cap on buffered request bodies.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

struct Route {
    method: Method,
    path: String,
    service: BoxService,
}

/// HTTP endpoint dispatching routes to [`Service`]s.
pub struct Endpoint {
    routes: Vec<Route>,
    filters: Chain,
    request_timeout: Option<Duration>,
    body_limit: usize,
}

impl Endpoint {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            filters: Chain::default(),
            request_timeout: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Register `service` for `method` requests matching `path`.
    ///
    /// # Panics
    /// If `method` is not one of the standard HTTP methods.
    pub fn route<S>(mut self, method: Method, path: &str, service: S) -> Self
    where
        S: Service + 'static,
    {
        assert!(
            method_filter(&method).is_some(),
            "unsupported method for route {path}: {method}"
        );
        self.routes.push(Route {
            method,
            path: path.to_string(),
            service: Arc::new(service),
        });
        self
    }

    pub fn get<S: Service + 'static>(self, path: &str, service: S) -> Self {
        self.route(Method::GET, path, service)
    }

    pub fn post<S: Service + 'static>(self, path: &str, service: S) -> Self {
        self.route(Method::POST, path, service)
    }

    pub fn put<S: Service + 'static>(self, path: &str, service: S) -> Self {
        self.route(Method::PUT, path, service)
    }

    pub fn delete<S: Service + 'static>(self, path: &str, service: S) -> Self {
        self.route(Method::DELETE, path, service)
    }

    /// Wrap every route with `filter`, inside previously added filters.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Filter + 'static,
    {
        self.filters = self.filters.push(filter);
        self
    }

    /// Give every request context a deadline of `timeout`.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Reject request bodies larger than `limit` bytes with 413.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Build the axum router serving all registered routes.
    pub fn into_router(self) -> Router {
        let settings = Arc::new(Dispatch {
            request_timeout: self.request_timeout,
            body_limit: self.body_limit,
        });

        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for route in self.routes {
            let service = self.filters.service(route.service);
            let settings = Arc::clone(&settings);
            let handler = move |request: Request<Body>| {
                let service = Arc::clone(&service);
                let settings = Arc::clone(&settings);
                async move { settings.dispatch(service, request).await }
            };
            // Validated in `route`.
            let Some(filter) = method_filter(&route.method) else {
                continue;
            };
            let methods = by_path.remove(&route.path).unwrap_or_else(MethodRouter::new);
            by_path.insert(route.path, methods.on(filter, handler));
        }

        let mut router = Router::new();
        for (path, methods) in by_path {
            router = router.route(&path, methods);
        }
        router
            .fallback(|| async { (StatusCode::NOT_FOUND, "No matching route found") })
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl Endpoint {
    /// View this endpoint as a [`Service`] dispatching the exchange of
    /// the calling context, so it can be mounted behind filters or inside
    /// another endpoint.
    pub fn into_service(self) -> EndpointService {
        EndpointService {
            router: self.into_router(),
        }
    }
}

/// An [`Endpoint`] invoked as a service; see [`Endpoint::into_service`].
///
/// Per-request contexts derive from the calling context, so its
/// cancellation and deadline reach the routed service. The rendered
/// response is copied into the caller's [`ResponseWriter`].
#[derive(Clone)]
pub struct EndpointService {
    router: Router,
}

#[async_trait]
impl Service for EndpointService {
    async fn call(&self, ctx: Context) -> Result<()> {
        let exchange = HttpExchange::from_context(&ctx);
        let inbound = exchange.request();

        let mut request = Request::builder()
            .method(inbound.method().clone())
            .uri(inbound.uri().clone())
            .version(inbound.version())
            .body(Body::from(inbound.body().clone()))
            .map_err(Error::operation)?;
        *request.headers_mut() = inbound.headers().clone();
        if let Some(id) = RequestId::from_context(&ctx) {
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                request.headers_mut().insert(X_REQUEST_ID, value);
            }
        }
        request.extensions_mut().insert(ctx.clone());

        let response = match tower::ServiceExt::oneshot(self.router.clone(), request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(Error::operation)?;

        let writer = exchange.response();
        writer.set_status(parts.status);
        for (name, value) in parts.headers.iter() {
            writer.append_header(name.clone(), value.clone());
        }
        writer.write(body);
        Ok(())
    }
}

struct Dispatch {
    request_timeout: Option<Duration>,
    body_limit: usize,
}

impl Dispatch {
    async fn dispatch(&self, service: BoxService, request: Request<Body>) -> Response {
        let (mut parts, body) = request.into_parts();

        let request_id = RequestId::from_headers(&parts.headers);
        let params: Params = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(raw) => raw.iter().collect(),
            Err(rejection) => {
                tracing::warn!(request_id = %request_id, error = %rejection, "Rejecting path parameters");
                return rejection.into_response();
            }
        };
        let route = parts
            .extensions
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %parts.method,
            route = %route
        );

        let body = match axum::body::to_bytes(body, self.body_limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Rejecting request body");
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };

        // Nested endpoints inherit the caller's context.
        let root = parts
            .extensions
            .remove::<Context>()
            .unwrap_or_else(Context::background);
        let exchange = Arc::new(HttpExchange::new(Request::from_parts(parts, body)));
        // Released when this future completes or is dropped.
        let (ctx, _release) = match self.request_timeout {
            Some(timeout) => Context::with_timeout(&root, timeout),
            None => Context::with_cancel(&root),
        };
        let ctx = exchange
            .attach(&ctx)
            .with_value(params)
            .with_value(request_id.clone());

        let result = service.call(ctx).instrument(span.clone()).await;

        let writer = exchange.response();
        if let Err(e) = result {
            let status = failure_status(writer, &e);
            span.in_scope(|| tracing::warn!(error = %e, status = %status, "Service failed"));
            if !writer.status_overridden() {
                writer.replace(status, e.to_string());
            }
        }

        let mut response = writer.take_response();
        if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        response
    }
}

/// Status the endpoint renders for a failed call: a non-200 status the
/// service chose, otherwise one derived from the error.
pub(crate) fn failure_status(writer: &ResponseWriter, error: &Error) -> StatusCode {
    if writer.status_overridden() {
        writer.status()
    } else {
        error_status(error)
    }
}

fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::Context(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn method_filter(method: &Method) -> Option<MethodFilter> {
    let filter = match *method {
        Method::GET => MethodFilter::GET,
        Method::POST => MethodFilter::POST,
        Method::PUT => MethodFilter::PUT,
        Method::DELETE => MethodFilter::DELETE,
        Method::PATCH => MethodFilter::PATCH,
        Method::HEAD => MethodFilter::HEAD,
        Method::OPTIONS => MethodFilter::OPTIONS,
        Method::TRACE => MethodFilter::TRACE,
        _ => return None,
    };
    Some(filter)
}
