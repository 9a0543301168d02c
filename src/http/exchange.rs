//! Request/response carrier for one inbound call.
//!
//! The endpoint stores an [`HttpExchange`] in the per-request context.
//! Services read the inbound request from it and write their response
//! into its [`ResponseWriter`]; the endpoint renders the writer once
//! the service returns.

use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::http::{header::HeaderName, HeaderMap, HeaderValue, Request, Response, StatusCode};
use bytes::BytesMut;

use crate::context::Context;

/// The inbound request and the response being built for it.
#[derive(Debug)]
pub struct HttpExchange {
    request: Request<Bytes>,
    response: ResponseWriter,
}

impl HttpExchange {
    pub fn new(request: Request<Bytes>) -> Self {
        Self {
            request,
            response: ResponseWriter::default(),
        }
    }

    /// Store this exchange in `ctx`.
    pub fn attach(self: &Arc<Self>, ctx: &Context) -> Context {
        ctx.with_value(Arc::clone(self))
    }

    /// The exchange of the current inbound call.
    ///
    /// # Panics
    /// When `ctx` carries no exchange. Only contexts created by the
    /// endpoint (or [`HttpExchange::attach`]) carry one.
    pub fn from_context(ctx: &Context) -> &HttpExchange {
        match ctx.value::<Arc<HttpExchange>>() {
            Some(exchange) => exchange,
            None => panic!("no HttpExchange in context: service was not invoked by an endpoint"),
        }
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }
}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    status_written: bool,
    headers: HeaderMap,
    body: BytesMut,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            status_written: false,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
        }
    }
}

/// Writable half of an exchange. Status defaults to `200 OK`.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    state: Mutex<ResponseState>,
}

impl ResponseWriter {
    fn state(&self) -> std::sync::MutexGuard<'_, ResponseState> {
        self.state.lock().expect("response writer mutex poisoned")
    }

    pub fn set_status(&self, status: StatusCode) {
        let mut state = self.state();
        state.status = status;
        state.status_written = true;
    }

    /// The status recorded so far.
    pub fn status(&self) -> StatusCode {
        self.state().status
    }

    /// True once a service chose a status explicitly.
    pub fn status_written(&self) -> bool {
        self.state().status_written
    }

    /// True once a service explicitly chose a status other than `200 OK`.
    pub fn status_overridden(&self) -> bool {
        let state = self.state();
        state.status_written && state.status != StatusCode::OK
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.state().headers.insert(name, value);
    }

    /// Add a header value, keeping existing values for `name`.
    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.state().headers.append(name, value);
    }

    /// Append bytes to the body.
    pub fn write(&self, chunk: impl AsRef<[u8]>) {
        self.state().body.extend_from_slice(chunk.as_ref());
    }

    /// Replace status and body, keeping headers.
    pub(crate) fn replace(&self, status: StatusCode, body: impl AsRef<[u8]>) {
        let mut state = self.state();
        state.status = status;
        state.status_written = true;
        state.body.clear();
        state.body.extend_from_slice(body.as_ref());
    }

    /// Take the accumulated response, leaving an empty `200 OK` behind.
    pub(crate) fn take_response(&self) -> Response<Body> {
        let state = std::mem::take(&mut *self.state());
        let mut response = Response::new(Body::from(state.body.freeze()));
        *response.status_mut() = state.status;
        *response.headers_mut() = state.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn exchange() -> Arc<HttpExchange> {
        let request = Request::builder()
            .uri("http://example.com/hello")
            .body(Bytes::from_static(b"ping"))
            .unwrap();
        Arc::new(HttpExchange::new(request))
    }

    #[test]
    fn test_exchange_round_trips_through_context() {
        let ex = exchange();
        let ctx = ex.attach(&Context::background());
        let found = HttpExchange::from_context(&ctx);
        assert_eq!(found.request().uri().path(), "/hello");
        assert_eq!(found.request().body().as_ref(), b"ping");
    }

    #[test]
    #[should_panic(expected = "no HttpExchange in context")]
    fn test_missing_exchange_panics() {
        HttpExchange::from_context(&Context::background());
    }

    #[test]
    fn test_writer_defaults_to_ok() {
        let ex = exchange();
        assert_eq!(ex.response().status(), StatusCode::OK);
        assert!(!ex.response().status_written());
    }

    #[test]
    fn test_writer_renders_response() {
        let ex = exchange();
        let writer = ex.response();
        writer.set_status(StatusCode::CREATED);
        writer.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        writer.write("hello ");
        writer.write(b"world");

        let response = writer.take_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_explicit_ok_is_not_an_override() {
        let ex = exchange();
        let writer = ex.response();
        writer.set_status(StatusCode::OK);
        assert!(writer.status_written());
        assert!(!writer.status_overridden());

        writer.set_status(StatusCode::CONFLICT);
        assert!(writer.status_overridden());
    }

    #[test]
    fn test_replace_discards_partial_body() {
        let ex = exchange();
        let writer = ex.response();
        writer.append_header(header::VARY, HeaderValue::from_static("accept"));
        writer.append_header(header::VARY, HeaderValue::from_static("origin"));
        writer.write("partial");
        writer.replace(StatusCode::INTERNAL_SERVER_ERROR, "operation failed: boom");

        let response = writer.take_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get_all(header::VARY).iter().count(), 2);
    }
}
