mod common;

use std::time::{Duration, Instant};

use weave::client::http::read_body;
use weave::client::HttpClient;
use weave::{Context, ContextError, Error};

fn uri(addr: std::net::SocketAddr, path: &str) -> axum::http::Uri {
    format!("http://{addr}{path}").parse().unwrap()
}

#[tokio::test]
async fn test_get_returns_backend_response() {
    let addr = common::start_mock_backend("hello from backend").await;
    let client = HttpClient::new();

    let response = client.get(&Context::background(), uri(addr, "/")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body = read_body(response, 1024).await.unwrap();
    assert_eq!(body.as_ref(), b"hello from backend");
}

#[tokio::test]
async fn test_backend_status_is_not_an_error() {
    let addr = common::start_programmable_backend(|| async { (503, "busy".to_string()) }).await;
    let response = HttpClient::new()
        .get(&Context::background(), uri(addr, "/"))
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn test_connection_refused_is_operation_error() {
    let addr = common::closed_port().await;
    let err = HttpClient::new()
        .get(&Context::background(), uri(addr, "/"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Operation(_)));
}

#[tokio::test]
async fn test_deadline_cuts_slow_backend_short() {
    let addr = common::start_slow_backend(Duration::from_secs(5)).await;
    let (ctx, _cancel) = Context::with_timeout(&Context::background(), Duration::from_millis(50));

    let start = Instant::now();
    let err = HttpClient::new().get(&ctx, uri(addr, "/")).await.unwrap_err();
    assert_eq!(err.as_context(), Some(ContextError::DeadlineExceeded));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_cancel_cuts_slow_backend_short() {
    let addr = common::start_slow_backend(Duration::from_secs(5)).await;
    let (ctx, cancel) = Context::with_cancel(&Context::background());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = HttpClient::new().get(&ctx, uri(addr, "/")).await.unwrap_err();
    assert_eq!(err.as_context(), Some(ContextError::Canceled));
}

#[tokio::test]
async fn test_body_limit_enforced() {
    let addr = common::start_mock_backend("0123456789").await;
    let response = HttpClient::new()
        .get(&Context::background(), uri(addr, "/"))
        .await
        .unwrap();
    assert!(read_body(response, 4).await.is_err());
}
