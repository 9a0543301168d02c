mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use weave::client::http::read_body;
use weave::client::HttpClient;
use weave::config::ClientConfig;
use weave::filters::{ResponseStatsFilter, StatsFilter, TimeoutFilter};
use weave::http::{HttpExchange, Params, X_REQUEST_ID};
use weave::observability::InMemoryStats;
use weave::service::service_fn;
use weave::{Context, Endpoint, Error, HttpServer, Shutdown};

struct TestServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    async fn start(endpoint: Endpoint) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(HttpServer::new(endpoint).run(listener, shutdown.subscribe()));
        Self { addr, shutdown, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

fn hello() -> impl weave::Service {
    service_fn(|ctx: Context| async move {
        let name = Params::from_context(&ctx).get("name").to_string();
        HttpExchange::from_context(&ctx)
            .response()
            .write(format!("Hello, {name}!"));
        Ok(())
    })
}

/// Calls an upstream with the request context, relaying its body.
fn relay(upstream: SocketAddr) -> impl weave::Service {
    let client = HttpClient::from_config(&ClientConfig::default());
    service_fn(move |ctx: Context| {
        let client = client.clone();
        async move {
            let uri = format!("http://{upstream}/").parse::<axum::http::Uri>().map_err(Error::operation)?;
            let response = client.get(&ctx, uri).await?;
            let body = read_body(response, 1024).await?;
            HttpExchange::from_context(&ctx).response().write(body);
            Ok::<(), Error>(())
        }
    })
}

#[tokio::test]
async fn test_end_to_end_with_stats() {
    let stats = InMemoryStats::new();
    let endpoint = Endpoint::new()
        .filter(StatsFilter::new(&stats))
        .filter(ResponseStatsFilter::new(&stats))
        .get("/hello/{name}", hello());
    let server = TestServer::start(endpoint).await;

    let client = reqwest::Client::new();
    let response = client
        .get(server.url("/hello/world"))
        .header(X_REQUEST_ID, "e2e-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[X_REQUEST_ID], "e2e-1");
    assert_eq!(response.text().await.unwrap(), "Hello, world!");

    let missing = client.get(server.url("/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    assert_eq!(stats.counter_value("requests"), 1);
    assert_eq!(stats.counter_value("success"), 1);
    assert_eq!(stats.counter_value("http.status.200"), 1);
    assert_eq!(stats.counter_value("http.status.2xx"), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_timeout_filter_bounds_upstream_call() {
    let upstream = common::start_slow_backend(Duration::from_secs(5)).await;
    let stats = InMemoryStats::new();
    let endpoint = Endpoint::new()
        .filter(ResponseStatsFilter::new(&stats))
        .filter(TimeoutFilter::new(Duration::from_millis(50)))
        .get("/relay", relay(upstream));
    let server = TestServer::start(endpoint).await;

    let response = reqwest::get(server.url("/relay")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE.as_u16());
    assert_eq!(response.text().await.unwrap(), "context deadline exceeded");
    assert_eq!(stats.counter_value("http.status.503"), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_relay_success() {
    let upstream = common::start_mock_backend("from upstream").await;
    let server = TestServer::start(Endpoint::new().get("/relay", relay(upstream))).await;

    let response = reqwest::get(server.url("/relay")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "from upstream");

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let server = TestServer::start(Endpoint::new().get("/hello/{name}", hello())).await;
    let addr = server.addr;
    server.stop().await;

    let result = reqwest::Client::new()
        .get(format!("http://{addr}/hello/x"))
        .timeout(Duration::from_secs(1))
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_shared_stats_across_requests() {
    let stats = Arc::new(InMemoryStats::new());
    let endpoint = Endpoint::new()
        .filter(StatsFilter::new(&*stats))
        .get("/hello/{name}", hello());
    let server = TestServer::start(endpoint).await;

    for name in ["a", "b", "c"] {
        let response = reqwest::get(server.url(&format!("/hello/{name}"))).await.unwrap();
        assert_eq!(response.text().await.unwrap(), format!("Hello, {name}!"));
    }
    assert_eq!(stats.counter_value("requests"), 3);
    assert_eq!(stats.timer_samples("latency").len(), 3);

    server.stop().await;
}
