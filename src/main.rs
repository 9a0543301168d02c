//! weave demo server.
//!
//! ```text
//! GET /hello/{name}   → "Hello, {name}!"
//! GET /sleep/{ms}     → waits, giving up when the request deadline passes
//!
//! every route: TraceFilter → StatsFilter → ResponseStatsFilter → service
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use clap::Parser;
use tokio::net::TcpListener;

use weave::config::{load_config, WeaveConfig};
use weave::filters::{ResponseStatsFilter, StatsFilter, TraceFilter};
use weave::http::{HttpExchange, Params};
use weave::lifecycle::{spawn_signal_handler, Shutdown};
use weave::observability::{init_logging, init_metrics, InMemoryStats, MetricsReceiver, StatsReceiver};
use weave::service::service_fn;
use weave::{Context, Endpoint, Error, HttpServer};

#[derive(Parser)]
#[command(name = "weave-demo")]
#[command(about = "Demo server for weave services and filters", long_about = None)]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WeaveConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    init_logging(&config.observability.log_level);
    tracing::info!("weave-demo v{} starting", env!("CARGO_PKG_VERSION"));

    let stats: Arc<dyn StatsReceiver> = if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
        Arc::new(MetricsReceiver::new(config.observability.metrics_prefix.clone()))
    } else {
        Arc::new(InMemoryStats::new())
    };

    let endpoint = Endpoint::new()
        .filter(TraceFilter::new("demo"))
        .filter(StatsFilter::new(stats.as_ref()))
        .filter(ResponseStatsFilter::new(stats.as_ref()))
        .get("/hello/{name}", service_fn(hello))
        .get("/sleep/{ms}", service_fn(sleep));

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        request_timeout_ms = config.server.request_timeout_ms,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    HttpServer::from_config(&config.server, endpoint)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn hello(ctx: Context) -> weave::Result<()> {
    let name = Params::from_context(&ctx).get("name");
    let response = HttpExchange::from_context(&ctx).response();
    response.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response.write(format!("Hello, {name}!"));
    Ok(())
}

async fn sleep(ctx: Context) -> weave::Result<()> {
    let response = HttpExchange::from_context(&ctx).response();
    let Ok(ms) = Params::from_context(&ctx).get("ms").parse::<u64>() else {
        response.set_status(StatusCode::BAD_REQUEST);
        response.write("ms must be an integer");
        return Ok(());
    };

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(ms)) => {
            response.write(format!("slept {ms}ms"));
            Ok(())
        }
        _ = ctx.done() => Err(ctx.err().map(Error::Context).unwrap_or(Error::WorkerLost)),
    }
}
