//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default, so an empty file is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a weave process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WeaveConfig {
    /// Inbound HTTP server settings.
    pub server: ServerConfig,

    /// Outbound HTTP client settings.
    pub client: ClientConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Inbound HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Deadline given to every request context, in milliseconds. 0 disables it.
    pub request_timeout_ms: u64,

    /// Largest accepted request body.
    pub body_limit_bytes: usize,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 30_000,
            body_limit_bytes: crate::http::endpoint::DEFAULT_BODY_LIMIT,
        }
    }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Scope prepended to every metric name.
    pub metrics_prefix: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            metrics_prefix: "weave".to_string(),
        }
    }
}
