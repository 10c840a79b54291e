//! Configuration data structures for Portico.
//!
//! These types map directly to YAML (also JSON / TOML) configuration files.
//! They are intentionally serde‑friendly and include defaults so that minimal
//! configs remain concise. Everything here is immutable after startup; there
//! is no hot‑reload contract, so changing any of it requires a restart.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_rate_limit_window() -> String {
    "10s".to_string()
}

fn default_rate_limit_count() -> u64 {
    100
}

fn default_token_ttl() -> String {
    "1h".to_string()
}

fn default_upstream_timeout() -> String {
    "30s".to_string()
}

fn default_audit_index() -> String {
    "gateway-logs".to_string()
}

fn default_audit_queue_capacity() -> usize {
    1024
}

fn default_audit_workers() -> usize {
    2
}

/// A single route entry under a service: the inbound path pattern, which may
/// contain named parameters delimited as `{name}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: String,
}

/// One backend service: the base URL requests are proxied to plus the set of
/// inbound path patterns the gateway registers for it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

/// Configuration for the asynchronous audit pipeline's document-index sink.
///
/// When the whole block is absent the pipeline still runs but records are
/// written to the local log instead of being shipped anywhere.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditConfig {
    /// Base URL of the document-index store (e.g. `http://localhost:9200`).
    pub sink_url: String,
    /// Index name records are written under.
    #[serde(default = "default_audit_index")]
    pub index: String,
    /// Capacity of the bounded shipping queue. Records arriving while the
    /// queue is full are dropped with a local warning (at-most-once).
    #[serde(default = "default_audit_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of dedicated shipping worker tasks.
    #[serde(default = "default_audit_workers")]
    pub workers: usize,
}

/// Top-level gateway configuration consumed once at startup.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Socket address the gateway listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Map from service name to its backend definition.
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,

    /// Fixed rate-limit window as a humantime duration string (e.g. "10s").
    /// The window TTL is set once when a counter is created and never
    /// extended by later requests.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window: String,

    /// Maximum accepted requests per (service, client) key per window.
    #[serde(default = "default_rate_limit_count")]
    pub rate_limit_count: u64,

    /// Shared secret used to sign and verify bearer tokens.
    pub jwt_secret_key: String,

    /// The API key callers must present to `/auth/token` to be issued a token.
    pub api_key: String,

    /// Validity horizon of issued tokens, fixed per process.
    #[serde(default = "default_token_ttl")]
    pub token_ttl: String,

    /// Per-request timeout for proxied backend calls.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout: String,

    #[serde(default)]
    pub audit: Option<AuditConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            services: HashMap::new(),
            rate_limit_window: default_rate_limit_window(),
            rate_limit_count: default_rate_limit_count(),
            jwt_secret_key: String::new(),
            api_key: String::new(),
            token_ttl: default_token_ttl(),
            upstream_timeout: default_upstream_timeout(),
            audit: None,
        }
    }
}
