//! Portico - an authenticating edge gateway for backend service meshes.
//!
//! Portico sits at the edge of a service deployment and fronts a set of
//! backend services behind a single listener. Every proxied request passes a
//! fixed chain: bearer-token verification, per-client fixed-window rate
//! limiting, and path-preserving forwarding to the owning backend. Each
//! exchange is additionally captured into an audit record and shipped
//! asynchronously to a log sink without blocking the caller.
//!
//! # Features
//! - Declarative route registration: services and their route patterns come
//!   from one config file, with conflicts rejected at startup
//! - HS256 bearer tokens issued by the gateway itself (`POST /auth/token`)
//! - Fixed-window rate limiting keyed by `(service, client address)`
//! - Transparent reverse proxying that preserves method, path, query,
//!   headers, and body
//! - Bounded asynchronous audit pipeline with an Elasticsearch-style HTTP
//!   sink and explicit best-effort drain on shutdown
//! - Structured JSON tracing via `tracing`
//! - Graceful shutdown on SIGINT/SIGTERM
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use portico::{GatewayService, adapters::HttpClientAdapter, config::loader::load_config};
//!
//! # fn main() -> eyre::Result<()> {
//! let cfg = load_config("config.yaml")?;
//! let cfg = Arc::new(cfg);
//! let client = Arc::new(HttpClientAdapter::new(std::time::Duration::from_secs(30))?);
//! let gateway = Arc::new(GatewayService::new(cfg, client)?);
//! // Wire the gateway into the Axum router (see the binary crate).
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping business logic inside `core`. End users should prefer the
//! re-exports documented below instead of reaching into internal modules
//! directly.
//!
//! # Error Handling
//! All fallible APIs return `eyre::Result<T>` or a domain specific error type.
//! A custom error context is always attached using `WrapErr` for
//! debuggability.
//!
//! # Concurrency & Data Structures
//! For shared mutable maps the project uses `scc::HashMap` instead of
//! `dashmap` to maintain predictable performance characteristics under
//! contention.
// Re-export public modules with explicit visibility controls
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpAuditSink, HttpClientAdapter, LogAuditSink, build_router},
    core::{GatewayService, audit::AuditPipeline},
    ports::{audit_sink::AuditSink, http_client::HttpClient},
    utils::GracefulShutdown,
};
