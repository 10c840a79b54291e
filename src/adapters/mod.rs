pub mod audit_sink;
pub mod dispatcher;
pub mod http_client;
pub mod middleware;

/// Re-export commonly used types from adapters
pub use audit_sink::{HttpAuditSink, LogAuditSink};
pub use dispatcher::build_router;
pub use http_client::HttpClientAdapter;
