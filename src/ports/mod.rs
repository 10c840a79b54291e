pub mod audit_sink;
pub mod http_client;
