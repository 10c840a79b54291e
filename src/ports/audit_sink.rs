use async_trait::async_trait;
use thiserror::Error;

use crate::core::audit::AuditRecord;

/// Error shipping an audit record to the external sink. These are logged
/// locally and otherwise swallowed — shipping never affects a caller's
/// response and is never retried.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AuditSinkError {
    #[error("sink request failed: {0}")]
    Transport(String),

    #[error("sink rejected record with status {0}")]
    Rejected(u16),
}

pub type AuditSinkResult<T> = Result<T, AuditSinkError>;

/// AuditSink defines the port (interface) for the write-only document-index
/// store audit records are shipped to.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Ship one record. At-most-once: the pipeline does not retry failures.
    async fn ship(&self, record: &AuditRecord) -> AuditSinkResult<()>;
}
