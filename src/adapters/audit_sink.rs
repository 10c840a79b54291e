use async_trait::async_trait;

use crate::{
    core::audit::AuditRecord,
    ports::audit_sink::{AuditSink, AuditSinkError, AuditSinkResult},
};

/// Ships audit records to an external document-index store over HTTP.
///
/// Each record becomes one `POST {sink_url}/{index}/_doc` with the record as
/// the JSON document. The store is treated as a write-only sink: responses
/// are only inspected for success, never read back.
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAuditSink {
    pub fn new(sink_url: &str, index: &str) -> Self {
        let endpoint = format!("{}/{index}/_doc", sink_url.trim_end_matches('/'));
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn ship(&self, record: &AuditRecord) -> AuditSinkResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| AuditSinkError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuditSinkError::Rejected(response.status().as_u16()))
        }
    }
}

/// Fallback sink used when no document-index store is configured: records go
/// to the local structured log and nowhere else.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn ship(&self, record: &AuditRecord) -> AuditSinkResult<()> {
        tracing::info!(
            trace_id = %record.trace_id,
            method = %record.method,
            path = %record.path,
            status = record.status_code,
            client_ip = %record.client_ip,
            latency_ms = record.latency_ms,
            "audit record (no sink configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_construction_handles_trailing_slash() {
        let sink = HttpAuditSink::new("http://localhost:9200/", "gateway-logs");
        assert_eq!(sink.endpoint, "http://localhost:9200/gateway-logs/_doc");

        let sink = HttpAuditSink::new("http://localhost:9200", "gateway-logs");
        assert_eq!(sink.endpoint, "http://localhost:9200/gateway-logs/_doc");
    }
}
