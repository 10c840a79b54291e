//! Audit records and the asynchronous shipping pipeline.
//!
//! Every request/response exchange produces one [`AuditRecord`]. Records are
//! handed to a bounded queue consumed by dedicated worker tasks that ship
//! them to the configured [`AuditSink`]; the hand-off is fire-and-forget from
//! the request's point of view. Delivery is at-most-once by design: a full
//! queue drops the record with a local warning, shipping failures are logged
//! and discarded, and shutdown performs a best-effort bounded drain rather
//! than a guarantee.
use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::ports::audit_sink::AuditSink;

/// Maximum characters of a captured body stored in a record.
pub const BODY_SNIPPET_LIMIT: usize = 1024;

/// Appended to a captured body that exceeded [`BODY_SNIPPET_LIMIT`].
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// The structured log entry capturing one request/response exchange,
/// serialized in the document-index sink's payload shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "traceId")]
    pub trace_id: String,
    pub method: String,
    pub path: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    #[serde(rename = "requestBody", default, skip_serializing_if = "String::is_empty")]
    pub request_body: String,
    #[serde(rename = "responseBody", default, skip_serializing_if = "String::is_empty")]
    pub response_body: String,
    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
}

/// Truncate a captured body to [`BODY_SNIPPET_LIMIT`] characters, appending
/// the marker when anything was cut. Shorter bodies are stored verbatim.
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(BODY_SNIPPET_LIMIT) {
        Some((boundary, _)) => format!("{}{TRUNCATION_MARKER}", &body[..boundary]),
        None => body.to_string(),
    }
}

/// Cloneable producer half handed to the request path.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditRecord>,
}

impl AuditHandle {
    /// Enqueue a record without waiting. Never blocks the request path: when
    /// the queue is full the record is dropped and counted against nothing
    /// but a local warning.
    pub fn submit(&self, record: AuditRecord) {
        if let Err(e) = self.tx.try_send(record) {
            match e {
                mpsc::error::TrySendError::Full(record) => {
                    tracing::warn!(trace_id = %record.trace_id, "audit queue full, dropping record");
                }
                mpsc::error::TrySendError::Closed(record) => {
                    tracing::warn!(trace_id = %record.trace_id, "audit pipeline stopped, dropping record");
                }
            }
        }
    }
}

/// The bounded queue plus its shipping workers.
pub struct AuditPipeline {
    tx: mpsc::Sender<AuditRecord>,
    workers: Vec<JoinHandle<()>>,
}

impl AuditPipeline {
    /// Start `workers` shipping tasks over a queue of `capacity` records.
    pub fn start(sink: Arc<dyn AuditSink>, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<AuditRecord>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|id| {
                let sink = sink.clone();
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        let record = {
                            let mut rx = rx.lock().await;
                            rx.recv().await
                        };
                        let Some(record) = record else { break };

                        if let Err(e) = sink.ship(&record).await {
                            tracing::warn!(
                                worker = id,
                                trace_id = %record.trace_id,
                                error = %e,
                                "failed to ship audit record"
                            );
                        }
                    }
                    tracing::debug!(worker = id, "audit worker finished");
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// Producer handle for the request path.
    pub fn handle(&self) -> AuditHandle {
        AuditHandle {
            tx: self.tx.clone(),
        }
    }

    /// Close the queue and give workers up to `grace` to drain what is
    /// already enqueued. Records still in flight when the grace period ends
    /// are abandoned — an intentional at-most-once semantic.
    pub async fn shutdown(self, grace: Duration) {
        drop(self.tx);

        let deadline = tokio::time::Instant::now() + grace;
        for worker in self.workers {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, worker).await.is_err() {
                tracing::warn!("audit drain grace period elapsed with records outstanding");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::ports::audit_sink::{AuditSinkError, AuditSinkResult};

    struct CollectingSink {
        records: Mutex<Vec<AuditRecord>>,
        fail: bool,
    }

    impl CollectingSink {
        fn new(fail: bool) -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl AuditSink for CollectingSink {
        async fn ship(&self, record: &AuditRecord) -> AuditSinkResult<()> {
            if self.fail {
                return Err(AuditSinkError::Rejected(500));
            }
            self.records.lock().await.push(record.clone());
            Ok(())
        }
    }

    fn record(trace_id: &str) -> AuditRecord {
        AuditRecord {
            timestamp: Utc::now(),
            trace_id: trace_id.to_string(),
            method: "GET".to_string(),
            path: "/drivers".to_string(),
            status_code: 200,
            client_ip: "10.0.0.1".to_string(),
            user_agent: "test".to_string(),
            request_body: String::new(),
            response_body: "ok".to_string(),
            latency_ms: 3,
        }
    }

    #[test]
    fn short_bodies_are_stored_verbatim() {
        let body = "a".repeat(BODY_SNIPPET_LIMIT);
        assert_eq!(truncate_body(&body), body);
        assert_eq!(truncate_body(""), "");
    }

    #[test]
    fn long_bodies_truncate_with_marker() {
        let body = "b".repeat(BODY_SNIPPET_LIMIT + 200);
        let snippet = truncate_body(&body);
        assert_eq!(
            snippet,
            format!("{}{TRUNCATION_MARKER}", "b".repeat(BODY_SNIPPET_LIMIT))
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        // Multibyte characters must not be split mid-codepoint.
        let body = "é".repeat(BODY_SNIPPET_LIMIT + 1);
        let snippet = truncate_body(&body);
        assert!(snippet.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            snippet.chars().count(),
            BODY_SNIPPET_LIMIT + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn record_serializes_in_sink_payload_shape() {
        let json = serde_json::to_value(record("abc")).unwrap();
        assert_eq!(json["traceId"], "abc");
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["clientIP"], "10.0.0.1");
        assert_eq!(json["userAgent"], "test");
        assert_eq!(json["latencyMs"], 3);
        // Empty captures are omitted from the payload.
        assert!(json.get("requestBody").is_none());
    }

    #[tokio::test]
    async fn pipeline_ships_submitted_records() {
        let sink = Arc::new(CollectingSink::new(false));
        let pipeline = AuditPipeline::start(sink.clone(), 16, 2);
        let handle = pipeline.handle();

        handle.submit(record("one"));
        handle.submit(record("two"));
        pipeline.shutdown(Duration::from_secs(1)).await;

        let shipped = sink.records.lock().await;
        assert_eq!(shipped.len(), 2);
    }

    #[tokio::test]
    async fn shipping_failures_are_swallowed() {
        let sink = Arc::new(CollectingSink::new(true));
        let pipeline = AuditPipeline::start(sink, 16, 1);
        let handle = pipeline.handle();

        handle.submit(record("doomed"));
        // Drains without propagating the sink error anywhere.
        pipeline.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        // No workers draining: start then immediately saturate a tiny queue.
        let sink = Arc::new(CollectingSink::new(false));
        let pipeline = AuditPipeline::start(sink, 1, 1);
        let handle = pipeline.handle();

        // Regardless of how many are dropped, submit never blocks.
        for i in 0..64 {
            handle.submit(record(&format!("r{i}")));
        }
        pipeline.shutdown(Duration::from_secs(1)).await;
    }
}
