//! The gateway's two cross-cutting Axum layers.
//!
//! `require_bearer_auth` fronts every proxied route: a request without a
//! valid, unexpired, correctly signed token is rejected with 401 before it
//! can touch the rate limiter or a backend. `audit_capture` is the outermost
//! layer, wrapping auth and everything after it; it assembles one
//! [`AuditRecord`] per exchange and hands it to the pipeline without ever
//! delaying the caller's response on the outcome.
use std::{
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::BodyExt;
use uuid::Uuid;

use crate::core::{
    GatewayError, GatewayService,
    audit::{AuditHandle, AuditRecord, BODY_SNIPPET_LIMIT, truncate_body},
};

/// Bytes of response prefix retained for the audit capture. Sized so the
/// snippet limit is reachable even for four-byte UTF-8 sequences, with room
/// to detect that the body continued past the limit.
const RESPONSE_CAPTURE_CAP: usize = BODY_SNIPPET_LIMIT * 4 + 4;

/// Reject any request lacking a valid bearer token. Runs strictly before
/// rate limiting and forwarding: a failed verification short-circuits the
/// chain, so the request is never counted against a window and never reaches
/// a backend.
pub async fn require_bearer_auth(
    State(gateway): State<Arc<GatewayService>>,
    req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match gateway.auth().verify_header(header) {
        Ok(_) => next.run(req).await,
        Err(e) => GatewayError::Authentication(e).into_response(),
    }
}

/// The client identity observed on the connection. This is the raw peer
/// address: requests traversing an upstream proxy all present the proxy's
/// address, which matches the source system's behavior and is a documented
/// limitation.
pub fn client_identity(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

/// Capture the request/response exchange into an audit record.
///
/// The request body is buffered and then restored so downstream layers read
/// it unaffected. The response is relayed frame by frame as the backend
/// produces it; a bounded prefix of the stream is copied aside for the
/// record, which is finalized and submitted once the stream ends. The
/// hand-off is fire-and-forget.
pub async fn audit_capture(State(audit): State<AuditHandle>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let timestamp = chrono::Utc::now();
    let trace_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let client_ip = client_identity(&req);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let (parts, body) = req.into_parts();
    let request_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(trace_id = %trace_id, error = %e, "failed to read request body");
            // The exchange still gets a record, with nothing captured.
            audit.submit(AuditRecord {
                timestamp,
                trace_id: trace_id.clone(),
                method,
                path,
                status_code: StatusCode::BAD_REQUEST.as_u16(),
                client_ip,
                user_agent,
                request_body: String::new(),
                response_body: String::new(),
                latency_ms: started.elapsed().as_millis() as u64,
            });
            let mut response = StatusCode::BAD_REQUEST.into_response();
            if let Ok(value) = HeaderValue::from_str(&trace_id) {
                response.headers_mut().insert("x-request-id", value);
            }
            return response;
        }
    };
    let req = Request::from_parts(parts, Body::from(request_bytes.clone()));

    let response = next.run(req).await;

    let (mut parts, body) = response.into_parts();
    let status_code = parts.status.as_u16();

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        parts.headers.insert("x-request-id", value);
    }

    let record = AuditRecord {
        timestamp,
        trace_id,
        method,
        path,
        status_code,
        client_ip,
        user_agent,
        request_body: truncate_body(&String::from_utf8_lossy(&request_bytes)),
        // Filled in when the relayed stream finishes.
        response_body: String::new(),
        latency_ms: 0,
    };

    Response::from_parts(
        parts,
        Body::new(ResponseCaptureBody::new(body, record, audit, started)),
    )
}

/// Response body wrapper that forwards each frame to the caller the moment
/// it arrives while copying a bounded prefix aside for the audit record.
/// The record is finalized when the stream completes, errors, or is dropped
/// (caller went away), so auditing never holds back a single byte.
struct ResponseCaptureBody {
    inner: Body,
    captured: Vec<u8>,
    started: Instant,
    pending: Option<(AuditRecord, AuditHandle)>,
}

impl ResponseCaptureBody {
    fn new(inner: Body, record: AuditRecord, handle: AuditHandle, started: Instant) -> Self {
        Self {
            inner,
            captured: Vec::new(),
            started,
            pending: Some((record, handle)),
        }
    }

    fn finalize(&mut self) {
        let Some((mut record, handle)) = self.pending.take() else {
            return;
        };
        record.response_body = truncate_body(&String::from_utf8_lossy(&self.captured));
        record.latency_ms = self.started.elapsed().as_millis() as u64;
        tracing::info!(
            trace_id = %record.trace_id,
            method = %record.method,
            path = %record.path,
            status = record.status_code,
            latency_ms = record.latency_ms,
            "completed request"
        );
        handle.submit(record);
    }
}

impl HttpBody for ResponseCaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    let room = RESPONSE_CAPTURE_CAP.saturating_sub(this.captured.len());
                    if room > 0 {
                        this.captured.extend_from_slice(&data[..data.len().min(room)]);
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finalize();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finalize();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ResponseCaptureBody {
    fn drop(&mut self) {
        self.finalize();
    }
}
