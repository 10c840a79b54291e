//! Request-path error taxonomy.
//!
//! Every error a request can hit is terminal at the layer that detects it and
//! maps deterministically to exactly one HTTP status; nothing propagates past
//! the response boundary. Startup problems use config-level error types
//! instead and abort the process before serving begins.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::core::{auth::AuthError, proxy::UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing/malformed/expired/invalid-signature token, or a wrong API key
    /// at issuance. Surfaced as 401; never retried internally.
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// The (service, client) window is exhausted. Surfaced as 429;
    /// self-healing once the window elapses.
    #[error("rate limit exceeded for service '{service}'")]
    RateLimited { service: String },

    /// The backend was unreachable or timed out. Surfaced as 502; retry
    /// policy, if any, belongs to the caller.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The request body failed explicit schema validation.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            GatewayError::Upstream(e) => tracing::error!(error = %e, "upstream failure"),
            GatewayError::RateLimited { service } => {
                tracing::debug!(service = %service, "request rate limited");
            }
            GatewayError::Authentication(e) => tracing::debug!(error = %e, "request rejected"),
            GatewayError::InvalidBody(reason) => tracing::debug!(%reason, "invalid request body"),
        }

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
