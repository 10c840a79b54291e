//! Router construction: turns the route table into one dispatchable Axum
//! registration per `(service, route)` pair and wires up the per-request
//! chain — authenticate, then rate-limit, then forward — with audit capture
//! wrapping the whole thing.
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, rejection::JsonRejection},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{
    adapters::middleware::{audit_capture, client_identity, require_bearer_auth},
    core::{GatewayError, GatewayService, audit::AuditHandle, route_table::ServiceRoute},
};

/// Request body for `POST /auth/token`.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
}

impl TokenRequest {
    /// Explicit schema check: `apiKey` must be present and non-empty.
    pub fn validate(&self) -> Result<&str, GatewayError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GatewayError::InvalidBody("apiKey is required".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
}

/// Build the complete gateway router.
///
/// Layer order (outermost first): trace, audit capture, then the token
/// endpoint alongside the auth-gated proxied routes. The issuance endpoint is
/// the single route exempt from verification.
pub fn build_router(gateway: Arc<GatewayService>, audit: AuditHandle) -> Router {
    let mut proxied = Router::new();
    for route in gateway.route_table().routes() {
        let pattern = route.pattern().to_string();
        let route = route.clone();
        let gateway_for_route = gateway.clone();
        proxied = proxied.route(
            &pattern,
            any(move |req: Request| {
                let gateway = gateway_for_route.clone();
                let route = route.clone();
                async move { dispatch(gateway, route, req).await }
            }),
        );
    }
    let proxied = proxied.layer(middleware::from_fn_with_state(
        gateway.clone(),
        require_bearer_auth,
    ));

    let issue_gateway = gateway.clone();
    Router::new()
        .route(
            "/auth/token",
            post(move |payload: Result<Json<TokenRequest>, JsonRejection>| {
                let gateway = issue_gateway.clone();
                async move { issue_token(gateway, payload).await }
            }),
        )
        .merge(proxied)
        .layer(middleware::from_fn_with_state(audit, audit_capture))
        .layer(TraceLayer::new_for_http())
}

/// The post-auth per-request chain for one matched registration: count the
/// request against its (service, client) window, then forward. The increment
/// happens before the comparison, so a rejected request still consumed a
/// slot.
async fn dispatch(gateway: Arc<GatewayService>, route: ServiceRoute, req: Request) -> Response {
    let client = client_identity(&req);
    let decision = gateway.limiter().check(route.service(), &client).await;
    if !decision.allowed {
        tracing::debug!(
            service = route.service(),
            client = %client,
            count = decision.count,
            limit = decision.limit,
            "rate limit exceeded"
        );
        return GatewayError::RateLimited {
            service: route.service().to_string(),
        }
        .into_response();
    }

    let Some(forwarder) = gateway.forwarder(route.service()) else {
        // The table and forwarder registry are built from the same config;
        // a miss here means a construction bug, not caller error.
        tracing::error!(service = route.service(), "no forwarder for matched route");
        return http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    match forwarder.forward(req).await {
        Ok(response) => response,
        Err(e) => GatewayError::Upstream(e).into_response(),
    }
}

async fn issue_token(
    gateway: Arc<GatewayService>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return GatewayError::InvalidBody(rejection.body_text()).into_response();
        }
    };

    let api_key = match request.validate() {
        Ok(key) => key,
        Err(e) => return e.into_response(),
    };

    match gateway.auth().issue(api_key) {
        Ok(token) => Json(TokenResponse { token }).into_response(),
        Err(e) => GatewayError::Authentication(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_request_validation() {
        let ok = TokenRequest {
            api_key: Some("key".to_string()),
        };
        assert_eq!(ok.validate().unwrap(), "key");

        let missing = TokenRequest { api_key: None };
        assert!(matches!(
            missing.validate(),
            Err(GatewayError::InvalidBody(_))
        ));

        let empty = TokenRequest {
            api_key: Some(String::new()),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn token_request_accepts_camel_case_payload() {
        let request: TokenRequest = serde_json::from_str(r#"{"apiKey": "letmein"}"#).unwrap();
        assert_eq!(request.validate().unwrap(), "letmein");
    }
}
