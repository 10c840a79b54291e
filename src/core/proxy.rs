//! Per-backend reverse-proxy forwarding.
//!
//! One [`ProxyForwarder`] is constructed per backend target at startup and
//! lives for the life of the process, so every forwarder shares the pooled
//! connections of the underlying [`HttpClient`] port. The forwarder retargets
//! the request URI at the backend's authority and rewrites the `Host` header;
//! the path and query are forwarded exactly as received — parameter
//! placeholders were already resolved into concrete values by the router, so
//! there is nothing for the proxy to substitute.
use std::sync::Arc;

use axum::body::Body as AxumBody;
use http::{Uri, header, header::HeaderValue, uri::PathAndQuery};
use hyper::{Request, Response};
use url::Url;

use crate::ports::http_client::{HttpClient, HttpClientError};

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The backend could not be reached, errored at the transport level, or
    /// timed out. Surfaced to the caller as 502, never retried here.
    #[error("backend '{service}' unavailable: {source}")]
    Unavailable {
        service: String,
        #[source]
        source: HttpClientError,
    },

    /// The forwarded request could not be constructed.
    #[error("failed to build upstream request for '{service}': {reason}")]
    BadRequest { service: String, reason: String },
}

/// A long-lived forwarder bound to one backend target.
pub struct ProxyForwarder {
    service: String,
    scheme: String,
    authority: String,
    host_header: HeaderValue,
    client: Arc<dyn HttpClient>,
}

impl ProxyForwarder {
    /// Bind a forwarder to a backend base URL. The URL was validated at
    /// startup; a host is guaranteed present.
    pub fn new(service: &str, target: &Url, client: Arc<dyn HttpClient>) -> eyre::Result<Self> {
        let host = target
            .host_str()
            .ok_or_else(|| eyre::eyre!("base URL '{target}' has no host"))?;
        let authority = match target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let host_header = HeaderValue::from_str(&authority)
            .map_err(|e| eyre::eyre!("base URL '{target}' yields an invalid Host header: {e}"))?;

        Ok(Self {
            service: service.to_string(),
            scheme: target.scheme().to_string(),
            authority,
            host_header,
            client,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Forward a matched request to the backend and relay its response
    /// verbatim.
    pub async fn forward(
        &self,
        mut req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, UpstreamError> {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map_or("/", PathAndQuery::as_str)
            .to_string();

        let uri = Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.authority.as_str())
            .path_and_query(path_and_query.as_str())
            .build()
            .map_err(|e| UpstreamError::BadRequest {
                service: self.service.clone(),
                reason: e.to_string(),
            })?;
        *req.uri_mut() = uri;

        req.headers_mut()
            .insert(header::HOST, self.host_header.clone());

        tracing::debug!(
            service = %self.service,
            backend = %self.authority,
            path = %path_and_query,
            "forwarding request"
        );

        self.client
            .send_request(req)
            .await
            .map_err(|source| UpstreamError::Unavailable {
                service: self.service.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use http::StatusCode;
    use tokio::sync::Mutex;

    use super::*;
    use crate::ports::http_client::HttpClientResult;

    /// Records the outgoing request and answers with a canned response.
    struct RecordingClient {
        seen: Mutex<Vec<(String, Option<String>)>>,
        fail: bool,
    }

    impl RecordingClient {
        fn new(fail: bool) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn send_request(
            &self,
            req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            let host = req
                .headers()
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen
                .lock()
                .await
                .push((req.uri().to_string(), host));

            if self.fail {
                return Err(HttpClientError::ConnectionError(
                    "connection refused".to_string(),
                ));
            }
            Ok(Response::builder()
                .status(StatusCode::OK)
                .body(Body::from("ok"))
                .unwrap())
        }
    }

    fn forwarder(client: Arc<RecordingClient>) -> ProxyForwarder {
        let target = Url::parse("http://backend.internal:8081").unwrap();
        ProxyForwarder::new("driver", &target, client).unwrap()
    }

    #[tokio::test]
    async fn retargets_uri_and_rewrites_host_keeping_path() {
        let client = Arc::new(RecordingClient::new(false));
        let forwarder = forwarder(client.clone());

        let req = Request::builder()
            .uri("/drivers/507f1f77bcf86cd799439011?near=1")
            .body(Body::empty())
            .unwrap();

        let response = forwarder.forward(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = client.seen.lock().await;
        assert_eq!(
            seen[0].0,
            "http://backend.internal:8081/drivers/507f1f77bcf86cd799439011?near=1"
        );
        assert_eq!(seen[0].1.as_deref(), Some("backend.internal:8081"));
    }

    #[tokio::test]
    async fn transport_failure_maps_to_unavailable() {
        let client = Arc::new(RecordingClient::new(true));
        let forwarder = forwarder(client);

        let req = Request::builder()
            .uri("/drivers")
            .body(Body::empty())
            .unwrap();

        assert!(matches!(
            forwarder.forward(req).await,
            Err(UpstreamError::Unavailable { .. })
        ));
    }
}
