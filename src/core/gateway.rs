//! Core gateway composition.
//!
//! The `GatewayService` aggregates the per-request machinery built from the
//! validated configuration: the route table, the fixed-window
//! rate limiter, the token authority, and one proxy forwarder per backend
//! service. Everything is constructed eagerly at startup so the request hot
//! path performs no allocation or setup, and the whole aggregate is
//! process-wide immutable — reconfiguring the gateway means restarting it.
use std::{collections::HashMap, sync::Arc};

use crate::{
    config::models::GatewayConfig,
    core::{
        auth::TokenAuthority,
        proxy::ProxyForwarder,
        rate_limiter::FixedWindowLimiter,
        route_table::{RouteTable, RouteTableError},
    },
    ports::http_client::HttpClient,
};

/// Central per-request dependency holder, passed (behind an `Arc`) to every
/// component that needs it instead of living in package-level globals.
pub struct GatewayService {
    route_table: RouteTable,
    limiter: FixedWindowLimiter,
    auth: TokenAuthority,
    forwarders: HashMap<String, Arc<ProxyForwarder>>,
}

impl GatewayService {
    /// Build the full service graph from validated configuration.
    ///
    /// The configuration is expected to have passed
    /// `GatewayConfigValidator::validate` first; duration strings and URLs
    /// are still re-parsed here so direct construction in tests stays safe.
    pub fn new(config: Arc<GatewayConfig>, http_client: Arc<dyn HttpClient>) -> eyre::Result<Self> {
        let route_table = RouteTable::from_config(&config).map_err(|e: RouteTableError| {
            eyre::eyre!("failed to build route table: {e}")
        })?;

        let window = humantime::parse_duration(&config.rate_limit_window)
            .map_err(|e| eyre::eyre!("invalid rate_limit_window: {e}"))?;
        let limiter = FixedWindowLimiter::new(config.rate_limit_count, window);

        let token_ttl = humantime::parse_duration(&config.token_ttl)
            .map_err(|e| eyre::eyre!("invalid token_ttl: {e}"))?;
        let auth = TokenAuthority::new(&config.jwt_secret_key, &config.api_key, token_ttl);

        // One long-lived forwarder per backend target so outbound connections
        // are pooled and reused across requests.
        let mut forwarders = HashMap::new();
        for route in route_table.routes() {
            if !forwarders.contains_key(route.service()) {
                let forwarder =
                    ProxyForwarder::new(route.service(), route.target(), http_client.clone())?;
                forwarders.insert(route.service().to_string(), Arc::new(forwarder));
            }
        }

        tracing::info!(
            routes = route_table.len(),
            backends = forwarders.len(),
            rate_limit = config.rate_limit_count,
            window = %config.rate_limit_window,
            "gateway service constructed"
        );

        Ok(Self {
            route_table,
            limiter,
            auth,
            forwarders,
        })
    }

    pub fn route_table(&self) -> &RouteTable {
        &self.route_table
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.limiter
    }

    pub fn auth(&self) -> &TokenAuthority {
        &self.auth
    }

    pub fn forwarder(&self, service: &str) -> Option<Arc<ProxyForwarder>> {
        self.forwarders.get(service).cloned()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body as AxumBody;
    use hyper::{Request, Response};

    use super::*;
    use crate::{
        config::models::{RouteEntry, ServiceConfig},
        ports::http_client::HttpClientResult,
    };

    struct NullClient;

    #[async_trait]
    impl HttpClient for NullClient {
        async fn send_request(
            &self,
            _req: Request<AxumBody>,
        ) -> HttpClientResult<Response<AxumBody>> {
            Ok(Response::new(AxumBody::empty()))
        }
    }

    fn test_config() -> GatewayConfig {
        let mut config = GatewayConfig {
            jwt_secret_key: "secret".to_string(),
            api_key: "key".to_string(),
            ..GatewayConfig::default()
        };
        config.services.insert(
            "driver".to_string(),
            ServiceConfig {
                base_url: "http://localhost:8081".to_string(),
                routes: vec![
                    RouteEntry {
                        path: "/drivers".to_string(),
                    },
                    RouteEntry {
                        path: "/drivers/{id}".to_string(),
                    },
                ],
            },
        );
        config
    }

    #[tokio::test]
    async fn builds_one_forwarder_per_backend() {
        let service = GatewayService::new(Arc::new(test_config()), Arc::new(NullClient)).unwrap();
        assert_eq!(service.route_table().len(), 2);
        assert!(service.forwarder("driver").is_some());
        assert!(service.forwarder("unknown").is_none());
    }

    #[tokio::test]
    async fn construction_fails_on_bad_base_url() {
        let mut config = test_config();
        config.services.get_mut("driver").unwrap().base_url = "not a url".to_string();
        assert!(GatewayService::new(Arc::new(config), Arc::new(NullClient)).is_err());
    }

    #[tokio::test]
    async fn construction_fails_on_bad_window() {
        let mut config = test_config();
        config.rate_limit_window = "whenever".to_string();
        assert!(GatewayService::new(Arc::new(config), Arc::new(NullClient)).is_err());
    }
}
