//! The routing table built once from configuration.
//!
//! Every `(service, route)` pair in the configuration becomes one
//! [`ServiceRoute`]: an inbound path pattern plus the backend target it
//! dispatches to. The table is immutable for the life of the process and a
//! given pattern maps to exactly one service — duplicates are rejected here
//! as well as by config validation, since the table can also be built
//! directly in tests.
use std::collections::HashSet;

use url::Url;

use crate::config::models::GatewayConfig;

#[derive(Debug, thiserror::Error)]
pub enum RouteTableError {
    #[error("service '{service}': invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        service: String,
        url: String,
        source: url::ParseError,
    },

    #[error("service '{service}': invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        service: String,
        pattern: String,
        reason: String,
    },

    #[error("pattern '{pattern}' is registered more than once")]
    DuplicatePattern { pattern: String },
}

/// One dispatchable registration: an inbound pattern bound to a backend.
#[derive(Debug, Clone)]
pub struct ServiceRoute {
    service: String,
    pattern: String,
    target: Url,
}

impl ServiceRoute {
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The pattern in the router's native parameter grammar.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn target(&self) -> &Url {
        &self.target
    }
}

/// Immutable set of registrations, read-only during serving.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<ServiceRoute>,
}

impl RouteTable {
    /// Build the table from the configured service map.
    ///
    /// Fails on an unparseable base URL, a malformed parameter placeholder,
    /// or a pattern registered twice (whether by one service or two).
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RouteTableError> {
        let mut routes = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        // Deterministic registration order regardless of map iteration.
        let mut names: Vec<&String> = config.services.keys().collect();
        names.sort();

        for name in names {
            let service = &config.services[name];
            let target =
                Url::parse(&service.base_url).map_err(|source| RouteTableError::InvalidBaseUrl {
                    service: name.clone(),
                    url: service.base_url.clone(),
                    source,
                })?;

            for route in &service.routes {
                let pattern = translate_pattern(&route.path).map_err(|reason| {
                    RouteTableError::InvalidPattern {
                        service: name.clone(),
                        pattern: route.path.clone(),
                        reason,
                    }
                })?;

                if !seen.insert(pattern.clone()) {
                    return Err(RouteTableError::DuplicatePattern { pattern });
                }

                routes.push(ServiceRoute {
                    service: name.clone(),
                    pattern,
                    target: target.clone(),
                });
            }
        }

        Ok(Self { routes })
    }

    pub fn routes(&self) -> &[ServiceRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Translate a configured pattern into the router's parameter grammar.
///
/// The config grammar uses `{name}` placeholders, which is also axum's native
/// syntax, so translation is a validating pass: placeholders must be
/// non-empty identifiers, braces must pair, and the pattern must start with
/// `/`. Substitution only affects matching — the path forwarded to the
/// backend is always the concrete inbound path.
pub fn translate_pattern(pattern: &str) -> Result<String, String> {
    if !pattern.starts_with('/') {
        return Err("pattern must start with '/'".to_string());
    }

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '}' => return Err("unmatched '}'".to_string()),
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => return Err("nested '{'".to_string()),
                        Some(c) if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
                        Some(c) => {
                            return Err(format!("invalid character '{c}' in parameter name"));
                        }
                        None => return Err("unclosed '{'".to_string()),
                    }
                }
                if name.is_empty() {
                    return Err("empty parameter name".to_string());
                }
            }
            _ => {}
        }
    }

    Ok(pattern.to_string())
}
