use std::{collections::HashMap, net::SocketAddr};

use eyre::Result;
use url::Url;

use crate::config::models::GatewayConfig;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Route conflict detected: {message}")]
    RouteConflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Gateway configuration validator
pub struct GatewayConfigValidator;

impl GatewayConfigValidator {
    /// Validate the entire gateway configuration.
    ///
    /// All problems are collected before failing so an operator sees every
    /// mistake in one pass rather than one per restart.
    pub fn validate(config: &GatewayConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if config.jwt_secret_key.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "jwt_secret_key".to_string(),
            });
        }
        if config.api_key.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "api_key".to_string(),
            });
        }

        for (field, value) in [
            ("rate_limit_window", &config.rate_limit_window),
            ("token_ttl", &config.token_ttl),
            ("upstream_timeout", &config.upstream_timeout),
        ] {
            if let Err(e) = Self::validate_duration(field, value) {
                errors.push(e);
            }
        }

        if config.rate_limit_count == 0 {
            errors.push(ValidationError::InvalidField {
                field: "rate_limit_count".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if config.services.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "services".to_string(),
            });
        }

        for (name, service) in &config.services {
            if let Err(e) =
                Self::validate_url(&service.base_url, &format!("service '{name}' base_url"))
            {
                errors.push(e);
            }
            for route in &service.routes {
                if !route.path.starts_with('/') {
                    errors.push(ValidationError::InvalidField {
                        field: format!("service '{name}' route '{}'", route.path),
                        message: "Route paths must start with '/'".to_string(),
                    });
                }
            }
        }

        errors.extend(Self::check_route_conflicts(config));

        if let Some(audit) = &config.audit {
            if let Err(e) = Self::validate_url(&audit.sink_url, "audit.sink_url") {
                errors.push(e);
            }
            if audit.queue_capacity == 0 {
                errors.push(ValidationError::InvalidField {
                    field: "audit.queue_capacity".to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
            if audit.workers == 0 {
                errors.push(ValidationError::InvalidField {
                    field: "audit.workers".to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_duration(field: &str, value: &str) -> ValidationResult<()> {
        match humantime::parse_duration(value) {
            Ok(d) if !d.is_zero() => Ok(()),
            Ok(_) => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: "duration must be greater than zero".to_string(),
            }),
            Err(e) => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("invalid duration '{value}': {e}"),
            }),
        }
    }

    fn validate_url(url: &str, field: &str) -> ValidationResult<()> {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                if parsed.host_str().is_none() {
                    Err(ValidationError::InvalidField {
                        field: field.to_string(),
                        message: format!("URL '{url}' has no host"),
                    })
                } else {
                    Ok(())
                }
            }
            Ok(parsed) => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("URL scheme '{}' must be http or https", parsed.scheme()),
            }),
            Err(e) => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("invalid URL '{url}': {e}"),
            }),
        }
    }

    /// A given inbound pattern must map to exactly one service. The source
    /// system silently let the last registration win; here a duplicate —
    /// within one service or across two — is a startup error.
    fn check_route_conflicts(config: &GatewayConfig) -> Vec<ValidationError> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        let mut errors = Vec::new();

        let mut names: Vec<&String> = config.services.keys().collect();
        names.sort();

        for name in names {
            for route in &config.services[name].routes {
                if let Some(prior) = seen.insert(route.path.as_str(), name.as_str()) {
                    errors.push(ValidationError::RouteConflict {
                        message: format!(
                            "pattern '{}' registered by both '{prior}' and '{name}'",
                            route.path
                        ),
                    });
                }
            }
        }
        errors
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let formatted: Vec<String> = errors.iter().map(|e| format!("  • {e}")).collect();
        format!("{} error(s):\n{}", errors.len(), formatted.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::{RouteEntry, ServiceConfig};

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig {
            jwt_secret_key: "secret".to_string(),
            api_key: "key".to_string(),
            ..GatewayConfig::default()
        };
        config.services.insert(
            "driver".to_string(),
            ServiceConfig {
                base_url: "http://localhost:8081".to_string(),
                routes: vec![RouteEntry {
                    path: "/drivers".to_string(),
                }],
            },
        );
        config
    }

    #[test]
    fn accepts_valid_config() {
        assert!(GatewayConfigValidator::validate(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_bad_listen_address() {
        let mut config = valid_config();
        config.listen_addr = "not-an-address".to_string();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn rejects_malformed_base_url() {
        let mut config = valid_config();
        config.services.get_mut("driver").unwrap().base_url = "::notaurl::".to_string();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn rejects_non_http_scheme() {
        let mut config = valid_config();
        config.services.get_mut("driver").unwrap().base_url = "ftp://localhost".to_string();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn rejects_zero_rate_limit() {
        let mut config = valid_config();
        config.rate_limit_count = 0;
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn rejects_bad_window_duration() {
        let mut config = valid_config();
        config.rate_limit_window = "soon".to_string();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn rejects_missing_secrets() {
        let mut config = valid_config();
        config.jwt_secret_key.clear();
        config.api_key.clear();
        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("jwt_secret_key"));
        assert!(message.contains("api_key"));
    }

    #[test]
    fn rejects_duplicate_pattern_across_services() {
        let mut config = valid_config();
        config.services.insert(
            "rider".to_string(),
            ServiceConfig {
                base_url: "http://localhost:8082".to_string(),
                routes: vec![RouteEntry {
                    path: "/drivers".to_string(),
                }],
            },
        );
        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("registered by both"));
    }

    #[test]
    fn rejects_pattern_without_leading_slash() {
        let mut config = valid_config();
        config
            .services
            .get_mut("driver")
            .unwrap()
            .routes
            .push(RouteEntry {
                path: "drivers/{id}".to_string(),
            });
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }
}
