//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (route users exist in the auth directory)
//! - Validate value ranges (body limit > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Duplicate routes are not an error: the registry keeps the last one

use std::net::SocketAddr;

use crate::config::schema::{ServiceConfig, TransportType};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    if server.host.trim().is_empty() {
        errors.push(ValidationError::new("server.host", "must not be empty"));
    }
    if server.max_body_size == 0 {
        errors.push(ValidationError::new("server.max_body_size", "must be greater than 0"));
    }
    if server.server_type == TransportType::Https && server.tls.is_none() {
        errors.push(ValidationError::new(
            "server.tls",
            "cert_path and key_path are required when server_type is https",
        ));
    }
    if let Some(tls) = &server.tls {
        if tls.request_cert && tls.ca.is_empty() {
            errors.push(ValidationError::new(
                "server.tls.ca",
                "at least one CA is required when request_cert is set",
            ));
        }
    }

    if let Some(auth) = &server.auth {
        if auth.realm.trim().is_empty() {
            errors.push(ValidationError::new("server.auth.realm", "must not be empty"));
        }
        if auth.users.is_empty() {
            errors.push(ValidationError::new("server.auth.users", "must list at least one user"));
        }
        for (name, digest) in &auth.users {
            if digest.len() != 40 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
                errors.push(ValidationError::new(
                    format!("server.auth.users.{name}"),
                    "must be a 40 character sha1 hex digest",
                ));
            }
        }
    }

    for (i, route) in config.routes.iter().enumerate() {
        let field = |name: &str| format!("routes[{i}].{name}");

        if !route.route.starts_with('/') {
            errors.push(ValidationError::new(field("route"), "must start with '/'"));
        }
        if route.action.trim().is_empty() {
            errors.push(ValidationError::new(field("action"), "must not be empty"));
        }
        for user in &route.valid_users {
            if user.is_empty() {
                errors.push(ValidationError::new(field("valid_users"), "contains an empty name"));
                continue;
            }
            if let Some(auth) = &server.auth {
                if !auth.users.contains_key(user) {
                    errors.push(ValidationError::new(
                        field("valid_users"),
                        format!("user '{user}' is not in server.auth.users"),
                    ));
                }
            }
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AuthConfig, RouteConfig, TlsConfig};

    fn route(path: &str, users: &[&str]) -> RouteConfig {
        RouteConfig {
            name: None,
            route: path.to_string(),
            valid_users: users.iter().map(|u| u.to_string()).collect(),
            action: "echo".to_string(),
            parameters: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.server.max_body_size = 0;
        config.server.server_type = TransportType::Https;
        config.routes.push(route("no-slash", &[]));

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["server.max_body_size", "server.tls", "routes[0].route"]);
    }

    #[test]
    fn test_route_users_must_exist_when_auth_enabled() {
        let mut config = ServiceConfig::default();
        let mut auth = AuthConfig {
            realm: "r".to_string(),
            ..Default::default()
        };
        auth.users.insert("test1".to_string(), "a".repeat(40));
        config.server.auth = Some(auth);
        config.routes.push(route("/ok/", &["test1"]));
        config.routes.push(route("/bad/", &["ghost"]));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "routes[1].valid_users");
    }

    #[test]
    fn test_users_unchecked_without_auth() {
        let mut config = ServiceConfig::default();
        config.routes.push(route("/a/", &["anyone"]));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_client_cert_request_needs_ca() {
        let mut config = ServiceConfig::default();
        config.server.server_type = TransportType::Https;
        config.server.tls = Some(TlsConfig {
            cert_path: "cert.pem".to_string(),
            key_path: "key.pem".to_string(),
            ca: Vec::new(),
            request_cert: true,
            reject_unauthorized: true,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "server.tls.ca");

        if let Some(tls) = config.server.tls.as_mut() {
            tls.ca.push("clients-ca.pem".to_string());
        }
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_bad_digest_and_metrics_address() {
        let mut config = ServiceConfig::default();
        let mut auth = AuthConfig {
            realm: "r".to_string(),
            ..Default::default()
        };
        auth.users.insert("u".to_string(), "not-a-digest".to_string());
        config.server.auth = Some(auth);
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
