//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service
//! and the client. All types derive Serde traits for deserialization from
//! config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Default limit for payload excerpts in debug logs.
pub const DEFAULT_MAX_LEN_MSG_LOG: usize = 50;

/// Root configuration for the JSON REST service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Server listener, auth and pipeline settings.
    pub server: ServerConfig,

    /// Route definitions mapping paths to actions.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Plain HTTP or HTTPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    Http,
    Https,
}

/// How the per-route `valid_users` list is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserCheck {
    /// Check the list against the authenticated identity. Without an
    /// authenticator the list is not enforced.
    #[default]
    Authenticated,
    /// Always check the list against the basic-auth name of the request,
    /// whether or not an authenticator is configured.
    Header,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// `http` or `https`.
    pub server_type: TransportType,

    /// Certificate and key, required for `https`.
    pub tls: Option<TlsConfig>,

    /// Basic authentication; absent means no authenticator.
    pub auth: Option<AuthConfig>,

    /// Enforcement mode of the per-route user lists.
    pub user_check: UserCheck,

    /// Include error causes in reply envelopes.
    pub expose_cause: bool,

    /// Maximum characters of a payload to include in debug logs.
    pub max_len_msg_log: usize,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            server_type: TransportType::Http,
            tls: None,
            auth: None,
            user_check: UserCheck::Authenticated,
            expose_cause: false,
            max_len_msg_log: DEFAULT_MAX_LEN_MSG_LOG,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,

    /// CA bundle(s) that sign client certificates; a single path or a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub ca: Vec<String>,

    /// Ask connecting clients for a certificate.
    #[serde(default)]
    pub request_cert: bool,

    /// With `request_cert`, refuse clients that present no certificate.
    #[serde(default = "default_true")]
    pub reject_unauthorized: bool,
}

fn default_true() -> bool {
    true
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

/// Basic authentication settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Realm announced in the challenge and mixed into every digest.
    pub realm: String,

    /// User name → hex SHA-1 of `realm ‖ name ‖ secret`.
    pub users: BTreeMap<String, String>,
}

/// Route configuration binding a path to an action.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Human readable name for logging.
    #[serde(default)]
    pub name: Option<String>,

    /// Exact request path, e.g. "/cs/test/1/".
    pub route: String,

    /// Users allowed to call this route.
    #[serde(default)]
    pub valid_users: Vec<String>,

    /// Identifier of the action in the catalog.
    pub action: String,

    /// Opaque action configuration.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `http` or `https`.
    pub client_type: TransportType,

    pub host: String,

    pub port: u16,

    /// `name:secret` sent as basic auth.
    pub auth: Option<String>,

    /// `gzip` or `deflate` request compression.
    pub compression: Option<String>,

    /// Whole-exchange timeout in milliseconds, 0 disables it.
    pub timeout_ms: u64,

    /// Keep idle connections for reuse.
    pub keep_alive: bool,

    /// Cap on idle connections kept per host.
    pub max_sockets: Option<usize>,

    /// Extra PEM root certificate trusted for `https`.
    pub ca_path: Option<String>,

    /// Client certificate (PEM) presented to servers asking for one.
    pub cert_path: Option<String>,

    /// PKCS#8 private key (PEM) of `cert_path`.
    pub key_path: Option<String>,

    /// Verify the server certificate. Disable only for self-signed test setups.
    pub reject_unauthorized: bool,

    /// Maximum inflated reply size in bytes.
    pub max_reply_size: usize,

    /// Maximum characters of a payload to include in debug logs.
    pub max_len_msg_log: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_type: TransportType::Http,
            host: "127.0.0.1".to_string(),
            port: 80,
            auth: None,
            compression: None,
            timeout_ms: 0,
            keep_alive: true,
            max_sockets: None,
            ca_path: None,
            cert_path: None,
            key_path: None,
            reject_unauthorized: true,
            max_reply_size: 16 * 1024 * 1024, // 16MB
            max_len_msg_log: DEFAULT_MAX_LEN_MSG_LOG,
        }
    }
}
