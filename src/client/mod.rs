//! Client side of the JSON exchange.
//!
//! # Data Flow
//! ```text
//! Value → serialize → compress (optional) → POST
//!     → buffer reply → decompress (deflate → raw fallback) → parse
//!     → 200: Ok(value) | other: ClientError::Status
//! ```
//!
//! # Design Decisions
//! - One attempt per call, no retries
//! - The timeout covers connect, send and the full reply body
//! - reqwest runs without its own decompression so the codec sees the raw bytes
//! - A route is only ever a path (and query) on the configured host and port

use std::time::Duration;

use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::auth::Credential;
use crate::codec::{self, CodecError, Encoding};
use crate::config::{ClientConfig, ConfigError, TransportType};
use crate::error::ErrorKind;
use crate::http::Envelope;
use crate::observability::logging::limited_log_msg;

/// Client failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("reply is not valid JSON: {0}")]
    InvalidReply(#[source] serde_json::Error),

    #[error("invalid route '{0}': must be a path starting with a single '/'")]
    InvalidRoute(String),

    #[error("server replied {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
        /// Decoded reply body, when it could be decoded.
        body: Option<Value>,
    },
}

impl ClientError {
    /// Error kind for failures that have one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Timeout(_) => Some(ErrorKind::ClientTimeout),
            ClientError::Transport(_) => Some(ErrorKind::ClientTransportError),
            ClientError::Codec(e) => Some(e.kind()),
            ClientError::InvalidReply(_) => Some(ErrorKind::MalformedPayload),
            ClientError::InvalidRoute(_) | ClientError::Status { .. } => None,
        }
    }

    /// Status of a non-200 reply.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Partial body of a non-200 reply.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ClientError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

/// Posts JSON values to a JSON REST server.
#[derive(Debug, Clone)]
pub struct JsonRestClient {
    http: reqwest::Client,
    base: Url,
    credential: Option<Credential>,
    encoding: Encoding,
    timeout: Option<Duration>,
    max_reply_size: usize,
    max_len_msg_log: usize,
}

impl JsonRestClient {
    /// Build a client. Bad auth strings, unknown compression, unreadable
    /// CA files and incomplete client identities are rejected here rather
    /// than on the first call.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let credential = match config.auth.as_deref() {
            Some(auth) => {
                let (name, secret) = auth.split_once(':').ok_or_else(|| {
                    ConfigError::Invalid("client auth must be in the form name:secret".to_string())
                })?;
                Some(Credential::new(name, secret))
            }
            None => None,
        };

        let encoding = match config.compression.as_deref() {
            None => Encoding::Identity,
            Some(token) => match Encoding::from_header(Some(token)) {
                Ok(enc @ (Encoding::Gzip | Encoding::Deflate)) => enc,
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "unsupported client compression '{}' (expected gzip or deflate)",
                        token
                    )))
                }
            },
        };

        let scheme = match config.client_type {
            TransportType::Http => "http",
            TransportType::Https => "https",
        };
        let base = Url::parse(&format!("{}://{}:{}/", scheme, config.host, config.port))
            .map_err(|e| ConfigError::Invalid(format!("invalid client address: {}", e)))?;

        let mut builder = reqwest::Client::builder().no_proxy();
        if !config.keep_alive {
            builder = builder.pool_max_idle_per_host(0);
        } else if let Some(max) = config.max_sockets {
            builder = builder.pool_max_idle_per_host(max);
        }
        if let Some(path) = &config.ca_path {
            let pem = std::fs::read(path).map_err(ConfigError::Io)?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ConfigError::Invalid(format!("invalid CA certificate {}: {}", path, e)))?;
            builder = builder.add_root_certificate(cert);
        }
        match (&config.cert_path, &config.key_path) {
            (Some(cert_path), Some(key_path)) => {
                let cert = std::fs::read(cert_path).map_err(ConfigError::Io)?;
                let key = std::fs::read(key_path).map_err(ConfigError::Io)?;
                let identity = reqwest::Identity::from_pkcs8_pem(&cert, &key).map_err(|e| {
                    ConfigError::Invalid(format!("invalid client identity {}: {}", cert_path, e))
                })?;
                builder = builder.identity(identity);
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "client cert_path and key_path must be set together".to_string(),
                ))
            }
        }
        if !config.reject_unauthorized {
            tracing::warn!(host = %config.host, "Server certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {}", e)))?;

        let timeout = (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms));

        Ok(Self {
            http,
            base,
            credential,
            encoding,
            timeout,
            max_reply_size: config.max_reply_size,
            max_len_msg_log: config.max_len_msg_log,
        })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve `route` against the configured host and port.
    ///
    /// Scheme-relative (`//host/...`), absolute and relative routes are refused.
    pub fn route_url(&self, route: &str) -> Result<Url, ClientError> {
        if !route.starts_with('/') || route.starts_with("//") || route.contains('#') {
            return Err(ClientError::InvalidRoute(route.to_string()));
        }
        let (path, query) = match route.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (route, None),
        };
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(query);
        Ok(url)
    }

    /// Post `value` to `route` and return the decoded 200 reply.
    pub async fn post(&self, route: &str, value: &Value) -> Result<Value, ClientError> {
        let url = self.route_url(route)?;
        let plain = serde_json::to_vec(value).map_err(CodecError::Serialize)?;
        let body = codec::compress(&plain, self.encoding)?;

        tracing::debug!(
            url = %url,
            encoding = %self.encoding,
            act = body.len(),
            full = plain.len(),
            payload = %limited_log_msg(&String::from_utf8_lossy(&plain), self.max_len_msg_log),
            "Posting request"
        );

        let exchange = self.exchange(url, body);
        let (status, reply_encoding, bytes) = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ClientError::Timeout(limit))??,
            None => exchange.await?,
        };

        self.interpret(status, reply_encoding.as_deref(), &bytes)
    }

    /// Send and buffer the whole reply.
    async fn exchange(
        &self,
        url: Url,
        body: Vec<u8>,
    ) -> Result<(StatusCode, Option<String>, bytes::Bytes), ClientError> {
        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = self.encoding.header_value() {
            request = request.header(CONTENT_ENCODING, token);
        }
        if let Some(credential) = &self.credential {
            request = request.basic_auth(&credential.name, Some(&credential.secret));
        }

        let response = request.send().await?;
        let status = response.status();
        let encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        let bytes = response.bytes().await?;
        Ok((status, encoding, bytes))
    }

    fn interpret(
        &self,
        status: StatusCode,
        encoding: Option<&str>,
        bytes: &[u8],
    ) -> Result<Value, ClientError> {
        let decoded = Encoding::from_header(encoding)
            .and_then(|enc| codec::decompress(bytes, enc, self.max_reply_size))
            .map(|(plain, _)| plain.into_owned());

        tracing::debug!(
            status = status.as_u16(),
            encoding = ?encoding,
            act = bytes.len(),
            "Reply received"
        );

        if status == StatusCode::OK {
            let plain = decoded?;
            return serde_json::from_slice(&plain).map_err(ClientError::InvalidReply);
        }

        let body = decoded
            .ok()
            .and_then(|plain| serde_json::from_slice::<Value>(&plain).ok());
        let message = body
            .as_ref()
            .and_then(Envelope::from_value)
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

        tracing::debug!(
            status = status.as_u16(),
            message = %message,
            "Request rejected"
        );
        Err(ClientError::Status {
            status,
            message,
            body,
        })
    }
}
