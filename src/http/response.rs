//! Reply construction.
//!
//! # Responsibilities
//! - Normalize non-success outcomes into the `{code, message?}` envelope
//! - Encode the reply with the exchange's effective encoding
//! - Set `Content-Type`, `Content-Encoding` and the auth challenge
//!
//! # Design Decisions
//! - A raw-deflate exchange is answered raw-deflated under the `deflate` token
//! - Encoding failures degrade to an uncompressed 500 envelope

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{self, CodecError, Encoding};

/// Fixed message for callers outside a route's user list.
pub const INVALID_USER: &str = "INVALID USER";

const APPLICATION_JSON: &str = "application/json";

/// Body of every non-success reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn new(status: StatusCode, message: Option<String>) -> Self {
        Self {
            code: status.as_u16(),
            message,
        }
    }

    /// Read an envelope back out of a decoded reply.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("code".to_string(), Value::from(self.code));
        if let Some(message) = &self.message {
            map.insert("message".to_string(), Value::from(message.as_str()));
        }
        Value::Object(map)
    }
}

/// A reply ready to be encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    pub encoding: Encoding,
    /// `WWW-Authenticate` value for 401 challenges.
    pub challenge: Option<String>,
}

impl Reply {
    /// 200 carrying the handler's value as is.
    pub fn ok(body: Value, encoding: Encoding) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            encoding,
            challenge: None,
        }
    }

    /// Non-success reply with an envelope body.
    pub fn error(status: StatusCode, message: Option<String>, encoding: Encoding) -> Self {
        Self {
            status,
            body: Envelope::new(status, message).to_value(),
            encoding,
            challenge: None,
        }
    }

    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.challenge = Some(challenge.into());
        self
    }

    /// Encoded body bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(&self.body, self.encoding)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let bytes = match self.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, encoding = %self.encoding, "Failed to encode reply");
                let fallback = Reply::error(StatusCode::INTERNAL_SERVER_ERROR, None, Encoding::Identity);
                return fallback.into_response();
            }
        };

        let mut response = (self.status, Body::from(bytes)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        if let Some(token) = self.encoding.header_value() {
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(token));
        }
        if let Some(challenge) = self.challenge {
            match HeaderValue::from_str(&challenge) {
                Ok(value) => {
                    headers.insert(header::WWW_AUTHENTICATE, value);
                }
                Err(_) => tracing::error!(challenge = %challenge, "Realm is not a valid header value"),
            }
        }
        response
    }
}
