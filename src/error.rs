//! Error taxonomy and status mapping.
//!
//! # Responsibilities
//! - Name every way an exchange can fail, on either side of the wire
//! - Map each failure to the HTTP status the server replies with
//!
//! # Design Decisions
//! - Status mapping is a pure function of the kind
//! - Client-side kinds never reach the wire and have no status
//! - Concern-specific error types (`CodecError`, `ActionError`, `ClientError`)
//!   each report their kind through `kind()`

use axum::http::StatusCode;

/// Every failure kind known to the server and client pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No action registered for the requested path.
    RouteNotFound,
    /// Missing or invalid credential while an authenticator is configured.
    Unauthenticated,
    /// Caller is not in the route's permitted user list.
    Unauthorized,
    /// Request body exceeds the configured limit.
    PayloadTooLarge,
    /// `Content-Encoding` token the codec does not know.
    UnsupportedEncoding,
    /// Body could not be decompressed with the announced encoding.
    CompressionError,
    /// Body is not valid UTF-8 JSON after decompression.
    MalformedPayload,
    HandlerBadRequest,
    HandlerNotFound,
    HandlerInternalError,
    /// Catch-all for handler failures of any other kind.
    HandlerUnknownError,
    ClientTimeout,
    ClientTransportError,
}

impl ErrorKind {
    /// HTTP status the server replies with for this kind.
    ///
    /// Returns `None` for kinds that only exist on the client side.
    pub fn status(self) -> Option<StatusCode> {
        let status = match self {
            ErrorKind::RouteNotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthenticated | ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::UnsupportedEncoding
            | ErrorKind::CompressionError
            | ErrorKind::MalformedPayload
            | ErrorKind::HandlerBadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::HandlerNotFound => StatusCode::NOT_FOUND,
            ErrorKind::HandlerInternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::HandlerUnknownError => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ClientTimeout | ErrorKind::ClientTransportError => return None,
        };
        Some(status)
    }

    /// Stable label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RouteNotFound => "route_not_found",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::UnsupportedEncoding => "unsupported_encoding",
            ErrorKind::CompressionError => "compression_error",
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::HandlerBadRequest => "handler_bad_request",
            ErrorKind::HandlerNotFound => "handler_not_found",
            ErrorKind::HandlerInternalError => "handler_internal_error",
            ErrorKind::HandlerUnknownError => "handler_unknown_error",
            ErrorKind::ClientTimeout => "client_timeout",
            ErrorKind::ClientTransportError => "client_transport_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
