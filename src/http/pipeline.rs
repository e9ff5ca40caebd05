//! Per-request processing pipeline.
//!
//! # Stages
//! ```text
//! Received → Authenticated → Authorized → BodyComplete → Decoded → Dispatched → Replied
//!     │            │              │             │            │           │
//!     └────────────┴──────────────┴─────────────┴────────────┴───────────┴──→ Failed(kind) → Replied
//! ```
//!
//! # Design Decisions
//! - Each request works on the registry/catalog snapshot loaded when it
//!   arrived; a concurrent reload never changes an exchange half way
//! - Failures carry an `ErrorKind`; the status comes from `ErrorKind::status`
//! - Causes reach the wire only when `expose_cause` is set
//! - The body buffer lives on this task and is dropped with the pipeline
//! - `max_body_size` caps both the received bytes and the inflated payload
//! - Replies are encoded exactly once, in `IntoResponse`

use std::time::Instant;

use axum::body::{Body, HttpBody};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;

use crate::auth::Credential;
use crate::codec::{self, Encoding};
use crate::config::{ServerConfig, UserCheck};
use crate::error::ErrorKind;
use crate::http::request::{client_id, content_encoding, RequestIdExt};
use crate::http::response::{Reply, INVALID_USER};
use crate::http::server::AppState;
use crate::observability::logging::{limited_log_bytes, limited_log_msg};
use crate::observability::metrics;

/// Pipeline knobs taken from the server configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub expose_cause: bool,
    pub user_check: UserCheck,
    pub max_len_msg_log: usize,
    pub max_body_size: usize,
}

impl From<&ServerConfig> for PipelineSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            expose_cause: config.expose_cause,
            user_check: config.user_check,
            max_len_msg_log: config.max_len_msg_log,
            max_body_size: config.max_body_size,
        }
    }
}

/// Position of a request in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authenticated,
    Authorized,
    BodyComplete,
    Decoded,
    Dispatched,
    Replied,
}

/// Why an exchange stopped early.
#[derive(Debug)]
struct Failure {
    stage: Stage,
    kind: ErrorKind,
    /// Shown only with `expose_cause`.
    cause: Option<String>,
    /// Always shown.
    public_message: Option<&'static str>,
    challenge: Option<String>,
    /// Overrides the reply encoding derived from the request header.
    encoding: Option<Encoding>,
}

impl Failure {
    fn new(stage: Stage, kind: ErrorKind) -> Self {
        Self {
            stage,
            kind,
            cause: None,
            public_message: None,
            challenge: None,
            encoding: None,
        }
    }

    fn cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    fn public(mut self, message: &'static str) -> Self {
        self.public_message = Some(message);
        self
    }

    fn challenge(mut self, challenge: String) -> Self {
        self.challenge = Some(challenge);
        self
    }

    fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

/// One inbound exchange.
pub struct Pipeline<'a> {
    state: &'a AppState,
    request_id: String,
    client_id: String,
    path: String,
    stage: Stage,
    /// Encoding for replies sent before the body is decoded.
    reply_encoding: Encoding,
}

impl<'a> Pipeline<'a> {
    /// Drive a request through every stage and produce the HTTP response.
    pub async fn run(state: &'a AppState, request: Request<Body>) -> Response {
        let start = Instant::now();
        let mut pipeline = Pipeline {
            state,
            request_id: request.headers().request_id().to_string(),
            client_id: client_id(&request),
            path: request.uri().path().to_string(),
            stage: Stage::Received,
            reply_encoding: Encoding::Identity,
        };

        let (route_label, reply) = match pipeline.execute(request).await {
            (label, Ok(reply)) => (label, reply),
            (label, Err(failure)) => (label, pipeline.failure_reply(failure)),
        };
        pipeline.advance(Stage::Replied);

        let encoding = reply.encoding;
        let full = tracing::enabled!(tracing::Level::DEBUG).then(|| reply.body.to_string());
        let response = reply.into_response();

        metrics::record_request(&route_label, response.status().as_u16(), start);
        if let Some(full) = full {
            pipeline.log_reply(&response, encoding, &full, start);
        }
        response
    }

    async fn execute(&mut self, request: Request<Body>) -> (String, Result<Reply, Failure>) {
        let raw_encoding = content_encoding(request.headers());
        let requested = Encoding::from_header(raw_encoding.as_deref());
        self.reply_encoding = requested.as_ref().map(|e| *e).unwrap_or_default();

        tracing::debug!(
            request_id = %self.request_id,
            client = %self.client_id,
            path = %self.path,
            encoding = ?raw_encoding,
            "Request received"
        );

        // Received
        let registry = self.state.registry.load_full();
        let Some(route) = registry.lookup(&self.path) else {
            return (
                "none".to_string(),
                Err(Failure::new(Stage::Received, ErrorKind::RouteNotFound)),
            );
        };
        let label = route.route.clone();

        // Authenticated
        let credential = Credential::from_headers(request.headers());
        if let Some(authenticator) = &self.state.authenticator {
            if !authenticator.is_authorized(credential.as_ref()) {
                let failure = Failure::new(Stage::Authenticated, ErrorKind::Unauthenticated)
                    .challenge(authenticator.challenge());
                return (label, Err(failure));
            }
        }
        self.advance(Stage::Authenticated);

        // Authorized
        let enforce_users = match self.state.settings.user_check {
            UserCheck::Authenticated => self.state.authenticator.is_some(),
            UserCheck::Header => true,
        };
        if enforce_users {
            let permitted = credential
                .as_ref()
                .is_some_and(|c| route.permits(&c.name));
            if !permitted {
                tracing::info!(
                    request_id = %self.request_id,
                    user = ?credential.as_ref().map(|c| c.name.as_str()),
                    route = %route.label(),
                    "User not permitted on route"
                );
                let failure = Failure::new(Stage::Authorized, ErrorKind::Unauthorized)
                    .public(INVALID_USER);
                return (label, Err(failure));
            }
        }
        self.advance(Stage::Authorized);

        // BodyComplete
        let body = match axum::body::to_bytes(request.into_body(), self.state.settings.max_body_size).await {
            Ok(body) => body,
            Err(e) => {
                let inner = e.into_inner();
                let kind = if inner.is::<LengthLimitError>() {
                    ErrorKind::PayloadTooLarge
                } else {
                    ErrorKind::MalformedPayload
                };
                let failure = Failure::new(Stage::BodyComplete, kind).cause(inner.to_string());
                return (label, Err(failure));
            }
        };
        self.advance(Stage::BodyComplete);

        // Decoded
        let encoding = match requested {
            Ok(encoding) => encoding,
            Err(e) => {
                let failure = Failure::new(Stage::Decoded, e.kind())
                    .cause(e.to_string())
                    .encoding(Encoding::Identity);
                return (label, Err(failure));
            }
        };
        let decoded = match codec::decode(&body, encoding, self.state.settings.max_body_size) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    client = %self.client_id,
                    error = %e,
                    payload = %limited_log_bytes(&body, self.state.settings.max_len_msg_log),
                    "Undecodable request"
                );
                let failure = Failure::new(Stage::Decoded, e.kind()).cause(e.to_string());
                return (label, Err(failure));
            }
        };
        if decoded.encoding != encoding {
            tracing::debug!(
                request_id = %self.request_id,
                client = %self.client_id,
                "Raw deflate fallback, replying raw deflated"
            );
        }
        self.reply_encoding = decoded.encoding;
        tracing::debug!(
            request_id = %self.request_id,
            act = body.len(),
            "Request object decoded"
        );
        self.advance(Stage::Decoded);

        // Dispatched
        let catalog = self.state.catalog.load_full();
        let action = match catalog.build(&route) {
            Some(Ok(action)) => action,
            Some(Err(e)) => {
                tracing::error!(request_id = %self.request_id, action = %route.action, error = %e, "Failed to build action");
                let failure = Failure::new(Stage::Dispatched, e.kind()).cause(e.message());
                return (label, Err(failure));
            }
            None => {
                tracing::error!(request_id = %self.request_id, action = %route.action, "No action registered");
                let failure = Failure::new(Stage::Dispatched, ErrorKind::HandlerUnknownError)
                    .cause(format!("no action registered as '{}'", route.action));
                return (label, Err(failure));
            }
        };
        self.advance(Stage::Dispatched);

        match action.process(decoded.value).await {
            Ok(value) => (label, Ok(Reply::ok(value, self.reply_encoding))),
            Err(e) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    route = %route.label(),
                    error = %e,
                    "Handler reported an error"
                );
                let failure = Failure::new(Stage::Dispatched, e.kind()).cause(e.message());
                (label, Err(failure))
            }
        }
    }

    fn advance(&mut self, stage: Stage) {
        tracing::trace!(request_id = %self.request_id, from = ?self.stage, to = ?stage, "Pipeline stage");
        self.stage = stage;
    }

    fn failure_reply(&self, failure: Failure) -> Reply {
        metrics::record_failure(failure.kind);
        tracing::debug!(
            request_id = %self.request_id,
            client = %self.client_id,
            stage = ?failure.stage,
            kind = %failure.kind,
            cause = ?failure.cause,
            "Request failed"
        );

        let status = failure
            .kind
            .status()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match failure.public_message {
            Some(public) => Some(public.to_string()),
            None if self.state.settings.expose_cause => failure.cause,
            None => None,
        };
        let encoding = failure.encoding.unwrap_or(self.reply_encoding);

        let reply = Reply::error(status, message, encoding);
        match failure.challenge {
            Some(challenge) => reply.with_challenge(challenge),
            None => reply,
        }
    }

    fn log_reply(&self, response: &Response, encoding: Encoding, full: &str, start: Instant) {
        let act = response.body().size_hint().exact().unwrap_or(0);
        tracing::debug!(
            request_id = %self.request_id,
            client = %self.client_id,
            status = response.status().as_u16(),
            encoding = %encoding,
            act,
            full = full.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            body = %limited_log_msg(full, self.state.settings.max_len_msg_log),
            "Reply sent"
        );
    }
}
