//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, listener)
//!     → request.rs (request ID, client id, encoding header)
//!     → pipeline.rs (route, auth, body, decode, dispatch)
//!     → response.rs (envelope, encode, headers)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{Pipeline, PipelineSettings, Stage};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{Envelope, Reply, INVALID_USER};
pub use server::{AppState, JsonRestServer, ServerHandle};
