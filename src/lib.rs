//! JSON over HTTP request/response service library.

pub mod actions;
pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use actions::{Action, ActionCatalog, ActionError};
pub use client::{ClientError, JsonRestClient};
pub use config::schema::ServiceConfig;
pub use error::ErrorKind;
pub use http::{JsonRestServer, ServerHandle};
pub use lifecycle::Shutdown;
