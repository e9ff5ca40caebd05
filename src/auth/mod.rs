//! Basic authentication against a realm-scoped user directory.
//!
//! # Data Flow
//! ```text
//! Authorization: Basic base64(name:secret)
//!     → credential.rs (parse header into Credential)
//!     → authenticator.rs (sha1(realm ‖ name ‖ secret) == directory[name])
//!     → bool
//! ```
//!
//! # Design Decisions
//! - Secrets are never stored; the directory holds hex digests only
//! - Authenticator is immutable after construction (shared via Arc)

pub mod authenticator;
pub mod credential;

pub use authenticator::{password_digest, Authenticator};
pub use credential::Credential;
