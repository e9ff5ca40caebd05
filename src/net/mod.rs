//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Config
//!     → listener bind (plain TCP, see main.rs)
//!     → tls.rs (rustls config for https)
//!     → Hand off to HTTP layer
//! ```

pub mod tls;

pub use tls::load_tls_config;
