//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → registry.rs (exact route lookup)
//!     → Return: RouteDescriptor or NoMatch (404)
//!
//! Registry Compilation (at startup and on reload):
//!     RouteConfig[]
//!     → RouteDescriptor (permitted users as a set)
//!     → Freeze as immutable ActionRegistry
//! ```
//!
//! # Design Decisions
//! - Registries are immutable at runtime; reload builds a new one
//! - Exact path match only, no prefixes or patterns
//! - Last registration for a path wins

pub mod registry;

pub use registry::{ActionRegistry, RouteDescriptor};
