//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, payload excerpts)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging via tracing fields
//! - Request ID flows through every pipeline log line
//! - Metrics are cheap (atomic increments)
//! - Payloads are only ever logged as bounded excerpts

pub mod logging;
pub mod metrics;
