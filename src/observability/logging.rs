//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Bound payload excerpts written to debug logs

use std::borrow::Cow;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this twice is harmless.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("json_rest={},tower_http={}", config.log_level, config.log_level).into()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Cut `msg` to `size` characters, noting the full length.
///
/// `limited_log_msg("abcdef", 3)` gives `"abc...(6 chars)"`.
pub fn limited_log_msg(msg: &str, size: usize) -> Cow<'_, str> {
    let total = msg.chars().count();
    if total <= size {
        return Cow::Borrowed(msg);
    }
    let cut: String = msg.chars().take(size).collect();
    Cow::Owned(format!("{cut}...({total} chars)"))
}

/// Same as [`limited_log_msg`] for raw payload bytes.
pub fn limited_log_bytes(bytes: &[u8], size: usize) -> String {
    limited_log_msg(&String::from_utf8_lossy(bytes), size).into_owned()
}
