//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM/SIGINT to start a graceful shutdown
//! - Reload the config file on SIGHUP
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that cannot be installed is logged and never fires
//! - SIGHUP triggers config reload, not shutdown

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::ServiceConfig;

/// Resolve once Ctrl+C or SIGTERM is received.
pub async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Termination signal received, starting graceful shutdown");
}

/// Reload `path` on every SIGHUP and push the result to `updates`.
///
/// A file that fails to load or validate keeps the current configuration.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(
    path: PathBuf,
    updates: mpsc::UnboundedSender<ServiceConfig>,
) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            tracing::info!(path = ?path, "SIGHUP received, reloading config");
            match load_config(&path) {
                Ok(config) => {
                    if updates.send(config).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.")
                }
            }
        }
    })
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(
    _path: PathBuf,
    _updates: mpsc::UnboundedSender<ServiceConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async {})
}
