//! JSON REST service.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────┐
//!                    │                   JSON REST SERVICE                 │
//!                    │                                                     │
//!   POST /route      │  ┌─────────┐   ┌──────────┐   ┌──────────────────┐  │
//!   ─────────────────┼─▶│  http   │──▶│ routing  │──▶│ auth (realm +    │  │
//!                    │  │ server  │   │ registry │   │ route user list) │  │
//!                    │  └─────────┘   └──────────┘   └────────┬─────────┘  │
//!                    │                                        ▼            │
//!                    │                 ┌──────────┐   ┌──────────────────┐ │
//!                    │                 │  codec   │◀──│ body (bounded)   │ │
//!                    │                 └────┬─────┘   └──────────────────┘ │
//!                    │                      ▼                              │
//!   JSON reply       │  ┌─────────┐   ┌──────────┐                         │
//!   ◀────────────────┼──│response │◀──│ actions  │                         │
//!                    │  └─────────┘   └──────────┘                         │
//!                    │                                                     │
//!                    │   config (+watcher) · observability · lifecycle     │
//!                    └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use json_rest::actions::ActionCatalog;
use json_rest::config::loader::load_config;
use json_rest::config::watcher::ConfigWatcher;
use json_rest::config::TransportType;
use json_rest::http::JsonRestServer;
use json_rest::lifecycle::{spawn_reload_on_hangup, wait_for_termination, Shutdown};
use json_rest::net::load_tls_config;
use json_rest::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "json-rest")]
#[command(about = "JSON over HTTP request/response service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long)]
    conf: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.conf)?;
    logging::init(&config.observability);

    tracing::info!("json-rest v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address(),
        server_type = ?config.server.server_type,
        routes = config.routes.len(),
        auth = config.server.auth.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = JsonRestServer::from_config(&config, ActionCatalog::with_builtins())?;
    let handle = server.handle();

    // Route hot reload from file changes and SIGHUP.
    let (watcher, mut updates) = ConfigWatcher::new(&args.conf);
    let hangup = spawn_reload_on_hangup(args.conf.clone(), watcher.sender());
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, reload only on SIGHUP");
            None
        }
    };
    tokio::spawn(async move {
        while let Some(new_config) = updates.recv().await {
            handle.reload_routes(new_config.routes);
        }
    });

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let result = match config.server.server_type {
        TransportType::Http => {
            let listener = TcpListener::bind(config.server.bind_address()).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            let mut task = tokio::spawn(server.run(listener, server_shutdown));
            tokio::select! {
                res = &mut task => res?,
                _ = wait_for_termination() => {
                    shutdown.trigger();
                    task.await?
                }
            }
        }
        TransportType::Https => {
            let tls = match &config.server.tls {
                Some(tls) => load_tls_config(tls)?,
                None => return Err("https requires a [server.tls] section".into()),
            };
            let mut task = tokio::spawn(server.run_tls(tls, server_shutdown));
            tokio::select! {
                res = &mut task => res?,
                _ = wait_for_termination() => {
                    shutdown.trigger();
                    task.await?
                }
            }
        }
    };
    hangup.abort();
    result?;

    tracing::info!("Shutdown complete");
    Ok(())
}
