//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router sending every path through the pipeline
//! - Wire up middleware (tracing, request ID)
//! - Bind server to a plain or TLS listener
//! - Expose the reload entry points for routes and actions

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::actions::ActionCatalog;
use crate::auth::Authenticator;
use crate::config::{ConfigError, RouteConfig, ServerConfig, ServiceConfig};
use crate::http::pipeline::{Pipeline, PipelineSettings};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::metrics;
use crate::routing::ActionRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ArcSwap<ActionRegistry>>,
    pub catalog: Arc<ArcSwap<ActionCatalog>>,
    pub authenticator: Option<Arc<Authenticator>>,
    pub settings: Arc<PipelineSettings>,
}

/// Cloneable handle to swap routes and actions of a running server.
#[derive(Clone)]
pub struct ServerHandle {
    registry: Arc<ArcSwap<ActionRegistry>>,
    catalog: Arc<ArcSwap<ActionCatalog>>,
}

impl ServerHandle {
    /// Replace the whole route registry. In-flight requests keep the old one.
    pub fn reload_routes<I>(&self, routes: I)
    where
        I: IntoIterator<Item = RouteConfig>,
    {
        let registry = ActionRegistry::from_routes(routes);
        tracing::info!(routes = registry.len(), "Route registry reloaded");
        self.registry.store(Arc::new(registry));
        metrics::record_reload("routes");
    }

    /// Replace the action catalog.
    pub fn reload_actions(&self, catalog: ActionCatalog) {
        tracing::info!(actions = ?catalog.ids(), "Action catalog reloaded");
        self.catalog.store(Arc::new(catalog));
        metrics::record_reload("actions");
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<ActionRegistry> {
        self.registry.load_full()
    }
}

/// JSON REST server.
pub struct JsonRestServer {
    router: Router,
    config: ServerConfig,
    handle: ServerHandle,
}

impl JsonRestServer {
    /// Create a server from its settings, initial routes and action catalog.
    ///
    /// Fails when the auth settings are unusable.
    pub fn new(
        config: ServerConfig,
        routes: Vec<RouteConfig>,
        catalog: ActionCatalog,
    ) -> Result<Self, ConfigError> {
        let authenticator = config
            .auth
            .as_ref()
            .map(Authenticator::new)
            .transpose()?
            .map(Arc::new);

        let registry = ActionRegistry::from_routes(routes);
        for route in registry.routes() {
            if let Some(descriptor) = registry.lookup(route) {
                if !catalog.contains(&descriptor.action) {
                    tracing::warn!(route = %route, action = %descriptor.action, "Route refers to an unknown action");
                }
            }
        }

        let state = AppState {
            registry: Arc::new(ArcSwap::from_pointee(registry)),
            catalog: Arc::new(ArcSwap::from_pointee(catalog)),
            authenticator,
            settings: Arc::new(PipelineSettings::from(&config)),
        };
        let handle = ServerHandle {
            registry: state.registry.clone(),
            catalog: state.catalog.clone(),
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            handle,
        })
    }

    /// Create a server from a full service configuration.
    pub fn from_config(config: &ServiceConfig, catalog: ActionCatalog) -> Result<Self, ConfigError> {
        Self::new(config.server.clone(), config.routes.clone(), catalog)
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(pipeline_handler))
            .route("/", any(pipeline_handler))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Handle for reloading routes and actions, usable after `run`.
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// The router, for driving the pipeline without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve plain HTTP until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on the configured address until the shutdown signal fires.
    pub async fn run_tls(
        self,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .bind_address()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Every path goes through the pipeline; unknown routes get their 404 there.
async fn pipeline_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    Pipeline::run(&state, request).await
}
