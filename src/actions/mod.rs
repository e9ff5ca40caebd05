//! Action handler contract and catalog.
//!
//! # Data Flow
//! ```text
//! RouteDescriptor.action (handler id)
//!     → ActionCatalog (id → ActionFactory)
//!     → factory builds a fresh Action for this request
//!     → Action::process(request) → Ok(reply) | Err(ActionError)
//! ```
//!
//! # Design Decisions
//! - Handlers are values behind a trait, resolved by id, never loaded from disk
//! - One handler instance per request, configured by the route descriptor
//! - Error kind is carried in the `ActionError` variant, not in a type check
//! - The catalog is swappable as a whole through the server's reload entry point

pub mod builtin;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::routing::RouteDescriptor;

/// Error reported by an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal server error: {0}")]
    Internal(String),

    /// Any other failure; replied to as 503.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::BadRequest(_) => ErrorKind::HandlerBadRequest,
            ActionError::NotFound(_) => ErrorKind::HandlerNotFound,
            ActionError::Internal(_) => ErrorKind::HandlerInternalError,
            ActionError::Unavailable(_) => ErrorKind::HandlerUnknownError,
        }
    }

    /// The cause without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ActionError::BadRequest(m)
            | ActionError::NotFound(m)
            | ActionError::Internal(m)
            | ActionError::Unavailable(m) => m,
        }
    }
}

/// The behaviour behind a route.
///
/// `process` is awaited exactly once per request and resolves to either a
/// reply value or an error, never both.
#[async_trait]
pub trait Action: Send + Sync {
    async fn process(&self, request: Value) -> Result<Value, ActionError>;
}

/// Builds an action for one request from its route descriptor.
pub trait ActionFactory: Send + Sync {
    fn create(&self, route: &RouteDescriptor) -> Result<Box<dyn Action>, ActionError>;
}

impl<F> ActionFactory for F
where
    F: Fn(&RouteDescriptor) -> Result<Box<dyn Action>, ActionError> + Send + Sync,
{
    fn create(&self, route: &RouteDescriptor) -> Result<Box<dyn Action>, ActionError> {
        self(route)
    }
}

/// Adapter turning an async closure into an [`Action`].
pub struct FnAction<F>(pub F);

#[async_trait]
impl<F, Fut> Action for FnAction<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    async fn process(&self, request: Value) -> Result<Value, ActionError> {
        (self.0)(request).await
    }
}

/// Handler id → factory.
#[derive(Clone, Default)]
pub struct ActionCatalog {
    factories: HashMap<String, Arc<dyn ActionFactory>>,
}

impl ActionCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the built-in actions (`echo`, `annotate`).
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        builtin::register_builtins(&mut catalog);
        catalog
    }

    /// Register a factory, replacing any previous one with the same id.
    pub fn register(&mut self, id: impl Into<String>, factory: impl ActionFactory + 'static) {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Register an async closure as a stateless action.
    pub fn register_fn<F, Fut>(&mut self, id: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.register(id, move |_: &RouteDescriptor| {
            Ok::<_, ActionError>(Box::new(FnAction(f.clone())) as Box<dyn Action>)
        });
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Build the action for a route. `None` when the id is unknown.
    pub fn build(&self, route: &RouteDescriptor) -> Option<Result<Box<dyn Action>, ActionError>> {
        self.factories
            .get(&route.action)
            .map(|factory| factory.create(route))
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for ActionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCatalog")
            .field("ids", &self.ids())
            .finish()
    }
}
