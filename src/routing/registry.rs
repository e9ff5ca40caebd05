//! Route lookup.
//!
//! # Responsibilities
//! - Store route descriptors keyed by path
//! - Look up the descriptor for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookup via HashMap
//! - Descriptors are shared as `Arc` so a request keeps its route alive
//!   across a reload

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::config::RouteConfig;

/// A route bound to an action.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    pub name: Option<String>,
    pub route: String,
    pub valid_users: HashSet<String>,
    /// Action identifier resolved through the catalog.
    pub action: String,
    /// Opaque action configuration.
    pub parameters: Value,
}

impl RouteDescriptor {
    pub fn new(route: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: None,
            route: route.into(),
            valid_users: HashSet::new(),
            action: action.into(),
            parameters: Value::Null,
        }
    }

    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// True when `user` is in the permitted user list.
    pub fn permits(&self, user: &str) -> bool {
        self.valid_users.contains(user)
    }

    /// Name for logs: the configured name, else the path.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.route)
    }
}

impl From<RouteConfig> for RouteDescriptor {
    fn from(config: RouteConfig) -> Self {
        Self {
            name: config.name,
            route: config.route,
            valid_users: config.valid_users.into_iter().collect(),
            action: config.action,
            parameters: config.parameters,
        }
    }
}

/// Path → route descriptor map.
#[derive(Debug, Default, Clone)]
pub struct ActionRegistry {
    routes: HashMap<String, Arc<RouteDescriptor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured routes.
    pub fn from_routes<I>(routes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RouteDescriptor>,
    {
        let mut registry = Self::new();
        for route in routes {
            registry.register(route.into());
        }
        registry
    }

    /// Store a descriptor, replacing any previous one for the same path.
    ///
    /// Returns the replaced descriptor.
    pub fn register(&mut self, descriptor: RouteDescriptor) -> Option<Arc<RouteDescriptor>> {
        let previous = self
            .routes
            .insert(descriptor.route.clone(), Arc::new(descriptor));
        if let Some(prev) = &previous {
            tracing::debug!(route = %prev.route, "Route registered twice, keeping the last one");
        }
        previous
    }

    pub fn lookup(&self, route: &str) -> Option<Arc<RouteDescriptor>> {
        self.routes.get(route).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered paths in sorted order.
    pub fn routes(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}
