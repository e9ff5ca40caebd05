//! Built-in actions.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Action, ActionCatalog, ActionError};
use crate::routing::RouteDescriptor;

pub const ECHO: &str = "echo";
pub const ANNOTATE: &str = "annotate";

pub fn register_builtins(catalog: &mut ActionCatalog) {
    catalog.register(ECHO, |_: &RouteDescriptor| {
        Ok::<_, ActionError>(Box::new(EchoAction) as Box<dyn Action>)
    });
    catalog.register(ANNOTATE, |route: &RouteDescriptor| {
        AnnotateAction::from_route(route).map(|a| Box::new(a) as Box<dyn Action>)
    });
}

/// Replies with the request unchanged.
pub struct EchoAction;

#[async_trait]
impl Action for EchoAction {
    async fn process(&self, request: Value) -> Result<Value, ActionError> {
        Ok(request)
    }
}

/// Merges the route's `parameters` table into the request object.
///
/// With `parameters = { result = "THIS IS ADDED IN TEST1!" }` a request
/// `{"x":1}` is answered with `{"x":1,"result":"THIS IS ADDED IN TEST1!"}`.
pub struct AnnotateAction {
    fields: Map<String, Value>,
}

impl AnnotateAction {
    pub fn from_route(route: &RouteDescriptor) -> Result<Self, ActionError> {
        let fields = match &route.parameters {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(ActionError::Internal(format!(
                    "annotate parameters for {} must be a table",
                    route.label()
                )))
            }
        };
        Ok(Self { fields })
    }
}

#[async_trait]
impl Action for AnnotateAction {
    async fn process(&self, request: Value) -> Result<Value, ActionError> {
        let Value::Object(mut object) = request else {
            return Err(ActionError::BadRequest("request must be a JSON object".to_string()));
        };
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        tracing::debug!(fields = self.fields.len(), "Annotated request");
        Ok(Value::Object(object))
    }
}
