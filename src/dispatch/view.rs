//! View rendering collaborator used by `view` routes.

use serde_json::{json, Value};

use crate::dispatch::context::RequestContext;
use crate::dispatch::reply::Reply;

/// Renders a named view with data. Templating lives outside the engine.
pub trait ViewRenderer: Send + Sync {
    fn render(&self, ctx: &RequestContext, view: &str, data: &Value) -> Reply;
}

/// Default renderer: returns the view name and data as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonViewRenderer;

impl ViewRenderer for JsonViewRenderer {
    fn render(&self, _ctx: &RequestContext, view: &str, data: &Value) -> Reply {
        Reply::json(json!({ "view": view, "data": data }))
    }
}
