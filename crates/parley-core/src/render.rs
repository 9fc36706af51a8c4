use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ParleyError, Result};
use crate::model::SessionModel;
use crate::types::DialogEvent;

/// What a view is rendered against.
#[derive(Debug, Clone, Copy)]
pub enum RenderScope<'a> {
    /// The turn in flight: event params and session model fields.
    Turn {
        event: &'a DialogEvent,
        model: &'a SessionModel,
    },
    /// Caller-provided data only.
    Data(&'a Value),
}

/// Injected templating capability: view path + scope in, rendered content out.
///
/// Rendered content is either a string (a statement) or structured data a
/// directive turns into a channel payload. Any failure is a `Render` error
/// and fatal to the turn.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, path: &str, scope: RenderScope<'_>) -> Result<Value>;

    /// Render and require a string result.
    async fn render_text(&self, path: &str, scope: RenderScope<'_>) -> Result<String> {
        match self.render(path, scope).await? {
            Value::String(s) => Ok(s),
            other => Err(ParleyError::render(
                path,
                format!("expected text, got {}", json_kind(&other)),
            )),
        }
    }
}

pub fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
