use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use parley_core::{DialogEvent, Reply};
use parley_engine::DialogApp;

use crate::error::Result;

/// Thin adapter between one vendor's webhook format and the engine.
///
/// Implementations must be `Send + Sync` so they can be stored in a
/// [`PlatformRegistry`](crate::registry::PlatformRegistry) and driven from
/// multiple Tokio tasks.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Stable lowercase identifier (e.g. `"alexa"`). Matches
    /// `DialogEvent::platform` and `Reply::channel` for this adapter.
    fn name(&self) -> &str;

    /// Translate a raw vendor request into a normalized event.
    fn parse_event(&self, raw: Value) -> Result<DialogEvent>;

    /// Empty reply of this channel's concrete type for `event`.
    fn new_reply(&self, event: &DialogEvent) -> Box<dyn Reply>;

    /// Run one turn end to end: parse, execute, serialize.
    ///
    /// Turn failures are already folded into the reply by the engine; only
    /// payload and serialization problems surface as errors here.
    async fn handle(&self, app: &DialogApp, raw: Value) -> Result<Value> {
        let event = self.parse_event(raw)?;
        let mut reply = self.new_reply(&event);
        let outcome = app.execute(event, reply.as_mut()).await;
        debug!(
            platform = self.name(),
            state = %outcome.state,
            terminated = outcome.terminated,
            "serializing reply"
        );
        Ok(reply.to_json()?)
    }
}
