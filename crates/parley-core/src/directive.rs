use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::model::SessionModel;
use crate::render::{RenderScope, Renderer};
use crate::reply::Reply;
use crate::transition::Transition;
use crate::types::DialogEvent;

/// Platform tag for directives that work on any reply.
pub const ANY_PLATFORM: &str = "core";

/// Everything a directive may read while writing to a reply.
pub struct DirectiveContext<'a> {
    pub event: &'a DialogEvent,
    pub model: &'a SessionModel,
    pub renderer: &'a dyn Renderer,
    /// The settled transition whose directive list is being applied.
    pub transition: &'a Transition,
}

impl<'a> DirectiveContext<'a> {
    pub fn scope(&self) -> RenderScope<'a> {
        RenderScope::Turn {
            event: self.event,
            model: self.model,
        }
    }
}

/// A composable instruction that augments a reply.
///
/// Directives only write: they never read back values they produced
/// themselves, so applying one is deterministic given the reply it sees.
/// A directive whose precondition is missing from the reply must fail with
/// `ParleyError::Directive` instead of producing a channel-invalid payload.
#[async_trait]
pub trait Directive: Send + Sync {
    /// Stable key, unique per platform (e.g. "alexaPlayAudio").
    fn key(&self) -> &'static str;

    /// Channel this directive targets, or [`ANY_PLATFORM`].
    fn platform(&self) -> &'static str;

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()>;
}

/// Directive content given either as a view path or as literal data.
#[derive(Debug, Clone)]
pub enum ContentSource<T> {
    View(String),
    Literal(T),
}

impl<T: Serialize + Send + Sync> ContentSource<T> {
    /// Resolve to concrete payload data, rendering through the context's
    /// renderer when built from a view path.
    pub async fn resolve(&self, ctx: &DirectiveContext<'_>) -> Result<Value> {
        match self {
            ContentSource::View(path) => ctx.renderer.render(path, ctx.scope()).await,
            ContentSource::Literal(data) => Ok(serde_json::to_value(data)?),
        }
    }
}

impl<T> From<&str> for ContentSource<T> {
    fn from(path: &str) -> Self {
        ContentSource::View(path.to_string())
    }
}
