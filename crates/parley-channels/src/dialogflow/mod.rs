//! Dialogflow webhook channel with Actions on Google rich responses.

pub mod directives;
pub mod event;
pub mod reply;

use async_trait::async_trait;
use serde_json::Value;

use parley_core::{DialogEvent, Reply};

use crate::error::Result;
use crate::platform::Platform;

pub use directives::{
    AccountLinkingCard, BasicCard, Carousel, List, MediaResponse, Suggestions, AUDIO_OUTPUT,
};
pub use event::parse_request;
pub use reply::DialogFlowReply;

pub const DIALOGFLOW: &str = "dialogflow";

/// Output context that carries session attributes between turns.
pub const ATTRIBUTES_CONTEXT: &str = "attributes";

#[derive(Debug, Default)]
pub struct DialogFlowPlatform;

impl DialogFlowPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Platform for DialogFlowPlatform {
    fn name(&self) -> &str {
        DIALOGFLOW
    }

    fn parse_event(&self, raw: Value) -> Result<DialogEvent> {
        parse_request(raw)
    }

    fn new_reply(&self, event: &DialogEvent) -> Box<dyn Reply> {
        Box::new(DialogFlowReply::new(event.session_id.as_str()))
    }
}
