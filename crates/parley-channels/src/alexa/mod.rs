//! Alexa-style voice channel.

pub mod directives;
pub mod event;
pub mod reply;

use async_trait::async_trait;
use serde_json::Value;

use parley_core::{DialogEvent, Reply};

use crate::error::Result;
use crate::platform::Platform;

pub use directives::{Hint, HomeCard, PlayAudio, PlayBehavior, StopAudio};
pub use event::{intent_for_request, parse_request};
pub use reply::AlexaReply;

/// Channel name shared by the event, the reply and every Alexa directive.
pub const ALEXA: &str = "alexa";

#[derive(Debug, Default)]
pub struct AlexaPlatform;

impl AlexaPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Platform for AlexaPlatform {
    fn name(&self) -> &str {
        ALEXA
    }

    fn parse_event(&self, raw: Value) -> Result<DialogEvent> {
        parse_request(raw)
    }

    fn new_reply(&self, _event: &DialogEvent) -> Box<dyn Reply> {
        Box::new(AlexaReply::new())
    }
}
