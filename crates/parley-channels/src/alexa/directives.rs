use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use parley_core::render::json_kind;
use parley_core::{reply_as, ContentSource, Directive, DirectiveContext, ParleyError, Reply, Result};

use super::{AlexaReply, ALEXA};

const PLAY: &str = "AudioPlayer.Play";

/// How a `PlayAudio` stream interacts with the device's queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayBehavior {
    #[default]
    ReplaceAll,
    Enqueue,
    ReplaceEnqueued,
}

/// Start streaming audio (`AudioPlayer.Play`).
#[derive(Debug, Clone)]
pub struct PlayAudio {
    pub url: String,
    pub token: String,
    pub offset_ms: u64,
    pub behavior: PlayBehavior,
}

impl PlayAudio {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        offset_ms: u64,
        behavior: PlayBehavior,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            offset_ms,
            behavior,
        }
    }
}

#[async_trait]
impl Directive for PlayAudio {
    fn key(&self) -> &'static str {
        "alexaPlayAudio"
    }

    fn platform(&self) -> &'static str {
        ALEXA
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, _ctx: &DirectiveContext<'_>) -> Result<()> {
        if reply.has_directive(&PLAY.into()) {
            return Err(ParleyError::Directive(format!(
                "at most one {PLAY} directive can be specified in a response"
            )));
        }
        reply_as::<AlexaReply>(reply, self.key())?.push_directive(json!({
            "type": PLAY,
            "playBehavior": self.behavior,
            "audioItem": {
                "stream": {
                    "url": self.url,
                    "token": self.token,
                    "offsetInMilliseconds": self.offset_ms,
                }
            }
        }))
    }
}

/// Stop the current stream (`AudioPlayer.Stop`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StopAudio;

#[async_trait]
impl Directive for StopAudio {
    fn key(&self) -> &'static str {
        "alexaStopAudio"
    }

    fn platform(&self) -> &'static str {
        ALEXA
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, _ctx: &DirectiveContext<'_>) -> Result<()> {
        reply_as::<AlexaReply>(reply, self.key())?
            .push_directive(json!({ "type": "AudioPlayer.Stop" }))
    }
}

/// Card shown in the companion app. The rendered card must be an object
/// with a string `type`.
#[derive(Debug, Clone)]
pub struct HomeCard {
    content: ContentSource<Value>,
}

impl HomeCard {
    pub fn view(path: impl Into<String>) -> Self {
        Self {
            content: ContentSource::View(path.into()),
        }
    }

    pub fn literal(card: Value) -> Self {
        Self {
            content: ContentSource::Literal(card),
        }
    }
}

#[async_trait]
impl Directive for HomeCard {
    fn key(&self) -> &'static str {
        "alexaHomeCard"
    }

    fn platform(&self) -> &'static str {
        ALEXA
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        let alexa = reply_as::<AlexaReply>(reply, self.key())?;
        let card = self.content.resolve(ctx).await?;
        if card.get("type").and_then(Value::as_str).is_none() {
            return Err(ParleyError::Directive(format!(
                "home card must be an object with a type, got {}",
                json_kind(&card)
            )));
        }
        alexa.set_card(card)
    }
}

/// Suggested utterance shown on screen devices.
#[derive(Debug, Clone)]
pub struct Hint {
    content: ContentSource<String>,
}

impl Hint {
    pub fn view(path: impl Into<String>) -> Self {
        Self {
            content: ContentSource::View(path.into()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: ContentSource::Literal(text.into()),
        }
    }
}

#[async_trait]
impl Directive for Hint {
    fn key(&self) -> &'static str {
        "alexaHint"
    }

    fn platform(&self) -> &'static str {
        ALEXA
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        if reply.has_directive(&"Hint".into()) {
            return Err(ParleyError::Directive(
                "at most one Hint directive can be specified in a response".to_string(),
            ));
        }
        let text = match self.content.resolve(ctx).await? {
            Value::String(s) => s,
            other => {
                return Err(ParleyError::Directive(format!(
                    "hint must be text, got {}",
                    json_kind(&other)
                )))
            }
        };
        reply_as::<AlexaReply>(reply, self.key())?.push_directive(json!({
            "type": "Hint",
            "hint": { "type": "PlainText", "text": text }
        }))
    }
}
