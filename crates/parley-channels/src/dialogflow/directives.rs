use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use parley_core::render::json_kind;
use parley_core::{reply_as, ContentSource, Directive, DirectiveContext, ParleyError, Reply, Result};

use super::{DialogFlowReply, DIALOGFLOW};

/// Surface capability required for media playback.
pub const AUDIO_OUTPUT: &str = "actions.capability.AUDIO_OUTPUT";

const OPTION_INTENT: &str = "actions.intent.OPTION";
const OPTION_VALUE_SPEC: &str = "type.googleapis.com/google.actions.v2.OptionValueSpec";

fn option_intent(select_key: &str, select: Value) -> Value {
    let mut data = serde_json::Map::new();
    data.insert("@type".to_string(), Value::from(OPTION_VALUE_SPEC));
    data.insert(select_key.to_string(), select);
    json!({ "intent": OPTION_INTENT, "data": data })
}

fn require_object(key: &str, value: &Value) -> Result<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ParleyError::Directive(format!(
            "{key} expects an object, got {}",
            json_kind(value)
        )))
    }
}

/// Selectable list, answered through the `actions.intent.OPTION` helper.
#[derive(Debug, Clone)]
pub struct List {
    content: ContentSource<Value>,
}

impl List {
    pub fn view(path: impl Into<String>) -> Self {
        Self {
            content: ContentSource::View(path.into()),
        }
    }

    pub fn literal(list: Value) -> Self {
        Self {
            content: ContentSource::Literal(list),
        }
    }
}

#[async_trait]
impl Directive for List {
    fn key(&self) -> &'static str {
        "dialogFlowList"
    }

    fn platform(&self) -> &'static str {
        DIALOGFLOW
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        let df = reply_as::<DialogFlowReply>(reply, self.key())?;
        let list = self.content.resolve(ctx).await?;
        require_object(self.key(), &list)?;
        df.set_system_intent(option_intent("listSelect", list));
        Ok(())
    }
}

/// Carousel of option cards, answered through `actions.intent.OPTION`.
#[derive(Debug, Clone)]
pub struct Carousel {
    content: ContentSource<Value>,
}

impl Carousel {
    pub fn view(path: impl Into<String>) -> Self {
        Self {
            content: ContentSource::View(path.into()),
        }
    }

    pub fn literal(carousel: Value) -> Self {
        Self {
            content: ContentSource::Literal(carousel),
        }
    }
}

#[async_trait]
impl Directive for Carousel {
    fn key(&self) -> &'static str {
        "dialogFlowCarousel"
    }

    fn platform(&self) -> &'static str {
        DIALOGFLOW
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        let df = reply_as::<DialogFlowReply>(reply, self.key())?;
        let carousel = self.content.resolve(ctx).await?;
        require_object(self.key(), &carousel)?;
        df.set_system_intent(option_intent("carouselSelect", carousel));
        Ok(())
    }
}

/// Suggestion chips. A view may render a single string or a list of strings.
#[derive(Debug, Clone)]
pub struct Suggestions {
    content: ContentSource<Vec<String>>,
}

impl Suggestions {
    pub fn view(path: impl Into<String>) -> Self {
        Self {
            content: ContentSource::View(path.into()),
        }
    }

    pub fn titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            content: ContentSource::Literal(titles.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl Directive for Suggestions {
    fn key(&self) -> &'static str {
        "dialogFlowSuggestions"
    }

    fn platform(&self) -> &'static str {
        DIALOGFLOW
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        let df = reply_as::<DialogFlowReply>(reply, self.key())?;
        let titles: Vec<String> = match self.content.resolve(ctx).await? {
            Value::String(s) => vec![s],
            Value::Array(items) => items
                .into_iter()
                .map(|i| match i {
                    Value::String(s) => Ok(s),
                    other => Err(ParleyError::Directive(format!(
                        "suggestion titles must be text, got {}",
                        json_kind(&other)
                    ))),
                })
                .collect::<Result<_>>()?,
            other => {
                return Err(ParleyError::Directive(format!(
                    "suggestions expect text or a list of text, got {}",
                    json_kind(&other)
                )))
            }
        };
        df.add_suggestions(titles);
        Ok(())
    }
}

/// Basic card appended to the rich response.
#[derive(Debug, Clone)]
pub struct BasicCard {
    content: ContentSource<Value>,
}

impl BasicCard {
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
impl Directive for BasicCard {
    fn key(&self) -> &'static str {
        "dialogFlowCard"
    }

    fn platform(&self) -> &'static str {
        DIALOGFLOW
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        let df = reply_as::<DialogFlowReply>(reply, self.key())?;
        let card = self.content.resolve(ctx).await?;
        require_object(self.key(), &card)?;
        df.add_item(json!({ "basicCard": card }));
        Ok(())
    }
}

/// Start the assistant's account-linking sign-in flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountLinkingCard;

#[async_trait]
impl Directive for AccountLinkingCard {
    fn key(&self) -> &'static str {
        "dialogFlowAccountLinkingCard"
    }

    fn platform(&self) -> &'static str {
        DIALOGFLOW
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, _ctx: &DirectiveContext<'_>) -> Result<()> {
        reply_as::<DialogFlowReply>(reply, self.key())?.request_sign_in();
        Ok(())
    }
}

/// Audio playback. Skipped on surfaces without audio output; otherwise the
/// rich response must already hold an item.
#[derive(Debug, Clone)]
pub struct MediaResponse {
    media_object: Value,
}

impl MediaResponse {
    pub fn new(media_object: Value) -> Self {
        Self { media_object }
    }
}

#[async_trait]
impl Directive for MediaResponse {
    fn key(&self) -> &'static str {
        "dialogFlowMediaResponse"
    }

    fn platform(&self) -> &'static str {
        DIALOGFLOW
    }

    async fn write_to_reply(&self, reply: &mut dyn Reply, ctx: &DirectiveContext<'_>) -> Result<()> {
        let df = reply_as::<DialogFlowReply>(reply, self.key())?;
        if !ctx.event.has_capability(AUDIO_OUTPUT) {
            debug!(key = self.key(), "surface has no audio output, skipping");
            return Ok(());
        }
        if !df.has_rich_items() {
            return Err(ParleyError::Directive(
                "MediaResponse requires another simple response first".to_string(),
            ));
        }
        df.add_item(json!({
            "mediaResponse": {
                "mediaType": "AUDIO",
                "mediaObjects": [self.media_object],
            }
        }));
        Ok(())
    }
}
