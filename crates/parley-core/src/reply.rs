use std::any::Any;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ParleyError, Result};

/// Capability surface every channel-specific reply implements.
///
/// The engine builds output exclusively through this trait. Channel payload
/// sections (cards, rich responses, audio directives) stay private to the
/// concrete type; directives that need them downcast with [`reply_as`].
pub trait Reply: Any + Send + Sync {
    /// Channel this reply serializes for (matches `DialogEvent::platform`).
    fn channel(&self) -> &str;

    /// Append a statement to the spoken/display response. Never overwrites.
    fn add_statement(&mut self, text: &str, is_plain: bool);

    /// Append to the reprompt. Never overwrites.
    fn add_reprompt(&mut self, text: &str, is_plain: bool);

    /// Store the serialized session model to be echoed back next turn.
    fn set_session(&mut self, attributes: Map<String, Value>);

    /// End the conversation. Sticky for the rest of the turn.
    fn terminate(&mut self);

    /// Drop all accumulated content and directive payloads.
    /// Termination, once set, survives a clear.
    fn clear(&mut self);

    fn has_directive(&self, matcher: &DirectiveMatcher) -> bool;

    fn speech(&self) -> String;

    fn reprompt(&self) -> String;

    fn has_terminated(&self) -> bool;

    fn has_messages(&self) -> bool;

    /// Serialize into the vendor response body.
    fn to_json(&self) -> Result<Value>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Downcast a reply to the concrete channel type a directive targets.
///
/// Fails with a `Directive` error naming both sides when the directive was
/// handed a reply from another channel.
pub fn reply_as<'r, R: Reply>(reply: &'r mut dyn Reply, directive: &str) -> Result<&'r mut R> {
    let channel = reply.channel().to_string();
    reply.as_any_mut().downcast_mut::<R>().ok_or_else(|| {
        ParleyError::Directive(format!(
            "{directive} cannot be written to a {channel} reply"
        ))
    })
}

/// Selects directives by their channel type string.
#[derive(Debug, Clone)]
pub enum DirectiveMatcher {
    Exact(String),
    Pattern(Regex),
}

impl DirectiveMatcher {
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(DirectiveMatcher::Pattern)
            .map_err(|e| ParleyError::Config(format!("invalid directive pattern: {e}")))
    }

    pub fn matches(&self, directive_type: &str) -> bool {
        match self {
            DirectiveMatcher::Exact(t) => t == directive_type,
            DirectiveMatcher::Pattern(re) => re.is_match(directive_type),
        }
    }
}

impl From<&str> for DirectiveMatcher {
    fn from(s: &str) -> Self {
        DirectiveMatcher::Exact(s.to_string())
    }
}

impl From<Regex> for DirectiveMatcher {
    fn from(re: Regex) -> Self {
        DirectiveMatcher::Pattern(re)
    }
}
