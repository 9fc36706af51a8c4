use std::any::Any;

use serde_json::{json, Map, Value};

use parley_core::{DirectiveMatcher, Reply, Result, SpeechBuffer};

/// Channel name of [`TextReply`].
pub const TEXT_CHANNEL: &str = "text";

/// Plain text reply for consoles, logs and tests.
///
/// Markup is stripped on output. Directives that want to attach data can
/// downcast to this type and call [`TextReply::push_directive`].
#[derive(Debug, Default)]
pub struct TextReply {
    speech: SpeechBuffer,
    reprompt: SpeechBuffer,
    directives: Vec<(String, Value)>,
    session: Map<String, Value>,
    terminated: bool,
}

impl TextReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_directive(&mut self, kind: impl Into<String>, payload: Value) {
        self.directives.push((kind.into(), payload));
    }

    /// Directive type names in the order they were written.
    pub fn directive_types(&self) -> Vec<&str> {
        self.directives.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn session(&self) -> &Map<String, Value> {
        &self.session
    }
}

impl Reply for TextReply {
    fn channel(&self) -> &str {
        TEXT_CHANNEL
    }

    fn add_statement(&mut self, text: &str, is_plain: bool) {
        self.speech.push(text, is_plain);
    }

    fn add_reprompt(&mut self, text: &str, is_plain: bool) {
        self.reprompt.push(text, is_plain);
    }

    fn set_session(&mut self, attributes: Map<String, Value>) {
        self.session = attributes;
    }

    fn terminate(&mut self) {
        self.terminated = true;
    }

    fn clear(&mut self) {
        self.speech.clear();
        self.reprompt.clear();
        self.directives.clear();
    }

    fn has_directive(&self, matcher: &DirectiveMatcher) -> bool {
        self.directives.iter().any(|(k, _)| matcher.matches(k))
    }

    fn speech(&self) -> String {
        self.speech.plain_text()
    }

    fn reprompt(&self) -> String {
        self.reprompt.plain_text()
    }

    fn has_terminated(&self) -> bool {
        self.terminated
    }

    fn has_messages(&self) -> bool {
        !self.speech.is_empty()
    }

    fn to_json(&self) -> Result<Value> {
        let directives: Vec<Value> = self
            .directives
            .iter()
            .map(|(kind, payload)| json!({ "type": kind, "payload": payload }))
            .collect();
        Ok(json!({
            "text": self.speech(),
            "reprompt": self.reprompt(),
            "directives": directives,
            "session": self.session,
            "end": self.terminated,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
