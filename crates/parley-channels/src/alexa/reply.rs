use std::any::Any;

use serde_json::{json, Map, Value};

use parley_core::{DirectiveMatcher, ParleyError, Reply, Result, Speech, SpeechBuffer};

use super::ALEXA;

/// Response envelope for the Alexa channel.
#[derive(Debug, Default)]
pub struct AlexaReply {
    speech: SpeechBuffer,
    reprompt: SpeechBuffer,
    card: Option<Value>,
    directives: Vec<Value>,
    session: Map<String, Value>,
    terminated: bool,
}

impl AlexaReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn card(&self) -> Option<&Value> {
        self.card.as_ref()
    }

    /// At most one card per response.
    pub fn set_card(&mut self, card: Value) -> Result<()> {
        if self.card.is_some() {
            return Err(ParleyError::Directive(
                "at most one card can be specified in a response".to_string(),
            ));
        }
        self.card = Some(card);
        Ok(())
    }

    pub fn directives(&self) -> &[Value] {
        &self.directives
    }

    /// Append a response directive. It must carry a string `type`.
    pub fn push_directive(&mut self, directive: Value) -> Result<()> {
        if directive.get("type").and_then(Value::as_str).is_none() {
            return Err(ParleyError::Directive(
                "alexa directives need a string type".to_string(),
            ));
        }
        self.directives.push(directive);
        Ok(())
    }

    pub fn session_attributes(&self) -> &Map<String, Value> {
        &self.session
    }
}

fn output_speech(speech: Speech) -> Value {
    match speech {
        Speech::Plain(text) => json!({ "type": "PlainText", "text": text }),
        Speech::Ssml(ssml) => json!({ "type": "SSML", "ssml": ssml }),
    }
}

impl Reply for AlexaReply {
    fn channel(&self) -> &str {
        ALEXA
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
        self.card = None;
        self.directives.clear();
    }

    fn has_directive(&self, matcher: &DirectiveMatcher) -> bool {
        let typed = self
            .directives
            .iter()
            .filter_map(|d| d.get("type").and_then(Value::as_str))
            .any(|t| matcher.matches(t));
        typed || (self.card.is_some() && matcher.matches("card"))
    }

    fn speech(&self) -> String {
        self.speech
            .render()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default()
    }

    fn reprompt(&self) -> String {
        self.reprompt
            .render()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default()
    }

    fn has_terminated(&self) -> bool {
        self.terminated
    }

    fn has_messages(&self) -> bool {
        !self.speech.is_empty()
    }

    fn to_json(&self) -> Result<Value> {
        let mut response = Map::new();
        if let Some(speech) = self.speech.render() {
            response.insert("outputSpeech".to_string(), output_speech(speech));
        }
        if let Some(reprompt) = self.reprompt.render() {
            response.insert(
                "reprompt".to_string(),
                json!({ "outputSpeech": output_speech(reprompt) }),
            );
        }
        if let Some(card) = &self.card {
            response.insert("card".to_string(), card.clone());
        }
        if !self.directives.is_empty() {
            response.insert("directives".to_string(), Value::Array(self.directives.clone()));
        }
        // Audio-only responses leave the session decision to the device.
        if self.terminated || self.has_messages() {
            response.insert("shouldEndSession".to_string(), Value::Bool(self.terminated));
        }

        Ok(json!({
            "version": "1.0",
            "response": response,
            "sessionAttributes": self.session,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_markup_statements_merge_into_ssml() {
        let mut reply = AlexaReply::new();
        reply.add_statement("<speak>Hello</speak>", false);
        reply.add_statement("world", true);

        assert_eq!(reply.speech(), "<speak>Hello\nworld</speak>");
        let body = reply.to_json().unwrap();
        assert_eq!(body["response"]["outputSpeech"]["type"], "SSML");
        assert_eq!(body["response"]["shouldEndSession"], false);
    }

    #[test]
    fn plain_only_output_stays_plain_text() {
        let mut reply = AlexaReply::new();
        reply.add_statement("Hello", true);
        reply.add_reprompt("Still there?", true);
        reply.terminate();

        let body = reply.to_json().unwrap();
        assert_eq!(body["response"]["outputSpeech"]["text"], "Hello");
        assert_eq!(body["response"]["reprompt"]["outputSpeech"]["text"], "Still there?");
        assert_eq!(body["response"]["shouldEndSession"], true);
    }

    #[test]
    fn directive_only_response_omits_should_end_session() {
        let mut reply = AlexaReply::new();
        reply
            .push_directive(json!({ "type": "AudioPlayer.Stop" }))
            .unwrap();
        let body = reply.to_json().unwrap();
        assert!(body["response"].get("shouldEndSession").is_none());
    }

    #[test]
    fn cards_count_as_directives() {
        let mut reply = AlexaReply::new();
        assert!(!reply.has_directive(&"card".into()));

        reply
            .set_card(json!({ "type": "Simple", "title": "t", "content": "c" }))
            .unwrap();
        assert!(reply.has_directive(&"card".into()));
        assert!(reply.set_card(json!({ "type": "Simple" })).is_err());

        reply
            .push_directive(json!({ "type": "AudioPlayer.Play" }))
            .unwrap();
        let audio = DirectiveMatcher::pattern(r"^AudioPlayer\.").unwrap();
        assert!(reply.has_directive(&audio));
    }

    #[test]
    fn clear_drops_payload_but_keeps_termination() {
        let mut reply = AlexaReply::new();
        reply.add_statement("Bye", true);
        reply.set_card(json!({ "type": "Simple" })).unwrap();
        reply.terminate();
        reply.clear();

        assert!(!reply.has_messages());
        assert!(reply.card().is_none());
        assert!(reply.has_terminated());
    }

    #[test]
    fn untyped_directive_is_rejected() {
        let mut reply = AlexaReply::new();
        let err = reply.push_directive(json!({ "hint": {} })).unwrap_err();
        assert_eq!(err.code(), "DIRECTIVE_ERROR");
    }
}
