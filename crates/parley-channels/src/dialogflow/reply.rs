use std::any::Any;

use serde_json::{json, Map, Value};

use parley_core::{DirectiveMatcher, Reply, Result, Speech, SpeechBuffer};

use super::{ATTRIBUTES_CONTEXT, DIALOGFLOW};

/// Context lifespan used to carry session attributes between turns.
const ATTRIBUTES_LIFESPAN: u32 = 10_000;

/// Webhook response for the Dialogflow channel, carrying an Actions on
/// Google rich response.
#[derive(Debug)]
pub struct DialogFlowReply {
    /// Full session path from the request, used to name output contexts.
    session_path: String,
    speech: SpeechBuffer,
    reprompt: SpeechBuffer,
    /// Rich response items following the leading simple response.
    items: Vec<Value>,
    suggestions: Vec<String>,
    system_intent: Option<Value>,
    input_prompt: Option<Value>,
    sign_in: bool,
    session: Map<String, Value>,
    terminated: bool,
}

impl DialogFlowReply {
    pub fn new(session_path: impl Into<String>) -> Self {
        Self {
            session_path: session_path.into(),
            speech: SpeechBuffer::new(),
            reprompt: SpeechBuffer::new(),
            items: Vec::new(),
            suggestions: Vec::new(),
            system_intent: None,
            input_prompt: None,
            sign_in: false,
            session: Map::new(),
            terminated: false,
        }
    }

    /// True once the rich response holds at least one item, including the
    /// simple response built from statements.
    pub fn has_rich_items(&self) -> bool {
        !self.speech.is_empty() || !self.items.is_empty()
    }

    pub fn add_item(&mut self, item: Value) {
        self.items.push(item);
    }

    pub fn add_suggestions<I, S>(&mut self, titles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(titles.into_iter().map(Into::into));
    }

    /// Replace the helper intent the assistant should run next.
    pub fn set_system_intent(&mut self, intent: Value) {
        self.system_intent = Some(intent);
    }

    /// Hand the turn to the assistant's sign-in flow. The conversation stays
    /// open regardless of termination.
    pub fn request_sign_in(&mut self) {
        self.speech.clear();
        self.speech.push("login", true);
        self.sign_in = true;
        self.input_prompt = Some(json!({
            "initialPrompts": [{ "textToSpeech": "PLACEHOLDER_FOR_SIGN_IN" }],
            "noInputPrompts": [],
        }));
        self.system_intent = Some(json!({
            "intent": "actions.intent.SIGN_IN",
            "inputValueData": {},
        }));
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn system_intent(&self) -> Option<&Value> {
        self.system_intent.as_ref()
    }

    fn expects_user_response(&self) -> bool {
        self.sign_in || !self.terminated
    }

    fn simple_response(&self) -> Option<Value> {
        let speech = self.speech.render()?;
        let mut simple = Map::new();
        match speech {
            Speech::Plain(text) => {
                simple.insert("textToSpeech".to_string(), Value::String(text));
            }
            Speech::Ssml(ssml) => {
                simple.insert("ssml".to_string(), Value::String(ssml));
                simple.insert(
                    "displayText".to_string(),
                    Value::String(self.speech.plain_text()),
                );
            }
        }
        Some(json!({ "simpleResponse": simple }))
    }

    fn item_types(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter_map(|item| item.as_object())
            .filter_map(|obj| obj.keys().next().map(String::as_str))
    }
}

impl Reply for DialogFlowReply {
    fn channel(&self) -> &str {
        DIALOGFLOW
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
        self.items.clear();
        self.suggestions.clear();
        self.system_intent = None;
        self.input_prompt = None;
        self.sign_in = false;
    }

    fn has_directive(&self, matcher: &DirectiveMatcher) -> bool {
        if self.item_types().any(|t| matcher.matches(t)) {
            return true;
        }
        if !self.suggestions.is_empty() && matcher.matches("suggestions") {
            return true;
        }
        self.system_intent
            .as_ref()
            .and_then(|si| si.get("intent"))
            .and_then(Value::as_str)
            .is_some_and(|intent| matcher.matches(intent))
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
        let mut items: Vec<Value> = self.simple_response().into_iter().collect();
        items.extend(self.items.iter().cloned());

        let mut rich = Map::new();
        rich.insert("items".to_string(), Value::Array(items));
        if !self.suggestions.is_empty() {
            let chips: Vec<Value> = self
                .suggestions
                .iter()
                .map(|title| json!({ "title": title }))
                .collect();
            rich.insert("suggestions".to_string(), Value::Array(chips));
        }

        let mut google = Map::new();
        google.insert(
            "expectUserResponse".to_string(),
            Value::Bool(self.expects_user_response()),
        );
        google.insert("richResponse".to_string(), Value::Object(rich));
        if let Some(reprompt) = self.reprompt.render() {
            google.insert(
                "noInputPrompts".to_string(),
                json!([{ "textToSpeech": reprompt.as_str() }]),
            );
        }
        if let Some(si) = &self.system_intent {
            google.insert("systemIntent".to_string(), si.clone());
        }
        if let Some(prompt) = &self.input_prompt {
            google.insert("inputPrompt".to_string(), prompt.clone());
        }

        let attributes = serde_json::to_string(&self.session)?;
        Ok(json!({
            "fulfillmentText": self.speech.plain_text(),
            "payload": { "google": google },
            "outputContexts": [{
                "name": format!("{}/contexts/{ATTRIBUTES_CONTEXT}", self.session_path),
                "lifespanCount": ATTRIBUTES_LIFESPAN,
                "parameters": { "attributes": attributes },
            }],
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

    const SESSION: &str = "projects/demo/agent/sessions/abc";

    #[test]
    fn statements_become_leading_simple_response() {
        let mut reply = DialogFlowReply::new(SESSION);
        reply.add_statement("Hello", true);
        reply.add_statement("world", true);
        reply.add_item(json!({ "basicCard": { "title": "Card" } }));

        let body = reply.to_json().unwrap();
        let items = body["payload"]["google"]["richResponse"]["items"]
            .as_array()
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["simpleResponse"]["textToSpeech"], "Hello world");
        assert_eq!(body["fulfillmentText"], "Hello world");
        assert_eq!(body["payload"]["google"]["expectUserResponse"], true);
    }

    #[test]
    fn session_attributes_ride_in_output_context() {
        let mut reply = DialogFlowReply::new(SESSION);
        let mut attrs = Map::new();
        attrs.insert("state".to_string(), json!("launch"));
        reply.set_session(attrs);
        reply.terminate();

        let body = reply.to_json().unwrap();
        let ctx = &body["outputContexts"][0];
        assert_eq!(ctx["name"], format!("{SESSION}/contexts/attributes"));
        let stored: Value =
            serde_json::from_str(ctx["parameters"]["attributes"].as_str().unwrap()).unwrap();
        assert_eq!(stored["state"], "launch");
        assert_eq!(body["payload"]["google"]["expectUserResponse"], false);
    }

    #[test]
    fn directive_lookup_covers_items_suggestions_and_system_intent() {
        let mut reply = DialogFlowReply::new(SESSION);
        assert!(!reply.has_directive(&"suggestions".into()));

        reply.add_suggestions(["Yes", "No"]);
        reply.add_item(json!({ "mediaResponse": {} }));
        reply.set_system_intent(json!({ "intent": "actions.intent.OPTION" }));

        assert!(reply.has_directive(&"suggestions".into()));
        assert!(reply.has_directive(&"mediaResponse".into()));
        assert!(reply.has_directive(&DirectiveMatcher::pattern(r"intent\.OPTION$").unwrap()));
    }

    #[test]
    fn sign_in_keeps_conversation_open() {
        let mut reply = DialogFlowReply::new(SESSION);
        reply.add_statement("ignored", true);
        reply.request_sign_in();
        reply.terminate();

        let body = reply.to_json().unwrap();
        let google = &body["payload"]["google"];
        assert_eq!(google["expectUserResponse"], true);
        assert_eq!(google["systemIntent"]["intent"], "actions.intent.SIGN_IN");
        assert_eq!(reply.speech(), "login");
    }
}
