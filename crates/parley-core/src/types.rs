use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a user as reported by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Anonymous id for payloads that carry no user (UUIDv7, sortable in logs).
    pub fn anonymous() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Conversation/session identifier assigned by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Channel-agnostic view of one incoming turn.
///
/// Built once per request by a channel adapter. Only `session_attributes` is
/// touched afterwards, when the engine hydrates and persists the session model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogEvent {
    /// Channel that produced the event (e.g. "alexa", "dialogflow").
    pub platform: String,
    /// Resolved intent. Unmapped raw request types arrive as the reserved
    /// unhandled intent, never as an empty string.
    pub intent_name: String,
    /// Slot values keyed by slot name.
    #[serde(default)]
    pub params: Map<String, Value>,
    pub session_id: SessionId,
    #[serde(default)]
    pub session_attributes: Map<String, Value>,
    pub is_new_session: bool,
    pub user_id: UserId,
    /// Surface capabilities advertised by the device (e.g. audio output).
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Untouched vendor payload for handlers that need extra fields.
    #[serde(default)]
    pub raw_payload: Value,
}

impl DialogEvent {
    /// Minimal event for `intent_name` on a fresh session with an anonymous user.
    pub fn new(platform: impl Into<String>, intent_name: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            intent_name: intent_name.into(),
            params: Map::new(),
            session_id: SessionId::new(),
            session_attributes: Map::new(),
            is_new_session: true,
            user_id: UserId::anonymous(),
            capabilities: Vec::new(),
            raw_payload: Value::Null,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_session(mut self, session_id: SessionId, attributes: Map<String, Value>) -> Self {
        self.session_id = session_id;
        self.session_attributes = attributes;
        self.is_new_session = false;
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn with_raw_payload(mut self, raw: Value) -> Self {
        self.raw_payload = raw;
        self
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_marks_resumed_sessions_as_not_new() {
        let mut attrs = Map::new();
        attrs.insert("state".to_string(), Value::from("launch"));

        let event = DialogEvent::new("alexa", "YesIntent")
            .with_user("amzn1.account.1")
            .with_session(SessionId::from("s-1"), attrs)
            .with_param("city", "Lisbon");

        assert!(!event.is_new_session);
        assert_eq!(event.user_id.as_str(), "amzn1.account.1");
        assert_eq!(event.param("city"), Some(&Value::from("Lisbon")));
        assert_eq!(event.session_attributes["state"], "launch");
    }
}
