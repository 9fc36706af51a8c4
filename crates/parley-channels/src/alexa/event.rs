use serde_json::{Map, Value};
use tracing::debug;

use parley_core::{DialogEvent, SessionId, UserId};

use super::ALEXA;
use crate::error::{ChannelError, Result};

/// Non-intent request types that still reach a state handler, with the
/// intent name they arrive as.
const REQUEST_TO_INTENT: &[(&str, &str)] = &[
    ("Display.ElementSelected", "Display.ElementSelected"),
    ("LaunchRequest", "LaunchIntent"),
    ("PlaybackController.NextCommandIssued", "PlaybackController.NextCommandIssued"),
    ("PlaybackController.PauseCommandIssued", "PlaybackController.PauseCommandIssued"),
    ("PlaybackController.PlayCommandIssued", "PlaybackController.PlayCommandIssued"),
    ("PlaybackController.PreviousCommandIssued", "PlaybackController.PreviousCommandIssued"),
];

pub fn intent_for_request(request_type: &str) -> Option<&'static str> {
    REQUEST_TO_INTENT
        .iter()
        .find(|(t, _)| *t == request_type)
        .map(|(_, intent)| *intent)
}

/// Normalize an Alexa request envelope.
///
/// Request types with no intent mapping arrive with an empty intent name,
/// which the engine replaces with the reserved unhandled intent.
pub fn parse_request(raw: Value) -> Result<DialogEvent> {
    let request = raw
        .get("request")
        .and_then(Value::as_object)
        .ok_or_else(|| ChannelError::invalid(ALEXA, "missing request object"))?;
    let request_type = request
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::invalid(ALEXA, "missing request.type"))?;

    let intent = request.get("intent");
    let intent_name = match intent_for_request(request_type) {
        Some(mapped) => mapped.to_string(),
        None if request_type == "IntentRequest" => intent
            .and_then(|i| i.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::invalid(ALEXA, "IntentRequest without intent.name"))?
            .to_string(),
        None => {
            debug!(request_type, "no intent mapping for request type");
            String::new()
        }
    };

    let mut event = DialogEvent::new(ALEXA, intent_name);
    event.params = slot_values(intent);

    let session = raw.get("session");
    event.is_new_session = session
        .and_then(|s| s.get("new"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if let Some(id) = session.and_then(|s| s.get("sessionId")).and_then(Value::as_str) {
        event.session_id = SessionId::from(id);
    }
    if let Some(attrs) = session
        .and_then(|s| s.get("attributes"))
        .and_then(Value::as_object)
    {
        event.session_attributes = attrs.clone();
    }

    let system = raw.get("context").and_then(|c| c.get("System"));
    let user = session
        .and_then(|s| s.get("user"))
        .or_else(|| system.and_then(|s| s.get("user")))
        .and_then(|u| u.get("userId"))
        .and_then(Value::as_str);
    if let Some(user) = user {
        event.user_id = UserId::from(user);
    }

    if let Some(interfaces) = system
        .and_then(|s| s.pointer("/device/supportedInterfaces"))
        .and_then(Value::as_object)
    {
        event.capabilities = interfaces.keys().cloned().collect();
    }

    event.raw_payload = raw;
    Ok(event)
}

fn slot_values(intent: Option<&Value>) -> Map<String, Value> {
    intent
        .and_then(|i| i.get("slots"))
        .and_then(Value::as_object)
        .map(|slots| {
            slots
                .iter()
                .map(|(name, slot)| {
                    let value = slot.get("value").cloned().unwrap_or(Value::Null);
                    (name.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}
