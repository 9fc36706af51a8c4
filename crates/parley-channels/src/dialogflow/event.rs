use serde_json::{Map, Value};

use parley_core::{DialogEvent, SessionId, UserId};

use super::{ATTRIBUTES_CONTEXT, DIALOGFLOW};
use crate::error::{ChannelError, Result};

/// Argument value fields, most specific first.
const ARGUMENT_VALUES: &[&str] = &[
    "extension",
    "boolValue",
    "datetimeValue",
    "placeValue",
    "intValue",
    "floatValue",
    "textValue",
];

/// Normalize a Dialogflow v2 webhook request.
///
/// Params merge the query parameters, the raw input queries keyed by input
/// type (`KEYBOARD`, `VOICE`) and the assistant's helper arguments.
pub fn parse_request(raw: Value) -> Result<DialogEvent> {
    let query = raw
        .get("queryResult")
        .and_then(Value::as_object)
        .ok_or_else(|| ChannelError::invalid(DIALOGFLOW, "missing queryResult object"))?;
    let session_path = raw
        .get("session")
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::invalid(DIALOGFLOW, "missing session"))?;

    let intent_name = query
        .get("intent")
        .and_then(|i| i.get("displayName"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut event = DialogEvent::new(DIALOGFLOW, intent_name);
    event.session_id = SessionId::from(session_path);
    if let Some(params) = query.get("parameters").and_then(Value::as_object) {
        event.params = params.clone();
    }

    let payload = raw.pointer("/originalDetectIntentRequest/payload");
    if let Some(payload) = payload {
        merge_inputs(payload, &mut event.params);

        if let Some(user) = payload.pointer("/user/userId").and_then(Value::as_str) {
            event.user_id = UserId::from(user);
        }
        event.is_new_session = payload
            .pointer("/conversation/type")
            .and_then(Value::as_str)
            .is_some_and(|t| t == "NEW");
        event.capabilities = payload
            .pointer("/surface/capabilities")
            .and_then(Value::as_array)
            .map(|caps| {
                caps.iter()
                    .filter_map(|c| c.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
    } else {
        event.is_new_session = false;
    }

    event.session_attributes = session_attributes(query)?;
    event.raw_payload = raw;
    Ok(event)
}

fn merge_inputs(payload: &Value, params: &mut Map<String, Value>) {
    let Some(inputs) = payload.get("inputs").and_then(Value::as_array) else {
        return;
    };
    for input in inputs {
        for raw_input in input
            .get("rawInputs")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let (Some(kind), Some(q)) = (
                raw_input.get("inputType").and_then(Value::as_str),
                raw_input.get("query"),
            ) {
                params.insert(kind.to_string(), q.clone());
            }
        }
        for arg in input
            .get("arguments")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            let Some(name) = arg.get("name").and_then(Value::as_str) else {
                continue;
            };
            if let Some(v) = ARGUMENT_VALUES.iter().find_map(|k| arg.get(*k)) {
                params.insert(name.to_string(), v.clone());
            }
        }
    }
}

fn session_attributes(query: &Map<String, Value>) -> Result<Map<String, Value>> {
    let suffix = format!("/contexts/{ATTRIBUTES_CONTEXT}");
    let stored = query
        .get("outputContexts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|ctx| {
            ctx.get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.ends_with(&suffix))
        })
        .and_then(|ctx| ctx.pointer("/parameters/attributes"));

    match stored {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ChannelError::invalid(
                DIALOGFLOW,
                "session attributes must be a JSON object",
            )),
            Err(e) => Err(ChannelError::invalid(
                DIALOGFLOW,
                format!("session attributes are not valid JSON: {e}"),
            )),
        },
        Some(_) => Err(ChannelError::invalid(
            DIALOGFLOW,
            "session attributes must be a JSON object",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SESSION: &str = "projects/demo/agent/sessions/1527283916063";

    fn request(intent: &str, payload: Value, contexts: Value) -> Value {
        json!({
            "responseId": "r-1",
            "session": SESSION,
            "queryResult": {
                "queryText": "Talk to my test app",
                "parameters": { "requestPhrase": "" },
                "intent": { "displayName": intent },
                "outputContexts": contexts
            },
            "originalDetectIntentRequest": { "source": "google", "payload": payload }
        })
    }

    fn launch_payload() -> Value {
        json!({
            "user": { "userId": "ABwppHG14A5zlHSo" },
            "conversation": { "conversationId": "1527283916063", "type": "NEW" },
            "inputs": [{
                "intent": "actions.intent.MAIN",
                "rawInputs": [{ "inputType": "KEYBOARD", "query": "Talk to my test app" }]
            }],
            "surface": {
                "capabilities": [
                    { "name": "actions.capability.AUDIO_OUTPUT" },
                    { "name": "actions.capability.SCREEN_OUTPUT" }
                ]
            }
        })
    }

    #[test]
    fn launch_request_fields() {
        let event = parse_request(request("LaunchIntent", launch_payload(), json!([]))).unwrap();
        assert_eq!(event.intent_name, "LaunchIntent");
        assert_eq!(
            Value::Object(event.params.clone()),
            json!({ "KEYBOARD": "Talk to my test app", "requestPhrase": "" })
        );
        assert_eq!(event.user_id.as_str(), "ABwppHG14A5zlHSo");
        assert!(event.is_new_session);
        assert!(event.has_capability("actions.capability.AUDIO_OUTPUT"));
        assert_eq!(event.session_id.as_str(), SESSION);
    }

    #[test]
    fn helper_arguments_become_params() {
        let payload = json!({
            "user": { "userId": "u" },
            "conversation": { "type": "ACTIVE" },
            "inputs": [{
                "intent": "actions.intent.OPTION",
                "rawInputs": [{ "inputType": "TOUCH", "query": "Today's meditation" }],
                "arguments": [
                    { "name": "OPTION", "textValue": "today" },
                    { "name": "PERMISSION", "textValue": "true", "boolValue": true },
                    { "name": "MEDIA_STATUS", "extension": { "status": "FINISHED" } }
                ]
            }]
        });
        let event = parse_request(request("actions.intent.OPTION", payload, json!([]))).unwrap();
        assert_eq!(event.params["OPTION"], "today");
        assert_eq!(event.params["TOUCH"], "Today's meditation");
        assert_eq!(event.params["PERMISSION"], true);
        assert_eq!(event.params["MEDIA_STATUS"]["status"], "FINISHED");
        assert!(!event.is_new_session);
    }

    #[test]
    fn session_attributes_from_context() {
        let contexts = json!([
            { "name": format!("{SESSION}/contexts/other"), "parameters": {} },
            {
                "name": format!("{SESSION}/contexts/attributes"),
                "parameters": { "attributes": "{\"key\":\"value\"}" }
            }
        ]);
        let event = parse_request(request("HelpIntent", launch_payload(), contexts)).unwrap();
        assert_eq!(Value::Object(event.session_attributes), json!({ "key": "value" }));
    }

    #[test]
    fn broken_attributes_are_rejected() {
        let contexts = json!([{
            "name": format!("{SESSION}/contexts/attributes"),
            "parameters": { "attributes": "{not json" }
        }]);
        let err = parse_request(request("HelpIntent", launch_payload(), contexts)).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYLOAD");

        let err = parse_request(json!({ "session": SESSION })).unwrap_err();
        assert!(err.to_string().contains("queryResult"));
    }
}
