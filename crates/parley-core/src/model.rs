use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Session attribute holding the current state name.
pub const STATE_KEY: &str = "state";
/// Session attribute holding application-defined model fields.
pub const MODEL_KEY: &str = "model";

/// Mutable conversation state carried between turns.
///
/// Hydrated from the event's session attributes at the start of a turn and
/// written back into the reply at the end. Handlers own it exclusively for
/// the duration of the turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionModel {
    pub state: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl SessionModel {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            fields: Map::new(),
        }
    }

    /// Rebuild the model from `{"state": .., "model": {..}}` session attributes.
    ///
    /// A missing or empty state falls back to `entry_state`. A `model` entry
    /// that is not an object is rejected rather than silently dropped.
    pub fn from_attributes(attributes: &Map<String, Value>, entry_state: &str) -> Result<Self> {
        let state = attributes
            .get(STATE_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(entry_state)
            .to_string();

        let fields = match attributes.get(MODEL_KEY) {
            None | Some(Value::Null) => Map::new(),
            Some(other) => serde_json::from_value::<Map<String, Value>>(other.clone())?,
        };

        Ok(Self { state, fields })
    }

    pub fn to_attributes(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(STATE_KEY.to_string(), Value::String(self.state.clone()));
        out.insert(MODEL_KEY.to_string(), Value::Object(self.fields.clone()));
        out
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Deserialize a field into a concrete type. `Ok(None)` when absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.fields.get(key) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }
}
