use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted user data row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub data: Map<String, Value>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the last save.
    pub updated_at: String,
}
