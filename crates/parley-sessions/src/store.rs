use async_trait::async_trait;
use serde_json::{Map, Value};

use parley_core::UserId;

use crate::error::Result;

/// Storage capability consumed by lifecycle plugins.
///
/// Implementations own their own retry policy; callers never retry.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Data stored for `user_id`, or an empty mapping for unknown users.
    async fn get(&self, user_id: &UserId) -> Result<Map<String, Value>>;

    /// Replace the data stored for `user_id`.
    async fn save(&self, user_id: &UserId, data: &Map<String, Value>) -> Result<()>;
}
