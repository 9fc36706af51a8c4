use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use parley_core::UserId;

use crate::error::Result;
use crate::store::UserStore;

/// In-process store. Data is lost on restart; meant for tests and demos.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user before the first turn.
    pub fn insert(&self, user_id: &str, data: Map<String, Value>) {
        self.users.insert(user_id.to_string(), data);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get(&self, user_id: &UserId) -> Result<Map<String, Value>> {
        Ok(self
            .users
            .get(user_id.as_str())
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &UserId, data: &Map<String, Value>) -> Result<()> {
        self.users.insert(user_id.as_str().to_string(), data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_user_reads_as_empty() {
        let store = MemoryStore::new();
        let data = store.get(&UserId::from("nobody")).await.unwrap();
        assert!(data.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn save_replaces_previous_data() {
        let store = MemoryStore::new();
        let user = UserId::from("user-xyz");

        let first = json!({ "Id": 1, "name": "Ann" });
        store.save(&user, first.as_object().unwrap()).await.unwrap();
        let second = json!({ "Id": 2 });
        store.save(&user, second.as_object().unwrap()).await.unwrap();

        let data = store.get(&user).await.unwrap();
        assert_eq!(data["Id"], 2);
        assert!(!data.contains_key("name"));
        assert_eq!(store.len(), 1);
    }
}
