use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use parley_core::UserId;

use crate::error::{Result, StoreError};
use crate::store::UserStore;
use crate::types::UserRecord;

/// SQLite-backed user store.
///
/// Wraps a single connection in a `Mutex`; one turn holds it only for the
/// duration of a single statement.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Open `path`, run migrations and wrap the connection.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        crate::db::init_db(&conn)?;
        Ok(Self::new(conn))
    }

    /// Full row for a user, `None` if never saved.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn record(&self, user_id: &UserId) -> Result<Option<UserRecord>> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        let row = db.query_row(
            "SELECT user_id, data, created_at, updated_at FROM user_data WHERE user_id = ?1",
            rusqlite::params![user_id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        );

        match row {
            Ok((user_id, data, created_at, updated_at)) => Ok(Some(UserRecord {
                user_id,
                data: serde_json::from_str(&data)?,
                created_at,
                updated_at,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    #[instrument(skip(self, data), fields(user_id = %user_id))]
    fn upsert(&self, user_id: &UserId, data: &Map<String, Value>) -> Result<()> {
        let encoded = serde_json::to_string(data)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        db.execute(
            "INSERT INTO user_data (user_id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(user_id) DO UPDATE SET data = excluded.data,
                                                updated_at = excluded.updated_at",
            rusqlite::params![user_id.as_str(), encoded, now],
        )?;
        debug!("user data saved");
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn get(&self, user_id: &UserId) -> Result<Map<String, Value>> {
        Ok(self.record(user_id)?.map(|r| r.data).unwrap_or_default())
    }

    async fn save(&self, user_id: &UserId, data: &Map<String, Value>) -> Result<()> {
        self.upsert(user_id, data)
    }
}
