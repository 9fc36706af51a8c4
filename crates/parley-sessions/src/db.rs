use rusqlite::Connection;

use crate::error::Result;

/// Initialise the user data table.
///
/// Safe to call on every startup: uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_data (
            user_id    TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_user_data_updated
            ON user_data(updated_at DESC);",
    )?;
    Ok(())
}
