//! Persistence boundary for per-user data used by lifecycle plugins.
//!
//! The engine's core loop never touches storage; plugins such as auto-load
//! receive a [`UserStore`] explicitly and call `get`/`save` from their hooks.

pub mod db;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::UserStore;
pub use types::UserRecord;
