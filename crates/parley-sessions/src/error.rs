use thiserror::Error;

use parley_core::ParleyError;

/// Errors that can occur inside a user store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,

    /// Any other backend failure (network stores, custom adapters).
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ParleyError {
    fn from(e: StoreError) -> Self {
        ParleyError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
