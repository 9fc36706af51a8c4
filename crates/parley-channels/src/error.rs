use thiserror::Error;

use parley_core::ParleyError;

/// Errors raised at the channel boundary, outside of a turn.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The vendor payload is missing a field the adapter needs.
    #[error("Invalid {platform} payload: {reason}")]
    InvalidPayload { platform: String, reason: String },

    /// No adapter is registered under this name.
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    /// The reply could not be serialized.
    #[error(transparent)]
    Engine(#[from] ParleyError),
}

impl ChannelError {
    pub fn invalid(platform: &str, reason: impl Into<String>) -> Self {
        ChannelError::InvalidPayload {
            platform: platform.to_string(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            ChannelError::UnknownPlatform(_) => "UNKNOWN_PLATFORM",
            ChannelError::Engine(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
