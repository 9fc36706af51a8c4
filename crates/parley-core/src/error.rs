use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParleyError {
    /// A transition (or the session) named a state that was never registered.
    #[error("Unknown state: {name}")]
    UnknownState { name: String },

    /// The active state has no route for the resolved intent.
    #[error("No handler for intent {intent} in state {state}")]
    UnhandledIntent { state: String, intent: String },

    /// A directive's precondition was not met, or it targeted the wrong channel.
    #[error("Directive error: {0}")]
    Directive(String),

    #[error("Render error ({path}): {reason}")]
    Render { path: String, reason: String },

    /// Recursive continuation exceeded the configured hop budget.
    #[error("Transition loop detected after {hops} hops (last state: {state})")]
    InfiniteLoop { hops: u32, state: String },

    /// A state handler failed.
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Hook {hook} failed: {reason}")]
    Hook { hook: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Short, stable error code for logs and adapter error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ParleyError::UnknownState { .. } => "UNKNOWN_STATE",
            ParleyError::UnhandledIntent { .. } => "UNHANDLED_INTENT",
            ParleyError::Directive(_) => "DIRECTIVE_ERROR",
            ParleyError::Render { .. } => "RENDER_ERROR",
            ParleyError::InfiniteLoop { .. } => "INFINITE_LOOP",
            ParleyError::Handler(_) => "HANDLER_ERROR",
            ParleyError::Hook { .. } => "HOOK_ERROR",
            ParleyError::Storage(_) => "STORAGE_ERROR",
            ParleyError::Config(_) => "CONFIG_ERROR",
            ParleyError::Serialization(_) => "SERIALIZATION_ERROR",
            ParleyError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Wrap any displayable failure raised inside a state handler.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        ParleyError::Handler(err.to_string())
    }

    pub fn render(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ParleyError::Render {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
