//! Named, prioritized lifecycle hooks around a dialog turn.

pub mod engine;
pub mod types;

pub use engine::HookEngine;
pub use types::{
    after_state_fn, before_reply_fn, before_state_fn, error_fn, session_started_fn, unhandled_fn,
    AfterStateHook, BeforeAction, BeforeReplyHook, BeforeStateHook, ErrorHook, FnHook,
    HookDefinition, HookPoint, SessionStartedHook, UnhandledStateHook,
};
