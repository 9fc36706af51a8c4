//! State-machine transition engine and directive-based reply composition.
//!
//! A turn flows: [`DialogEvent`](parley_core::DialogEvent) →
//! [`StateMachine`] (with hooks) → settled [`Transition`](parley_core::Transition)
//! → directive pipeline → [`Reply`](parley_core::Reply). [`DialogApp`] drives
//! the whole thing and owns error recovery.

pub mod app;
pub mod directives;
pub mod machine;
pub mod pipeline;
pub mod plugins;
pub mod render;
pub mod state;
pub mod text;

pub use app::{DialogApp, TurnOutcome};
pub use directives::{Reprompt, Say};
pub use machine::{Edge, Settled, StateMachine};
pub use pipeline::apply_directives;
pub use plugins::{auto_load, AutoLoadConfig};
pub use render::JsonViews;
pub use state::{handler_fn, FnHandler, IntentMap, Route, StateDef, StateHandler};
pub use text::{TextReply, TEXT_CHANNEL};
