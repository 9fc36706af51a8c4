//! Channel-agnostic contracts for the parley dialog engine.
//!
//! Everything a state handler, hook, directive or channel adapter needs to
//! agree on lives here: the normalized event, the session model, transition
//! results, the reply capability surface and the error taxonomy.

pub mod config;
pub mod directive;
pub mod error;
pub mod model;
pub mod render;
pub mod reply;
pub mod speech;
pub mod transition;
pub mod types;

pub use directive::{ContentSource, Directive, DirectiveContext};
pub use error::{ParleyError, Result};
pub use model::SessionModel;
pub use render::{RenderScope, Renderer};
pub use reply::{reply_as, DirectiveMatcher, Reply};
pub use speech::{Speech, SpeechBuffer};
pub use transition::{HandlerOutput, Transition};
pub use types::{DialogEvent, SessionId, UserId};
