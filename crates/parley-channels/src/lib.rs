//! Vendor adapters: concrete replies, channel directives and request parsing
//! for each supported assistant platform.

pub mod alexa;
pub mod dialogflow;
pub mod error;
pub mod platform;
pub mod registry;

pub use alexa::{AlexaPlatform, AlexaReply};
pub use dialogflow::{DialogFlowPlatform, DialogFlowReply};
pub use error::ChannelError;
pub use platform::Platform;
pub use registry::PlatformRegistry;
