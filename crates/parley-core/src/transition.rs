use std::fmt;

use crate::directive::Directive;

/// Normalized result of one state-handler invocation.
///
/// Produced fresh per invocation and consumed immediately by the state
/// machine; never persisted.
#[derive(Default)]
pub struct Transition {
    /// Next state. `None` means "no further state": the turn stays where it is.
    pub to: Option<String>,
    /// View paths rendered as statements, in order.
    pub reply: Vec<String>,
    pub reprompt: Option<String>,
    pub directives: Vec<Box<dyn Directive>>,
    pub should_terminate: bool,
}

impl Transition {
    /// Continue into `state`.
    pub fn to(state: impl Into<String>) -> Self {
        Self {
            to: Some(state.into()),
            ..Self::default()
        }
    }

    /// Stay in the current state and say `path`.
    pub fn reply(path: impl Into<String>) -> Self {
        Self {
            reply: vec![path.into()],
            ..Self::default()
        }
    }

    /// Say `path` and end the conversation.
    pub fn tell(path: impl Into<String>) -> Self {
        Self::reply(path).terminate()
    }

    pub fn with_reply(mut self, path: impl Into<String>) -> Self {
        self.reply.push(path.into());
        self
    }

    pub fn with_reprompt(mut self, path: impl Into<String>) -> Self {
        self.reprompt = Some(path.into());
        self
    }

    pub fn with_to(mut self, state: impl Into<String>) -> Self {
        self.to = Some(state.into());
        self
    }

    pub fn with_directive(mut self, directive: impl Directive + 'static) -> Self {
        self.directives.push(Box::new(directive));
        self
    }

    pub fn terminate(mut self) -> Self {
        self.should_terminate = true;
        self
    }

    /// Keys of the attached directives, in application order.
    pub fn directive_keys(&self) -> Vec<&'static str> {
        self.directives.iter().map(|d| d.key()).collect()
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("to", &self.to)
            .field("reply", &self.reply)
            .field("reprompt", &self.reprompt)
            .field("directives", &self.directive_keys())
            .field("should_terminate", &self.should_terminate)
            .finish()
    }
}

/// What a state handler hands back before normalization.
pub enum HandlerOutput {
    /// Bare view path: say it and terminate.
    Content(String),
    Transition(Transition),
    /// The handler declines this intent; routed to the unhandled-state hooks.
    Unhandled,
}

impl From<Transition> for HandlerOutput {
    fn from(t: Transition) -> Self {
        HandlerOutput::Transition(t)
    }
}

impl From<&str> for HandlerOutput {
    fn from(path: &str) -> Self {
        HandlerOutput::Content(path.to_string())
    }
}

impl From<String> for HandlerOutput {
    fn from(path: String) -> Self {
        HandlerOutput::Content(path)
    }
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOutput::Content(p) => f.debug_tuple("Content").field(p).finish(),
            HandlerOutput::Transition(t) => f.debug_tuple("Transition").field(t).finish(),
            HandlerOutput::Unhandled => f.write_str("Unhandled"),
        }
    }
}
