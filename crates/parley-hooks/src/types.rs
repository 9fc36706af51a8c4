use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parley_core::{DialogEvent, ParleyError, Reply, Result, SessionModel, Transition};

/// Fixed extension points around one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Once per turn on a new session, before any state is resolved.
    SessionStarted,
    /// Before every handler invocation, including recursive continuation.
    BeforeStateChanged,
    /// After every handler invocation, with the normalized transition.
    AfterStateChanged,
    /// Once, after the state machine settles and before directives run.
    BeforeReplySent,
    /// The active state has no route for the intent.
    UnhandledState,
    /// Any fatal condition in the turn.
    OnError,
}

impl HookPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::SessionStarted => "session_started",
            HookPoint::BeforeStateChanged => "before_state_changed",
            HookPoint::AfterStateChanged => "after_state_changed",
            HookPoint::BeforeReplySent => "before_reply_sent",
            HookPoint::UnhandledState => "unhandled_state",
            HookPoint::OnError => "on_error",
        }
    }

    pub const ALL: [HookPoint; 6] = [
        HookPoint::SessionStarted,
        HookPoint::BeforeStateChanged,
        HookPoint::AfterStateChanged,
        HookPoint::BeforeReplySent,
        HookPoint::UnhandledState,
        HookPoint::OnError,
    ];
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decision a before-state-changed hook returns to the state machine.
pub enum BeforeAction {
    /// Run the resolved state's handler as planned.
    Continue,
    /// Resolve this state instead. Later hooks see the new target.
    Redirect(String),
    /// Skip the handler entirely and use this transition.
    Handled(Transition),
}

impl fmt::Debug for BeforeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeforeAction::Continue => f.write_str("Continue"),
            BeforeAction::Redirect(s) => f.debug_tuple("Redirect").field(s).finish(),
            BeforeAction::Handled(t) => f.debug_tuple("Handled").field(t).finish(),
        }
    }
}

#[async_trait]
pub trait SessionStartedHook: Send + Sync {
    async fn on_session_started(&self, event: &mut DialogEvent, model: &mut SessionModel)
        -> Result<()>;
}

#[async_trait]
pub trait BeforeStateHook: Send + Sync {
    async fn before_state(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
    ) -> Result<BeforeAction>;
}

#[async_trait]
pub trait AfterStateHook: Send + Sync {
    /// May rewrite `transition.to` or append directives.
    async fn after_state(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
        transition: &mut Transition,
    ) -> Result<()>;
}

#[async_trait]
pub trait BeforeReplyHook: Send + Sync {
    async fn before_reply(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        reply: &mut dyn Reply,
        transition: &Transition,
    ) -> Result<()>;
}

#[async_trait]
pub trait UnhandledStateHook: Send + Sync {
    /// `Ok(None)` passes to the next hook; `Err` re-raises.
    async fn on_unhandled(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
    ) -> Result<Option<Transition>>;
}

#[async_trait]
pub trait ErrorHook: Send + Sync {
    /// `Some` becomes the turn's output; `None` defers to the next hook.
    async fn on_error(&self, event: &DialogEvent, error: &ParleyError) -> Option<Transition>;
}

/// A registered hook: name for logs and deregistration, priority for ordering.
pub struct HookDefinition<T: ?Sized> {
    pub name: String,
    /// Lower value = earlier execution. Ties broken by registration order.
    pub priority: i32,
    pub handler: Arc<T>,
}

// ---------------------------------------------------------------------------
// Closure adapters
// ---------------------------------------------------------------------------

/// Wraps a synchronous closure as a hook. Build with the `*_fn` constructors
/// so the closure's argument lifetimes are inferred.
pub struct FnHook<F>(F);

pub fn session_started_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&mut DialogEvent, &mut SessionModel) -> Result<()> + Send + Sync,
{
    FnHook(f)
}

pub fn before_state_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&DialogEvent, &mut SessionModel, &str) -> Result<BeforeAction> + Send + Sync,
{
    FnHook(f)
}

pub fn after_state_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&DialogEvent, &mut SessionModel, &str, &mut Transition) -> Result<()> + Send + Sync,
{
    FnHook(f)
}

pub fn before_reply_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&DialogEvent, &mut SessionModel, &mut dyn Reply, &Transition) -> Result<()>
        + Send
        + Sync,
{
    FnHook(f)
}

pub fn unhandled_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&DialogEvent, &mut SessionModel, &str) -> Result<Option<Transition>> + Send + Sync,
{
    FnHook(f)
}

pub fn error_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&DialogEvent, &ParleyError) -> Option<Transition> + Send + Sync,
{
    FnHook(f)
}

#[async_trait]
impl<F> SessionStartedHook for FnHook<F>
where
    F: Fn(&mut DialogEvent, &mut SessionModel) -> Result<()> + Send + Sync,
{
    async fn on_session_started(
        &self,
        event: &mut DialogEvent,
        model: &mut SessionModel,
    ) -> Result<()> {
        (self.0)(event, model)
    }
}

#[async_trait]
impl<F> BeforeStateHook for FnHook<F>
where
    F: Fn(&DialogEvent, &mut SessionModel, &str) -> Result<BeforeAction> + Send + Sync,
{
    async fn before_state(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
    ) -> Result<BeforeAction> {
        (self.0)(event, model, state)
    }
}

#[async_trait]
impl<F> AfterStateHook for FnHook<F>
where
    F: Fn(&DialogEvent, &mut SessionModel, &str, &mut Transition) -> Result<()> + Send + Sync,
{
    async fn after_state(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
        transition: &mut Transition,
    ) -> Result<()> {
        (self.0)(event, model, state, transition)
    }
}

#[async_trait]
impl<F> BeforeReplyHook for FnHook<F>
where
    F: Fn(&DialogEvent, &mut SessionModel, &mut dyn Reply, &Transition) -> Result<()>
        + Send
        + Sync,
{
    async fn before_reply(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        reply: &mut dyn Reply,
        transition: &Transition,
    ) -> Result<()> {
        (self.0)(event, model, reply, transition)
    }
}

#[async_trait]
impl<F> UnhandledStateHook for FnHook<F>
where
    F: Fn(&DialogEvent, &mut SessionModel, &str) -> Result<Option<Transition>> + Send + Sync,
{
    async fn on_unhandled(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
    ) -> Result<Option<Transition>> {
        (self.0)(event, model, state)
    }
}

#[async_trait]
impl<F> ErrorHook for FnHook<F>
where
    F: Fn(&DialogEvent, &ParleyError) -> Option<Transition> + Send + Sync,
{
    async fn on_error(&self, event: &DialogEvent, error: &ParleyError) -> Option<Transition> {
        (self.0)(event, error)
    }
}
