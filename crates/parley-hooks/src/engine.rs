use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use parley_core::{DialogEvent, ParleyError, Reply, Result, SessionModel, Transition};

use crate::types::{
    AfterStateHook, BeforeAction, BeforeReplyHook, BeforeStateHook, ErrorHook, HookDefinition,
    HookPoint, SessionStartedHook, UnhandledStateHook,
};

/// One ordered list of hooks for a single extension point.
struct Registry<T: ?Sized> {
    /// Sorted by priority ascending after every registration.
    hooks: Vec<HookDefinition<T>>,
}

impl<T: ?Sized> Registry<T> {
    fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    fn push(&mut self, name: String, handler: Arc<T>) {
        self.hooks.push(HookDefinition {
            name,
            priority: 0,
            handler,
        });
        self.resort();
    }

    fn resort(&mut self) {
        // Stable sort preserves registration order within the same priority.
        self.hooks.sort_by_key(|h| h.priority);
    }

    fn remove(&mut self, name: &str) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.name != name);
        self.hooks.len() < before
    }

    fn set_priority(&mut self, name: &str, priority: i32) -> bool {
        let mut found = false;
        for hook in self.hooks.iter_mut().filter(|h| h.name == name) {
            hook.priority = priority;
            found = true;
        }
        if found {
            self.resort();
        }
        found
    }
}

fn elapsed_ms(t: Instant) -> u64 {
    u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Ordered hook registries invoked around the state machine.
///
/// Hooks within a registry run strictly one after another in priority then
/// registration order; each is awaited before the next starts because later
/// hooks commonly depend on side effects of earlier ones. Registration takes
/// `&mut self`, so the set of hooks is frozen once the app is shared.
pub struct HookEngine {
    session_started: Registry<dyn SessionStartedHook>,
    before_state: Registry<dyn BeforeStateHook>,
    after_state: Registry<dyn AfterStateHook>,
    before_reply: Registry<dyn BeforeReplyHook>,
    unhandled: Registry<dyn UnhandledStateHook>,
    on_error: Registry<dyn ErrorHook>,
}

impl HookEngine {
    pub fn new() -> Self {
        Self {
            session_started: Registry::new(),
            before_state: Registry::new(),
            after_state: Registry::new(),
            before_reply: Registry::new(),
            unhandled: Registry::new(),
            on_error: Registry::new(),
        }
    }

    pub fn on_session_started(
        &mut self,
        name: impl Into<String>,
        hook: impl SessionStartedHook + 'static,
    ) -> &mut Self {
        let name = name.into();
        debug!(name = %name, point = %HookPoint::SessionStarted, "hook registered");
        self.session_started.push(name, Arc::new(hook));
        self
    }

    pub fn on_before_state_changed(
        &mut self,
        name: impl Into<String>,
        hook: impl BeforeStateHook + 'static,
    ) -> &mut Self {
        let name = name.into();
        debug!(name = %name, point = %HookPoint::BeforeStateChanged, "hook registered");
        self.before_state.push(name, Arc::new(hook));
        self
    }

    pub fn on_after_state_changed(
        &mut self,
        name: impl Into<String>,
        hook: impl AfterStateHook + 'static,
    ) -> &mut Self {
        let name = name.into();
        debug!(name = %name, point = %HookPoint::AfterStateChanged, "hook registered");
        self.after_state.push(name, Arc::new(hook));
        self
    }

    pub fn on_before_reply_sent(
        &mut self,
        name: impl Into<String>,
        hook: impl BeforeReplyHook + 'static,
    ) -> &mut Self {
        let name = name.into();
        debug!(name = %name, point = %HookPoint::BeforeReplySent, "hook registered");
        self.before_reply.push(name, Arc::new(hook));
        self
    }

    pub fn on_unhandled_state(
        &mut self,
        name: impl Into<String>,
        hook: impl UnhandledStateHook + 'static,
    ) -> &mut Self {
        let name = name.into();
        debug!(name = %name, point = %HookPoint::UnhandledState, "hook registered");
        self.unhandled.push(name, Arc::new(hook));
        self
    }

    pub fn on_error(&mut self, name: impl Into<String>, hook: impl ErrorHook + 'static) -> &mut Self {
        let name = name.into();
        debug!(name = %name, point = %HookPoint::OnError, "hook registered");
        self.on_error.push(name, Arc::new(hook));
        self
    }

    /// Remove every hook with this name from every registry.
    /// Silent no-op if the name is not found.
    pub fn unregister(&mut self, name: &str) {
        let removed = [
            self.session_started.remove(name),
            self.before_state.remove(name),
            self.after_state.remove(name),
            self.before_reply.remove(name),
            self.unhandled.remove(name),
            self.on_error.remove(name),
        ];
        if removed.iter().any(|r| *r) {
            debug!(name, "hook unregistered");
        }
    }

    /// Move a named hook within its registry. Returns false when not found.
    pub fn set_priority(&mut self, point: HookPoint, name: &str, priority: i32) -> bool {
        match point {
            HookPoint::SessionStarted => self.session_started.set_priority(name, priority),
            HookPoint::BeforeStateChanged => self.before_state.set_priority(name, priority),
            HookPoint::AfterStateChanged => self.after_state.set_priority(name, priority),
            HookPoint::BeforeReplySent => self.before_reply.set_priority(name, priority),
            HookPoint::UnhandledState => self.unhandled.set_priority(name, priority),
            HookPoint::OnError => self.on_error.set_priority(name, priority),
        }
    }

    /// Hook names for one point, in execution order.
    pub fn names(&self, point: HookPoint) -> Vec<&str> {
        fn collect<T: ?Sized>(r: &Registry<T>) -> Vec<&str> {
            r.hooks.iter().map(|h| h.name.as_str()).collect()
        }
        match point {
            HookPoint::SessionStarted => collect(&self.session_started),
            HookPoint::BeforeStateChanged => collect(&self.before_state),
            HookPoint::AfterStateChanged => collect(&self.after_state),
            HookPoint::BeforeReplySent => collect(&self.before_reply),
            HookPoint::UnhandledState => collect(&self.unhandled),
            HookPoint::OnError => collect(&self.on_error),
        }
    }

    /// Run session-started hooks. The first failure aborts the chain.
    pub async fn run_session_started(
        &self,
        event: &mut DialogEvent,
        model: &mut SessionModel,
    ) -> Result<()> {
        for hook in &self.session_started.hooks {
            let t = Instant::now();
            let result = hook.handler.on_session_started(event, model).await;
            debug!(hook = %hook.name, duration_ms = elapsed_ms(t), "session_started hook completed");
            if let Err(e) = result {
                warn!(hook = %hook.name, error = %e, "session_started hook failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run before-state-changed hooks for `state`.
    ///
    /// A redirect updates the target seen by later hooks; the final target is
    /// reported as `Redirect` if it differs from `state`. `Handled` stops the
    /// chain immediately.
    pub async fn run_before_state(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
    ) -> Result<BeforeAction> {
        let mut target = state.to_string();

        for hook in &self.before_state.hooks {
            let t = Instant::now();
            let action = hook.handler.before_state(event, model, &target).await?;
            debug!(
                hook = %hook.name,
                state = %target,
                duration_ms = elapsed_ms(t),
                "before_state_changed hook completed"
            );

            match action {
                BeforeAction::Continue => {}
                BeforeAction::Redirect(next) => {
                    debug!(hook = %hook.name, from = %target, to = %next, "hook redirected state");
                    target = next;
                }
                BeforeAction::Handled(transition) => {
                    debug!(hook = %hook.name, state = %target, "hook short-circuited handler");
                    return Ok(BeforeAction::Handled(transition));
                }
            }
        }

        if target == state {
            Ok(BeforeAction::Continue)
        } else {
            Ok(BeforeAction::Redirect(target))
        }
    }

    pub async fn run_after_state(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
        transition: &mut Transition,
    ) -> Result<()> {
        for hook in &self.after_state.hooks {
            let t = Instant::now();
            hook.handler.after_state(event, model, state, transition).await?;
            debug!(hook = %hook.name, state, duration_ms = elapsed_ms(t), "after_state_changed hook completed");
        }
        Ok(())
    }

    pub async fn run_before_reply(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        reply: &mut dyn Reply,
        transition: &Transition,
    ) -> Result<()> {
        for hook in &self.before_reply.hooks {
            let t = Instant::now();
            hook.handler.before_reply(event, model, reply, transition).await?;
            debug!(hook = %hook.name, duration_ms = elapsed_ms(t), "before_reply_sent hook completed");
        }
        Ok(())
    }

    /// First hook to return a transition wins. `Ok(None)` when no hook
    /// recovered, including when none are registered.
    pub async fn run_unhandled(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        state: &str,
    ) -> Result<Option<Transition>> {
        for hook in &self.unhandled.hooks {
            let t = Instant::now();
            let outcome = hook.handler.on_unhandled(event, model, state).await?;
            debug!(hook = %hook.name, state, duration_ms = elapsed_ms(t), "unhandled_state hook completed");
            if outcome.is_some() {
                return Ok(outcome);
            }
        }
        Ok(None)
    }

    /// First hook to return a transition wins.
    pub async fn run_error(&self, event: &DialogEvent, error: &ParleyError) -> Option<Transition> {
        for hook in &self.on_error.hooks {
            let t = Instant::now();
            let outcome = hook.handler.on_error(event, error).await;
            debug!(hook = %hook.name, code = error.code(), duration_ms = elapsed_ms(t), "on_error hook completed");
            if outcome.is_some() {
                return outcome;
            }
        }
        None
    }
}

impl Default for HookEngine {
    fn default() -> Self {
        Self::new()
    }
}
