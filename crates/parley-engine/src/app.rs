use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use parley_core::config::EngineConfig;
use parley_core::{
    DialogEvent, DirectiveContext, ParleyError, Renderer, Reply, Result, SessionModel, Transition,
};
use parley_hooks::HookEngine;

use crate::machine::StateMachine;
use crate::pipeline::apply_directives;
use crate::state::{IntentMap, Route, StateHandler};

/// What happened during one turn, alongside the reply the caller owns.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Session state persisted for the next turn.
    pub state: String,
    pub hops: u32,
    pub terminated: bool,
    /// The fatal error the turn recovered from, if any.
    pub error: Option<ParleyError>,
}

/// A conversational application: state graph, hooks and renderer.
///
/// Build it with `&mut self` registration calls, then share it (e.g. in an
/// `Arc`) and call [`DialogApp::execute`] once per incoming event. Callers
/// must not run two turns for the same session concurrently.
pub struct DialogApp {
    machine: StateMachine,
    hooks: HookEngine,
    renderer: Arc<dyn Renderer>,
    config: EngineConfig,
}

impl DialogApp {
    pub fn new(config: EngineConfig, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            machine: StateMachine::new(config.clone()),
            hooks: HookEngine::new(),
            renderer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn hooks(&self) -> &HookEngine {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut HookEngine {
        &mut self.hooks
    }

    pub fn on_state(&mut self, name: &str, handler: impl StateHandler + 'static) -> Result<&mut Self> {
        self.machine.register_state(name, handler)?;
        Ok(self)
    }

    pub fn on_intents(&mut self, name: &str, intents: IntentMap) -> Result<&mut Self> {
        self.machine.register_intents(name, intents)?;
        Ok(self)
    }

    /// Handle `intent` directly in the entry state.
    pub fn on_intent(&mut self, intent: &str, handler: impl StateHandler + 'static) -> Result<&mut Self> {
        let entry = self.config.entry_state.clone();
        self.machine
            .add_route(&entry, intent, Route::Handler(Arc::new(handler)))?;
        Ok(self)
    }

    /// Run one turn and write its output into `reply`.
    ///
    /// Never fails: every fatal condition goes through the on-error hooks
    /// exactly once, and if none recovers the reply becomes a terminal
    /// apology with the session reset to the entry state.
    pub async fn execute(&self, mut event: DialogEvent, reply: &mut dyn Reply) -> TurnOutcome {
        let started = Instant::now();
        if event.intent_name.trim().is_empty() {
            warn!(platform = %event.platform, "event without intent, using the unhandled intent");
            event.intent_name = self.config.unhandled_intent.clone();
        }

        let mut model = SessionModel::new(self.config.entry_state.clone());
        let result = self.run_turn(&mut event, &mut model, reply).await;
        let outcome = match result {
            Ok(hops) => TurnOutcome {
                state: model.state.clone(),
                hops,
                terminated: reply.has_terminated(),
                error: None,
            },
            Err(e) => self.recover(&event, &mut model, reply, e).await,
        };

        info!(
            platform = %event.platform,
            user = %event.user_id,
            intent = %event.intent_name,
            state = %outcome.state,
            hops = outcome.hops,
            terminated = outcome.terminated,
            recovered = outcome.error.is_some(),
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "turn complete"
        );
        outcome
    }

    async fn run_turn(
        &self,
        event: &mut DialogEvent,
        model: &mut SessionModel,
        reply: &mut dyn Reply,
    ) -> Result<u32> {
        *model = SessionModel::from_attributes(&event.session_attributes, &self.config.entry_state)?;

        if event.is_new_session {
            model.state = self.config.entry_state.clone();
            self.hooks.run_session_started(event, model).await?;
        }

        let event: &DialogEvent = event;
        let settled = self.machine.run_transition(event, model, &self.hooks).await?;

        self.hooks
            .run_before_reply(event, model, reply, &settled.transition)
            .await?;

        let ctx = DirectiveContext {
            event,
            model: &*model,
            renderer: self.renderer.as_ref(),
            transition: &settled.transition,
        };
        apply_directives(reply, &ctx).await?;

        if settled.transition.should_terminate {
            reply.terminate();
        }
        reply.set_session(model.to_attributes());
        Ok(settled.hops)
    }

    async fn recover(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        reply: &mut dyn Reply,
        err: ParleyError,
    ) -> TurnOutcome {
        warn!(code = err.code(), error = %err, state = %model.state, "turn failed, running error hooks");
        reply.clear();

        if let Some(transition) = self.hooks.run_error(event, &err).await {
            match self.apply_recovery(event, model, reply, transition).await {
                Ok(()) => {
                    return TurnOutcome {
                        state: model.state.clone(),
                        hops: 0,
                        terminated: reply.has_terminated(),
                        error: Some(err),
                    };
                }
                Err(recovery_err) => {
                    error!(
                        code = recovery_err.code(),
                        error = %recovery_err,
                        "error transition could not be applied"
                    );
                    reply.clear();
                }
            }
        } else {
            error!(code = err.code(), error = %err, "unrecovered error, replying with apology");
        }

        reply.add_statement(&self.config.apology, true);
        reply.terminate();
        model.state = self.config.entry_state.clone();
        reply.set_session(model.to_attributes());

        TurnOutcome {
            state: model.state.clone(),
            hops: 0,
            terminated: true,
            error: Some(err),
        }
    }

    /// Apply an on-error transition without continuing the flow: its `to`
    /// (or the entry state) becomes the session state for the next turn.
    async fn apply_recovery(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        reply: &mut dyn Reply,
        mut transition: Transition,
    ) -> Result<()> {
        let target = transition
            .to
            .take()
            .unwrap_or_else(|| self.config.entry_state.clone());
        if target == self.config.terminal_state {
            transition.should_terminate = true;
        } else if !self.machine.is_registered(&target) {
            return Err(ParleyError::UnknownState { name: target });
        }
        model.state = target;

        let ctx = DirectiveContext {
            event,
            model: &*model,
            renderer: self.renderer.as_ref(),
            transition: &transition,
        };
        apply_directives(reply, &ctx).await?;

        if transition.should_terminate {
            reply.terminate();
        }
        reply.set_session(model.to_attributes());
        Ok(())
    }
}
