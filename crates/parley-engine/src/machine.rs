use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use parley_core::config::EngineConfig;
use parley_core::{DialogEvent, HandlerOutput, ParleyError, Result, SessionModel, Transition};
use parley_hooks::{BeforeAction, HookEngine};

use crate::state::{IntentMap, Route, StateDef, StateHandler};

/// Outcome of [`StateMachine::run_transition`].
#[derive(Debug)]
pub struct Settled {
    /// Content and directives gathered across every hop, plus the final
    /// target and termination flag.
    pub transition: Transition,
    /// Number of state changes taken by recursive continuation.
    pub hops: u32,
}

/// A statically declared intent-map edge (diagnostics only).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: String,
    pub intent: String,
    pub to: String,
}

/// Registered state graph plus the resolution loop that walks it.
///
/// Edges are not declared up front: every `to` a handler returns is checked
/// against the registry when the transition happens.
pub struct StateMachine {
    states: HashMap<String, StateDef>,
    config: EngineConfig,
}

impl StateMachine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            states: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register (or replace) a state whose handler receives every intent.
    pub fn register_state(&mut self, name: &str, handler: impl StateHandler + 'static) -> Result<()> {
        self.insert(name, StateDef::Handler(Arc::new(handler)))
    }

    /// Register (or replace) a state backed by an intent map.
    pub fn register_intents(&mut self, name: &str, intents: IntentMap) -> Result<()> {
        self.insert(name, StateDef::Intents(intents))
    }

    /// Add one intent route to an intent-map state, creating the state if needed.
    pub fn add_route(&mut self, state: &str, intent: &str, route: Route) -> Result<()> {
        match self.states.get_mut(state) {
            Some(StateDef::Intents(map)) => {
                map.insert(intent.to_string(), route);
                Ok(())
            }
            Some(StateDef::Handler(_)) => Err(ParleyError::Config(format!(
                "state {state} has a catch-all handler; cannot add intent {intent}"
            ))),
            None => {
                let mut map = IntentMap::new();
                map.insert(intent.to_string(), route);
                self.insert(state, StateDef::Intents(map))
            }
        }
    }

    fn insert(&mut self, name: &str, def: StateDef) -> Result<()> {
        if name.is_empty() {
            return Err(ParleyError::Config("state name must not be empty".to_string()));
        }
        if name == self.config.terminal_state {
            return Err(ParleyError::Config(format!(
                "{name} is the reserved terminal state and cannot have a handler"
            )));
        }
        if self.states.insert(name.to_string(), def).is_some() {
            debug!(state = name, "state handler replaced");
        } else {
            debug!(state = name, "state registered");
        }
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    pub fn state_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.states.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Edges known without running any handler, sorted.
    pub fn declared_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .states
            .iter()
            .filter_map(|(from, def)| match def {
                StateDef::Intents(map) => Some((from, map)),
                StateDef::Handler(_) => None,
            })
            .flat_map(|(from, map)| {
                map.iter().filter_map(move |(intent, route)| match route {
                    Route::To(to) => Some(Edge {
                        from: from.clone(),
                        intent: intent.clone(),
                        to: to.clone(),
                    }),
                    Route::Handler(_) => None,
                })
            })
            .collect();
        edges.sort();
        edges
    }

    /// Declared edges whose target is neither registered nor the terminal marker.
    pub fn dangling_edges(&self) -> Vec<Edge> {
        self.declared_edges()
            .into_iter()
            .filter(|e| !self.is_known_target(&e.to))
            .collect()
    }

    fn is_known_target(&self, name: &str) -> bool {
        name == self.config.terminal_state || self.is_registered(name)
    }

    /// State the turn starts from: the model's state unless it is empty or
    /// the terminal marker, in which case the entry state.
    pub fn resolve_start(&self, model: &SessionModel) -> String {
        if model.state.is_empty() || model.state == self.config.terminal_state {
            self.config.entry_state.clone()
        } else {
            model.state.clone()
        }
    }

    /// Drive the machine until it settles.
    ///
    /// Each hop runs before-state hooks, the state's handler (or the
    /// unhandled-state hooks), normalization and after-state hooks, then
    /// follows `to` while it names a different registered state and the
    /// transition does not terminate. Content and directives from every hop
    /// accumulate in order. `model.state` always names the active state.
    pub async fn run_transition(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        hooks: &HookEngine,
    ) -> Result<Settled> {
        let mut current = self.resolve_start(model);
        if !self.is_registered(&current) {
            return Err(ParleyError::UnknownState { name: current });
        }
        model.state = current.clone();

        let mut settled = Transition::default();
        let mut hops: u32 = 0;

        loop {
            let mut transition = match hooks.run_before_state(event, model, &current).await? {
                BeforeAction::Handled(t) => normalize(HandlerOutput::Transition(t), &current),
                action => {
                    if let BeforeAction::Redirect(target) = action {
                        if target == self.config.terminal_state {
                            debug!(from = %current, "before hook redirected to terminal state");
                            model.state = target;
                            settled.should_terminate = true;
                            break;
                        }
                        if !self.is_registered(&target) {
                            return Err(ParleyError::UnknownState { name: target });
                        }
                        current = target;
                        model.state = current.clone();
                    }
                    self.invoke(&current, event, model, hooks).await?
                }
            };

            hooks
                .run_after_state(event, model, &current, &mut transition)
                .await?;

            let next = transition.to.take();
            let terminate = transition.should_terminate;
            absorb(&mut settled, transition);

            match next {
                None => break,
                Some(target) if target == self.config.terminal_state => {
                    model.state = target;
                    settled.should_terminate = true;
                    break;
                }
                Some(target) => {
                    if !self.is_registered(&target) {
                        return Err(ParleyError::UnknownState { name: target });
                    }
                    if target == current || terminate {
                        model.state = target;
                        break;
                    }

                    hops += 1;
                    if hops > self.config.max_hops {
                        return Err(ParleyError::InfiniteLoop {
                            hops,
                            state: target,
                        });
                    }
                    debug!(from = %current, to = %target, hops, "continuing into next state");
                    current = target;
                    model.state = current.clone();
                }
            }
        }

        settled.to = Some(model.state.clone());
        info!(
            state = %model.state,
            hops,
            terminate = settled.should_terminate,
            directives = settled.directives.len(),
            "state machine settled"
        );
        Ok(Settled {
            transition: settled,
            hops,
        })
    }

    async fn invoke(
        &self,
        state: &str,
        event: &DialogEvent,
        model: &mut SessionModel,
        hooks: &HookEngine,
    ) -> Result<Transition> {
        let def = self
            .states
            .get(state)
            .ok_or_else(|| ParleyError::UnknownState {
                name: state.to_string(),
            })?;

        let t = Instant::now();
        let output = def.dispatch(event, model).await?;
        debug!(
            state,
            intent = %event.intent_name,
            duration_ms = u64::try_from(t.elapsed().as_millis()).unwrap_or(u64::MAX),
            "state handler completed"
        );

        match output {
            HandlerOutput::Unhandled => {
                let recovered = hooks.run_unhandled(event, model, state).await?;
                match recovered {
                    Some(t) => Ok(normalize(HandlerOutput::Transition(t), state)),
                    None => Err(ParleyError::UnhandledIntent {
                        state: state.to_string(),
                        intent: event.intent_name.clone(),
                    }),
                }
            }
            other => Ok(normalize(other, state)),
        }
    }
}

/// Turn a handler's output into a transition.
///
/// A bare content reference says that content and terminates. A transition
/// without `to` stays in `current` unless it terminates, in which case it
/// has no next state at all.
pub fn normalize(output: HandlerOutput, current: &str) -> Transition {
    match output {
        HandlerOutput::Content(path) => Transition::tell(path),
        HandlerOutput::Transition(mut t) => {
            if t.to.is_none() && !t.should_terminate {
                t.to = Some(current.to_string());
            }
            t
        }
        HandlerOutput::Unhandled => Transition::default(),
    }
}

fn absorb(acc: &mut Transition, hop: Transition) {
    acc.reply.extend(hop.reply);
    if hop.reprompt.is_some() {
        acc.reprompt = hop.reprompt;
    }
    acc.directives.extend(hop.directives);
    acc.should_terminate |= hop.should_terminate;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::handler_fn;

    #[test]
    fn bare_content_terminates() {
        let t = normalize(HandlerOutput::Content("Bye".to_string()), "launch");
        assert!(t.should_terminate);
        assert_eq!(t.to, None);
        assert_eq!(t.reply, vec!["Bye".to_string()]);
    }

    #[test]
    fn missing_to_stays_unless_terminating() {
        let t = normalize(Transition::reply("Hi").into(), "launch");
        assert_eq!(t.to.as_deref(), Some("launch"));

        let t = normalize(Transition::tell("Bye").into(), "launch");
        assert_eq!(t.to, None);
    }

    #[test]
    fn terminal_state_cannot_be_registered() {
        let mut machine = StateMachine::new(EngineConfig::default());
        let err = machine
            .register_state("die", handler_fn(|_e, _m| Ok(HandlerOutput::Unhandled)))
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn declared_edges_and_dangling_targets() {
        let mut machine = StateMachine::new(EngineConfig::default());
        machine
            .register_intents(
                "entry",
                IntentMap::new()
                    .route("LaunchIntent", "launch")
                    .route("StopIntent", "die")
                    .route("HelpIntent", "help"),
            )
            .unwrap();
        machine
            .register_state("launch", handler_fn(|_e, _m| Ok("Launch.Welcome".into())))
            .unwrap();

        let edges = machine.declared_edges();
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0].intent, "HelpIntent");

        let dangling = machine.dangling_edges();
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].to, "help");
    }

    #[test]
    fn add_route_refuses_catch_all_states() {
        let mut machine = StateMachine::new(EngineConfig::default());
        machine
            .register_state("launch", handler_fn(|_e, _m| Ok("Launch.Welcome".into())))
            .unwrap();
        assert!(machine
            .add_route("launch", "YesIntent", Route::To("entry".to_string()))
            .is_err());
        machine
            .add_route("entry", "YesIntent", Route::To("launch".to_string()))
            .unwrap();
        assert_eq!(machine.state_names(), vec!["entry", "launch"]);
    }

    #[test]
    fn terminal_and_empty_states_resolve_to_entry() {
        let machine = StateMachine::new(EngineConfig::default());
        assert_eq!(machine.resolve_start(&SessionModel::new("die")), "entry");
        assert_eq!(machine.resolve_start(&SessionModel::new("")), "entry");
        assert_eq!(machine.resolve_start(&SessionModel::new("launch")), "launch");
    }
}
