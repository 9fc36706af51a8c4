use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use parley_core::{DialogEvent, HandlerOutput, Result, SessionModel};

/// Application logic for one state.
///
/// Handlers may mutate the session model freely; the engine serializes it
/// back into the reply at the end of the turn.
#[async_trait]
pub trait StateHandler: Send + Sync {
    async fn handle(&self, event: &DialogEvent, model: &mut SessionModel) -> Result<HandlerOutput>;
}

/// Synchronous closure handler. Build with [`handler_fn`].
pub struct FnHandler<F>(F);

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&DialogEvent, &mut SessionModel) -> Result<HandlerOutput> + Send + Sync,
{
    FnHandler(f)
}

#[async_trait]
impl<F> StateHandler for FnHandler<F>
where
    F: Fn(&DialogEvent, &mut SessionModel) -> Result<HandlerOutput> + Send + Sync,
{
    async fn handle(&self, event: &DialogEvent, model: &mut SessionModel) -> Result<HandlerOutput> {
        (self.0)(event, model)
    }
}

/// Where an intent goes inside an intent-map state.
#[derive(Clone)]
pub enum Route {
    /// Continue into another state.
    To(String),
    Handler(Arc<dyn StateHandler>),
}

/// Partial intent → route table. Intents missing from the table are
/// unhandled in that state.
#[derive(Clone, Default)]
pub struct IntentMap {
    routes: HashMap<String, Route>,
}

impl IntentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, intent: impl Into<String>, state: impl Into<String>) -> Self {
        self.routes.insert(intent.into(), Route::To(state.into()));
        self
    }

    pub fn handle(mut self, intent: impl Into<String>, handler: impl StateHandler + 'static) -> Self {
        self.routes
            .insert(intent.into(), Route::Handler(Arc::new(handler)));
        self
    }

    pub(crate) fn insert(&mut self, intent: String, route: Route) {
        self.routes.insert(intent, route);
    }

    pub fn get(&self, intent: &str) -> Option<&Route> {
        self.routes.get(intent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Route)> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A registered state: one handler for every intent, or an intent map.
#[derive(Clone)]
pub enum StateDef {
    Handler(Arc<dyn StateHandler>),
    Intents(IntentMap),
}

impl StateDef {
    /// Dispatch the event to this state's logic.
    pub async fn dispatch(&self, event: &DialogEvent, model: &mut SessionModel) -> Result<HandlerOutput> {
        match self {
            StateDef::Handler(h) => h.handle(event, model).await,
            StateDef::Intents(map) => match map.get(&event.intent_name) {
                Some(Route::To(target)) => Ok(parley_core::Transition::to(target.clone()).into()),
                Some(Route::Handler(h)) => h.handle(event, model).await,
                None => Ok(HandlerOutput::Unhandled),
            },
        }
    }
}
