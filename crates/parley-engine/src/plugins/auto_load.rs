use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use parley_core::{DialogEvent, ParleyError, Reply, Result, SessionModel, Transition};
use parley_hooks::{BeforeReplyHook, SessionStartedHook};
use parley_sessions::UserStore;

use crate::app::DialogApp;

const DEFAULT_FIELD: &str = "user";

/// Configuration for [`auto_load`]. Captured by the registered hooks; there
/// is no shared default.
#[derive(Clone, Default)]
pub struct AutoLoadConfig {
    pub store: Option<Arc<dyn UserStore>>,
    /// Model field the user data is loaded into. Defaults to `"user"`.
    pub field: Option<String>,
    /// Write the field back through `save` before every reply.
    pub save_on_reply: bool,
}

impl AutoLoadConfig {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn save_on_reply(mut self, enabled: bool) -> Self {
        self.save_on_reply = enabled;
        self
    }
}

/// Load per-user data into the session model when a session starts.
///
/// Store failures are logged and abort the turn, which then goes through
/// the on-error hooks.
pub fn auto_load(app: &mut DialogApp, config: AutoLoadConfig) -> Result<()> {
    let store = config
        .store
        .ok_or_else(|| ParleyError::Config("auto-load requires a user store".to_string()))?;
    let field = config.field.unwrap_or_else(|| DEFAULT_FIELD.to_string());
    if field.is_empty() {
        return Err(ParleyError::Config(
            "auto-load field name must not be empty".to_string(),
        ));
    }

    app.hooks_mut().on_session_started(
        "auto_load",
        AutoLoadHook {
            store: Arc::clone(&store),
            field: field.clone(),
        },
    );
    if config.save_on_reply {
        app.hooks_mut()
            .on_before_reply_sent("auto_save", AutoSaveHook { store, field });
    }
    Ok(())
}

struct AutoLoadHook {
    store: Arc<dyn UserStore>,
    field: String,
}

#[async_trait]
impl SessionStartedHook for AutoLoadHook {
    async fn on_session_started(
        &self,
        event: &mut DialogEvent,
        model: &mut SessionModel,
    ) -> Result<()> {
        let data = self.store.get(&event.user_id).await.map_err(|e| {
            error!(user = %event.user_id, error = %e, "auto-load: fetching user data failed");
            ParleyError::from(e)
        })?;
        debug!(user = %event.user_id, keys = data.len(), "auto-load: user data fetched");
        model.set(self.field.clone(), Value::Object(data));
        Ok(())
    }
}

struct AutoSaveHook {
    store: Arc<dyn UserStore>,
    field: String,
}

#[async_trait]
impl BeforeReplyHook for AutoSaveHook {
    async fn before_reply(
        &self,
        event: &DialogEvent,
        model: &mut SessionModel,
        _reply: &mut dyn Reply,
        _transition: &Transition,
    ) -> Result<()> {
        let Some(Value::Object(data)) = model.get(&self.field) else {
            return Ok(());
        };
        self.store.save(&event.user_id, data).await.map_err(|e| {
            error!(user = %event.user_id, error = %e, "auto-load: saving user data failed");
            ParleyError::from(e)
        })?;
        debug!(user = %event.user_id, "auto-load: user data saved");
        Ok(())
    }
}
