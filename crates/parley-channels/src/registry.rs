use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use parley_engine::DialogApp;

use crate::error::{ChannelError, Result};
use crate::platform::Platform;

/// Platform adapters keyed by name, sharing one [`DialogApp`].
pub struct PlatformRegistry {
    app: Arc<DialogApp>,
    platforms: HashMap<String, Box<dyn Platform>>,
}

impl PlatformRegistry {
    pub fn new(app: Arc<DialogApp>) -> Self {
        Self {
            app,
            platforms: HashMap::new(),
        }
    }

    pub fn app(&self) -> &DialogApp {
        &self.app
    }

    /// Register an adapter. An adapter with the same name is replaced.
    pub fn register(&mut self, platform: Box<dyn Platform>) -> &mut Self {
        let name = platform.name().to_string();
        info!(platform = %name, "registering platform adapter");
        if self.platforms.insert(name.clone(), platform).is_some() {
            warn!(platform = %name, "replaced existing platform adapter");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Platform> {
        self.platforms.get(name).map(|b| b.as_ref())
    }

    /// Registered adapter names, sorted for deterministic output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.platforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run one raw request through the named adapter and return the vendor
    /// response body.
    pub async fn dispatch(&self, name: &str, raw: Value) -> Result<Value> {
        let platform = self
            .get(name)
            .ok_or_else(|| ChannelError::UnknownPlatform(name.to_string()))?;
        platform.handle(&self.app, raw).await
    }
}
