use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// State every new session starts in.
pub const DEFAULT_ENTRY_STATE: &str = "entry";
/// Marker state meaning "the conversation is over".
pub const DEFAULT_TERMINAL_STATE: &str = "die";
/// Reserved intent for raw requests no adapter knows how to map.
pub const DEFAULT_UNHANDLED_INTENT: &str = "Unhandled";
/// Hop budget for one turn's recursive continuation.
pub const DEFAULT_MAX_HOPS: u32 = 32;
pub const DEFAULT_APOLOGY: &str = "Sorry, something went wrong. Please try again later.";

/// Top-level config (parley.toml + PARLEY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Knobs for the state machine and the error fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_entry_state")]
    pub entry_state: String,
    #[serde(default = "default_terminal_state")]
    pub terminal_state: String,
    #[serde(default = "default_unhandled_intent")]
    pub unhandled_intent: String,
    /// Maximum number of state changes a single turn may traverse.
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
    /// Spoken when a fatal error is not recovered by any on-error hook.
    #[serde(default = "default_apology")]
    pub apology: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_state: default_entry_state(),
            terminal_state: default_terminal_state(),
            unhandled_intent: default_unhandled_intent(),
            max_hops: DEFAULT_MAX_HOPS,
            apology: default_apology(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// JSON file holding the view tree. `None` means views are supplied in code.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when neither PARLEY_LOG nor RUST_LOG is set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_entry_state() -> String {
    DEFAULT_ENTRY_STATE.to_string()
}
fn default_terminal_state() -> String {
    DEFAULT_TERMINAL_STATE.to_string()
}
fn default_unhandled_intent() -> String {
    DEFAULT_UNHANDLED_INTENT.to_string()
}
fn default_max_hops() -> u32 {
    DEFAULT_MAX_HOPS
}
fn default_apology() -> String {
    DEFAULT_APOLOGY.to_string()
}
fn default_log_filter() -> String {
    "parley=info".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.parley/parley.db", home)
}

impl ParleyConfig {
    /// Load config from a TOML file with PARLEY_* env var overrides.
    ///
    /// Falls back to `~/.parley/parley.toml` when no path is given. A missing
    /// file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ParleyConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PARLEY_").split("__"))
            .extract()
            .map_err(|e| crate::error::ParleyError::Config(e.to_string()))?;

        if config.engine.max_hops == 0 {
            return Err(crate::error::ParleyError::Config(
                "engine.max_hops must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.parley/parley.toml", home)
}
