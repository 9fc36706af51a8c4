use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parley_channels::{AlexaPlatform, DialogFlowPlatform, PlatformRegistry};
use parley_core::config::{LoggingConfig, ParleyConfig};
use parley_core::Renderer;
use parley_engine::{auto_load, AutoLoadConfig, JsonViews};
use parley_sessions::{MemoryStore, SqliteStore, UserStore};

mod skill;

#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Run vendor requests through a parley dialog skill")]
struct Cli {
    /// Config file (overrides PARLEY_CONFIG; defaults to ~/.parley/parley.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one raw request through the demo skill and print the vendor reply.
    Replay(ReplayArgs),
    /// Print the demo skill's statically declared intent routes.
    Graph,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Platform adapter that parses the request (alexa, dialogflow).
    #[arg(long, short)]
    platform: String,
    /// Request JSON file, or `-` for stdin.
    #[arg(long, short, value_name = "FILE")]
    event: PathBuf,
    /// Views JSON file (overrides views.path from config).
    #[arg(long, value_name = "FILE")]
    views: Option<String>,
    /// Keep user data in memory instead of the SQLite store.
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // explicit flag > PARLEY_CONFIG env > ~/.parley/parley.toml
    let config_path = cli.config.clone().or_else(|| std::env::var("PARLEY_CONFIG").ok());
    let loaded = ParleyConfig::load(config_path.as_deref());
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_logging(&logging);
    let config = loaded.unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        ParleyConfig::default()
    });

    match cli.command {
        Commands::Replay(args) => {
            let raw = read_event(&args.event)?;
            let reply = replay(&config, &args, raw).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Commands::Graph => {
            let app = skill::build(config.engine.clone(), Arc::new(skill::demo_views()?))?;
            for edge in app.machine().declared_edges() {
                println!("{} --{}--> {}", edge.from, edge.intent, edge.to);
            }
        }
    }
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_env("PARLEY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_event(path: &Path) -> anyhow::Result<Value> {
    let raw = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading request from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading request from {}", path.display()))?
    };
    serde_json::from_str(&raw).context("request is not valid JSON")
}

async fn replay(config: &ParleyConfig, args: &ReplayArgs, raw: Value) -> anyhow::Result<Value> {
    let views_path = args.views.as_deref().or(config.views.path.as_deref());
    let renderer: Arc<dyn Renderer> = match views_path {
        Some(path) => Arc::new(JsonViews::from_file(path)?),
        None => Arc::new(skill::demo_views()?),
    };

    let store: Arc<dyn UserStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else {
        let db_path = &config.storage.path;
        ensure_parent_dir(db_path);
        info!(path = %db_path, "opening user store");
        Arc::new(SqliteStore::open(db_path)?)
    };

    let mut app = skill::build(config.engine.clone(), renderer)?;
    auto_load(&mut app, AutoLoadConfig::new(store).save_on_reply(true))?;

    let mut registry = PlatformRegistry::new(Arc::new(app));
    registry
        .register(Box::new(AlexaPlatform::new()))
        .register(Box::new(DialogFlowPlatform::new()));

    Ok(registry.dispatch(&args.platform, raw).await?)
}

/// Create the parent directory of `path` if it does not exist yet.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "could not create store directory");
            }
        }
    }
}
