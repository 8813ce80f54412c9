//! # Wikiflow: Workflow & Notification Engine
//!
//! Serves `/trigger-workflow` and `/send-notification` for the wiki's
//! trusted backend, plus admin endpoints for rules, tasks, and inboxes.
//!
//! Usage:
//!   wikiflow                          # Start with ~/.wikiflow/config.toml
//!   wikiflow --config ./wikiflow.toml # Explicit config file
//!   wikiflow --port 8080 -v           # Override port, debug logging
//!   wikiflow --init-config            # Write a default config file and exit

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wikiflow_core::WikiflowConfig;

#[derive(Parser)]
#[command(
    name = "wikiflow",
    version,
    about = "⚡ Wikiflow: workflow & notification trigger engine"
)]
struct Cli {
    /// Config file (default: $WIKIFLOW_CONFIG or ~/.wikiflow/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override gateway port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override bind address
    #[arg(long)]
    host: Option<String>,

    /// Override database path
    #[arg(long)]
    db_path: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Write a default config to the config path and exit
    #[arg(long)]
    init_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "wikiflow=debug,wikiflow_gateway=debug,wikiflow_workflows=debug,tower_http=debug"
    } else {
        "wikiflow=info,wikiflow_gateway=info,wikiflow_workflows=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("WIKIFLOW_CONFIG").ok().map(PathBuf::from));

    // --init-config: write defaults and exit
    if cli.init_config {
        let path = config_path.unwrap_or_else(WikiflowConfig::default_path);
        if path.exists() {
            println!("⚠️  Config '{}' already exists, leaving it untouched.", path.display());
        } else {
            WikiflowConfig::default().save_to(&path)?;
            println!("✅ Default config written to {}", path.display());
        }
        return Ok(());
    }

    let mut config = match &config_path {
        Some(path) => WikiflowConfig::load_from(path)?,
        None => WikiflowConfig::load()?,
    };
    config.apply_env();

    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(host) = cli.host {
        config.gateway.host = host;
    }
    if let Some(db_path) = cli.db_path {
        config.database.path = db_path;
    }
    config.database.path = expand_path(&config.database.path);

    tracing::info!("⚡ Wikiflow v{}", env!("CARGO_PKG_VERSION"));
    wikiflow_gateway::start(&config).await
}
