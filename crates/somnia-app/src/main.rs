//! Somnia application binary - composition root.
//!
//! 1. Parse CLI arguments, install tracing, then load configuration from TOML
//! 2. Open the SQLite conversation store
//! 3. Build the LLM client, chat orchestrator, and analytics aggregator
//! 4. Serve the REST API

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

use somnia_api::AppState;
use somnia_chat::HttpLlmClient;
use somnia_core::config::SomniaConfig;
use somnia_storage::Database;

use cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Log level to switch to once the config file is read. `RUST_LOG` and
/// `--log-level` pin the startup filter, so the config only applies without them.
fn config_log_level(rust_log_set: bool, cli_level: Option<&str>, config_level: &str) -> Option<String> {
    if rust_log_set || cli_level.is_some() {
        None
    } else {
        Some(config_level.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let cli_level = args.resolve_log_level();

    // Tracing.
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    let startup_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_level.as_deref().unwrap_or("info")));
    let (filter, filter_handle) = reload::Layer::new(startup_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Somnia v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = match SomniaConfig::load_if_present(&config_file) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = cli_level.clone() {
        config.general.log_level = level;
    }
    config.general.port = args.resolve_port(config.general.port);
    config.llm.api_key = cli::resolve_api_key(config.llm.api_key.take());

    if let Some(level) = config_log_level(rust_log_set, cli_level.as_deref(), &config.general.log_level) {
        if let Err(e) = filter_handle.reload(EnvFilter::new(&level)) {
            tracing::warn!(level = %level, error = %e, "Failed to apply configured log level");
        }
    }
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("somnia.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // LLM.
    if config.llm.api_key.is_none() {
        tracing::warn!("No LLM API key configured; every chat turn will receive the fallback reply");
    }
    let llm = Arc::new(HttpLlmClient::new(&config.llm)?);
    tracing::info!(model = %config.llm.model, endpoint = %config.llm.endpoint, "LLM client ready");

    // === API server ===

    let state = AppState::new(config.clone(), db, llm);
    somnia_api::start_server(&config, state).await?;

    Ok(())
}
