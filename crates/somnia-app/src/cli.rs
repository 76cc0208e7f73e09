//! CLI argument definitions for the Somnia server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Somnia - sleep-science chat and analytics server.
#[derive(Parser, Debug)]
#[command(name = "somnia", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SOMNIA_CONFIG env var > ~/.somnia/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        resolve_config_path(self.config.clone(), std::env::var("SOMNIA_CONFIG").ok())
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > SOMNIA_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        resolve_port(self.port, std::env::var("SOMNIA_PORT").ok(), config_port)
    }

    /// Data directory override from --data-dir, if any.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level override from --log-level, if any.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// LLM API key from SOMNIA_LLM_API_KEY, falling back to the config value.
pub fn resolve_api_key(config_key: Option<String>) -> Option<String> {
    pick_api_key(std::env::var("SOMNIA_LLM_API_KEY").ok(), config_key)
}

fn resolve_config_path(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

fn resolve_port(flag: Option<u16>, env: Option<String>, config_port: u16) -> u16 {
    flag.or_else(|| env.and_then(|v| v.parse::<u16>().ok()))
        .unwrap_or(config_port)
}

fn pick_api_key(env: Option<String>, config_key: Option<String>) -> Option<String> {
    env.filter(|k| !k.trim().is_empty()).or(config_key)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".somnia").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".somnia").join("config.toml");
    }
    PathBuf::from("config.toml")
}
