//! CLI argument definitions for the ConversationalTax server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// ConversationalTax - chatbot backend for managing employment contracts.
#[derive(Parser, Debug)]
#[command(name = "convtax", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Directory holding the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Priority: --config flag > CONVTAX_CONFIG env var > ~/.convtax/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        resolve_config_path(self.config.clone(), std::env::var("CONVTAX_CONFIG").ok())
    }

    /// Priority: --port flag > CONVTAX_PORT env var > config file value > 3030.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        resolve_port(self.port, std::env::var("CONVTAX_PORT").ok(), config_port)
    }

    /// `None` unless --data-dir was given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// `None` unless --log-level was given.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn resolve_config_path(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

fn resolve_port(flag: Option<u16>, env: Option<String>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    if let Some(p) = env.and_then(|v| v.parse::<u16>().ok()) {
        return p;
    }
    if config_port != 0 {
        return config_port;
    }
    3030
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".convtax").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".convtax").join("config.toml");
    }
    PathBuf::from("config.toml")
}
