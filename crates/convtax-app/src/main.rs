//! ConversationalTax server binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize logging
//! 3. Open the SQLite database
//! 4. Build the Dialogflow client
//! 5. Serve the axum REST API

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use convtax_api::state::AppState;
use convtax_core::config::ConvTaxConfig;
use convtax_nlu::DialogflowClient;
use convtax_storage::Database;

use crate::cli::CliArgs;

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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first, the log level may come from it.
    let config_file = args.resolve_config_path();
    let mut config = ConvTaxConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting ConversationalTax v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("convtax.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Intent detection. CONVTAX_NLU_TOKEN keeps the token out of the config file.
    let mut detector = DialogflowClient::new(&config.nlu)?;
    match std::env::var("CONVTAX_NLU_TOKEN") {
        Ok(token) if !token.is_empty() => detector = detector.with_access_token(token),
        _ if config.nlu.access_token.is_empty() => {
            tracing::warn!("No NLU access token configured; detectIntent calls will be rejected")
        }
        _ => {}
    }
    tracing::info!(
        endpoint = %config.nlu.endpoint,
        project = %config.nlu.project_id,
        "Dialogflow client ready"
    );

    let state = AppState::new(config.clone(), db, Arc::new(detector));
    convtax_api::start_server(&config, state).await?;

    Ok(())
}
