use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConvTaxError, Result};

const INTENT_PREFIX: &str = "projects/test-c7ec0/agent/intents/";

/// Top-level configuration for ConversationalTax.
///
/// Loaded from `~/.convtax/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvTaxConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub nlu: NluConfig,
    #[serde(default)]
    pub intents: IntentConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub explanations: ExplanationConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl ConvTaxConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ConvTaxConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConvTaxError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Address the API server binds to. Mobile clients on the LAN need `0.0.0.0`.
    pub host: String,
    /// HTTP port of the API server.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.convtax/data".to_string(),
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

/// Connection settings for the Dialogflow detect-intent API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    /// Base URL of the Dialogflow REST API.
    pub endpoint: String,
    /// Google Cloud project that owns the agent.
    pub project_id: String,
    /// Language code sent with every query.
    pub language_code: String,
    /// OAuth bearer token. Overridden by `CONVTAX_NLU_TOKEN`.
    pub access_token: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://dialogflow.googleapis.com".to_string(),
            project_id: "test-c7ec0".to_string(),
            language_code: "de".to_string(),
            access_token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Fully qualified intent names the dispatcher reacts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub create_contract: String,
    pub set_start_date: String,
    pub set_end_date_unlimited: String,
    pub help: String,
    pub context: String,
    pub list_contracts: String,
    pub fallback: String,
}

impl Default for IntentConfig {
    fn default() -> Self {
        let name = |id: &str| format!("{}{}", INTENT_PREFIX, id);
        Self {
            create_contract: name("ae4cd4c7-67ea-41e3-b064-79b0a75505c5"),
            set_start_date: name("99d07e41-0833-4e50-991e-5f49ba4e9bc4"),
            set_end_date_unlimited: name("d1523cf3-bb4d-47cb-8fc4-bec3d669628e"),
            help: name("e695c10c-0a85-4ede-a899-67f264ff5275"),
            context: name("39611549-cad9-4152-9130-22ed7879e700"),
            list_contracts: name("list-employment-contracts"),
            fallback: name("default-fallback"),
        }
    }
}

impl IntentConfig {
    /// Intents that never serve as the subject of a help/context follow-up.
    pub fn meta_intents(&self) -> Vec<String> {
        vec![
            self.help.clone(),
            self.context.clone(),
            self.fallback.clone(),
        ]
    }
}

/// Conversation history behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Whether exchanges with an empty recognized query are still logged.
    pub log_empty_queries: bool,
    /// Default number of entries returned by the history endpoint.
    pub default_limit: u64,
    /// Upper bound for the history endpoint `limit` parameter.
    pub max_limit: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            log_empty_queries: true,
            default_limit: 50,
            max_limit: 200,
        }
    }
}

/// Texts used to answer help and context follow-ups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    /// Reply when there is nothing in the history to explain.
    pub no_history: String,
    /// Help reply when neither action nor intent has a dedicated text.
    pub default_help: String,
    /// Context reply when the intent has no dedicated text.
    pub default_context: String,
    /// Help texts keyed by action name. Checked before `help`.
    pub help_by_action: HashMap<String, String>,
    /// Help texts keyed by intent name.
    pub help: HashMap<String, String>,
    /// Context texts keyed by intent name.
    pub context: HashMap<String, String>,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        let intents = IntentConfig::default();

        let help = HashMap::from([
            (
                intents.create_contract.clone(),
                "Ich habe einen neuen Arbeitsvertrag für dich angelegt. Als Nächstes kannst du mir sagen, wann er beginnt.".to_string(),
            ),
            (
                intents.set_start_date.clone(),
                "Nenne mir das Datum, an dem dein Arbeitsvertrag beginnt, zum Beispiel \"ab dem 1. März\".".to_string(),
            ),
            (
                intents.set_end_date_unlimited.clone(),
                "Ein unbefristeter Vertrag hat kein festes Enddatum. Du kannst es später jederzeit ändern.".to_string(),
            ),
        ]);

        let context = HashMap::from([
            (
                intents.create_contract.clone(),
                "Für deine Steuererklärung brauche ich alle Arbeitsverträge, die du im Steuerjahr hattest.".to_string(),
            ),
            (
                intents.set_start_date.clone(),
                "Das Startdatum bestimmt, ab wann dein Einkommen aus diesem Vertrag berücksichtigt wird.".to_string(),
            ),
            (
                intents.set_end_date_unlimited.clone(),
                "Das Enddatum bestimmt, bis wann dein Einkommen aus diesem Vertrag berücksichtigt wird.".to_string(),
            ),
        ]);

        Self {
            no_history: "Es gibt noch nichts, wobei ich dir helfen könnte.".to_string(),
            default_help: "Du kannst mich bitten, einen Arbeitsvertrag anzulegen oder Start- und Enddatum eines Vertrags zu ändern.".to_string(),
            default_context: "Wir sprechen gerade über deine Arbeitsverträge.".to_string(),
            help_by_action: HashMap::new(),
            help,
            context,
        }
    }
}

/// Client-side push-to-talk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recordings shorter than this are kept running until the floor is reached.
    pub min_recording_ms: u64,
    /// Poll interval while a release waits for the recording to become active.
    pub release_retry_ms: u64,
    /// Base URL of the ConversationalTax server.
    pub server_url: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_recording_ms: 500,
            release_retry_ms: 20,
            server_url: "http://127.0.0.1:3030".to_string(),
        }
    }
}
