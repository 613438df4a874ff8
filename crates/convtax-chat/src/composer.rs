//! Response composition and history logging.

use std::sync::Arc;

use tracing::{debug, info, warn};

use convtax_core::config::HistoryConfig;
use convtax_core::types::{ConversationHistoryEntry, Platform, NOT_SPECIFIED};
use convtax_nlu::{encode_audio, AudioSettings, DetectIntentResponse, IntentDetector};
use convtax_storage::{Database, HistoryRepository, NewHistoryEntry};

use crate::dispatcher::Dispatcher;
use crate::error::ChatError;

/// Sends user input to the intent detector, dispatches the recognized
/// intent and records the exchange.
pub struct ResponseComposer {
    detector: Arc<dyn IntentDetector>,
    dispatcher: Dispatcher,
    history: HistoryRepository,
    log_empty_queries: bool,
}

impl ResponseComposer {
    pub fn new(
        detector: Arc<dyn IntentDetector>,
        dispatcher: Dispatcher,
        db: Arc<Database>,
        history: &HistoryConfig,
    ) -> Self {
        Self {
            detector,
            dispatcher,
            history: HistoryRepository::new(db),
            log_empty_queries: history.log_empty_queries,
        }
    }

    /// Answer a typed message.
    pub async fn respond_to_text(&self, user_id: &str, text: &str) -> Result<String, ChatError> {
        debug!(user_id = %user_id, detector = self.detector.name(), "Detecting text intent");
        let response = self.detector.detect_text_intent(text, user_id).await?;
        self.compose(user_id, &response)
    }

    /// Answer a recorded utterance from the given platform.
    pub async fn respond_to_audio(
        &self,
        user_id: &str,
        platform: Platform,
        audio: &[u8],
    ) -> Result<String, ChatError> {
        let settings = AudioSettings::for_platform(platform);
        debug!(
            user_id = %user_id,
            platform = %platform,
            bytes = audio.len(),
            "Detecting audio intent"
        );
        let response = self
            .detector
            .detect_audio_intent(settings, &encode_audio(audio), user_id)
            .await?;
        self.compose(user_id, &response)
    }

    /// Pick the reply for a detect-intent response and log the exchange.
    ///
    /// An empty recognized query short-circuits with an empty reply. Dispatch
    /// failures are logged with the agent's text before they propagate.
    pub fn compose(
        &self,
        user_id: &str,
        response: &DetectIntentResponse,
    ) -> Result<String, ChatError> {
        if response.query_text().is_empty() {
            debug!(user_id = %user_id, "Nothing recognized");
            if self.log_empty_queries {
                self.record(user_id, response, "")?;
            }
            return Ok(String::new());
        }

        let dispatched = match response.intent_name() {
            Some(intent) => self.dispatcher.dispatch(user_id, intent, response),
            None => Ok(None),
        };

        match dispatched {
            Ok(override_text) => {
                let text = override_text.unwrap_or_else(|| response.fulfillment_text().to_string());
                self.record(user_id, response, &text)?;
                Ok(text)
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Dispatch failed");
                self.record(user_id, response, response.fulfillment_text())?;
                Err(e)
            }
        }
    }

    fn record(
        &self,
        user_id: &str,
        response: &DetectIntentResponse,
        response_text: &str,
    ) -> Result<ConversationHistoryEntry, ChatError> {
        let or_placeholder =
            |value: Option<&str>| value.unwrap_or(NOT_SPECIFIED).to_string();
        let query_text = Some(response.query_text()).filter(|q| !q.is_empty());

        let entry = self.history.append(NewHistoryEntry {
            user_id: user_id.to_string(),
            parameters: response
                .parameters()
                .map(|p| p.to_json_string())
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            query_text: or_placeholder(query_text),
            response_text: response_text.to_string(),
            intent_name: or_placeholder(response.intent_name()),
            intent_display_name: or_placeholder(response.intent_display_name()),
            action_name: or_placeholder(response.action()),
        })?;
        info!(
            user_id = %user_id,
            entry_id = %entry.id,
            intent = %entry.intent_name,
            "Logged exchange"
        );
        Ok(entry)
    }
}
