//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use convtax_chat::{Dispatcher, ExplanationCatalog, ResponseComposer};
use convtax_core::config::ConvTaxConfig;
use convtax_nlu::IntentDetector;
use convtax_storage::{Database, HistoryRepository, NotificationRepository};

/// Shared application state. Cloned per request; every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConvTaxConfig>,
    pub database: Arc<Database>,
    /// Detect, dispatch and log pipeline behind both intent endpoints.
    pub composer: Arc<ResponseComposer>,
    pub history: Arc<HistoryRepository>,
    pub notifications: Arc<NotificationRepository>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the conversation pipeline around a database and an intent detector.
    pub fn new(
        config: ConvTaxConfig,
        database: Database,
        detector: Arc<dyn IntentDetector>,
    ) -> Self {
        let database = Arc::new(database);
        let explanations = Arc::new(ExplanationCatalog::new(config.explanations.clone()));
        let dispatcher = Dispatcher::new(database.clone(), config.intents.clone(), explanations);
        let composer =
            ResponseComposer::new(detector, dispatcher, database.clone(), &config.history);

        Self {
            history: Arc::new(HistoryRepository::new(database.clone())),
            notifications: Arc::new(NotificationRepository::new(database.clone())),
            composer: Arc::new(composer),
            database,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
