//! Screen models rendered by the UI layer.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use convtax_core::types::{ConversationHistoryEntry, Notification};

use crate::error::ClientError;
use crate::navigation::{NavigationContext, Route};
use crate::rest::RestConnection;

/// Landing screen with the single "Los geht's" button.
#[derive(Debug, Default, Clone, Copy)]
pub struct StartScreen;

impl StartScreen {
    pub const BUTTON_LABEL: &'static str = "Los geht's";

    /// Button pressed: open the conversation.
    pub fn begin(&self, nav: &mut NavigationContext) {
        nav.navigate(Route::Conversation, HashMap::new());
    }
}

/// Where the history screen loads its entries from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn conversation_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationHistoryEntry>, ClientError>;
}

#[async_trait]
impl HistorySource for RestConnection {
    async fn conversation_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationHistoryEntry>, ClientError> {
        RestConnection::conversation_history(self, user_id).await
    }
}

/// The "Verlauf" screen: the user's past exchanges, most recent first.
#[derive(Debug, Default, Clone)]
pub struct HistoryScreen {
    entries: Vec<ConversationHistoryEntry>,
    loaded: bool,
}

impl HistoryScreen {
    pub const TITLE: &'static str = "Verlauf";

    pub fn new() -> Self {
        Self::default()
    }

    /// Load the history when the screen is mounted. On failure the list
    /// stays empty and the error is returned for display.
    pub async fn mount<S: HistorySource + ?Sized>(
        &mut self,
        source: &S,
        user_id: &str,
    ) -> Result<(), ClientError> {
        match source.conversation_history(user_id).await {
            Ok(entries) => {
                self.entries = entries;
                self.loaded = true;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load conversation history");
                self.entries.clear();
                self.loaded = false;
                Err(e)
            }
        }
    }

    pub fn entries(&self) -> &[ConversationHistoryEntry] {
        &self.entries
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Where the notifications screen loads its entries from.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>, ClientError>;
}

#[async_trait]
impl NotificationSource for RestConnection {
    async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>, ClientError> {
        RestConnection::notifications(self, user_id).await
    }
}

/// The "Benachrichtigungen" screen.
#[derive(Debug, Default, Clone)]
pub struct NotificationsScreen {
    notifications: Vec<Notification>,
    loaded: bool,
}

impl NotificationsScreen {
    pub const TITLE: &'static str = "Benachrichtigungen";
    /// Shown instead of the list when the user has no notifications.
    pub const EMPTY_TEXT: &'static str = "Keine Benachrichtigungen";

    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mount<S: NotificationSource + ?Sized>(
        &mut self,
        source: &S,
        user_id: &str,
    ) -> Result<(), ClientError> {
        match source.notifications(user_id).await {
            Ok(notifications) => {
                self.notifications = notifications;
                self.loaded = true;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load notifications");
                self.notifications.clear();
                self.loaded = false;
                Err(e)
            }
        }
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Whether the empty-state text replaces the list.
    pub fn shows_empty_text(&self) -> bool {
        self.loaded && self.notifications.is_empty()
    }
}
