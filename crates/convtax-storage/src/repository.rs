//! Repository implementations for SQLite-backed persistence.
//!
//! Provides UserRepository, ContractRepository, HistoryRepository and
//! NotificationRepository that operate on the Database struct using raw SQL.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use convtax_core::error::ConvTaxError;
use convtax_core::types::{
    ConversationHistoryEntry, EmploymentContract, EndDate, Notification, User,
};

use crate::db::Database;

const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Users
// =============================================================================

/// Repository for chatbot users.
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether a user with this id exists.
    pub fn exists(&self, user_id: &str) -> Result<bool, ConvTaxError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM users WHERE id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;
            Ok(count > 0)
        })
    }

    /// Create a user. Fails if the id is already taken.
    pub fn create(&self, user_id: &str) -> Result<User, ConvTaxError> {
        let user = User {
            id: user_id.to_string(),
            created_at: Utc::now(),
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, created_at) VALUES (?1, ?2)",
                rusqlite::params![user.id, user.created_at.timestamp()],
            )
            .map_err(|e| ConvTaxError::Storage(format!("Failed to create user: {}", e)))?;
            Ok(())
        })?;
        tracing::debug!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Create the user unless it exists. Returns whether a row was inserted.
    ///
    /// Check and insert are one statement, so concurrent first requests of a
    /// new user cannot collide.
    pub fn ensure(&self, user_id: &str) -> Result<bool, ConvTaxError> {
        let inserted = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, created_at) VALUES (?1, ?2)",
                rusqlite::params![user_id, Utc::now().timestamp()],
            )
            .map_err(|e| ConvTaxError::Storage(format!("Failed to ensure user: {}", e)))
        })?;
        Ok(inserted > 0)
    }

    /// Find a user by id.
    pub fn find_by_id(&self, user_id: &str) -> Result<Option<User>, ConvTaxError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, created_at FROM users WHERE id = ?1",
                rusqlite::params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        created_at: epoch_to_utc(row.get(1)?),
                    })
                },
            )
            .optional()
            .map_err(|e| ConvTaxError::Storage(e.to_string()))
        })
    }
}

// =============================================================================
// Employment contracts
// =============================================================================

/// Repository for employment contracts.
///
/// Edit operations return `false` when no contract has the given id.
pub struct ContractRepository {
    db: Arc<Database>,
}

impl ContractRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create an empty contract for an existing user.
    pub fn create(&self, user_id: &str) -> Result<EmploymentContract, ConvTaxError> {
        let contract = EmploymentContract::new(user_id);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO employment_contracts (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    contract.id,
                    contract.user_id,
                    contract.created_at.timestamp(),
                ],
            )
            .map_err(|e| ConvTaxError::Storage(format!("Failed to create contract: {}", e)))?;
            Ok(())
        })?;
        tracing::debug!(contract_id = %contract.id, user_id = %user_id, "Contract created");
        Ok(contract)
    }

    /// Find a contract by id.
    pub fn find_by_id(&self, id: &str) -> Result<Option<EmploymentContract>, ConvTaxError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, start_date_exact, start_date_string,
                            end_date_exact, end_date_string, created_at
                     FROM employment_contracts WHERE id = ?1",
                )
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id], |row| Ok(row_to_contract(row)))
                .optional()
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            match result {
                Some(contract) => Ok(Some(contract?)),
                None => Ok(None),
            }
        })
    }

    /// All contracts of a user, oldest first.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<EmploymentContract>, ConvTaxError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, start_date_exact, start_date_string,
                            end_date_exact, end_date_string, created_at
                     FROM employment_contracts
                     WHERE user_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| Ok(row_to_contract(row)))
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            let mut contracts = Vec::new();
            for row in rows {
                let contract = row.map_err(|e| ConvTaxError::Storage(e.to_string()))??;
                contracts.push(contract);
            }
            Ok(contracts)
        })
    }

    pub fn edit_start_date_exact(&self, id: &str, date: NaiveDate) -> Result<bool, ConvTaxError> {
        self.update(
            "UPDATE employment_contracts SET start_date_exact = ?2 WHERE id = ?1",
            id,
            Some(date.format(DATE_FORMAT).to_string()),
        )
    }

    pub fn edit_start_date_string(&self, id: &str, text: &str) -> Result<bool, ConvTaxError> {
        self.update(
            "UPDATE employment_contracts SET start_date_string = ?2 WHERE id = ?1",
            id,
            Some(text.to_string()),
        )
    }

    pub fn delete_start_date_exact(&self, id: &str) -> Result<bool, ConvTaxError> {
        self.update(
            "UPDATE employment_contracts SET start_date_exact = ?2 WHERE id = ?1",
            id,
            None,
        )
    }

    pub fn delete_start_date_string(&self, id: &str) -> Result<bool, ConvTaxError> {
        self.update(
            "UPDATE employment_contracts SET start_date_string = ?2 WHERE id = ?1",
            id,
            None,
        )
    }

    /// Set the exact start date and clear the phrase in one statement.
    pub fn replace_start_date_exact(&self, id: &str, date: NaiveDate) -> Result<bool, ConvTaxError> {
        self.update(
            "UPDATE employment_contracts SET start_date_exact = ?2, start_date_string = NULL WHERE id = ?1",
            id,
            Some(date.format(DATE_FORMAT).to_string()),
        )
    }

    /// Set the start date phrase and clear the exact date in one statement.
    pub fn replace_start_date_string(&self, id: &str, text: &str) -> Result<bool, ConvTaxError> {
        self.update(
            "UPDATE employment_contracts SET start_date_string = ?2, start_date_exact = NULL WHERE id = ?1",
            id,
            Some(text.to_string()),
        )
    }

    /// Set a textual end date such as [`EndDate::UNLIMITED`], replacing any exact one.
    pub fn edit_end_date_string(&self, id: &str, text: &str) -> Result<bool, ConvTaxError> {
        self.update(
            "UPDATE employment_contracts SET end_date_string = ?2, end_date_exact = NULL WHERE id = ?1",
            id,
            Some(text.to_string()),
        )
    }

    /// Set an exact end date, replacing any textual one.
    pub fn edit_end_date_exact(&self, id: &str, date: NaiveDate) -> Result<bool, ConvTaxError> {
        self.update(
            "UPDATE employment_contracts SET end_date_exact = ?2, end_date_string = NULL WHERE id = ?1",
            id,
            Some(date.format(DATE_FORMAT).to_string()),
        )
    }

    /// Run an update keyed by contract id. SQLite counts matched rows even when the
    /// value is unchanged, so repeating an edit still reports `true`.
    fn update(&self, sql: &str, id: &str, value: Option<String>) -> Result<bool, ConvTaxError> {
        let changed = self.db.with_conn(|conn| {
            conn.execute(sql, rusqlite::params![id, value])
                .map_err(|e| ConvTaxError::Storage(format!("Failed to update contract: {}", e)))
        })?;
        Ok(changed > 0)
    }
}

// =============================================================================
// Conversation history
// =============================================================================

/// Fields of a history entry before it is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub user_id: String,
    pub parameters: String,
    pub query_text: String,
    pub response_text: String,
    pub intent_name: String,
    pub intent_display_name: String,
    pub action_name: String,
}

/// Append-only repository for conversation history entries.
pub struct HistoryRepository {
    db: Arc<Database>,
}

impl HistoryRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append an entry and return the stored record.
    pub fn append(&self, entry: NewHistoryEntry) -> Result<ConversationHistoryEntry, ConvTaxError> {
        let stored = ConversationHistoryEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            timestamp: Utc::now(),
            parameters: entry.parameters,
            query_text: entry.query_text,
            response_text: entry.response_text,
            intent_name: entry.intent_name,
            intent_display_name: entry.intent_display_name,
            action_name: entry.action_name,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_history
                    (id, user_id, timestamp, parameters, query_text, response_text,
                     intent_name, intent_display_name, action_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    stored.id.to_string(),
                    stored.user_id,
                    stored.timestamp.timestamp(),
                    stored.parameters,
                    stored.query_text,
                    stored.response_text,
                    stored.intent_name,
                    stored.intent_display_name,
                    stored.action_name,
                ],
            )
            .map_err(|e| ConvTaxError::Storage(format!("Failed to append history: {}", e)))?;
            Ok(())
        })?;

        Ok(stored)
    }

    /// Most recent entry of a user whose intent is not in `excluded_intents`.
    pub fn latest_excluding(
        &self,
        user_id: &str,
        excluded_intents: &[String],
    ) -> Result<Option<ConversationHistoryEntry>, ConvTaxError> {
        let excluded = serde_json::to_string(excluded_intents)?;
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, timestamp, parameters, query_text, response_text,
                            intent_name, intent_display_name, action_name
                     FROM conversation_history
                     WHERE user_id = ?1
                       AND intent_name NOT IN (SELECT value FROM json_each(?2))
                     ORDER BY seq DESC
                     LIMIT 1",
                )
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![user_id, excluded], |row| {
                    Ok(row_to_history(row))
                })
                .optional()
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            match result {
                Some(entry) => Ok(Some(entry?)),
                None => Ok(None),
            }
        })
    }

    /// Entries of a user, most recent first.
    pub fn recent(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<ConversationHistoryEntry>, ConvTaxError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, timestamp, parameters, query_text, response_text,
                            intent_name, intent_display_name, action_name
                     FROM conversation_history
                     WHERE user_id = ?1
                     ORDER BY seq DESC
                     LIMIT ?2",
                )
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok(row_to_history(row))
                })
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            let mut entries = Vec::new();
            for row in rows {
                let entry = row.map_err(|e| ConvTaxError::Storage(e.to_string()))??;
                entries.push(entry);
            }
            Ok(entries)
        })
    }

    /// Number of entries logged for a user.
    pub fn count_for_user(&self, user_id: &str) -> Result<u64, ConvTaxError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM conversation_history WHERE user_id = ?1",
                    rusqlite::params![user_id],
                    |row| row.get(0),
                )
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// Repository for user notifications.
pub struct NotificationRepository {
    db: Arc<Database>,
}

impl NotificationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a notification, creating the user if needed.
    pub fn create(
        &self,
        user_id: &str,
        title: &str,
        description: &str,
    ) -> Result<Notification, ConvTaxError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.db.with_conn(|conn| {
            let created_at = notification.created_at.timestamp();
            conn.execute(
                "INSERT OR IGNORE INTO users (id, created_at) VALUES (?1, ?2)",
                rusqlite::params![notification.user_id, created_at],
            )
            .map_err(|e| ConvTaxError::Storage(format!("Failed to ensure user: {}", e)))?;
            conn.execute(
                "INSERT INTO notifications (id, user_id, title, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    notification.id.to_string(),
                    notification.user_id,
                    notification.title,
                    notification.description,
                    created_at,
                ],
            )
            .map_err(|e| ConvTaxError::Storage(format!("Failed to create notification: {}", e)))?;
            Ok(())
        })?;
        tracing::debug!(notification_id = %notification.id, user_id = %user_id, "Notification created");
        Ok(notification)
    }

    /// Notifications of a user, most recent first.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Notification>, ConvTaxError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, description, created_at
                     FROM notifications
                     WHERE user_id = ?1
                     ORDER BY seq DESC",
                )
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id], |row| Ok(row_to_notification(row)))
                .map_err(|e| ConvTaxError::Storage(e.to_string()))?;

            let mut notifications = Vec::new();
            for row in rows {
                notifications.push(row.map_err(|e| ConvTaxError::Storage(e.to_string()))??);
            }
            Ok(notifications)
        })
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn parse_stored_date(value: Option<String>) -> Result<Option<NaiveDate>, ConvTaxError> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| ConvTaxError::Storage(format!("Corrupt date '{}': {}", s, e)))
        })
        .transpose()
}

fn row_to_contract(row: &rusqlite::Row) -> Result<EmploymentContract, ConvTaxError> {
    let get_err = |e: rusqlite::Error| ConvTaxError::Storage(e.to_string());

    let end_exact = parse_stored_date(row.get(4).map_err(get_err)?)?;
    let end_string: Option<String> = row.get(5).map_err(get_err)?;
    let end_date = match (end_exact, end_string) {
        (Some(date), _) => Some(EndDate::Exact(date)),
        (None, Some(text)) => Some(EndDate::Text(text)),
        (None, None) => None,
    };

    Ok(EmploymentContract {
        id: row.get(0).map_err(get_err)?,
        user_id: row.get(1).map_err(get_err)?,
        start_date_exact: parse_stored_date(row.get(2).map_err(get_err)?)?,
        start_date_string: row.get(3).map_err(get_err)?,
        end_date,
        created_at: epoch_to_utc(row.get(6).map_err(get_err)?),
    })
}

fn row_to_history(row: &rusqlite::Row) -> Result<ConversationHistoryEntry, ConvTaxError> {
    let get_err = |e: rusqlite::Error| ConvTaxError::Storage(e.to_string());

    let id_str: String = row.get(0).map_err(get_err)?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| ConvTaxError::Storage(format!("Invalid UUID '{}': {}", id_str, e)))?;

    Ok(ConversationHistoryEntry {
        id,
        user_id: row.get(1).map_err(get_err)?,
        timestamp: epoch_to_utc(row.get(2).map_err(get_err)?),
        parameters: row.get(3).map_err(get_err)?,
        query_text: row.get(4).map_err(get_err)?,
        response_text: row.get(5).map_err(get_err)?,
        intent_name: row.get(6).map_err(get_err)?,
        intent_display_name: row.get(7).map_err(get_err)?,
        action_name: row.get(8).map_err(get_err)?,
    })
}

fn row_to_notification(row: &rusqlite::Row) -> Result<Notification, ConvTaxError> {
    let get_err = |e: rusqlite::Error| ConvTaxError::Storage(e.to_string());

    let id_str: String = row.get(0).map_err(get_err)?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| ConvTaxError::Storage(format!("Invalid UUID '{}': {}", id_str, e)))?;

    Ok(Notification {
        id,
        user_id: row.get(1).map_err(get_err)?,
        title: row.get(2).map_err(get_err)?,
        description: row.get(3).map_err(get_err)?,
        created_at: epoch_to_utc(row.get(4).map_err(get_err)?),
    })
}
