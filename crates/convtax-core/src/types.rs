use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConvTaxError;

/// Placeholder stored in history entries for fields the NLU did not supply.
pub const NOT_SPECIFIED: &str = "Not specified";

// =============================================================================
// Enums
// =============================================================================

/// Client platform that produced an audio upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ConvTaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(ConvTaxError::Api(format!("Unknown platform '{}'", other))),
        }
    }
}

/// End of an employment contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EndDate {
    /// A concrete last day.
    Exact(NaiveDate),
    /// A textual marker such as [`EndDate::UNLIMITED`].
    Text(String),
}

impl EndDate {
    /// Literal stored for open-ended contracts.
    pub const UNLIMITED: &'static str = "unbefristet";

    pub fn unlimited() -> Self {
        EndDate::Text(Self::UNLIMITED.to_string())
    }
}

impl fmt::Display for EndDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndDate::Exact(date) => write!(f, "{}", date.format("%d.%m.%Y")),
            EndDate::Text(text) => f.write_str(text),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A chatbot user, identified by the id the client sends as `u_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// An employment contract owned by a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmploymentContract {
    pub id: String,
    pub user_id: String,
    /// Exact first day, mutually exclusive with `start_date_string`.
    pub start_date_exact: Option<NaiveDate>,
    /// Free-text start such as "Anfang Mai".
    pub start_date_string: Option<String>,
    pub end_date: Option<EndDate>,
    pub created_at: DateTime<Utc>,
}

impl EmploymentContract {
    /// Create a contract with no dates set yet.
    pub fn new(user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            start_date_exact: None,
            start_date_string: None,
            end_date: None,
            created_at: Utc::now(),
        }
    }

    /// One-line German summary used when listing contracts.
    pub fn describe(&self) -> String {
        let start = match (&self.start_date_exact, &self.start_date_string) {
            (Some(date), _) => date.format("%d.%m.%Y").to_string(),
            (None, Some(text)) => text.clone(),
            (None, None) => "nicht angegeben".to_string(),
        };
        let end = self
            .end_date
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "nicht angegeben".to_string());
        format!("Vertrag {}: Beginn {}, Ende {}", self.id, start, end)
    }
}

/// Append-only log record of one user-facing exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistoryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    /// Recognized parameters as raw JSON text.
    pub parameters: String,
    pub query_text: String,
    pub response_text: String,
    pub intent_name: String,
    pub intent_display_name: String,
    pub action_name: String,
}

/// A message shown to a user on the notifications screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Parse a date value as delivered by the NLU: RFC 3339 timestamp or `YYYY-MM-DD`.
pub fn parse_exact_date(value: &str) -> Result<NaiveDate, ConvTaxError> {
    let trimmed = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.date_naive());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| ConvTaxError::InvalidDate(trimmed.to_string()))
}
