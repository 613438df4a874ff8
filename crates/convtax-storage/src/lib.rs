//! ConversationalTax storage crate - SQLite persistence.
//!
//! Provides a WAL-mode SQLite database with migrations and repositories for
//! users, employment contracts, the conversation history and notifications.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{
    ContractRepository, HistoryRepository, NewHistoryEntry, NotificationRepository, UserRepository,
};
