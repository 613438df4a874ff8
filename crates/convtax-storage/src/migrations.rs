//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use convtax_core::error::ConvTaxError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), ConvTaxError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ConvTaxError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ConvTaxError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    if current_version < 2 {
        apply_v2(conn)?;
        info!("Applied migration v2: notifications");
    }

    Ok(())
}

/// Version 1: users, contracts and conversation history.
fn apply_v1(conn: &Connection) -> Result<(), ConvTaxError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY NOT NULL,
            created_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS employment_contracts (
            id                  TEXT PRIMARY KEY NOT NULL,
            user_id             TEXT NOT NULL,
            start_date_exact    TEXT,
            start_date_string   TEXT,
            end_date_exact      TEXT,
            end_date_string     TEXT,
            created_at          INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_contracts_user
            ON employment_contracts (user_id, created_at ASC);

        -- seq orders entries written within the same second.
        CREATE TABLE IF NOT EXISTS conversation_history (
            seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
            id                  TEXT NOT NULL UNIQUE,
            user_id             TEXT NOT NULL,
            timestamp           INTEGER NOT NULL,
            parameters          TEXT NOT NULL,
            query_text          TEXT NOT NULL,
            response_text       TEXT NOT NULL,
            intent_name         TEXT NOT NULL,
            intent_display_name TEXT NOT NULL,
            action_name         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_user
            ON conversation_history (user_id, seq DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| ConvTaxError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

/// Version 2: per-user notifications.
fn apply_v2(conn: &Connection) -> Result<(), ConvTaxError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS notifications (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            user_id         TEXT NOT NULL,
            title           TEXT NOT NULL,
            description     TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications (user_id, seq DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (2, 'notifications');
        ",
    )
    .map_err(|e| ConvTaxError::Storage(format!("Failed to apply migration v2: {}", e)))?;

    Ok(())
}
