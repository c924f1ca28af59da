//! Table bootstrap.
//!
//! - `user_storage` - current value per `(username, storage_key)`
//! - `operation_logs` - append-only audit trail, read by `(username, created_at)`

/// Statements run in order by `SqlStorageEngine::initialize`. All idempotent.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS user_storage (
        username    TEXT NOT NULL,
        storage_key TEXT NOT NULL,
        value       TEXT,
        updated_at  TEXT NOT NULL,
        PRIMARY KEY (username, storage_key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_user_storage_key ON user_storage (storage_key)",
    r#"
    CREATE TABLE IF NOT EXISTS operation_logs (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        username    TEXT,
        operation   TEXT,
        storage_key TEXT,
        value       TEXT,
        created_at  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_operation_logs_username_created ON operation_logs (username, created_at)",
];

/// Tables that must exist after bootstrap.
pub const REQUIRED_TABLES: &[&str] = &["user_storage", "operation_logs"];
