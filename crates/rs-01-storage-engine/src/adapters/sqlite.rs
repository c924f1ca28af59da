//! SQLite adapter for the Storage Engine.
//!
//! Reads and writes share one bounded sqlx pool, so concurrent connections'
//! operations proceed in parallel at the storage layer. WAL journaling plus a
//! busy timeout keeps concurrent writers from failing with "database is locked".

use crate::adapters::audit::AuditLog;
use crate::adapters::schema::{REQUIRED_TABLES, SCHEMA_STATEMENTS};
use crate::domain::entities::OperationLogEntry;
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::value_objects::StorageConfig;
use crate::ports::inbound::StorageEngine;
use crate::ports::outbound::AuditSink;
use async_trait::async_trait;
use chrono::Utc;
use shared_types::{StorageOperation, AUDIT_DELETED, AUDIT_ERROR, AUDIT_NOT_FOUND};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

/// Storage Engine backed by a SQLite connection pool.
pub struct SqlStorageEngine {
    pool: SqlitePool,
    audit: AuditLog,
}

impl SqlStorageEngine {
    /// Open the pool and start the audit writer.
    ///
    /// Does not create tables; call [`initialize`](Self::initialize) next.
    pub async fn connect(config: StorageConfig) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        info!(
            min_connections = config.min_connections,
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        let audit = AuditLog::spawn(
            SqliteAuditSink::new(pool.clone()),
            config.audit_queue_capacity,
        );

        Ok(Self { pool, audit })
    }

    /// Create tables and indexes if missing, then confirm they exist.
    pub async fn initialize(&self) -> StorageResult<()> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Schema(e.to_string()))?;
        }

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        for required in REQUIRED_TABLES {
            if !tables.iter().any(|t| t == required) {
                return Err(StorageError::Schema(format!("missing table {}", required)));
            }
        }

        info!(tables = ?tables, "Database initialized");
        Ok(())
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Audit writer handle.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Drain the audit queue, then close every pooled connection.
    pub async fn close(&self) {
        self.audit.close().await;
        self.pool.close().await;
        info!("Database connection pool closed");
    }

    fn audit_entry(
        &self,
        username: &str,
        operation: StorageOperation,
        storage_key: Option<&str>,
        value: &str,
    ) {
        self.audit.record(OperationLogEntry::now(
            username,
            operation,
            storage_key,
            value,
        ));
    }

    /// Refuse work once [`close`](Self::close) has run.
    fn check_open(
        &self,
        username: &str,
        operation: StorageOperation,
        storage_key: Option<&str>,
    ) -> StorageResult<()> {
        if self.pool.is_closed() {
            debug!(username, operation = %operation, "Operation on closed engine");
            self.audit_entry(username, operation, storage_key, AUDIT_ERROR);
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageEngine for SqlStorageEngine {
    async fn get(&self, username: &str, storage_key: Option<&str>) -> StorageResult<Option<String>> {
        self.check_open(username, StorageOperation::Get, storage_key)?;
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT value FROM user_storage WHERE username = ? AND storage_key = ?",
        )
        .bind(username)
        .bind(storage_key)
        .fetch_optional(&self.pool)
        .await;

        match row.map(Option::flatten) {
            Ok(Some(value)) => {
                debug!(username, storage_key, "Retrieved data");
                self.audit_entry(username, StorageOperation::Get, storage_key, &value);
                Ok(Some(value))
            }
            Ok(None) => {
                debug!(username, storage_key, "No data found");
                self.audit_entry(username, StorageOperation::Get, storage_key, AUDIT_NOT_FOUND);
                Ok(None)
            }
            Err(e) => {
                error!(username, storage_key, error = %e, "Get failed");
                self.audit_entry(username, StorageOperation::Get, storage_key, AUDIT_ERROR);
                Err(e.into())
            }
        }
    }

    async fn put(&self, username: &str, storage_key: Option<&str>, value: &str) -> StorageResult<()> {
        self.check_open(username, StorageOperation::Put, storage_key)?;
        let result = sqlx::query(
            "INSERT INTO user_storage (username, storage_key, value, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT (username, storage_key) \
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(username)
        .bind(storage_key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(username, storage_key, "Saved data");
                self.audit_entry(username, StorageOperation::Put, storage_key, value);
                Ok(())
            }
            Err(e) => {
                error!(username, storage_key, error = %e, "Put failed");
                self.audit_entry(username, StorageOperation::Put, storage_key, AUDIT_ERROR);
                Err(e.into())
            }
        }
    }

    async fn delete(&self, username: &str, storage_key: Option<&str>) -> StorageResult<bool> {
        self.check_open(username, StorageOperation::Delete, storage_key)?;
        let result = sqlx::query("DELETE FROM user_storage WHERE username = ? AND storage_key = ?")
            .bind(username)
            .bind(storage_key)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                debug!(username, storage_key, "Deleted data");
                self.audit_entry(username, StorageOperation::Delete, storage_key, AUDIT_DELETED);
                Ok(true)
            }
            Ok(_) => {
                debug!(username, storage_key, "No data to delete");
                self.audit_entry(username, StorageOperation::Delete, storage_key, AUDIT_NOT_FOUND);
                Ok(false)
            }
            Err(e) => {
                error!(username, storage_key, error = %e, "Delete failed");
                self.audit_entry(username, StorageOperation::Delete, storage_key, AUDIT_ERROR);
                Err(e.into())
            }
        }
    }

    async fn health_check(&self) -> bool {
        match sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
        {
            Ok(1) => true,
            Ok(other) => {
                error!(result = other, "Health check returned unexpected value");
                false
            }
            Err(e) => {
                error!(error = %e, "Health check query failed");
                false
            }
        }
    }
}

/// Writes operation log entries into `operation_logs`.
pub struct SqliteAuditSink {
    pool: SqlitePool,
}

impl SqliteAuditSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn append(&self, entry: &OperationLogEntry) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO operation_logs (username, operation, storage_key, value, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.username)
        .bind(entry.operation.audit_label())
        .bind(&entry.storage_key)
        .bind(entry.value.as_deref())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine() -> (tempfile::TempDir, SqlStorageEngine) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::sqlite_file(&dir.path().join("store.db"));
        let engine = SqlStorageEngine::connect(config).await.unwrap();
        engine.initialize().await.unwrap();
        (dir, engine)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (_dir, engine) = engine().await;
        engine.initialize().await.unwrap();
        assert!(engine.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_fails_after_close() {
        let (_dir, engine) = engine().await;
        engine.close().await;
        assert!(!engine.health_check().await);
    }

    #[tokio::test]
    async fn test_operations_fail_cleanly_after_close() {
        let (_dir, engine) = engine().await;
        engine.close().await;

        assert!(matches!(
            engine.get("alice", Some("k")).await,
            Err(StorageError::Closed)
        ));
        assert!(matches!(
            engine.put("alice", Some("k"), "1").await,
            Err(StorageError::Closed)
        ));
        assert!(matches!(
            engine.delete("alice", Some("k")).await,
            Err(StorageError::Closed)
        ));
    }
}
