//! # Domain Errors
//!
//! Error types for the Storage Engine.
//!
//! Every variant is a locally recoverable outcome: callers turn it into a
//! response, never into a crash.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The connection string could not be parsed.
    #[error("invalid database url: {0}")]
    InvalidUrl(String),

    /// Pool creation, query execution or connection acquisition failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema bootstrap failed.
    #[error("schema initialization failed: {0}")]
    Schema(String),

    /// The engine was closed.
    #[error("storage engine closed")]
    Closed,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
