//! # Inbound Ports (Driving Ports)
//!
//! The primary API of the Storage Engine.

use crate::domain::errors::StorageResult;
use async_trait::async_trait;

/// Per-user key-value storage.
///
/// All operations are scoped to `(username, storage_key)`. Each call enqueues
/// exactly one operation log entry, whatever its outcome.
///
/// The key is taken as the client sent it. A `None` key matches no record, so
/// `get` misses and `delete` removes nothing, while `put` is refused by the
/// store's NOT NULL constraint.
///
/// An `Err` is the "failed" outcome of the operation: the backing-store fault
/// has already been logged where it happened and is safe to surface as a
/// generic failure.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Current value for the key, or `None` if absent.
    async fn get(&self, username: &str, storage_key: Option<&str>) -> StorageResult<Option<String>>;

    /// Insert or replace the value for the key.
    async fn put(&self, username: &str, storage_key: Option<&str>, value: &str) -> StorageResult<()>;

    /// Remove the key. Removing an absent key succeeds.
    ///
    /// Returns whether a record was removed.
    async fn delete(&self, username: &str, storage_key: Option<&str>) -> StorageResult<bool>;

    /// Lightweight liveness probe. Not used on the request path.
    async fn health_check(&self) -> bool;
}
