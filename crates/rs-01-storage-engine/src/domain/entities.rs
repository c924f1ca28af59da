//! # Domain Entities

use chrono::{DateTime, Utc};
use shared_types::StorageOperation;

/// One row of the append-only operation log.
///
/// Write-only from the service's point of view: the trail exists for external
/// inspection and is never read back on the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLogEntry {
    pub username: String,
    pub operation: StorageOperation,
    /// `None` when the request carried no key.
    pub storage_key: Option<String>,
    /// Stored value on a hit or a write, otherwise a status marker.
    pub value: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OperationLogEntry {
    /// Build an entry stamped with the current time.
    pub fn now(
        username: &str,
        operation: StorageOperation,
        storage_key: Option<&str>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            username: username.to_string(),
            operation,
            storage_key: storage_key.map(str::to_string),
            value: Some(value.into()),
            created_at: Utc::now(),
        }
    }
}
