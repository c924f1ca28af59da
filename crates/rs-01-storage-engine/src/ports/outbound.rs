//! # Outbound Ports (Driven Ports)

use crate::domain::entities::OperationLogEntry;
use crate::domain::errors::StorageResult;
use async_trait::async_trait;

/// Destination of operation log entries.
///
/// Production: `SqliteAuditSink` (adapters/sqlite.rs)
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Append one entry.
    async fn append(&self, entry: &OperationLogEntry) -> StorageResult<()>;
}
