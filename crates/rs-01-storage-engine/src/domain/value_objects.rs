//! # Value Objects

use std::path::Path;
use std::time::Duration;

/// Default upper bound on physical connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default audit queue depth before entries are dropped.
pub const DEFAULT_AUDIT_QUEUE_CAPACITY: usize = 1024;

/// Storage Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// sqlx connection string, e.g. `sqlite://data/remote-storage.db?mode=rwc`.
    pub database_url: String,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// Hard cap on concurrent physical connections.
    pub max_connections: u32,
    /// How long an operation waits for a free connection.
    pub acquire_timeout: Duration,
    /// Pending audit entries tolerated before new ones are dropped.
    pub audit_queue_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://remote-storage.db?mode=rwc".to_string(),
            min_connections: 1,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(10),
            audit_queue_capacity: DEFAULT_AUDIT_QUEUE_CAPACITY,
        }
    }
}

impl StorageConfig {
    /// Configuration for a SQLite database file at `path`.
    pub fn sqlite_file(path: &Path) -> Self {
        Self {
            database_url: format!("sqlite://{}?mode=rwc", path.display()),
            ..Self::default()
        }
    }
}
