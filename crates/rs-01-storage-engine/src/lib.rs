//! # Storage Engine (rs-01)
//!
//! Durable per-user key-value store with an append-only operation log.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Composite Key | A record is addressed by `(username, storage_key)`; last write wins |
//! | 2 | One Audit Entry | Every get/put/delete enqueues exactly one operation log entry |
//! | 3 | Non-blocking Audit | Audit writes never delay or fail the primary operation |
//! | 4 | Contained Failures | Backing-store errors are logged and returned as values, never panics |
//! | 5 | Bounded Pool | Physical connections stay within `[min_connections, max_connections]` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Entities, configuration and errors
//! - `ports/` - `StorageEngine` (inbound) and `AuditSink` (outbound)
//! - `adapters/` - SQLite pool adapter, schema bootstrap, audit writer task
//!
//! ## Usage
//!
//! ```ignore
//! use rs_01_storage_engine::{SqlStorageEngine, StorageConfig, StorageEngine};
//!
//! let engine = SqlStorageEngine::connect(StorageConfig::default()).await?;
//! engine.initialize().await?;
//!
//! engine.put("alice", Some("slot-1"), r#"{"level":3}"#).await?;
//! let value = engine.get("alice", Some("slot-1")).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::audit::{AuditLog, AuditStats};
pub use adapters::sqlite::{SqlStorageEngine, SqliteAuditSink};
pub use domain::entities::OperationLogEntry;
pub use domain::errors::{StorageError, StorageResult};
pub use domain::value_objects::StorageConfig;
pub use ports::inbound::StorageEngine;
pub use ports::outbound::AuditSink;
