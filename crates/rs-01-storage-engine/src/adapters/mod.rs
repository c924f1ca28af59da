//! # Adapters
//!
//! - `sqlite` - sqlx SQLite pool implementing `StorageEngine` and `AuditSink`
//! - `schema` - table bootstrap
//! - `audit` - dedicated audit writer task

pub mod audit;
pub mod schema;
pub mod sqlite;
