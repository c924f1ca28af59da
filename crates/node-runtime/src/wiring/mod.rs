//! # Subsystem Wiring Module
//!
//! Background work that ties subsystems together after startup.
//!
//! ```text
//!   MaintenanceScheduler
//!     ├── session refresh ──► IdentityProvider::refresh_session
//!     ├── registry sweep  ──► SessionRegistry (report only)
//!     └── health check    ──► StorageEngine::health_check
//! ```

pub mod maintenance;

pub use maintenance::{MaintenanceScheduler, MaintenanceStats};
