//! # Subsystem Container
//!
//! Configuration plus the container that owns every subsystem instance.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NodeConfig};
pub use subsystems::SubsystemContainer;
