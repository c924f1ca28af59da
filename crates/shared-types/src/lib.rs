//! # Shared Types Crate
//!
//! Vocabulary shared by the storage engine, the identity client and the
//! protocol gateway.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-subsystem types live here and nowhere else.
//! - **Identity is resolved once**: an [`AuthenticatedSession`] binds a token to a
//!   username; subsystems never re-derive the username from the token.

pub mod entities;
pub mod time;

pub use entities::*;
pub use time::{SystemTimeSource, TimeSource};
