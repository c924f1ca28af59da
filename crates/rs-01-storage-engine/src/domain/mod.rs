//! # Domain Layer
//!
//! Pure types for the Storage Engine. No I/O lives here.

pub mod entities;
pub mod errors;
pub mod value_objects;
