//! # Ports Layer
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving port (API used by the protocol gateway and scheduler)
//! - `outbound.rs` - Driven port (where audit entries end up)

pub mod inbound;
pub mod outbound;
