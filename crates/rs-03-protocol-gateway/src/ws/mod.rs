//! WebSocket connection handling.

pub mod connection;
pub mod handler;

pub use connection::run_connection;
pub use handler::{ConnectionHandler, ConnectionState, FrameOutcome};
