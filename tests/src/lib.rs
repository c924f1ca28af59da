//! # Remote Storage Test Suite
//!
//! End-to-end tests that start a real node (SQLite store, fake identity
//! service) and talk to it over WebSocket and HTTP.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # TestNode + WebSocket client helpers
//! └── integration/
//!     ├── websocket_flows.rs   # protocol behaviour seen by clients
//!     └── node_lifecycle.rs    # startup, restart and shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p rs-tests
//! cargo test -p rs-tests integration::websocket_flows::
//! ```

#[cfg(test)]
mod harness;

pub mod integration;
