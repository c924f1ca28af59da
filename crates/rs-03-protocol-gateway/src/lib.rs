//! # Protocol Gateway (rs-03)
//!
//! Per-connection state machine for the remote-storage WebSocket protocol.
//!
//! ```text
//!  client ──ws──► ProtocolGateway (axum router, optional rustls)
//!                   │
//!                   ▼
//!             ConnectionHandler
//!   CONNECTING → AUTHENTICATING → AUTHENTICATED → CLOSED
//!                   │                  │
//!        IdentityProvider      SessionRegistry check
//!     (validate_token)                 │
//!                                      ▼
//!                               StorageEngine
//! ```
//!
//! ## Frames
//!
//! - Request: `{id, op: "put"|"get"|"delete", key, value?}` or `{type: "keepalive", timestamp}`
//! - Success: `{id, result}`
//! - Failure: `{id, error, errorName}` with `errorName` one of
//!   `SecurityError`, `DataError`, `SyntaxError`, `UnknownError`
//! - Keepalive: `{type: "keepalive_response", timestamp, server_time}`
//!
//! Every request with an id gets exactly one reply. Requests without an id and
//! JSON values that are not objects get none.

pub mod domain;
pub mod metrics;
pub mod service;
pub mod tls;
pub mod ws;

pub use domain::config::GatewayConfig;
pub use domain::error::{ErrorName, GatewayError, ProtocolError};
pub use domain::frames::ResponseFrame;
pub use metrics::GatewayMetrics;
pub use service::{GatewayContext, ProtocolGateway};
pub use tls::{load_tls, PlaintextReason, TlsMode, TlsSettings};
pub use ws::handler::{ConnectionHandler, ConnectionState, FrameOutcome};
