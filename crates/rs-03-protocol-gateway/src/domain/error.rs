//! Gateway error types.
//!
//! `ErrorName` is the client-visible error taxonomy carried in `errorName`.
//! `ProtocolError` pairs it with the message sent to the client, which never
//! includes internal error text. `GatewayError` covers server-level faults.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Client-visible error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorName {
    /// Authentication or session invalidity
    SecurityError,
    /// Malformed client input, unknown operation, corrupted stored payload
    DataError,
    /// Unparseable frame
    SyntaxError,
    /// Backing-store or other internal failure
    UnknownError,
}

impl ErrorName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorName::SecurityError => "SecurityError",
            ErrorName::DataError => "DataError",
            ErrorName::SyntaxError => "SyntaxError",
            ErrorName::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single request, as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct ProtocolError {
    pub name: ErrorName,
    pub message: String,
}

impl ProtocolError {
    pub fn new(name: ErrorName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::new(ErrorName::SecurityError, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorName::DataError, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorName::SyntaxError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorName::UnknownError, message)
    }

    pub fn invalid_token() -> Self {
        Self::security("Invalid or expired token")
    }

    pub fn session_expired() -> Self {
        Self::security("Session expired, please reload")
    }

    pub fn invalid_json() -> Self {
        Self::syntax("Invalid JSON")
    }
}

/// Server-level errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}
