//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `AuthenticatedSession`
//! - **Storage**: `StorageOperation`, audit value markers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A token that the upstream identity service has resolved to a user.
///
/// Held in the session registry keyed by `token`. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthenticatedSession {
    /// Opaque bearer credential presented by the client.
    pub token: String,
    /// Username the identity service reported for the token.
    pub username: String,
}

impl AuthenticatedSession {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
        }
    }
}

/// Shortened form of a token, safe to write to logs.
pub fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    if token.chars().count() > 4 {
        format!("{}…", prefix)
    } else {
        prefix
    }
}

// =============================================================================
// CLUSTER B: STORAGE
// =============================================================================

/// Audit value recorded for a read or delete that found nothing.
pub const AUDIT_NOT_FOUND: &str = "NOT_FOUND";

/// Audit value recorded for a delete that removed a record.
pub const AUDIT_DELETED: &str = "DELETED";

/// Audit value recorded when the backing store rejected the operation.
pub const AUDIT_ERROR: &str = "ERROR";

/// A storage operation a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageOperation {
    Get,
    Put,
    Delete,
}

impl StorageOperation {
    /// Name used on the wire (`op` field).
    pub fn as_wire(&self) -> &'static str {
        match self {
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::Delete => "delete",
        }
    }

    /// Name written to the operation log.
    pub fn audit_label(&self) -> &'static str {
        match self {
            StorageOperation::Get => "GET",
            StorageOperation::Put => "PUT",
            StorageOperation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// The `op` field named something other than put/get/delete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for StorageOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(StorageOperation::Get),
            "put" => Ok(StorageOperation::Put),
            "delete" => Ok(StorageOperation::Delete),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}
