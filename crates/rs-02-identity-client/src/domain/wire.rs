//! Replies from the identity service.
//!
//! Success and failure are both signalled by the `message` field; an HTTP 200
//! on its own means nothing.

use crate::domain::errors::IdentityError;
use serde::Deserialize;

/// Login accepted.
pub const AUTH_SUCCESS: &str = "auth_success";
/// User-info lookup resolved.
pub const USER_INFO_SUCCESS: &str = "user_info_success";
/// The shared session is no longer authenticated.
pub const AUTHENTICATION_FAILED: &str = "authentication_failed";
/// Also reported when the shared session has lapsed.
pub const USER_NOT_FOUND: &str = "user_not_found";

/// Body of every identity service reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl UpstreamReply {
    pub fn parse(body: &str) -> Result<Self, IdentityError> {
        serde_json::from_str(body).map_err(|e| IdentityError::Parse(e.to_string()))
    }

    pub fn has_message(&self, marker: &str) -> bool {
        self.message.as_deref() == Some(marker)
    }

    /// `data.user.username`, if present and a string.
    pub fn username(&self) -> Option<&str> {
        self.data
            .as_ref()?
            .pointer("/user/username")?
            .as_str()
    }

    /// True when the reply says our session, not the token, is the problem.
    pub fn signals_session_invalid(&self) -> bool {
        self.has_message(AUTHENTICATION_FAILED) || self.has_message(USER_NOT_FOUND)
    }
}

/// Result of one token lookup through the current session.
#[derive(Debug)]
pub enum LookupOutcome {
    /// The token belongs to this user.
    Resolved(String),
    /// The shared session must be replaced before retrying.
    SessionInvalid,
    /// Anything else: bad token, timeout, malformed reply.
    Failed(IdentityError),
}
