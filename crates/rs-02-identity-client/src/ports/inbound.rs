//! # Inbound Ports (Driving Ports)
//!
//! What the protocol gateway and the maintenance scheduler need from identity.

use async_trait::async_trait;

/// Resolves client tokens through the shared upstream session.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Make sure a verified upstream session exists, logging in if needed.
    async fn ensure_session(&self) -> bool;

    /// Username for `token`, or `None` if it cannot be confirmed.
    ///
    /// A resolved token is also registered in the session registry.
    async fn validate_token(&self, token: &str) -> Option<String>;

    /// Replace the upstream session with a fresh login.
    async fn refresh_session(&self) -> bool;
}
