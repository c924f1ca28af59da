//! Identity client configuration.

use std::time::Duration;

/// Tokens shorter than this are rejected without a lookup.
pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 5;

/// Settings for talking to the external identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Login endpoint (form POST of `username` and `password`).
    pub auth_url: String,
    /// User-info endpoint; token lookups add `?token=`.
    pub uinfo_url: String,
    /// Service account used for the shared session.
    pub username: String,
    pub password: String,
    /// Timeout for the login POST.
    pub login_timeout: Duration,
    /// Timeout for verification and token lookups.
    pub lookup_timeout: Duration,
    pub min_token_length: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            auth_url: String::new(),
            uinfo_url: String::new(),
            username: String::new(),
            password: String::new(),
            login_timeout: Duration::from_secs(10),
            lookup_timeout: Duration::from_secs(5),
            min_token_length: DEFAULT_MIN_TOKEN_LENGTH,
        }
    }
}

// Manual Debug so the service password never reaches a log line.
impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("auth_url", &self.auth_url)
            .field("uinfo_url", &self.uinfo_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("login_timeout", &self.login_timeout)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("min_token_length", &self.min_token_length)
            .finish()
    }
}
