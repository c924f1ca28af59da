//! Identity client errors.
//!
//! These never cross the `IdentityProvider` boundary: callers only see
//! `Option<String>` / `bool`. They exist so failures are logged with a reason.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("identity service replied {0:?}")]
    Rejected(Option<String>),

    #[error("response carried no username")]
    MissingUsername,
}

pub type IdentityResult<T> = Result<T, IdentityError>;
