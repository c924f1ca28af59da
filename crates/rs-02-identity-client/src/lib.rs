//! # Upstream Identity Client (rs-02)
//!
//! Holds the one authenticated session this process keeps with the external
//! identity service and uses it to resolve client tokens to usernames.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Single Session | At most one upstream session exists; it is swapped whole, never mutated |
//! | 2 | Verified Login | A login counts only after a self-lookup through the new session succeeds |
//! | 3 | Cheap Rejection | Tokens shorter than `min_token_length` never reach the network |
//! | 4 | Bounded Retry | A session-invalid lookup triggers at most one re-login and one retry |
//! | 5 | Registry Population | Only a successful lookup inserts into the `SessionRegistry` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Configuration, wire replies, errors
//! - `ports/` - `IdentityProvider` (inbound)
//! - `adapters/` - reqwest upstream client, DashMap session registry
//! - `test_utils` - in-process fake identity service (feature `test-utils`)

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::registry::SessionRegistry;
pub use adapters::upstream::UpstreamIdentityClient;
pub use domain::config::IdentityConfig;
pub use domain::errors::{IdentityError, IdentityResult};
pub use domain::wire::{LookupOutcome, UpstreamReply};
pub use ports::inbound::IdentityProvider;
