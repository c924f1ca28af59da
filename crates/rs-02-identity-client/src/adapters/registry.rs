//! Connection Session Registry - token -> authenticated identity.
//!
//! Shared by every open connection. Populated only by successful token
//! lookups; a connection consults it before each storage operation and treats
//! a missing entry as an expired session. Nothing expires entries on a timer;
//! the registry is cleared wholesale at shutdown.

use dashmap::DashMap;
use shared_types::{token_prefix, AuthenticatedSession};
use std::collections::BTreeSet;
use tracing::debug;

/// Concurrent map of recognized tokens.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, AuthenticatedSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a validated token. A later validation of the same token replaces
    /// the entry.
    pub fn insert(&self, session: AuthenticatedSession) {
        debug!(
            token = %token_prefix(&session.token),
            username = %session.username,
            "Registered session"
        );
        self.sessions.insert(session.token.clone(), session);
    }

    pub fn contains(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    pub fn get(&self, token: &str) -> Option<AuthenticatedSession> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    /// Invalidate a token. Connections using it are refused on their next
    /// operation.
    pub fn remove(&self, token: &str) -> Option<AuthenticatedSession> {
        self.sessions.remove(token).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Distinct usernames currently holding at least one token.
    pub fn usernames(&self) -> BTreeSet<String> {
        self.sessions
            .iter()
            .map(|entry| entry.value().username.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }
}
