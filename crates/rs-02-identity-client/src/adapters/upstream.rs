//! reqwest adapter for the external identity service.
//!
//! One cookie-jar `Client` is the upstream session. It is published behind an
//! `Arc` and swapped whole on every login, so a lookup in flight keeps using
//! the session it started with while a re-login installs the next one.
//!
//! Logins are serialized by `login_lock`. Each session carries a generation
//! number; a caller that saw generation N rejected only logs in again if the
//! current session is still N, otherwise it reuses the newer one.

use crate::adapters::registry::SessionRegistry;
use crate::domain::config::IdentityConfig;
use crate::domain::errors::{IdentityError, IdentityResult};
use crate::domain::wire::{LookupOutcome, UpstreamReply, AUTH_SUCCESS, USER_INFO_SUCCESS};
use crate::ports::inbound::IdentityProvider;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Response, StatusCode};
use shared_types::{token_prefix, AuthenticatedSession};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct UpstreamSession {
    client: Client,
    generation: u64,
}

/// Identity client backed by a single shared upstream session.
pub struct UpstreamIdentityClient {
    config: IdentityConfig,
    registry: Arc<SessionRegistry>,
    session: RwLock<Option<Arc<UpstreamSession>>>,
    login_lock: Mutex<()>,
    generation: AtomicU64,
}

impl UpstreamIdentityClient {
    pub fn new(config: IdentityConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config,
            registry,
            session: RwLock::new(None),
            login_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn has_session(&self) -> bool {
        self.session.read().is_some()
    }

    /// Generation of the live session, if any.
    pub fn session_generation(&self) -> Option<u64> {
        self.session.read().as_ref().map(|s| s.generation)
    }

    /// Drop the upstream session. The next validation logs in again.
    pub fn close(&self) {
        if self.session.write().take().is_some() {
            info!("Upstream session closed");
        }
    }

    fn current(&self) -> Option<Arc<UpstreamSession>> {
        self.session.read().clone()
    }

    async fn session_or_login(&self) -> Option<Arc<UpstreamSession>> {
        if let Some(session) = self.current() {
            return Some(session);
        }

        let _guard = self.login_lock.lock().await;
        if let Some(session) = self.current() {
            return Some(session);
        }
        self.login_locked().await
    }

    async fn relogin_after(&self, stale_generation: u64) -> Option<Arc<UpstreamSession>> {
        let _guard = self.login_lock.lock().await;
        if let Some(session) = self.current() {
            if session.generation != stale_generation {
                debug!(
                    stale_generation,
                    generation = session.generation,
                    "Session already replaced, skipping re-login"
                );
                return Some(session);
            }
        }
        self.login_locked().await
    }

    /// Caller must hold `login_lock`.
    async fn login_locked(&self) -> Option<Arc<UpstreamSession>> {
        // A failed attempt must leave no session behind.
        self.session.write().take();

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            account = %self.config.username,
            generation,
            "Logging in to identity service"
        );

        match self.login().await {
            Ok((client, confirmed_user)) => {
                info!(user = %confirmed_user, generation, "Upstream session confirmed");
                let session = Arc::new(UpstreamSession { client, generation });
                *self.session.write() = Some(Arc::clone(&session));
                Some(session)
            }
            Err(e) => {
                warn!(generation, error = %e, "Failed to create upstream session");
                None
            }
        }
    }

    /// Log in, then look ourselves up through the same cookie jar.
    async fn login(&self) -> IdentityResult<(Client, String)> {
        let client = Client::builder().cookie_store(true).build()?;

        let response = client
            .post(&self.config.auth_url)
            .form(&[
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .timeout(self.config.login_timeout)
            .send()
            .await?;
        let reply = read_reply(response).await?;
        if !reply.has_message(AUTH_SUCCESS) {
            return Err(IdentityError::Rejected(reply.message));
        }

        let response = client
            .get(&self.config.uinfo_url)
            .timeout(self.config.lookup_timeout)
            .send()
            .await?;
        let reply = read_reply(response).await?;
        if !reply.has_message(USER_INFO_SUCCESS) {
            return Err(IdentityError::Rejected(reply.message));
        }
        let confirmed_user = reply
            .username()
            .ok_or(IdentityError::MissingUsername)?
            .to_string();

        Ok((client, confirmed_user))
    }

    async fn lookup(&self, session: &UpstreamSession, token: &str) -> LookupOutcome {
        let response = match session
            .client
            .get(&self.config.uinfo_url)
            .query(&[("token", token)])
            .timeout(self.config.lookup_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return LookupOutcome::Failed(e.into()),
        };

        if response.status() == StatusCode::UNAUTHORIZED {
            return LookupOutcome::SessionInvalid;
        }

        let reply = match read_reply(response).await {
            Ok(reply) => reply,
            Err(e) => return LookupOutcome::Failed(e),
        };

        if reply.has_message(USER_INFO_SUCCESS) {
            return match reply.username() {
                Some(username) => LookupOutcome::Resolved(username.to_string()),
                None => LookupOutcome::Failed(IdentityError::MissingUsername),
            };
        }
        if reply.signals_session_invalid() {
            return LookupOutcome::SessionInvalid;
        }
        LookupOutcome::Failed(IdentityError::Rejected(reply.message))
    }
}

async fn read_reply(response: Response) -> IdentityResult<UpstreamReply> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(IdentityError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    UpstreamReply::parse(&body)
}

#[async_trait]
impl IdentityProvider for UpstreamIdentityClient {
    async fn ensure_session(&self) -> bool {
        self.session_or_login().await.is_some()
    }

    async fn validate_token(&self, token: &str) -> Option<String> {
        let prefix = token_prefix(token);
        if token.chars().count() < self.config.min_token_length {
            debug!(token = %prefix, "Rejected token below minimum length");
            return None;
        }

        let mut session = self.session_or_login().await?;
        let mut relogin_used = false;

        // At most two lookups: the first and one retry after a re-login.
        loop {
            match self.lookup(&session, token).await {
                LookupOutcome::Resolved(username) => {
                    info!(token = %prefix, username = %username, "Token validated");
                    self.registry
                        .insert(AuthenticatedSession::new(token, username.as_str()));
                    return Some(username);
                }
                LookupOutcome::SessionInvalid if !relogin_used => {
                    relogin_used = true;
                    warn!(
                        token = %prefix,
                        generation = session.generation,
                        "Upstream session rejected, re-logging in"
                    );
                    session = self.relogin_after(session.generation).await?;
                }
                LookupOutcome::SessionInvalid => {
                    warn!(token = %prefix, "Upstream session rejected again after re-login");
                    return None;
                }
                LookupOutcome::Failed(e) => {
                    warn!(token = %prefix, error = %e, "Token lookup failed");
                    return None;
                }
            }
        }
    }

    async fn refresh_session(&self) -> bool {
        let _guard = self.login_lock.lock().await;
        self.login_locked().await.is_some()
    }
}
