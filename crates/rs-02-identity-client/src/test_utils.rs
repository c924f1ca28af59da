//! In-process fake of the external identity service.
//!
//! Issues `sid` cookies on login, resolves registered tokens on user-info
//! lookups, and exposes call counters plus switches for the failure modes the
//! client has to survive.

use crate::domain::config::IdentityConfig;
use axum::extract::{Form, Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Service account the fake accepts.
pub const SERVICE_USER: &str = "storage-service";
pub const SERVICE_PASSWORD: &str = "service-password";

#[derive(Default)]
struct FakeState {
    users: Mutex<HashMap<String, String>>,
    live_sessions: Mutex<HashSet<u64>>,
    next_sid: AtomicU64,
    lookup_delay: Mutex<Duration>,

    login_calls: AtomicU64,
    verify_calls: AtomicU64,
    lookup_calls: AtomicU64,

    reject_logins: AtomicBool,
    fail_verification: AtomicBool,
    reject_lookups: AtomicBool,
    unauthorized_status: AtomicBool,
}

/// Running fake identity service. Stops when dropped.
pub struct FakeUpstream {
    addr: SocketAddr,
    state: Arc<FakeState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeUpstream {
    /// Bind an ephemeral localhost port and start serving.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(FakeState::default());

        let app = Router::new()
            .route("/auth", post(login))
            .route("/uinfo", get(user_info))
            .with_state(Arc::clone(&state));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn auth_url(&self) -> String {
        format!("http://{}/auth", self.addr)
    }

    pub fn uinfo_url(&self) -> String {
        format!("http://{}/uinfo", self.addr)
    }

    /// Client configuration pointing at this fake with valid credentials.
    pub fn identity_config(&self) -> IdentityConfig {
        IdentityConfig {
            auth_url: self.auth_url(),
            uinfo_url: self.uinfo_url(),
            username: SERVICE_USER.to_string(),
            password: SERVICE_PASSWORD.to_string(),
            login_timeout: Duration::from_secs(2),
            lookup_timeout: Duration::from_secs(2),
            ..IdentityConfig::default()
        }
    }

    pub fn add_user(&self, token: &str, username: &str) {
        self.state
            .users
            .lock()
            .insert(token.to_string(), username.to_string());
    }

    pub fn remove_user(&self, token: &str) {
        self.state.users.lock().remove(token);
    }

    /// Invalidate every session cookie issued so far.
    pub fn expire_sessions(&self) {
        self.state.live_sessions.lock().clear();
    }

    /// Answer logins with a failure marker.
    pub fn set_reject_logins(&self, on: bool) {
        self.state.reject_logins.store(on, Ordering::SeqCst);
    }

    /// Accept logins but fail the self lookup that follows.
    pub fn set_fail_verification(&self, on: bool) {
        self.state.fail_verification.store(on, Ordering::SeqCst);
    }

    /// Report `authentication_failed` for every token lookup, even through a
    /// fresh session.
    pub fn set_reject_lookups(&self, on: bool) {
        self.state.reject_lookups.store(on, Ordering::SeqCst);
    }

    /// Signal an invalid session with HTTP 401 instead of a 200 marker.
    pub fn set_unauthorized_status(&self, on: bool) {
        self.state.unauthorized_status.store(on, Ordering::SeqCst);
    }

    pub fn set_lookup_delay(&self, delay: Duration) {
        *self.state.lookup_delay.lock() = delay;
    }

    pub fn login_calls(&self) -> u64 {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    /// Self lookups made right after a login.
    pub fn verify_calls(&self) -> u64 {
        self.state.verify_calls.load(Ordering::SeqCst)
    }

    /// Lookups that carried a `token` parameter.
    pub fn lookup_calls(&self) -> u64 {
        self.state.lookup_calls.load(Ordering::SeqCst)
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn login(
    State(state): State<Arc<FakeState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    let credentials_ok = form.get("username").map(String::as_str) == Some(SERVICE_USER)
        && form.get("password").map(String::as_str) == Some(SERVICE_PASSWORD);
    if !credentials_ok || state.reject_logins.load(Ordering::SeqCst) {
        return Json(json!({"message": "auth_failed"})).into_response();
    }

    let sid = state.next_sid.fetch_add(1, Ordering::SeqCst) + 1;
    state.live_sessions.lock().insert(sid);
    (
        [(SET_COOKIE, format!("sid={}; Path=/", sid))],
        Json(json!({"message": "auth_success"})),
    )
        .into_response()
}

async fn user_info(
    State(state): State<Arc<FakeState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let session_live = session_id(&headers)
        .map(|sid| state.live_sessions.lock().contains(&sid))
        .unwrap_or(false);

    let Some(token) = params.get("token") else {
        state.verify_calls.fetch_add(1, Ordering::SeqCst);
        if !session_live {
            return session_invalid(&state);
        }
        if state.fail_verification.load(Ordering::SeqCst) {
            return Json(json!({"message": "user_info_failed"})).into_response();
        }
        return user_found(SERVICE_USER);
    };

    state.lookup_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *state.lookup_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if !session_live || state.reject_lookups.load(Ordering::SeqCst) {
        return session_invalid(&state);
    }

    let username = state.users.lock().get(token).cloned();
    match username {
        Some(username) => user_found(&username),
        None => Json(json!({"message": "token_not_found"})).into_response(),
    }
}

fn session_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| pair.trim().strip_prefix("sid=")?.parse().ok())
}

fn user_found(username: &str) -> Response {
    Json(json!({
        "message": "user_info_success",
        "data": {"user": {"username": username}}
    }))
    .into_response()
}

fn session_invalid(state: &FakeState) -> Response {
    let body = Json(json!({"message": "authentication_failed"}));
    if state.unauthorized_status.load(Ordering::SeqCst) {
        (StatusCode::UNAUTHORIZED, body).into_response()
    } else {
        body.into_response()
    }
}
