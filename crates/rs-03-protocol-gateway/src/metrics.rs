//! Gateway counters.
//!
//! Plain atomics, read by `/health` and by tests.

use serde_json::json;
use shared_types::StorageOperation;
use std::sync::atomic::{AtomicU64, Ordering};

/// Gateway metrics
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    // Connection counters
    pub connections_opened: AtomicU64,
    pub connections_active: AtomicU64,
    pub auth_failures: AtomicU64,
    pub sessions_expired: AtomicU64,

    // Request counters
    pub requests_get: AtomicU64,
    pub requests_put: AtomicU64,
    pub requests_delete: AtomicU64,
    pub requests_error: AtomicU64,
    pub keepalives: AtomicU64,
    pub frames_dropped: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connect(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnect(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_expired(&self) {
        self.sessions_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operation(&self, op: StorageOperation) {
        let counter = match op {
            StorageOperation::Get => &self.requests_get,
            StorageOperation::Put => &self.requests_put,
            StorageOperation::Delete => &self.requests_delete,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.requests_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_keepalive(&self) {
        self.keepalives.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.connections_active.load(Ordering::Relaxed)
    }

    /// Export as JSON
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "connections": {
                "opened": self.connections_opened.load(Ordering::Relaxed),
                "active": self.connections_active.load(Ordering::Relaxed),
                "auth_failures": self.auth_failures.load(Ordering::Relaxed),
                "sessions_expired": self.sessions_expired.load(Ordering::Relaxed),
            },
            "requests": {
                "get": self.requests_get.load(Ordering::Relaxed),
                "put": self.requests_put.load(Ordering::Relaxed),
                "delete": self.requests_delete.load(Ordering::Relaxed),
                "errors": self.requests_error.load(Ordering::Relaxed),
                "keepalives": self.keepalives.load(Ordering::Relaxed),
                "dropped": self.frames_dropped.load(Ordering::Relaxed),
            }
        })
    }
}
