//! Connection state machine.
//!
//! ```text
//! CONNECTING ──authenticate()──► AUTHENTICATING ──ok──► AUTHENTICATED ──► CLOSED
//!                                      │                      │
//!                                      └──── invalid token ───┴── session expired / close
//! ```
//!
//! The handler is transport-free: it turns one inbound frame into at most one
//! outbound frame, and the socket loop in `connection.rs` does the I/O. Nothing
//! is produced once the state is `Closed`.

use crate::domain::error::ProtocolError;
use crate::domain::frames::{
    describe_op, is_keepalive, request_id, storage_key, ResponseFrame,
};
use crate::service::GatewayContext;
use serde_json::{json, Map, Value};
use shared_types::{token_prefix, StorageOperation};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Authenticated { token: String, username: String },
    Closed,
}

/// What the socket loop should do after a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Send nothing.
    Silent,
    /// Send this frame and keep reading.
    Reply(ResponseFrame),
    /// Send this frame, then close the connection.
    ReplyAndClose(ResponseFrame),
}

/// Per-connection protocol handler.
pub struct ConnectionHandler {
    ctx: GatewayContext,
    connection_id: Uuid,
    state: ConnectionState,
}

impl ConnectionHandler {
    pub fn new(ctx: GatewayContext) -> Self {
        Self {
            ctx,
            connection_id: Uuid::new_v4(),
            state: ConnectionState::Connecting,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Username bound to this connection, once authenticated.
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Authenticated { username, .. } => Some(username),
            _ => None,
        }
    }

    /// Validate the token from the connection URL.
    ///
    /// A missing token is just an invalid token. On failure the returned frame
    /// is the only thing ever sent on this connection.
    pub async fn authenticate(&mut self, token: Option<&str>) -> FrameOutcome {
        if self.state != ConnectionState::Connecting {
            return FrameOutcome::Silent;
        }
        self.state = ConnectionState::Authenticating;

        let token = token.unwrap_or_default();
        match self.ctx.identity.validate_token(token).await {
            Some(username) => {
                info!(
                    connection_id = %self.connection_id,
                    username = %username,
                    "Connection authenticated"
                );
                self.state = ConnectionState::Authenticated {
                    token: token.to_string(),
                    username,
                };
                FrameOutcome::Silent
            }
            None => {
                warn!(
                    connection_id = %self.connection_id,
                    token = %token_prefix(token),
                    "Authentication failed"
                );
                self.ctx.metrics.record_auth_failure();
                self.state = ConnectionState::Closed;
                FrameOutcome::ReplyAndClose(ResponseFrame::error(
                    None,
                    ProtocolError::invalid_token(),
                ))
            }
        }
    }

    /// Handle a text message.
    pub async fn handle_text(&mut self, text: &str) -> FrameOutcome {
        let outcome = self.process(text).await;
        if matches!(outcome, FrameOutcome::ReplyAndClose(_)) {
            self.state = ConnectionState::Closed;
        }
        outcome
    }

    /// Handle a binary message. Payloads must be UTF-8 JSON text.
    pub async fn handle_binary(&mut self, data: Vec<u8>) -> FrameOutcome {
        match String::from_utf8(data) {
            Ok(text) => self.handle_text(&text).await,
            Err(_) if self.is_authenticated() => {
                debug!(connection_id = %self.connection_id, "Binary frame is not UTF-8");
                self.ctx.metrics.record_error();
                FrameOutcome::Reply(ResponseFrame::error(
                    Some(json!(0)),
                    ProtocolError::invalid_json(),
                ))
            }
            Err(_) => FrameOutcome::Silent,
        }
    }

    /// Mark the connection closed after a transport fault or client close.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(connection_id = %self.connection_id, "Connection closed");
            self.state = ConnectionState::Closed;
        }
    }

    fn is_authenticated(&self) -> bool {
        matches!(self.state, ConnectionState::Authenticated { .. })
    }

    async fn process(&self, text: &str) -> FrameOutcome {
        let ConnectionState::Authenticated { token, username } = &self.state else {
            debug!(
                connection_id = %self.connection_id,
                state = ?self.state,
                "Frame ignored outside authenticated state"
            );
            return FrameOutcome::Silent;
        };

        let frame: Value = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(connection_id = %self.connection_id, error = %e, "Unparseable frame");
                self.ctx.metrics.record_error();
                return FrameOutcome::Reply(ResponseFrame::error(
                    Some(json!(0)),
                    ProtocolError::invalid_json(),
                ));
            }
        };

        let Some(frame) = frame.as_object() else {
            debug!(connection_id = %self.connection_id, "Non-object frame dropped");
            self.ctx.metrics.record_dropped();
            return FrameOutcome::Silent;
        };

        if is_keepalive(frame) {
            self.ctx.metrics.record_keepalive();
            let timestamp = frame.get("timestamp").cloned().unwrap_or(Value::Null);
            return FrameOutcome::Reply(ResponseFrame::keepalive(
                timestamp,
                self.ctx.clock.now_millis(),
            ));
        }

        let Some(id) = request_id(frame) else {
            debug!(connection_id = %self.connection_id, "Request without id dropped");
            self.ctx.metrics.record_dropped();
            return FrameOutcome::Silent;
        };

        let op = match frame
            .get("op")
            .and_then(Value::as_str)
            .map(str::parse::<StorageOperation>)
        {
            Some(Ok(op)) => op,
            _ => {
                let op = describe_op(frame.get("op"));
                debug!(connection_id = %self.connection_id, op = %op, "Unknown operation");
                self.ctx.metrics.record_error();
                return FrameOutcome::Reply(ResponseFrame::error(
                    Some(id),
                    ProtocolError::data(format!("Unknown operation: {}", op)),
                ));
            }
        };

        if !self.ctx.registry.contains(token) {
            warn!(
                connection_id = %self.connection_id,
                token = %token_prefix(token),
                "Session no longer registered"
            );
            self.ctx.metrics.record_session_expired();
            return FrameOutcome::ReplyAndClose(ResponseFrame::error(
                Some(id),
                ProtocolError::session_expired(),
            ));
        }

        self.ctx.metrics.record_operation(op);
        match self.dispatch(op, username, frame).await {
            Ok(result) => FrameOutcome::Reply(ResponseFrame::success(id, result)),
            Err(err) => {
                self.ctx.metrics.record_error();
                FrameOutcome::Reply(ResponseFrame::error(Some(id), err))
            }
        }
    }

    async fn dispatch(
        &self,
        op: StorageOperation,
        username: &str,
        frame: &Map<String, Value>,
    ) -> Result<Value, ProtocolError> {
        // An absent key goes to storage as-is: it misses on get and delete and
        // is refused on put.
        let raw_key = frame.get("key").filter(|k| !k.is_null());
        let owned_key = raw_key.map(storage_key);
        let key = owned_key.as_deref();
        let storage = &self.ctx.storage;

        debug!(
            connection_id = %self.connection_id,
            username,
            op = %op,
            storage_key = ?key,
            "Dispatching operation"
        );

        match op {
            StorageOperation::Put => {
                let value = match frame.get("value") {
                    None | Some(Value::Null) => {
                        return Err(ProtocolError::data("No value provided for put"))
                    }
                    Some(value) => value,
                };
                storage
                    .put(username, key, &value.to_string())
                    .await
                    .map_err(|_| ProtocolError::unknown("Database write failed"))?;
                Ok(raw_key.cloned().unwrap_or(Value::Null))
            }
            StorageOperation::Get => match storage.get(username, key).await {
                Ok(Some(stored)) => serde_json::from_str(&stored).map_err(|e| {
                    warn!(
                        connection_id = %self.connection_id,
                        username,
                        storage_key = ?key,
                        error = %e,
                        "Stored value is not valid JSON"
                    );
                    ProtocolError::data("Data corruption")
                }),
                Ok(None) => Ok(Value::Null),
                Err(_) => Err(ProtocolError::unknown("Database read failed")),
            },
            StorageOperation::Delete => {
                storage
                    .delete(username, key)
                    .await
                    .map_err(|_| ProtocolError::unknown("Delete operation failed"))?;
                Ok(Value::Null)
            }
        }
    }
}
