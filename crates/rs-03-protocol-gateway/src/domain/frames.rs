//! Wire frames.
//!
//! Requests are handled as raw JSON objects so that the exact values clients
//! send (ids, keys, timestamps) are echoed back untouched.

use crate::domain::error::{ErrorName, ProtocolError};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

/// `type` marker of a keepalive request.
pub const KEEPALIVE: &str = "keepalive";

/// `type` marker of a keepalive reply.
pub const KEEPALIVE_RESPONSE: &str = "keepalive_response";

/// A frame sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseFrame {
    Success {
        id: Value,
        result: Value,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        error: String,
        #[serde(rename = "errorName")]
        error_name: ErrorName,
    },
    Keepalive {
        #[serde(rename = "type")]
        kind: &'static str,
        timestamp: Value,
        server_time: u64,
    },
}

impl ResponseFrame {
    pub fn success(id: Value, result: Value) -> Self {
        ResponseFrame::Success { id, result }
    }

    /// Error reply. `id` is `None` only for the pre-authentication frame.
    pub fn error(id: Option<Value>, err: ProtocolError) -> Self {
        ResponseFrame::Error {
            id,
            error: err.message,
            error_name: err.name,
        }
    }

    pub fn keepalive(timestamp: Value, server_time: u64) -> Self {
        ResponseFrame::Keepalive {
            kind: KEEPALIVE_RESPONSE,
            timestamp,
            server_time,
        }
    }

    /// Serialize for a text message.
    pub fn to_text(&self) -> String {
        match serde_json::to_string(self) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Failed to serialize response frame");
                r#"{"error":"Internal error","errorName":"UnknownError"}"#.to_string()
            }
        }
    }
}

/// The request id, if the frame carries a usable one.
///
/// Missing, `null`, `false`, zero, and empty strings, arrays or objects all
/// count as no id.
pub fn request_id(frame: &Map<String, Value>) -> Option<Value> {
    let id = frame.get("id")?;
    let present = match id {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    };
    present.then(|| id.clone())
}

/// True for `{"type": "keepalive", ...}`.
pub fn is_keepalive(frame: &Map<String, Value>) -> bool {
    frame.get("type").and_then(Value::as_str) == Some(KEEPALIVE)
}

/// Storage key as a string: strings verbatim, anything else as compact JSON.
pub fn storage_key(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How an `op` value is rendered in "Unknown operation" messages.
pub fn describe_op(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}
