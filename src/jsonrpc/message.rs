//! Core JSON-RPC 2.0 message types and the discriminator-based codec.
//!
//! Four concrete message shapes (`JsonRpcRequest`, `JsonRpcResponse`,
//! `JsonRpcErrorResponse`, `JsonRpcNotification`) are wrapped by the
//! [`JsonRpcMessage`] enum, which discriminates between them by field
//! presence when parsing an untyped [`serde_json::Value`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::JsonRpcError;

/// JSON-RPC 2.0 request identifier: a string or a number, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    pub fn new_number(id: i64) -> Self {
        Self::Number(id)
    }

    pub fn new_string(id: impl Into<String>) -> Self {
        Self::String(id.into())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

/// Monotonically increasing generator for outbound request IDs, one per
/// connection.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    next: std::sync::atomic::AtomicI64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self {
            next: std::sync::atomic::AtomicI64::new(1),
        }
    }

    pub fn next_id(&self) -> RequestId {
        let id = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        RequestId::Number(id)
    }
}

fn jsonrpc_field() -> String {
    "2.0".to_string()
}

/// A JSON-RPC 2.0 request: expects a reply, correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    #[serde(default = "jsonrpc_field")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: jsonrpc_field(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 success reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    #[serde(default = "jsonrpc_field")]
    pub jsonrpc: String,
    pub result: Value,
    pub id: RequestId,
}

impl JsonRpcResponse {
    pub fn new(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: jsonrpc_field(),
            result,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error reply. `id` is `None` only for parse errors that
/// occurred before a request ID could be determined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcErrorResponse {
    #[serde(default = "jsonrpc_field")]
    pub jsonrpc: String,
    pub error: JsonRpcError,
    pub id: Option<RequestId>,
}

impl JsonRpcErrorResponse {
    pub fn new(error: JsonRpcError, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: jsonrpc_field(),
            error,
            id,
        }
    }
}

/// A JSON-RPC 2.0 notification: fire-and-forget, never replied to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    #[serde(default = "jsonrpc_field")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_field(),
            method: method.into(),
            params,
        }
    }
}

/// A parsed, already-discriminated JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Error(JsonRpcErrorResponse),
    Notification(JsonRpcNotification),
}

/// Errors that can occur while parsing an inbound JSON-RPC payload.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MessageParseError {
    #[error("malformed JSON: {0}")]
    Json(String),
    #[error("missing or invalid \"jsonrpc\":\"2.0\" field")]
    MissingVersion,
    #[error("message has neither a recognizable request, response, error, nor notification shape")]
    UnrecognizedShape,
}

impl From<serde_json::Error> for MessageParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl JsonRpcMessage {
    /// Parse a raw JSON payload, discriminating by field presence:
    /// method+id → Request, method only → Notification, id+error → Error,
    /// id+result → Response.
    pub fn parse(raw: &str) -> Result<Self, MessageParseError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, MessageParseError> {
        let obj = value.as_object().ok_or(MessageParseError::UnrecognizedShape)?;

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            _ => return Err(MessageParseError::MissingVersion),
        }

        let has_method = obj.contains_key("method");
        let has_id = obj.contains_key("id");
        let has_error = obj.contains_key("error");
        let has_result = obj.contains_key("result");

        if has_method && has_id {
            let request: JsonRpcRequest = serde_json::from_value(value)?;
            Ok(Self::Request(request))
        } else if has_method {
            let notification: JsonRpcNotification = serde_json::from_value(value)?;
            Ok(Self::Notification(notification))
        } else if has_id && has_error {
            let error: JsonRpcErrorResponse = serde_json::from_value(value)?;
            Ok(Self::Error(error))
        } else if has_id && has_result {
            let response: JsonRpcResponse = serde_json::from_value(value)?;
            Ok(Self::Response(response))
        } else {
            Err(MessageParseError::UnrecognizedShape)
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Request(r) => serde_json::to_value(r),
            Self::Response(r) => serde_json::to_value(r),
            Self::Error(r) => serde_json::to_value(r),
            Self::Notification(r) => serde_json::to_value(r),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Request(r) => serde_json::to_string(r),
            Self::Response(r) => serde_json::to_string(r),
            Self::Error(r) => serde_json::to_string(r),
            Self::Notification(r) => serde_json::to_string(r),
        }
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => Some(&r.id),
            Self::Error(r) => r.id.as_ref(),
            Self::Notification(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_request() {
        let req = JsonRpcRequest::new("ping", None, RequestId::new_number(1));
        let msg = JsonRpcMessage::Request(req.clone());
        let json = msg.to_json().unwrap();
        let parsed = JsonRpcMessage::parse(&json).unwrap();
        assert_eq!(parsed, JsonRpcMessage::Request(req));
    }

    #[test]
    fn round_trips_notification() {
        let note = JsonRpcNotification::new("notifications/cancelled", Some(json!({"requestId": 1})));
        let msg = JsonRpcMessage::Notification(note.clone());
        let json = msg.to_json().unwrap();
        let parsed = JsonRpcMessage::parse(&json).unwrap();
        assert_eq!(parsed, JsonRpcMessage::Notification(note));
    }

    #[test]
    fn round_trips_response() {
        let resp = JsonRpcResponse::new(json!({"ok": true}), RequestId::new_string("abc"));
        let msg = JsonRpcMessage::Response(resp.clone());
        let json = msg.to_json().unwrap();
        let parsed = JsonRpcMessage::parse(&json).unwrap();
        assert_eq!(parsed, JsonRpcMessage::Response(resp));
    }

    #[test]
    fn round_trips_error() {
        let err = JsonRpcErrorResponse::new(
            JsonRpcError::new(super::super::error::JsonRpcErrorCode::InternalError, "boom"),
            Some(RequestId::new_number(9)),
        );
        let msg = JsonRpcMessage::Error(err.clone());
        let json = msg.to_json().unwrap();
        let parsed = JsonRpcMessage::parse(&json).unwrap();
        assert_eq!(parsed, JsonRpcMessage::Error(err));
    }

    #[test]
    fn discriminates_by_field_presence() {
        assert!(matches!(
            JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap(),
            JsonRpcMessage::Request(_)
        ));
        assert!(matches!(
            JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap(),
            JsonRpcMessage::Notification(_)
        ));
        assert!(matches!(
            JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap(),
            JsonRpcMessage::Response(_)
        ));
        assert!(matches!(
            JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"nope"}}"#)
                .unwrap(),
            JsonRpcMessage::Error(_)
        ));
    }

    #[test]
    fn rejects_missing_jsonrpc_version() {
        let err = JsonRpcMessage::parse(r#"{"method":"ping","id":1}"#).unwrap_err();
        assert!(matches!(err, MessageParseError::MissingVersion));
    }

    #[test]
    fn rejects_unrecognized_shape() {
        let err = JsonRpcMessage::parse(r#"{"jsonrpc":"2.0"}"#).unwrap_err();
        assert!(matches!(err, MessageParseError::UnrecognizedShape));
    }
}
