//! Top-level error hierarchy for the protocol engine and MCP dispatch layer.
//!
//! Two tiers, matching the protocol/application split: [`EngineError`] and
//! [`McpError`] carry protocol-level failures (surfaced as JSON-RPC error
//! objects), while [`ToolError`] is what user tool/prompt/resource handlers
//! return and is always folded back into an in-band response envelope.

use thiserror::Error;

use crate::jsonrpc::RequestId;

/// Errors raised by the [`crate::engine::ProtocolEngine`].
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// The connection was closed (explicitly, or by a transport error)
    /// while a request was still pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// `connect()` was called on an engine that is already running.
    #[error("engine is already connected")]
    AlreadyConnected,

    /// An outbound request's timeout elapsed before a reply arrived.
    #[error("request {request_id} timed out")]
    Timeout { request_id: RequestId },

    /// An outbound request was cancelled before a reply arrived.
    #[error("request {request_id} was cancelled")]
    Cancelled { request_id: RequestId },

    /// `initialize` cannot be cancelled by the initiating side.
    #[error("initialize cannot be cancelled")]
    InitializeNotCancellable,

    /// No request handler is registered for the given method.
    #[error("method not found: {method}")]
    MethodNotFound { method: String },

    /// A reply arrived for a request ID with no matching pending slot.
    #[error("no pending request for id {request_id}")]
    UnknownRequestId { request_id: RequestId },

    /// The peer replied with a JSON-RPC error object instead of a result.
    #[error("request {request_id} failed: {message} (code {code})")]
    Remote {
        request_id: RequestId,
        code: i64,
        message: String,
    },
}

/// Public error type returned by the MCP dispatch layer's fallible APIs.
#[derive(Debug, Error)]
pub enum McpError {
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    /// A request's params didn't match the shape the method expects.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// A resource handler returned an error. Unlike tool/prompt failures
    /// this is not folded in-band (see `handler::resource`), so it
    /// surfaces as a protocol-level error.
    #[error("resource handler failed: {0}")]
    HandlerFailed(String),

    /// A registered handler's argument type failed schema derivation or
    /// validation (e.g. a prompt argument struct with a non-string field).
    #[error("invalid handler schema: {0}")]
    Schema(String),

    /// A prompt handler's argument struct has a field that isn't a string
    /// or optional string, rejected at registration time.
    #[error("invalid prompt arguments for '{name}': {reason}")]
    InvalidPromptArguments { name: String, reason: String },

    /// A `register_*` call used a name/URI already present in the registry.
    #[error("'{0}' is already registered")]
    AlreadyRegistered(String),

    /// `tools/call`, `prompts/get`, or `resources/read` named an entry
    /// that isn't registered. Always carries the actual requested name,
    /// never the method string.
    #[error("unknown {kind}: {name}")]
    NotFound { kind: &'static str, name: String },
}

impl McpError {
    /// The JSON-RPC error code this error should be reported under, used
    /// by the protocol engine when converting a handler's `Err` into a
    /// wire-level error reply.
    pub fn error_code(&self) -> crate::jsonrpc::JsonRpcErrorCode {
        use crate::jsonrpc::JsonRpcErrorCode;
        match self {
            McpError::Transport(_) | McpError::Schema(_) => JsonRpcErrorCode::InternalError,
            McpError::Engine(EngineError::MethodNotFound { .. }) => JsonRpcErrorCode::MethodNotFound,
            McpError::Engine(_) => JsonRpcErrorCode::InternalError,
            McpError::HandlerFailed(_) => JsonRpcErrorCode::InternalError,
            McpError::NotFound { .. } => JsonRpcErrorCode::InternalError,
            McpError::Pagination(_)
            | McpError::InvalidParams(_)
            | McpError::InvalidPromptArguments { .. }
            | McpError::AlreadyRegistered(_) => JsonRpcErrorCode::InvalidParams,
        }
    }
}

/// The error type user-supplied tool/prompt/resource handlers return.
///
/// Always converted to in-band content (never a JSON-RPC error object) by
/// the handler wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ToolError {
    message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ToolError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors raised while paginating a registry snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("failed to decode cursor: {0}")]
    InvalidCursor(String),
}
