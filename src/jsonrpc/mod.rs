//! JSON-RPC 2.0 message codec.
//!
//! Transport-agnostic parse/serialize with bit-exact discrimination between
//! requests, responses, error replies, and notifications.

mod error;
mod message;

pub use error::{JsonRpcError, JsonRpcErrorCode};
pub use message::{
    JsonRpcErrorResponse, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    MessageParseError, RequestId, RequestIdGenerator,
};
