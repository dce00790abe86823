//! Transport contract and the reference stdio implementation.
//!
//! Concrete transports are external collaborators — this module defines
//! only the contract they must satisfy, plus a newline-delimited read
//! buffer and a stdio reference transport built on it for testing and
//! the `demos/` binary.

mod buffer;
mod stdio;

pub use buffer::ReadBuffer;
pub use stdio::StdioTransport;

use futures::stream::BoxStream;
use thiserror::Error;

use crate::jsonrpc::JsonRpcMessage;

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("transport closed")]
    Closed,
}

/// What the protocol engine consumes from a transport: send one message,
/// receive a stream of parsed messages in arrival order, and release
/// resources on close.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError>;

    /// Yields parsed messages in arrival order, terminating on EOF or error.
    fn receive(&self) -> BoxStream<'static, Result<JsonRpcMessage, TransportError>>;

    async fn close(&self) -> Result<(), TransportError>;
}
