//! mcp-protocol-core - a JSON-RPC 2.0 protocol engine and Model Context
//! Protocol server dispatch core.
//!
//! The crate is organized in layers:
//!
//! - **JSON-RPC layer** (`jsonrpc`): message parsing/serialization with
//!   bit-exact discrimination between requests, responses, error replies,
//!   and notifications.
//! - **Engine layer** (`engine`): a bidirectional protocol engine —
//!   request/reply correlation, dispatch tables, timeouts, cancellation.
//! - **Handler layer** (`handler`): typed `register_tool`/`register_prompt`/
//!   `register_resource` entry points that derive JSON Schema at
//!   registration and erase to a uniform callable.
//! - **Server layer** (`server`): `McpServer`, binding the eight MCP
//!   methods onto the engine and managing capability advertisement.
//! - **Transport layer** (`transport`): the `Transport` contract plus a
//!   stdio reference implementation.
//! - **Types layer** (`types`): MCP domain types and response envelopes.
//!
//! # Quick start
//!
//! ```rust
//! use mcp_protocol_core::{McpServer, McpServerConfig, ToolResponse, ToolError};
//! use serde::Deserialize;
//! use schemars::JsonSchema;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct EchoArgs {
//!     message: String,
//! }
//!
//! # fn build() -> Result<(), mcp_protocol_core::McpError> {
//! let server = McpServer::new(McpServerConfig::new("demo", "0.1.0"));
//! server.register_tool("echo", "Echoes its input", |args: EchoArgs| async move {
//!     Ok(ToolResponse::text(args.message))
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod handler;
pub mod jsonrpc;
pub mod pagination;
pub mod registry;
pub mod server;
pub mod transport;
pub mod types;

pub use engine::{EngineConfig, ProtocolEngine, RequestOptions};
pub use error::{EngineError, McpError, PaginationError, ToolError};
pub use handler::{register_prompt, register_resource, register_tool};
pub use jsonrpc::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, MessageParseError, RequestId, RequestIdGenerator,
};
pub use server::{McpServer, McpServerConfig};
pub use transport::{StdioTransport, Transport, TransportError};
pub use types::{
    ClientCapabilities, ClientInfo, Content, EmbeddedResource, InitializeParams,
    InitializeResult, ListChangedCapability, Prompt, PromptArgument, PromptMessage,
    PromptResponse, PromptRole, Resource, ResourceResponse, ServerCapabilities, ServerInfo,
    Tool, ToolResponse, PROTOCOL_VERSION,
};

/// The crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
