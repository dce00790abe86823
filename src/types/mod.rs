//! MCP domain types: response envelopes, capability negotiation, and the
//! tool/prompt/resource descriptors.

mod capabilities;
mod content;
mod prompt;
mod resource;
mod tool;

pub use capabilities::{
    ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, ListChangedCapability,
    ServerCapabilities, ServerInfo, PROTOCOL_VERSION,
};
pub use content::{Content, EmbeddedResource};
pub use prompt::{Prompt, PromptArgument, PromptMessage, PromptResponse, PromptRole};
pub use resource::{Resource, ResourceResponse};
pub use tool::{Tool, ToolResponse};
