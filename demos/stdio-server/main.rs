//! A minimal MCP server over stdio, wiring a couple of example tools,
//! a prompt, and a resource onto [`McpServer`].
//!
//! ```bash
//! echo '{"jsonrpc":"2.0","id":1,"method":"ping"}' | cargo run --bin stdio-server
//! ```
//!
//! Logging goes to stderr only — stdout is the JSON-RPC wire and must
//! never carry anything else.

use std::sync::Arc;

use mcp_protocol_core::{
    McpServer, McpServerConfig, PromptResponse, ResourceResponse, StdioTransport, ToolError,
    ToolResponse,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt_layer)
        .init();
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddArgs {
    a: f64,
    b: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GreetArgs {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "starting stdio MCP server");

    let server = McpServer::new(McpServerConfig::new("mcp-protocol-core-demo", env!("CARGO_PKG_VERSION")));

    server.register_tool("add", "Adds two numbers", |args: AddArgs| async move {
        Ok(ToolResponse::text((args.a + args.b).to_string()))
    })?;

    server.register_prompt(
        "greeting",
        "Produce a friendly greeting",
        |args: GreetArgs| async move { Ok(PromptResponse::user_text(format!("Say hello to {}", args.name))) },
    )?;

    server.register_resource(
        "memory://readme",
        "readme",
        Some("A static in-memory note".to_string()),
        Some("text/plain".to_string()),
        || async move { Ok(ResourceResponse::text("memory://readme", "hello from mcp-protocol-core", Some("text/plain".to_string()))) },
    )?;

    let transport: Arc<dyn mcp_protocol_core::Transport> = Arc::new(StdioTransport::new());
    server.serve(transport).await?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c, shutting down"),
        Err(err) => error!(error = %err, "unable to listen for shutdown signal"),
    }

    server.close().await?;
    Ok(())
}
