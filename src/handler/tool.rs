//! Typed tool registration: derives a JSON Schema `inputSchema` from the
//! handler's argument type and wraps the handler so its failures are
//! folded into an in-band `ToolResponse`.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{McpError, ToolError};
use crate::types::{Tool, ToolResponse};

use super::guarded;

pub type ToolHandlerFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Value> + Send + Sync>;

/// A tool's advertised descriptor paired with its erased invocation
/// closure, ready to be stored in a [`crate::registry::ConcurrentRegistry`].
pub struct RegisteredTool {
    pub descriptor: Tool,
    pub invoke: ToolHandlerFn,
}

/// Build a [`RegisteredTool`] from a typed handler.
///
/// `A` must implement [`JsonSchema`] so its `inputSchema` can be derived
/// once, at registration time, via `schemars::schema_for!`.
pub fn register_tool<A, R, F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    handler: F,
) -> Result<RegisteredTool, McpError>
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
    R: Into<ToolResponse>,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
{
    let name = name.into();
    let description = description.into();

    let schema = schemars::schema_for!(A);
    let input_schema =
        serde_json::to_value(&schema).map_err(|e| McpError::Schema(e.to_string()))?;

    debug!(tool = %name, "registered tool");

    let handler = Arc::new(handler);
    let invoke: ToolHandlerFn = Arc::new(move |params: Value| {
        let handler = Arc::clone(&handler);
        let name = name.clone();
        Box::pin(async move {
            let args: A = match serde_json::from_value(params) {
                Ok(args) => args,
                Err(err) => {
                    return to_json(ToolResponse::error(format!(
                        "failed to parse arguments: {err}"
                    )))
                }
            };

            let response = match guarded(handler(args)).await {
                Ok(result) => result.into(),
                Err(err) => {
                    warn!(tool = %name, error = %err, "tool handler returned an error");
                    ToolResponse::error(err.message().to_string())
                }
            };
            to_json(response)
        })
    });

    Ok(RegisteredTool {
        descriptor: Tool {
            name,
            description: Some(description),
            input_schema,
        },
        invoke,
    })
}

fn to_json(response: ToolResponse) -> Value {
    serde_json::to_value(&response)
        .unwrap_or_else(|_| serde_json::json!({ "content": [], "isError": true }))
}
