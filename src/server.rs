//! MCP dispatch layer: binds the eight MCP method names onto
//! a [`ProtocolEngine`], owns the tool/prompt/resource registries, and
//! manages capability advertisement and change notifications.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::engine::{EngineConfig, ProtocolEngine};
use crate::error::{EngineError, McpError, ToolError};
use crate::handler::{self, RegisteredPrompt, RegisteredResource, RegisteredTool};
use crate::pagination;
use crate::registry::ConcurrentRegistry;
use crate::transport::Transport;
use crate::types::{
    ClientCapabilities, InitializeParams, InitializeResult, Prompt, PromptResponse, Resource,
    ResourceResponse, ServerCapabilities, ServerInfo, Tool, ToolResponse, PROTOCOL_VERSION,
};

/// Static configuration for a [`McpServer`], set once at construction.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub server_name: String,
    pub server_version: String,
    pub server_instructions: Option<String>,
    /// Cap applied to `tools/list`, `prompts/list`, `resources/list` when
    /// the caller doesn't specify its own limit. `None` returns every
    /// entry on the first page.
    pub pagination_limit: Option<usize>,
    pub engine: EngineConfig,
}

impl McpServerConfig {
    pub fn new(server_name: impl Into<String>, server_version: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            server_version: server_version.into(),
            server_instructions: None,
            pagination_limit: Some(50),
            engine: EngineConfig::default(),
        }
    }
}

/// The MCP server: a typed tool/prompt/resource registry bound to a
/// [`ProtocolEngine`], handling the eight-method MCP surface.
pub struct McpServer {
    engine: Arc<ProtocolEngine>,
    tools: ConcurrentRegistry<RegisteredTool>,
    prompts: ConcurrentRegistry<RegisteredPrompt>,
    resources: ConcurrentRegistry<RegisteredResource>,
    is_running: Arc<AtomicBool>,
    config: McpServerConfig,
}

impl McpServer {
    pub fn new(config: McpServerConfig) -> Arc<Self> {
        let engine = ProtocolEngine::new(config.engine.clone());
        Arc::new(Self {
            engine,
            tools: ConcurrentRegistry::new(),
            prompts: ConcurrentRegistry::new(),
            resources: ConcurrentRegistry::new(),
            is_running: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Register a typed tool handler. Fails if `name` is already taken.
    pub fn register_tool<A, R, F, Fut>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Result<(), McpError>
    where
        A: serde::de::DeserializeOwned + schemars::JsonSchema + Send + 'static,
        R: Into<ToolResponse>,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
    {
        let name = name.into();
        if self.tools.contains(&name) {
            return Err(McpError::AlreadyRegistered(name));
        }
        let registered = handler::register_tool(name.clone(), description, handler)?;
        self.tools.store(name, registered);
        self.notify_list_changed("notifications/tools/list_changed");
        Ok(())
    }

    /// Remove a previously registered tool. Returns whether one was removed.
    pub fn deregister_tool(&self, name: &str) -> bool {
        let removed = self.tools.delete(name).is_some();
        if removed {
            self.notify_list_changed("notifications/tools/list_changed");
        }
        removed
    }

    pub fn register_prompt<A, F, Fut>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Result<(), McpError>
    where
        A: serde::de::DeserializeOwned + schemars::JsonSchema + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PromptResponse, ToolError>> + Send + 'static,
    {
        let name = name.into();
        if self.prompts.contains(&name) {
            return Err(McpError::AlreadyRegistered(name));
        }
        let registered = handler::register_prompt(name.clone(), description, handler)?;
        self.prompts.store(name, registered);
        self.notify_list_changed("notifications/prompts/list_changed");
        Ok(())
    }

    pub fn deregister_prompt(&self, name: &str) -> bool {
        let removed = self.prompts.delete(name).is_some();
        if removed {
            self.notify_list_changed("notifications/prompts/list_changed");
        }
        removed
    }

    pub fn register_resource<F, Fut>(
        &self,
        uri: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        mime_type: Option<String>,
        handler: F,
    ) -> Result<(), McpError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ResourceResponse, ToolError>> + Send + 'static,
    {
        let uri = uri.into();
        if self.resources.contains(&uri) {
            return Err(McpError::AlreadyRegistered(uri));
        }
        let registered = handler::register_resource(uri.clone(), name, description, mime_type, handler);
        self.resources.store(uri, registered);
        self.notify_list_changed("notifications/resources/list_changed");
        Ok(())
    }

    pub fn deregister_resource(&self, uri: &str) -> bool {
        let removed = self.resources.delete(uri).is_some();
        if removed {
            self.notify_list_changed("notifications/resources/list_changed");
        }
        removed
    }

    /// Fire a `*/list_changed` notification iff the server is running;
    /// registrations made before `serve()` starts are suppressed.
    fn notify_list_changed(&self, method: &'static str) {
        if !self.is_running() {
            return;
        }
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let _ = engine.notification(method, None).await;
        });
    }

    /// Register the eight MCP method bindings on the underlying engine,
    /// connect the transport, and mark the server as running.
    pub async fn serve(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Result<(), McpError> {
        self.bind_handlers();
        self.engine.connect(transport).await?;
        self.is_running.store(true, Ordering::Release);
        info!(server = %self.config.server_name, "MCP server running");
        Ok(())
    }

    pub async fn close(&self) -> Result<(), McpError> {
        self.is_running.store(false, Ordering::Release);
        self.engine.close().await?;
        Ok(())
    }

    fn bind_handlers(self: &Arc<Self>) {
        let weak: Weak<McpServer> = Arc::downgrade(self);

        bind(&self.engine, &weak, "ping", |_server, _params| async move {
            Ok(serde_json::json!({}))
        });
        bind(&self.engine, &weak, "initialize", |server, params| async move {
            server.handle_initialize(params)
        });
        bind(&self.engine, &weak, "tools/list", |server, params| async move {
            server.handle_tools_list(params)
        });
        bind(&self.engine, &weak, "tools/call", |server, params| async move {
            server.handle_tools_call(params).await
        });
        bind(&self.engine, &weak, "prompts/list", |server, params| async move {
            server.handle_prompts_list(params)
        });
        bind(&self.engine, &weak, "prompts/get", |server, params| async move {
            server.handle_prompts_get(params).await
        });
        bind(&self.engine, &weak, "resources/list", |server, params| async move {
            server.handle_resources_list(params)
        });
        bind(&self.engine, &weak, "resources/read", |server, params| async move {
            server.handle_resources_read(params).await
        });
    }

    fn handle_initialize(&self, params: Value) -> Result<Value, McpError> {
        let request: InitializeParams = serde_json::from_value(params)
            .unwrap_or_else(|_| InitializeParams {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ClientCapabilities::default(),
                client_info: crate::types::ClientInfo {
                    name: "unknown".to_string(),
                    version: "0.0.0".to_string(),
                },
            });
        debug!(client = %request.client_info.name, "client initialized");

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::advertising_all(),
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            },
            instructions: self.config.server_instructions.clone(),
        };
        serde_json::to_value(result).map_err(|e| McpError::InvalidParams(e.to_string()))
    }

    fn handle_tools_list(&self, params: Value) -> Result<Value, McpError> {
        let list_params: ListParams = parse_or_default(params)?;
        let snapshot = self.tools.snapshot_sorted();
        let keys: Vec<String> = snapshot.iter().map(|(k, _)| k.clone()).collect();
        let tools: Vec<Tool> = snapshot.iter().map(|(_, v)| v.descriptor.clone()).collect();

        let page = pagination::paginate(
            &keys,
            &tools,
            list_params.cursor.as_deref(),
            self.config.pagination_limit,
        )?;
        serde_json::to_value(ToolsListResult {
            tools: page.items.to_vec(),
            next_cursor: page.next_cursor,
        })
        .map_err(|e| McpError::InvalidParams(e.to_string()))
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, McpError> {
        let call: CallToolParams = serde_json::from_value(params)
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        let tool = self.tools.load(&call.name).ok_or_else(|| McpError::NotFound {
            kind: "tool",
            name: call.name.clone(),
        })?;

        let result = (tool.invoke)(call.arguments).await;
        Ok(result)
    }

    fn handle_prompts_list(&self, params: Value) -> Result<Value, McpError> {
        let list_params: ListParams = parse_or_default(params)?;
        let snapshot = self.prompts.snapshot_sorted();
        let keys: Vec<String> = snapshot.iter().map(|(k, _)| k.clone()).collect();
        let prompts: Vec<Prompt> = snapshot.iter().map(|(_, v)| v.descriptor.clone()).collect();

        let page = pagination::paginate(
            &keys,
            &prompts,
            list_params.cursor.as_deref(),
            self.config.pagination_limit,
        )?;
        serde_json::to_value(PromptsListResult {
            prompts: page.items.to_vec(),
            next_cursor: page.next_cursor,
        })
        .map_err(|e| McpError::InvalidParams(e.to_string()))
    }

    async fn handle_prompts_get(&self, params: Value) -> Result<Value, McpError> {
        let get: GetPromptParams = serde_json::from_value(params)
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        let prompt = self.prompts.load(&get.name).ok_or_else(|| McpError::NotFound {
            kind: "prompt",
            name: get.name.clone(),
        })?;

        let response = (prompt.invoke)(get.arguments).await;
        serde_json::to_value(response).map_err(|e| McpError::InvalidParams(e.to_string()))
    }

    fn handle_resources_list(&self, params: Value) -> Result<Value, McpError> {
        let list_params: ListParams = parse_or_default(params)?;
        let snapshot = self.resources.snapshot_sorted();
        let keys: Vec<String> = snapshot.iter().map(|(k, _)| k.clone()).collect();
        let resources: Vec<Resource> = snapshot.iter().map(|(_, v)| v.descriptor.clone()).collect();

        let page = pagination::paginate(
            &keys,
            &resources,
            list_params.cursor.as_deref(),
            self.config.pagination_limit,
        )?;
        serde_json::to_value(ResourcesListResult {
            resources: page.items.to_vec(),
            next_cursor: page.next_cursor,
        })
        .map_err(|e| McpError::InvalidParams(e.to_string()))
    }

    async fn handle_resources_read(&self, params: Value) -> Result<Value, McpError> {
        let read: ReadResourceParams = serde_json::from_value(params)
            .map_err(|e| McpError::InvalidParams(e.to_string()))?;

        let resource = self
            .resources
            .load(&read.uri)
            .ok_or_else(|| McpError::NotFound {
                kind: "resource",
                name: read.uri.clone(),
            })?;

        let response = (resource.invoke)()
            .await
            .map_err(|err| McpError::HandlerFailed(err.message().to_string()))?;
        serde_json::to_value(response).map_err(|e| McpError::InvalidParams(e.to_string()))
    }
}

/// Register one MCP method on `engine`, upgrading `weak` on every call and
/// failing with [`EngineError::ConnectionClosed`] if the server has since
/// been dropped — the cycle-breaking half of `McpServer` owning an `Arc<
/// ProtocolEngine>` whose handler table would otherwise own an `Arc` back.
fn bind<F, Fut>(engine: &Arc<ProtocolEngine>, weak: &Weak<McpServer>, method: &'static str, handler: F)
where
    F: Fn(Arc<McpServer>, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
{
    let weak = weak.clone();
    let handler = Arc::new(handler);
    engine.set_request_handler(method, move |params| {
        let weak = weak.clone();
        let handler = Arc::clone(&handler);
        async move {
            let server = weak.upgrade().ok_or(EngineError::ConnectionClosed)?;
            handler(server, params).await
        }
    });
}

fn parse_or_default<T: Default + for<'de> Deserialize<'de>>(params: Value) -> Result<T, McpError> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    uri: String,
}

#[derive(Debug, Serialize)]
struct ToolsListResult {
    tools: Vec<Tool>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct PromptsListResult {
    prompts: Vec<Prompt>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResourcesListResult {
    resources: Vec<Resource>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    next_cursor: Option<String>,
}
