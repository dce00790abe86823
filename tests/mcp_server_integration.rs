//! MCP Server Integration Tests
//!
//! Exercises `McpServer` end to end over an in-memory transport pair:
//! initialize, tool/prompt/resource registration and invocation,
//! pagination, and the in-band vs. protocol-level error split.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use mcp_protocol_core::{
    InitializeParams, McpServer, McpServerConfig, PromptResponse, ResourceResponse, ToolError,
    ToolResponse, Transport, TransportError,
};

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use mcp_protocol_core::jsonrpc::JsonRpcMessage;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory transport pairing two ends for tests: messages sent on one
/// side are delivered to the other via unbounded channels.
struct MockTransport {
    outbound: tokio::sync::mpsc::UnboundedSender<JsonRpcMessage>,
    inbound: Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<JsonRpcMessage>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed)
    }

    fn receive(&self) -> BoxStream<'static, Result<JsonRpcMessage, TransportError>> {
        let rx = self
            .inbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .expect("receive called once");
        tokio_stream::wrappers::UnboundedReceiverStream::new(rx)
            .map(Ok)
            .boxed()
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn wire_pair() -> (Arc<MockTransport>, Arc<MockTransport>) {
    let (tx_a_to_b, rx_a_to_b) = tokio::sync::mpsc::unbounded_channel();
    let (tx_b_to_a, rx_b_to_a) = tokio::sync::mpsc::unbounded_channel();

    let a = Arc::new(MockTransport {
        outbound: tx_a_to_b,
        inbound: Mutex::new(Some(rx_b_to_a)),
    });
    let b = Arc::new(MockTransport {
        outbound: tx_b_to_a,
        inbound: Mutex::new(Some(rx_a_to_b)),
    });
    (a, b)
}

/// Spins up a server on one side of a wired transport pair and a bare
/// client-side `ProtocolEngine` on the other, for issuing raw requests.
async fn serve_and_connect(
    server: &Arc<McpServer>,
) -> Arc<mcp_protocol_core::ProtocolEngine> {
    let (client_transport, server_transport) = wire_pair();
    server.serve(server_transport).await.unwrap();

    let client = mcp_protocol_core::ProtocolEngine::new(mcp_protocol_core::EngineConfig::default());
    client.connect(client_transport).await.unwrap();
    client
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EchoArgs {
    message: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GreetArgs {
    name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ArticleArgs {
    title: String,
    subtitle: Option<String>,
}

#[tokio::test]
async fn initialize_returns_capabilities_and_server_info() {
    let server = McpServer::new(McpServerConfig::new("test-server", "1.2.3"));
    let client = serve_and_connect(&server).await;

    let params = InitializeParams {
        protocol_version: mcp_protocol_core::PROTOCOL_VERSION.to_string(),
        capabilities: Default::default(),
        client_info: mcp_protocol_core::ClientInfo {
            name: "test-client".to_string(),
            version: "0.0.1".to_string(),
        },
    };
    let result = client
        .request(
            "initialize",
            Some(serde_json::to_value(&params).unwrap()),
            Default::default(),
        )
        .await
        .unwrap();

    assert_eq!(result["serverInfo"]["name"], json!("test-server"));
    assert_eq!(result["serverInfo"]["version"], json!("1.2.3"));
    assert_eq!(result["capabilities"]["tools"]["listChanged"], json!(true));

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn tool_round_trip_and_in_band_error() {
    let server = McpServer::new(McpServerConfig::new("test-server", "1.0.0"));
    server
        .register_tool("echo", "Echoes its input", |args: EchoArgs| async move {
            Ok(ToolResponse::text(args.message))
        })
        .unwrap();
    server
        .register_tool("fails", "Always fails", |_args: EchoArgs| async move {
            Err::<ToolResponse, _>(ToolError::new("boom"))
        })
        .unwrap();

    let client = serve_and_connect(&server).await;

    let listed = client
        .request("tools/list", None, Default::default())
        .await
        .unwrap();
    let names: Vec<&str> = listed["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["echo", "fails"]);

    let called = client
        .request(
            "tools/call",
            Some(json!({"name": "echo", "arguments": {"message": "hi"}})),
            Default::default(),
        )
        .await
        .unwrap();
    assert_eq!(called["isError"], json!(false));
    assert_eq!(called["content"][0]["text"], json!("hi"));

    // A handler error is folded in-band, not a JSON-RPC error reply.
    let failed = client
        .request(
            "tools/call",
            Some(json!({"name": "fails", "arguments": {"message": "x"}})),
            Default::default(),
        )
        .await
        .unwrap();
    assert_eq!(failed["isError"], json!(true));
    assert_eq!(failed["content"][0]["text"], json!("boom"));

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn unknown_tool_is_a_protocol_error_naming_the_tool() {
    let server = McpServer::new(McpServerConfig::new("test-server", "1.0.0"));
    let client = serve_and_connect(&server).await;

    let err = client
        .request(
            "tools/call",
            Some(json!({"name": "missing-tool", "arguments": {}})),
            Default::default(),
        )
        .await
        .unwrap_err();

    match err {
        mcp_protocol_core::EngineError::Remote { message, code, .. } => {
            assert!(message.contains("missing-tool"), "message was: {message}");
            assert_eq!(code, -32603, "unknown tool should report Internal error, not Invalid params");
        }
        other => panic!("expected a remote error, got {other:?}"),
    }

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn prompt_arguments_are_projected_by_name() {
    let server = McpServer::new(McpServerConfig::new("test-server", "1.0.0"));
    server
        .register_prompt("greeting", "Greets someone", |args: GreetArgs| async move {
            Ok(PromptResponse::user_text(format!("hello, {}", args.name)))
        })
        .unwrap();

    let client = serve_and_connect(&server).await;

    let listed = client
        .request("prompts/list", None, Default::default())
        .await
        .unwrap();
    let args = &listed["prompts"][0]["arguments"];
    assert_eq!(args[0]["name"], json!("name"));
    assert_eq!(args[0]["required"], json!(true));

    let got = client
        .request(
            "prompts/get",
            Some(json!({"name": "greeting", "arguments": {"name": "ada"}})),
            Default::default(),
        )
        .await
        .unwrap();
    assert_eq!(got["messages"][0]["content"]["text"], json!("hello, ada"));

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn prompt_arguments_preserve_struct_declaration_order() {
    let server = McpServer::new(McpServerConfig::new("test-server", "1.0.0"));
    server
        .register_prompt("article", "Drafts an article", |args: ArticleArgs| async move {
            Ok(PromptResponse::user_text(args.title))
        })
        .unwrap();

    let client = serve_and_connect(&server).await;

    let listed = client
        .request("prompts/list", None, Default::default())
        .await
        .unwrap();
    let args = &listed["prompts"][0]["arguments"];
    assert_eq!(args[0]["name"], json!("title"));
    assert_eq!(args[1]["name"], json!("subtitle"));

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn resource_handler_failure_is_a_protocol_error_not_in_band() {
    let server = McpServer::new(McpServerConfig::new("test-server", "1.0.0"));
    server
        .register_resource(
            "file:///broken.txt",
            "broken",
            None,
            Some("text/plain".to_string()),
            || async move { Err::<ResourceResponse, _>(ToolError::new("disk on fire")) },
        )
        .unwrap();

    let client = serve_and_connect(&server).await;

    let err = client
        .request(
            "resources/read",
            Some(json!({"uri": "file:///broken.txt"})),
            Default::default(),
        )
        .await
        .unwrap_err();

    match err {
        mcp_protocol_core::EngineError::Remote { message, .. } => {
            assert!(message.contains("disk on fire"), "message was: {message}");
        }
        other => panic!("expected a remote error, got {other:?}"),
    }

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn tools_list_paginates_with_a_cursor() {
    let server = McpServer::new(McpServerConfig {
        pagination_limit: Some(1),
        ..McpServerConfig::new("test-server", "1.0.0")
    });
    server
        .register_tool("a-tool", "first", |args: EchoArgs| async move {
            Ok(ToolResponse::text(args.message))
        })
        .unwrap();
    server
        .register_tool("b-tool", "second", |args: EchoArgs| async move {
            Ok(ToolResponse::text(args.message))
        })
        .unwrap();

    let client = serve_and_connect(&server).await;

    let page1 = client
        .request("tools/list", None, Default::default())
        .await
        .unwrap();
    assert_eq!(page1["tools"].as_array().unwrap().len(), 1);
    let cursor = page1["nextCursor"].as_str().unwrap().to_string();

    let page2 = client
        .request("tools/list", Some(json!({"cursor": cursor})), Default::default())
        .await
        .unwrap();
    assert_eq!(page2["tools"].as_array().unwrap().len(), 1);
    assert!(page2.get("nextCursor").is_none());

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn list_changed_notification_fires_after_serve_starts() {
    let server = McpServer::new(McpServerConfig::new("test-server", "1.0.0"));
    let (client_transport, server_transport) = wire_pair();
    server.serve(server_transport).await.unwrap();

    let client = mcp_protocol_core::ProtocolEngine::new(mcp_protocol_core::EngineConfig::default());
    let notified = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&notified);
    client.set_notification_handler("notifications/tools/list_changed", move |_params| {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock().unwrap_or_else(|e| e.into_inner()) = true;
        }
    });
    client.connect(client_transport).await.unwrap();

    server
        .register_tool("late", "registered after serve() started", |args: EchoArgs| async move {
            Ok(ToolResponse::text(args.message))
        })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(*notified.lock().unwrap_or_else(|e| e.into_inner()));

    client.close().await.unwrap();
    server.close().await.unwrap();
}
