//! The JSON-RPC protocol engine: correlates outbound
//! requests with inbound replies, dispatches inbound requests and
//! notifications to registered handlers, and manages connection lifecycle.

mod pending;

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{EngineError, McpError};
use crate::jsonrpc::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, RequestIdGenerator,
};
use crate::transport::Transport;

pub use pending::PendingTable;

/// Tunables for the protocol engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default timeout applied to outbound requests that don't specify
    /// their own via [`RequestOptions`].
    pub default_timeout: Duration,
    /// How often the background sweep checks for expired requests.
    pub cleanup_interval: Duration,
    /// Enable `debug!`/`trace!` tracing of protocol-level events.
    pub enable_tracing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(5),
            enable_tracing: true,
        }
    }
}

/// Per-request overrides for [`ProtocolEngine::request`].
#[derive(Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    /// Invoked on each `notifications/progress` bearing this request's
    /// generated progress token, if set.
    pub on_progress: Option<Arc<dyn Fn(Value) + Send + Sync>>,
}

type RequestHandlerFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, McpError>> + Send + Sync>;
type NotificationHandlerFn = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Running = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Running,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// The transport-agnostic JSON-RPC request/response/notification engine.
pub struct ProtocolEngine {
    transport: RwLock<Option<Arc<dyn Transport>>>,
    pending: PendingTable,
    request_handlers: Arc<DashMap<String, RequestHandlerFn>>,
    notification_handlers: Arc<DashMap<String, NotificationHandlerFn>>,
    progress_handlers: Arc<DashMap<String, Arc<dyn Fn(Value) + Send + Sync>>>,
    id_generator: Arc<RequestIdGenerator>,
    state: AtomicU8,
    config: EngineConfig,
    read_task: RwLock<Option<JoinHandle<()>>>,
    cleanup_task: RwLock<Option<JoinHandle<()>>>,
}

impl ProtocolEngine {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            transport: RwLock::new(None),
            pending: PendingTable::new(),
            request_handlers: Arc::new(DashMap::new()),
            notification_handlers: Arc::new(DashMap::new()),
            progress_handlers: Arc::new(DashMap::new()),
            id_generator: Arc::new(RequestIdGenerator::new()),
            state: AtomicU8::new(ConnectionState::Idle as u8),
            config,
            read_task: RwLock::new(None),
            cleanup_task: RwLock::new(None),
        })
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Register (or replace) the handler for inbound requests of `method`.
    pub fn set_request_handler<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
    {
        let wrapped: RequestHandlerFn = Arc::new(move |params| Box::pin(handler(params)));
        self.request_handlers.insert(method.into(), wrapped);
    }

    /// Register (or replace) the handler for inbound notifications of
    /// `method`.
    pub fn set_notification_handler<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let wrapped: NotificationHandlerFn = Arc::new(move |params| Box::pin(handler(params)));
        self.notification_handlers.insert(method.into(), wrapped);
    }

    /// Attach the transport, start the read loop and background cleanup
    /// sweep, and transition to *running*. A second call while already
    /// connected fails with [`EngineError::AlreadyConnected`].
    pub async fn connect(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Result<(), EngineError> {
        match self.state() {
            ConnectionState::Connecting | ConnectionState::Running => {
                return Err(EngineError::AlreadyConnected);
            }
            _ => {}
        }
        self.set_state(ConnectionState::Connecting);
        *self.transport.write().await = Some(Arc::clone(&transport));

        let engine = Arc::clone(self);
        let read_task = tokio::spawn(async move {
            engine.run_read_loop(transport).await;
        });
        *self.read_task.write().await = Some(read_task);

        let engine = Arc::clone(self);
        let cleanup_task = tokio::spawn(async move {
            engine.run_cleanup_loop().await;
        });
        *self.cleanup_task.write().await = Some(cleanup_task);

        self.set_state(ConnectionState::Running);
        if self.config.enable_tracing {
            debug!("protocol engine connected");
        }
        Ok(())
    }

    async fn run_read_loop(self: Arc<Self>, transport: Arc<dyn Transport>) {
        let mut stream = transport.receive();
        while let Some(item) = stream.next().await {
            match item {
                Ok(message) => self.handle_inbound(&transport, message).await,
                Err(err) => {
                    warn!(error = %err, "transport error, closing connection");
                    self.pending.fail_all();
                    self.set_state(ConnectionState::Closed);
                    break;
                }
            }
        }
    }

    async fn run_cleanup_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.cleanup_interval);
        loop {
            ticker.tick().await;
            if self.state() != ConnectionState::Running {
                break;
            }
            let expired = self.pending.sweep_expired();
            if expired.is_empty() {
                continue;
            }
            let transport = self.transport.read().await.clone();
            for request_id in expired {
                if let Some(transport) = &transport {
                    let note = JsonRpcNotification::new(
                        "notifications/cancelled",
                        Some(serde_json::json!({ "requestId": request_id })),
                    );
                    let _ = transport.send(JsonRpcMessage::Notification(note)).await;
                }
            }
        }
    }

    async fn handle_inbound(&self, transport: &Arc<dyn Transport>, message: JsonRpcMessage) {
        if self.state() != ConnectionState::Running {
            return;
        }
        match message {
            JsonRpcMessage::Request(req) => self.dispatch_request(transport, req).await,
            JsonRpcMessage::Notification(note) => self.dispatch_notification(note).await,
            JsonRpcMessage::Response(resp) => {
                self.pending.correlate(&resp.id, Ok(resp.result));
            }
            JsonRpcMessage::Error(err) => {
                if let Some(id) = &err.id {
                    self.pending.correlate(
                        id,
                        Err(EngineError::Remote {
                            request_id: id.clone(),
                            code: err.error.code,
                            message: err.error.message.clone(),
                        }),
                    );
                }
            }
        }
    }

    async fn dispatch_request(&self, transport: &Arc<dyn Transport>, req: JsonRpcRequest) {
        let handler = self.request_handlers.get(&req.method).map(|e| Arc::clone(e.value()));
        let Some(handler) = handler else {
            let response = JsonRpcErrorResponse::new(
                JsonRpcError::method_not_found(&req.method),
                Some(req.id),
            );
            let _ = transport.send(JsonRpcMessage::Error(response)).await;
            return;
        };

        let params = req.params.clone().unwrap_or(Value::Null);
        let outcome = std::panic::AssertUnwindSafe(handler(params))
            .catch_unwind()
            .await;

        let reply = match outcome {
            Ok(Ok(result)) => JsonRpcMessage::Response(JsonRpcResponse::new(result, req.id)),
            Ok(Err(err)) => JsonRpcMessage::Error(JsonRpcErrorResponse::new(
                JsonRpcError::new(err.error_code(), err.to_string()),
                Some(req.id),
            )),
            Err(_panic) => JsonRpcMessage::Error(JsonRpcErrorResponse::new(
                JsonRpcError::internal_error("handler panicked"),
                Some(req.id),
            )),
        };

        if let Err(err) = transport.send(reply).await {
            warn!(error = %err, "failed to send reply");
        }
    }

    async fn dispatch_notification(&self, note: JsonRpcNotification) {
        if note.method == "notifications/progress" {
            if let Some(params) = &note.params {
                if let Some(token) = params.get("progressToken").and_then(Value::as_str) {
                    if let Some(cb) = self.progress_handlers.get(token) {
                        cb(params.clone());
                    }
                }
            }
            return;
        }

        let handler = self
            .notification_handlers
            .get(&note.method)
            .map(|e| Arc::clone(e.value()));
        let Some(handler) = handler else {
            trace!(method = %note.method, "dropping notification with no registered handler");
            return;
        };
        let params = note.params.unwrap_or(Value::Null);
        handler(params).await;
    }

    /// Issue an outbound request and suspend until the matching reply
    /// arrives, the operation times out, or it is cancelled.
    pub async fn request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value, EngineError> {
        if self.state() != ConnectionState::Running {
            return Err(EngineError::ConnectionClosed);
        }

        let method = method.into();
        let id = self.id_generator.next_id();
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);

        let mut params = params;
        if let Some(on_progress) = options.on_progress {
            let token = Uuid::new_v4().to_string();
            self.progress_handlers.insert(token.clone(), on_progress);
            let mut obj = params.unwrap_or_else(|| serde_json::json!({}));
            if let Some(map) = obj.as_object_mut() {
                map.insert(
                    "_meta".to_string(),
                    serde_json::json!({ "progressToken": token }),
                );
            }
            params = Some(obj);
        }

        let receiver = self.pending.register(id.clone(), method.clone(), timeout);

        let transport = self.transport.read().await.clone().ok_or(EngineError::ConnectionClosed)?;
        let request = JsonRpcRequest::new(method, params, id.clone());
        if let Err(err) = transport.send(JsonRpcMessage::Request(request)).await {
            self.pending.correlate(&id, Err(EngineError::ConnectionClosed));
            warn!(error = %err, "failed to send request");
            return Err(EngineError::ConnectionClosed);
        }

        match receiver.await {
            Ok(result) => result,
            Err(_recv_dropped) => Err(EngineError::ConnectionClosed),
        }
    }

    /// Fire-and-forget: send a notification, never allocating a reply slot.
    pub async fn notification(&self, method: impl Into<String>, params: Option<Value>) -> Result<(), EngineError> {
        let transport = self.transport.read().await.clone().ok_or(EngineError::ConnectionClosed)?;
        let note = JsonRpcNotification::new(method, params);
        transport
            .send(JsonRpcMessage::Notification(note))
            .await
            .map_err(|_| EngineError::ConnectionClosed)
    }

    /// Cancel a specific outbound request. Rejects cancelling `initialize`.
    pub async fn cancel_request(&self, id: &RequestId) -> Result<(), EngineError> {
        self.pending.cancel(id)?;
        if let Some(transport) = self.transport.read().await.clone() {
            let note = JsonRpcNotification::new(
                "notifications/cancelled",
                Some(serde_json::json!({ "requestId": id })),
            );
            let _ = transport.send(JsonRpcMessage::Notification(note)).await;
        }
        Ok(())
    }

    /// Stop the read loop, cancel every pending reply slot, and detach the
    /// transport.
    pub async fn close(&self) -> Result<(), EngineError> {
        self.set_state(ConnectionState::Closing);

        if let Some(task) = self.read_task.write().await.take() {
            task.abort();
        }
        if let Some(task) = self.cleanup_task.write().await.take() {
            task.abort();
        }

        self.pending.fail_all();

        if let Some(transport) = self.transport.write().await.take() {
            let _ = transport.close().await;
        }

        self.set_state(ConnectionState::Closed);
        Ok(())
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::jsonrpc::JsonRpcErrorCode;
    use crate::transport::TransportError;
    use std::sync::Mutex;

    /// An in-memory transport pairing two engines for tests: messages sent
    /// on one side are delivered to the other via unbounded channels.
    struct MockTransport {
        outbound: tokio::sync::mpsc::UnboundedSender<JsonRpcMessage>,
        inbound: Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<JsonRpcMessage>>>,
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
            self.outbound
                .send(message)
                .map_err(|_| TransportError::Closed)
        }

        fn receive(&self) -> futures::stream::BoxStream<'static, Result<JsonRpcMessage, TransportError>> {
            let rx = self.inbound.lock().unwrap().take().expect("receive called once");
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

    #[tokio::test]
    async fn request_reply_round_trip() {
        let (client_transport, server_transport) = wire_pair();

        let server = ProtocolEngine::new(EngineConfig::default());
        server.set_request_handler("echo", |params| async move { Ok(params) });
        server.connect(server_transport).await.unwrap();

        let client = ProtocolEngine::new(EngineConfig::default());
        client.connect(client_transport).await.unwrap();

        let result = client
            .request("echo", Some(serde_json::json!({"hi": "there"})), RequestOptions::default())
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"hi": "there"}));

        client.close().await.unwrap();
        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let (client_transport, server_transport) = wire_pair();
        let server = ProtocolEngine::new(EngineConfig::default());
        server.connect(server_transport).await.unwrap();
        let client = ProtocolEngine::new(EngineConfig::default());
        client.connect(client_transport).await.unwrap();

        let err = client
            .request("missing", None, RequestOptions::default())
            .await
            .unwrap_err();
        match err {
            EngineError::Remote { code, .. } => {
                assert_eq!(code, JsonRpcErrorCode::MethodNotFound.as_i64());
            }
            other => panic!("expected a remote method-not-found error, got {other:?}"),
        }

        client.close().await.unwrap();
        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn second_connect_fails_already_connected() {
        let (_client_transport, server_transport) = wire_pair();
        let server = ProtocolEngine::new(EngineConfig::default());
        server.connect(server_transport).await.unwrap();

        let (_another_client, another_server_transport) = wire_pair();
        let err = server.connect(another_server_transport).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyConnected));

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_fails_pending_requests() {
        let (client_transport, server_transport) = wire_pair();
        // Server holds the request open well past the test's window, so the
        // client's slot is still pending when `close()` runs.
        let server = ProtocolEngine::new(EngineConfig::default());
        server.set_request_handler("slow", |_params| async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(serde_json::json!({}))
        });
        server.connect(server_transport).await.unwrap();

        let client = ProtocolEngine::new(EngineConfig::default());
        client.connect(client_transport).await.unwrap();

        let client_for_task = Arc::clone(&client);
        let handle = tokio::spawn(async move {
            client_for_task
                .request("slow", None, RequestOptions::default())
                .await
        });

        // Give the request time to register before closing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.close().await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, EngineError::ConnectionClosed));

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn initialize_cannot_be_cancelled() {
        let (client_transport, server_transport) = wire_pair();
        let server = ProtocolEngine::new(EngineConfig::default());
        server.set_request_handler("initialize", |_params| async move { Ok(serde_json::json!({})) });
        server.connect(server_transport).await.unwrap();

        let client = ProtocolEngine::new(EngineConfig::default());
        client.connect(client_transport).await.unwrap();

        let id = RequestId::new_number(1);
        let _receiver = client.pending.register(id.clone(), "initialize", Duration::from_secs(30));
        let err = client.cancel_request(&id).await.unwrap_err();
        assert!(matches!(err, EngineError::InitializeNotCancellable));

        client.close().await.unwrap();
        server.close().await.unwrap();
    }
}
