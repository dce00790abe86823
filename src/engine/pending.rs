//! The pending reply table: single-use slots keyed by request ID, one per
//! outbound request, satisfied exactly once by a reply, a cancellation, or
//! connection shutdown.
//!
//! A `DashMap` of oneshot senders plus a background sweep task for
//! timeouts, which also tracks whether a slot may be explicitly cancelled
//! (everything except `initialize`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::EngineError;
use crate::jsonrpc::RequestId;

pub struct PendingReply {
    sender: oneshot::Sender<Result<serde_json::Value, EngineError>>,
    registered_at: Instant,
    timeout: Duration,
    method: String,
}

/// The table of in-flight outbound requests awaiting a reply.
#[derive(Clone)]
pub struct PendingTable {
    entries: Arc<DashMap<RequestId, PendingReply>>,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Allocate a new slot for `request_id`, returning the receiver half
    /// the caller suspends on.
    pub fn register(
        &self,
        request_id: RequestId,
        method: impl Into<String>,
        timeout: Duration,
    ) -> oneshot::Receiver<Result<serde_json::Value, EngineError>> {
        let (sender, receiver) = oneshot::channel();
        self.entries.insert(
            request_id,
            PendingReply {
                sender,
                registered_at: Instant::now(),
                timeout,
                method: method.into(),
            },
        );
        receiver
    }

    /// Satisfy a pending slot with the peer's reply. Late or duplicate
    /// replies (no matching slot) are logged and discarded.
    pub fn correlate(&self, request_id: &RequestId, result: Result<serde_json::Value, EngineError>) {
        match self.entries.remove(request_id) {
            Some((_, pending)) => {
                trace!(%request_id, "correlating reply");
                let _ = pending.sender.send(result);
            }
            None => {
                warn!(%request_id, "discarding reply with no matching pending request");
            }
        }
    }

    /// Cancel a single pending request. Rejects cancelling `initialize`
    /// without removing its slot.
    pub fn cancel(&self, request_id: &RequestId) -> Result<(), EngineError> {
        if let Some(entry) = self.entries.get(request_id) {
            if entry.method == "initialize" {
                return Err(EngineError::InitializeNotCancellable);
            }
        } else {
            return Err(EngineError::UnknownRequestId {
                request_id: request_id.clone(),
            });
        }

        if let Some((_, pending)) = self.entries.remove(request_id) {
            let _ = pending.sender.send(Err(EngineError::Cancelled {
                request_id: request_id.clone(),
            }));
        }
        Ok(())
    }

    /// Sweep slots whose deadline has passed, failing each with a timeout.
    /// Returns the request IDs that were timed out, so the caller can emit
    /// `notifications/cancelled` for each.
    pub fn sweep_expired(&self) -> Vec<RequestId> {
        let now = Instant::now();
        let expired: Vec<RequestId> = self
            .entries
            .iter()
            .filter_map(|entry| {
                if now.duration_since(entry.registered_at) >= entry.timeout {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect();

        for request_id in &expired {
            if let Some((_, pending)) = self.entries.remove(request_id) {
                debug!(%request_id, "request timed out");
                let _ = pending.sender.send(Err(EngineError::Timeout {
                    request_id: request_id.clone(),
                }));
            }
        }

        expired
    }

    /// Fail every pending slot with a connection-closed error, as required
    /// on engine shutdown.
    pub fn fail_all(&self) {
        let ids: Vec<RequestId> = self.entries.iter().map(|e| e.key().clone()).collect();
        for request_id in ids {
            if let Some((_, pending)) = self.entries.remove(&request_id) {
                let _ = pending.sender.send(Err(EngineError::ConnectionClosed));
            }
        }
    }
}
