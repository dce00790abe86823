//! Typed resource registration: a zero-argument handler identified by URI.
//!
//! Unlike tools and prompts, a resource handler's failure is **not**
//! folded in-band: it is a protocol-level error, not a piece of content
//! with an error flag. `register_resource` returns the handler's
//! [`ToolError`] as-is; the MCP dispatch layer converts it to a JSON-RPC
//! error reply.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::error::ToolError;
use crate::types::{Resource, ResourceResponse};

use super::guarded;

pub type ResourceHandlerFn = Arc<dyn Fn() -> BoxFuture<'static, Result<ResourceResponse, ToolError>> + Send + Sync>;

pub struct RegisteredResource {
    pub descriptor: Resource,
    pub invoke: ResourceHandlerFn,
}

pub fn register_resource<F, Fut>(
    uri: impl Into<String>,
    name: impl Into<String>,
    description: Option<String>,
    mime_type: Option<String>,
    handler: F,
) -> RegisteredResource
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResourceResponse, ToolError>> + Send + 'static,
{
    let uri = uri.into();
    debug!(resource = %uri, "registered resource");

    let handler = Arc::new(handler);
    let invoke: ResourceHandlerFn = Arc::new(move || {
        let handler = Arc::clone(&handler);
        Box::pin(async move { guarded(handler()).await })
    });

    RegisteredResource {
        descriptor: Resource {
            uri,
            name: name.into(),
            description,
            mime_type,
        },
        invoke,
    }
}
