//! Handler wrapper: the type-erased adapter between raw JSON
//! params and a strongly-typed user handler.
//!
//! Argument types derive `schemars::JsonSchema`, so their shape is known
//! at compile time via monomorphization rather than runtime reflection.

mod prompt;
mod resource;
mod tool;

pub use prompt::{register_prompt, PromptHandlerFn, RegisteredPrompt};
pub use resource::{register_resource, RegisteredResource, ResourceHandlerFn};
pub use tool::{register_tool, RegisteredTool, ToolHandlerFn};

use std::future::Future;

use futures::FutureExt;

use crate::error::ToolError;

/// Run `fut`, converting a caught panic into a [`ToolError`] instead of
/// unwinding into the protocol engine's dispatch loop.
///
/// Mirrors the panic guard around the engine's own inbound request
/// dispatch (`engine::ProtocolEngine::dispatch_request`), applied here at
/// the narrower granularity of a single user handler invocation.
async fn guarded<Fut, T>(fut: Fut) -> Result<T, ToolError>
where
    Fut: Future<Output = Result<T, ToolError>> + Send,
{
    match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_panic) => Err(ToolError::new("handler panicked")),
    }
}
