//! Typed prompt registration: derives the structural `{name, description?,
//! required}` argument list from the handler's argument struct, rejecting
//! any argument struct with a non-string field at registration time.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{McpError, ToolError};
use crate::types::{Prompt, PromptArgument, PromptResponse};

use super::guarded;

pub type PromptHandlerFn = Arc<dyn Fn(HashMap<String, String>) -> BoxFuture<'static, PromptResponse> + Send + Sync>;

pub struct RegisteredPrompt {
    pub descriptor: Prompt,
    pub invoke: PromptHandlerFn,
}

pub fn register_prompt<A, F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    handler: F,
) -> Result<RegisteredPrompt, McpError>
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PromptResponse, ToolError>> + Send + 'static,
{
    let name = name.into();
    let description = description.into();

    let schema = schemars::schema_for!(A);
    let schema_value =
        serde_json::to_value(&schema).map_err(|e| McpError::Schema(e.to_string()))?;
    let arguments = prompt_arguments_from_schema(&schema_value, &name)?;

    debug!(prompt = %name, args = arguments.len(), "registered prompt");

    let handler = Arc::new(handler);
    let invoke: PromptHandlerFn = Arc::new(move |arguments: HashMap<String, String>| {
        let handler = Arc::clone(&handler);
        let name = name.clone();
        Box::pin(async move {
            let params = serde_json::to_value(&arguments).unwrap_or_else(|_| serde_json::json!({}));
            let args: A = match serde_json::from_value(params) {
                Ok(args) => args,
                Err(err) => return PromptResponse::error(format!("failed to parse arguments: {err}")),
            };

            match guarded(handler(args)).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(prompt = %name, error = %err, "prompt handler returned an error");
                    PromptResponse::error(err.message().to_string())
                }
            }
        })
    });

    Ok(RegisteredPrompt {
        descriptor: Prompt {
            name,
            description: Some(description),
            arguments,
        },
        invoke,
    })
}

/// Translate a derived JSON Schema's `properties`/`required` into the
/// structural argument list, rejecting any field that isn't a string or
/// optional string.
///
/// Relies on the `preserve_order` feature on `schemars`/`serde_json` so
/// `properties` iterates in struct declaration order, not alphabetically.
fn prompt_arguments_from_schema(schema: &Value, type_name: &str) -> Result<Vec<PromptArgument>, McpError> {
    let object = schema
        .as_object()
        .ok_or_else(|| McpError::InvalidPromptArguments {
            name: type_name.to_string(),
            reason: "argument type did not produce an object schema".to_string(),
        })?;

    let Some(properties) = object.get("properties").and_then(Value::as_object) else {
        return Ok(Vec::new());
    };

    let required: HashSet<&str> = object
        .get("required")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut arguments = Vec::with_capacity(properties.len());
    for (field_name, field_schema) in properties {
        if !is_string_or_optional_string(field_schema) {
            return Err(McpError::InvalidPromptArguments {
                name: type_name.to_string(),
                reason: format!("field '{field_name}' must be a string or optional string"),
            });
        }
        let description = field_schema
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        arguments.push(PromptArgument {
            name: field_name.clone(),
            description,
            required: required.contains(field_name.as_str()),
        });
    }
    Ok(arguments)
}

fn is_string_or_optional_string(field_schema: &Value) -> bool {
    match field_schema.get("type") {
        Some(Value::String(t)) => t == "string",
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            names.contains(&"string") && names.iter().all(|t| *t == "string" || *t == "null")
        }
        _ => field_schema
            .get("anyOf")
            .and_then(Value::as_array)
            .is_some_and(|variants| {
                variants.iter().all(|variant| {
                    matches!(variant.get("type").and_then(Value::as_str), Some("string") | Some("null"))
                })
            }),
    }
}
