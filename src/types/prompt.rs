//! Prompt descriptor, structural argument schema, and response envelope.

use serde::{Deserialize, Serialize};

/// One entry of a prompt's structural argument schema, derived from the
/// handler's argument struct at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
}

/// The advertised shape of a registered prompt, returned by `prompts/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: super::content::Content,
}

/// The result of rendering a prompt, returned by `prompts/get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PromptResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

impl PromptResponse {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            description: None,
            messages: vec![PromptMessage {
                role: PromptRole::User,
                content: super::content::Content::text(text),
            }],
        }
    }

    /// Reconstruct this envelope to carry a single error-describing
    /// assistant message, mirroring [`super::tool::ToolResponse::error`].
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            description: None,
            messages: vec![PromptMessage {
                role: PromptRole::Assistant,
                content: super::content::Content::text(message),
            }],
        }
    }
}
