//! Resource descriptor and its response envelope.

use serde::{Deserialize, Serialize};

use super::content::EmbeddedResource;

/// The advertised shape of a registered resource, returned by
/// `resources/list`. Keyed by `uri`, unique within its registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The result of reading a resource, returned by `resources/read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResourceResponse {
    pub contents: Vec<EmbeddedResource>,
}

impl ResourceResponse {
    pub fn text(uri: impl Into<String>, text: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            contents: vec![EmbeddedResource {
                uri: uri.into(),
                text: Some(text.into()),
                blob: None,
                mime_type,
            }],
        }
    }
}
