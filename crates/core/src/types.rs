use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One input record: a mapping of field name to value. BTreeMap keeps
/// rendering order deterministic, which the store round-trip law relies on.
pub type Record = BTreeMap<String, Value>;

/// One chat message in a rendered request. `content` is either a plain
/// string or an array of content blocks (multimodal inputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: Value::String(content.to_string()),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Value::String(content.to_string()),
        }
    }

    /// User message carrying multimodal content blocks
    /// (`{"type": "text", ...}` / `{"type": "image_url", ...}`).
    pub fn user_blocks(blocks: Vec<Value>) -> Self {
        Self {
            role: "user".to_string(),
            content: Value::Array(blocks),
        }
    }
}

/// Fully materialized provider payload for one task. Provider-agnostic:
/// the client maps `response_schema` onto its own structured-output knob
/// (OpenAI `response_format: json_schema`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// JSON Schema the response content must satisfy.
    pub response_schema: Value,
}

/// Structured content returned by a provider for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Raw content text, expected to be a JSON object.
    pub content: String,
    #[serde(default)]
    pub usage: Value,
}

impl ProviderResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), usage: Value::Null }
    }

    /// Parse the content as a JSON object, the shape every skill response
    /// must take before schema validation.
    pub fn parse_object(&self) -> Option<serde_json::Map<String, Value>> {
        match serde_json::from_str::<Value>(&self.content) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}
