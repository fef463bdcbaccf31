use async_trait::async_trait;
use flashskill_core::types::{ProviderResponse, RenderedRequest};
use flashskill_core::{Error, ProviderConfig, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI and OpenAI-compatible endpoints
/// (DeepSeek, OpenRouter, ... via `api_base`). Structured output is
/// requested through `response_format: json_schema`.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    api_base: String,
}

impl OpenAIProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_base: config
                .api_base
                .as_deref()
                .unwrap_or(OPENAI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn build_request_body(request: &RenderedRequest) -> Value {
        json!({
            "model": request.model,
            "messages": request.messages,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "skill_output",
                    "strict": true,
                    "schema": request.response_schema,
                }
            },
        })
    }

    /// Map an HTTP error status onto the engine's retryability classes.
    /// Throttling and server-side failures are transient; auth and
    /// request-shape problems are fatal.
    fn classify_status(status: StatusCode, body: &str) -> Error {
        let detail = format!("API error {}: {}", status, truncate(body, 500));
        if status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
        {
            Error::TransientProvider(detail)
        } else {
            Error::FatalProvider(detail)
        }
    }

    fn parse_response(raw_body: &str) -> Result<ProviderResponse> {
        let resp: ChatCompletionResponse = serde_json::from_str(raw_body).map_err(|e| {
            Error::Provider(format!(
                "Failed to parse chat completion: {}. Body: {}",
                e,
                truncate(raw_body, 500)
            ))
        })?;
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("Chat completion carried no choices".to_string()))?;
        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: resp.usage.unwrap_or(Value::Null),
        })
    }
}

#[async_trait]
impl crate::ModelProvider for OpenAIProvider {
    async fn complete(
        &self,
        request: &RenderedRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = Self::build_request_body(request);

        info!(url = %url, model = %request.model, messages = request.messages.len(), "Calling chat completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("Request to {} timed out", url))
                } else {
                    Error::TransientProvider(format!("Transport error: {}", e))
                }
            })?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body_len = raw_body.len(), "Chat completions error");
            return Err(Self::classify_status(status, &raw_body));
        }

        debug!(body_len = raw_body.len(), "Chat completions raw response");
        Self::parse_response(&raw_body)
    }
}

/// Cut an error body down to at most `max` bytes without splitting a
/// UTF-8 character.
fn truncate(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashskill_core::types::ChatMessage;

    fn sample_request() -> RenderedRequest {
        RenderedRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![
                ChatMessage::system("classify"),
                ChatMessage::user("review: great movie"),
            ],
            response_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_build_request_body() {
        let body = OpenAIProvider::build_request_body(&sample_request());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["response_format"]["json_schema"]["schema"]["type"], "object");
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            OpenAIProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Error::TransientProvider(_)
        ));
        assert!(matches!(
            OpenAIProvider::classify_status(StatusCode::BAD_GATEWAY, ""),
            Error::TransientProvider(_)
        ));
        assert!(matches!(
            OpenAIProvider::classify_status(StatusCode::UNAUTHORIZED, "bad key"),
            Error::FatalProvider(_)
        ));
        assert!(matches!(
            OpenAIProvider::classify_status(StatusCode::BAD_REQUEST, "bad shape"),
            Error::FatalProvider(_)
        ));
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"categories\": \"pos\"}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        }"#;
        let resp = OpenAIProvider::parse_response(raw).unwrap();
        assert_eq!(resp.content, r#"{"categories": "pos"}"#);
        assert_eq!(resp.usage["prompt_tokens"], 12);
    }

    #[test]
    fn test_parse_response_no_choices() {
        let raw = r#"{"id": "chatcmpl-1", "choices": []}"#;
        assert!(matches!(
            OpenAIProvider::parse_response(raw),
            Err(Error::Provider(_))
        ));
    }

    #[test]
    fn test_classify_status_truncates_on_char_boundary() {
        // Byte 500 lands inside the two-byte 'é'; classification must not
        // panic and the detail keeps the intact prefix.
        let mut body = "x".repeat(499);
        body.push('é');
        body.push_str(&"y".repeat(100));
        let err = OpenAIProvider::classify_status(StatusCode::TOO_MANY_REQUESTS, &body);
        match err {
            Error::TransientProvider(detail) => {
                assert!(detail.contains(&"x".repeat(499)));
                assert!(!detail.contains('é'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_failure_detail_truncates_on_char_boundary() {
        let mut raw = "x".to_string();
        raw.push_str(&"ä".repeat(400));
        raw.push_str("not json");
        let err = OpenAIProvider::parse_response(&raw).unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let cfg = ProviderConfig::new("k").with_api_base("https://api.deepseek.com/v1/");
        let provider = OpenAIProvider::new(&cfg);
        assert_eq!(provider.api_base, "https://api.deepseek.com/v1");
    }
}
