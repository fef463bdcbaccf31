use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Credentials and endpoint for one model provider.
///
/// Always constructed explicitly by the caller and handed to the provider
/// client; the engine never reads process environment variables itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    /// Override for OpenAI-compatible endpoints (DeepSeek, OpenRouter, ...).
    #[serde(default)]
    pub api_base: Option<String>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), api_base: None }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }
}

/// What the result mapping records for a task that never reached Succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Failed task ids are absent from the mapping.
    OmitFailed,
    /// Failed task ids carry an explicit `{"error": <reason>}` marker.
    #[default]
    MarkFailed,
}

/// Per-batch dispatch knobs. Every `run` call gets its own copy; nothing
/// here is global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default = "default_requests_per_minute")]
    pub max_requests_per_minute: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Attempts per task, counting the first one.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default)]
    pub failure_mode: FailureMode,
}

fn default_requests_per_minute() -> u32 {
    600
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_max_concurrency() -> usize {
    8
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_requests_per_minute(),
            request_timeout_ms: default_request_timeout_ms(),
            max_concurrency: default_max_concurrency(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            failure_mode: FailureMode::default(),
        }
    }
}

impl RunConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Backoff before retry attempt `attempt` (1-based): base * 2^(attempt-1),
    /// capped at 30s.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self.retry_base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(ms.min(30_000))
    }
}
