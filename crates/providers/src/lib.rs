pub mod mock;
pub mod openai;

use async_trait::async_trait;
use flashskill_core::types::{ProviderResponse, RenderedRequest};
use flashskill_core::Result;
use std::time::Duration;

/// The model-provider boundary: accept a rendered request with a deadline,
/// return structured content or a classified error. Errors must come back
/// as `Error::Timeout`, `Error::TransientProvider`, or `Error::FatalProvider`
/// so the dispatch loop can decide whether to retry.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(
        &self,
        request: &RenderedRequest,
        timeout: Duration,
    ) -> Result<ProviderResponse>;
}

pub use mock::MockProvider;
pub use openai::OpenAIProvider;
