use async_trait::async_trait;
use flashskill_core::types::{ProviderResponse, RenderedRequest};
use flashskill_core::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

type Handler = dyn Fn(u64, &RenderedRequest) -> Result<ProviderResponse> + Send + Sync;

/// Scriptable in-process provider for tests and offline runs.
///
/// The handler receives the zero-based global call index and the rendered
/// request, and returns whatever the script dictates. The mock also records
/// issue timestamps, total calls, and the peak number of concurrent calls,
/// which the engine tests use to check the rate-limit and concurrency laws.
pub struct MockProvider {
    handler: Box<Handler>,
    latency: Duration,
    calls: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    issue_times: Mutex<Vec<Instant>>,
}

impl MockProvider {
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(u64, &RenderedRequest) -> Result<ProviderResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            latency: Duration::ZERO,
            calls: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            issue_times: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the given JSON object.
    pub fn with_json(value: Value) -> Self {
        let content = value.to_string();
        Self::from_fn(move |_, _| Ok(ProviderResponse::new(content.clone())))
    }

    /// Simulated per-call latency, so concurrency actually overlaps.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn issue_times(&self) -> Vec<Instant> {
        self.issue_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl crate::ModelProvider for MockProvider {
    async fn complete(
        &self,
        request: &RenderedRequest,
        _timeout: Duration,
    ) -> Result<ProviderResponse> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.issue_times.lock().unwrap().push(Instant::now());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let result = (self.handler)(index, request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
