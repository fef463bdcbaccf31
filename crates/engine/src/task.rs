use chrono::{DateTime, Utc};
use flashskill_core::types::{ProviderResponse, Record, RenderedRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One unit of work: one input record rendered against one skill.
/// `id` equals the position of the source record in the compiled batch,
/// so callers can correlate results without external bookkeeping.
/// Tasks are never mutated after compilation; a retry re-sends the same
/// rendered request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: usize,
    pub input: Record,
    pub request: RenderedRequest,
}

impl Task {
    /// Decimal string form of the id, the key used across the provider
    /// boundary and in the final result mapping.
    pub fn custom_id(&self) -> String {
        self.id.to_string()
    }

    /// Batch-replay/export descriptor, one JSONL line per task.
    pub fn to_descriptor(&self) -> Value {
        json!({
            "custom_id": self.custom_id(),
            "rendered_request": self.request,
        })
    }
}

/// Outcome of one dispatch try.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Succeeded,
    Retryable(String),
    Fatal(String),
}

/// Transient record of one dispatch try for a task.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

impl Attempt {
    pub fn new(number: u32, outcome: AttemptOutcome) -> Self {
        Self { number, outcome, at: Utc::now() }
    }
}

/// Terminal state of one task after dispatch.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Succeeded(ProviderResponse),
    /// Every allowed attempt failed transiently; carries the last error.
    RetriesExhausted(String),
    /// A non-retryable failure aborted the task immediately.
    Fatal(String),
}

/// Everything the engine knows about one task after the batch joined:
/// its terminal state plus the attempt trail that led there.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task_id: usize,
    pub attempts: Vec<Attempt>,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Succeeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashskill_core::types::ChatMessage;

    fn task(id: usize) -> Task {
        Task {
            id,
            input: Record::new(),
            request: RenderedRequest {
                model: "gpt-4o-mini".to_string(),
                messages: vec![ChatMessage::user("x")],
                response_schema: json!({"type": "object"}),
            },
        }
    }

    #[test]
    fn test_custom_id_is_decimal_string() {
        assert_eq!(task(0).custom_id(), "0");
        assert_eq!(task(42).custom_id(), "42");
    }

    #[test]
    fn test_descriptor_carries_custom_id_and_request() {
        let desc = task(3).to_descriptor();
        assert_eq!(desc["custom_id"], "3");
        assert_eq!(desc["rendered_request"]["model"], "gpt-4o-mini");
    }

    #[test]
    fn test_report_success_flag() {
        let ok = TaskReport {
            task_id: 0,
            attempts: vec![Attempt::new(1, AttemptOutcome::Succeeded)],
            outcome: TaskOutcome::Succeeded(ProviderResponse::new("{}")),
        };
        assert!(ok.succeeded());
        let failed = TaskReport {
            task_id: 0,
            attempts: vec![Attempt::new(1, AttemptOutcome::Fatal("401".into()))],
            outcome: TaskOutcome::Fatal("401".into()),
        };
        assert!(!failed.succeeded());
    }
}
