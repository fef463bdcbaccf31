use flashskill_core::skill::SkillDefinition;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::task::{TaskOutcome, TaskReport};

/// Final identifier-keyed result mapping: decimal string form of the task
/// id to either a validated output object or an explicit failure marker.
pub type ExecutionResult = BTreeMap<String, Value>;

/// Reason code recorded in a failure marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    RetriesExhausted,
    Fatal,
    SchemaValidation,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::RetriesExhausted => "retries_exhausted",
            FailureReason::Fatal => "fatal_provider_error",
            FailureReason::SchemaValidation => "schema_validation",
        }
    }
}

/// Explicit marker stored for a failed task under `FailureMode::MarkFailed`.
pub fn failure_marker(reason: FailureReason) -> Value {
    json!({"error": reason.code()})
}

/// What one aggregation pass produced: validated outputs, responses that
/// failed schema validation (eligible for one re-issue cycle), and tasks
/// that never produced a response at all.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    pub validated: BTreeMap<String, Value>,
    /// Task id + violation reason for structurally invalid responses.
    pub schema_failures: Vec<(usize, String)>,
    pub dispatch_failures: Vec<(usize, FailureReason)>,
}

/// Validates raw dispatch responses against the skill's output schema and
/// sorts every task into validated / re-issue / failed buckets.
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn aggregate(reports: &[TaskReport], definition: &SkillDefinition) -> AggregateOutcome {
        let mut outcome = AggregateOutcome::default();
        for report in reports {
            match &report.outcome {
                TaskOutcome::Succeeded(response) => {
                    match response.parse_object() {
                        None => {
                            warn!(task_id = report.task_id, "Response content is not a JSON object");
                            outcome
                                .schema_failures
                                .push((report.task_id, "content is not a JSON object".to_string()));
                        }
                        Some(obj) => match definition
                            .output_schema
                            .validate(&obj, definition.max_selected_categories)
                        {
                            Ok(()) => {
                                outcome
                                    .validated
                                    .insert(report.task_id.to_string(), Value::Object(obj));
                            }
                            Err(reason) => {
                                warn!(task_id = report.task_id, reason = %reason, "Schema validation failed");
                                outcome.schema_failures.push((report.task_id, reason));
                            }
                        },
                    }
                }
                TaskOutcome::RetriesExhausted(_) => {
                    outcome
                        .dispatch_failures
                        .push((report.task_id, FailureReason::RetriesExhausted));
                }
                TaskOutcome::Fatal(_) => {
                    outcome.dispatch_failures.push((report.task_id, FailureReason::Fatal));
                }
            }
        }
        debug!(
            validated = outcome.validated.len(),
            schema_failures = outcome.schema_failures.len(),
            dispatch_failures = outcome.dispatch_failures.len(),
            "Aggregation pass complete"
        );
        outcome
    }
}
