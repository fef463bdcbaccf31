use flashskill_core::skill::SkillDefinition;
use flashskill_core::{FailureMode, RunConfig};
use flashskill_providers::ModelProvider;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregate::{failure_marker, ExecutionResult, FailureReason, ResultAggregator};
use crate::dispatch::DispatchEngine;
use crate::task::Task;

/// The top-level batch join: dispatch, aggregate, and one re-issue cycle
/// for responses that failed schema validation. The schema re-issue budget
/// is independent of (and stacked on top of) the dispatch engine's own
/// transport-retry budget.
pub struct SkillRunner {
    dispatch: DispatchEngine,
    failure_mode: FailureMode,
}

impl SkillRunner {
    pub fn new(provider: Arc<dyn ModelProvider>, config: RunConfig) -> Self {
        let failure_mode = config.failure_mode;
        Self { dispatch: DispatchEngine::new(provider, config), failure_mode }
    }

    /// Run every task to a terminal state and build the final mapping.
    /// Always returns: failed tasks are either omitted or carry a marker,
    /// per the configured failure mode.
    pub async fn run(&self, definition: &SkillDefinition, tasks: &[Task]) -> ExecutionResult {
        let reports = self.dispatch.run(tasks).await;
        let first_pass = ResultAggregator::aggregate(&reports, definition);

        let mut validated = first_pass.validated;
        let mut failures: BTreeMap<usize, FailureReason> = first_pass
            .dispatch_failures
            .iter()
            .map(|(id, reason)| (*id, *reason))
            .collect();

        if !first_pass.schema_failures.is_empty() {
            let retry_ids: Vec<usize> =
                first_pass.schema_failures.iter().map(|(id, _)| *id).collect();
            warn!(tasks = retry_ids.len(), "Re-issuing schema-invalid tasks");
            let retry_tasks: Vec<Task> = tasks
                .iter()
                .filter(|t| retry_ids.contains(&t.id))
                .cloned()
                .collect();
            let retry_reports = self.dispatch.run(&retry_tasks).await;
            let second_pass = ResultAggregator::aggregate(&retry_reports, definition);

            validated.extend(second_pass.validated);
            for (id, _) in second_pass.schema_failures {
                failures.insert(id, FailureReason::SchemaValidation);
            }
            for (id, reason) in second_pass.dispatch_failures {
                failures.insert(id, reason);
            }
        }

        let mut results = validated;
        let succeeded = results.len();
        if self.failure_mode == FailureMode::MarkFailed {
            for (id, reason) in &failures {
                results.insert(id.to_string(), failure_marker(*reason));
            }
        }

        info!(tasks = tasks.len(), succeeded, failed = failures.len(), "Batch run complete");
        results
    }
}
