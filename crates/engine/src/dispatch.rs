use flashskill_core::{Error, RunConfig};
use flashskill_providers::ModelProvider;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::limiter::RollingWindowLimiter;
use crate::task::{Attempt, AttemptOutcome, Task, TaskOutcome, TaskReport};

/// Executes a batch of tasks against the model backend under a
/// concurrency bound and a rolling-window rate limit, with per-task
/// retry and backoff.
///
/// Every `run` call owns a fresh worker pool and limiter, so consecutive
/// batches do not interfere. The call returns only once every task has
/// reached a terminal state; individual failures never abort siblings.
pub struct DispatchEngine {
    provider: Arc<dyn ModelProvider>,
    config: RunConfig,
}

impl DispatchEngine {
    pub fn new(provider: Arc<dyn ModelProvider>, config: RunConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub async fn run(&self, tasks: &[Task]) -> Vec<TaskReport> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let limiter = Arc::new(RollingWindowLimiter::per_minute(
            self.config.max_requests_per_minute,
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        info!(
            tasks = tasks.len(),
            max_concurrency = self.config.max_concurrency,
            rpm = self.config.max_requests_per_minute,
            "Dispatching batch"
        );

        let mut join_set: JoinSet<(usize, TaskReport)> = JoinSet::new();
        for (position, task) in tasks.iter().enumerate() {
            let provider = self.provider.clone();
            let limiter = limiter.clone();
            let semaphore = semaphore.clone();
            let config = self.config.clone();
            let task = task.clone();
            join_set.spawn(async move {
                let report = run_task(provider, task, limiter, semaphore, config).await;
                (position, report)
            });
        }

        let mut slots: Vec<Option<TaskReport>> = (0..tasks.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((position, report)) => slots[position] = Some(report),
                Err(e) => error!(error = %e, "Dispatch worker panicked"),
            }
        }

        let reports: Vec<TaskReport> = slots
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.unwrap_or_else(|| TaskReport {
                    task_id: tasks[position].id,
                    attempts: Vec::new(),
                    outcome: TaskOutcome::Fatal("dispatch worker failed".to_string()),
                })
            })
            .collect();

        let succeeded = reports.iter().filter(|r| r.succeeded()).count();
        info!(tasks = reports.len(), succeeded, "Batch joined");
        reports
    }
}

async fn run_task(
    provider: Arc<dyn ModelProvider>,
    task: Task,
    limiter: Arc<RollingWindowLimiter>,
    semaphore: Arc<Semaphore>,
    config: RunConfig,
) -> TaskReport {
    let max_attempts = config.max_retry_attempts.max(1);
    let timeout = config.request_timeout();
    let mut attempts = Vec::new();
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let result = {
            let _permit = semaphore
                .acquire()
                .await
                .expect("dispatch semaphore is never closed");
            limiter.acquire().await;
            debug!(task_id = task.id, attempt, "Issuing request");
            match tokio::time::timeout(timeout, provider.complete(&task.request, timeout)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "attempt {} exceeded {}ms",
                    attempt, config.request_timeout_ms
                ))),
            }
        };

        match result {
            Ok(response) => {
                attempts.push(Attempt::new(attempt, AttemptOutcome::Succeeded));
                debug!(task_id = task.id, attempt, "Task succeeded");
                return TaskReport {
                    task_id: task.id,
                    attempts,
                    outcome: TaskOutcome::Succeeded(response),
                };
            }
            Err(e) if e.is_retryable() => {
                last_error = e.to_string();
                warn!(task_id = task.id, attempt, error = %e, "Retryable attempt failure");
                attempts.push(Attempt::new(attempt, AttemptOutcome::Retryable(last_error.clone())));
                if attempt < max_attempts {
                    tokio::time::sleep(config.backoff_delay(attempt)).await;
                }
            }
            Err(e) => {
                let reason = e.to_string();
                error!(task_id = task.id, attempt, error = %e, "Fatal task failure");
                attempts.push(Attempt::new(attempt, AttemptOutcome::Fatal(reason.clone())));
                return TaskReport {
                    task_id: task.id,
                    attempts,
                    outcome: TaskOutcome::Fatal(reason),
                };
            }
        }
    }

    TaskReport {
        task_id: task.id,
        attempts,
        outcome: TaskOutcome::RetriesExhausted(last_error),
    }
}
