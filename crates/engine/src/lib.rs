pub mod aggregate;
pub mod compiler;
pub mod dispatch;
pub mod limiter;
pub mod runner;
pub mod task;

pub use aggregate::{failure_marker, AggregateOutcome, ExecutionResult, FailureReason, ResultAggregator};
pub use compiler::{CompileOptions, TaskCompiler};
pub use dispatch::DispatchEngine;
pub use limiter::RollingWindowLimiter;
pub use runner::SkillRunner;
pub use task::{Attempt, AttemptOutcome, Task, TaskOutcome, TaskReport};
