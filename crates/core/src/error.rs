use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input at record {record}: missing column '{column}'")]
    InvalidInput { record: usize, column: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Transient provider error: {0}")]
    TransientProvider(String),

    #[error("Fatal provider error: {0}")]
    FatalProvider(String),

    #[error("Schema validation failed for task {task_id}: {reason}")]
    SchemaValidation { task_id: usize, reason: String },

    #[error("Skill learning did not converge after {iterations} iterations: {reason}")]
    LearnConvergence { iterations: u32, reason: String },

    #[error("Provider error: {0}")]
    Provider(String),
}

impl Error {
    /// Whether the dispatch loop may re-issue the attempt.
    /// Timeouts, provider throttling, and transport hiccups are retryable;
    /// authentication and malformed-request failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::TransientProvider(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
