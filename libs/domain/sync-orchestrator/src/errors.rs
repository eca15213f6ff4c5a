// [libs/domain/sync-orchestrator/src/errors.rs]
use ehr_infra_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("queue is at capacity: {active} active jobs >= high-water mark {high_water_mark}")]
    QueueFull { active: u64, high_water_mark: u64 },

    #[error("job not found")]
    JobNotFound,

    #[error("invalid job state transition")]
    InvalidTransition,

    #[error("schedule not found")]
    ScheduleNotFound,

    #[error(transparent)]
    Database(#[from] DbError),
}

/// Outcome of a single `JobExecutor` invocation, reported to the worker
/// loop so it can decide between `Completed`, a transient retry, or a
/// terminal failure.
#[derive(Debug, Clone)]
pub enum JobExecutionError {
    /// Worth retrying with backoff — network blip, vendor 429/503, etc.
    Transient(String),
    /// Not worth retrying — malformed job, permanently revoked connection.
    Permanent(String),
    /// The job's cancellation token was observed at a suspension point.
    Cancelled,
}

impl std::fmt::Display for JobExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobExecutionError::Transient(msg) => write!(f, "transient: {msg}"),
            JobExecutionError::Permanent(msg) => write!(f, "permanent: {msg}"),
            JobExecutionError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for JobExecutionError {}



