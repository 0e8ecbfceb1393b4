use super::QueueError;
use async_trait::async_trait;
use thiserror::Error;

/// Retry bookkeeping of the task being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskContext {
    pub task_id: i64,
    pub retry_count: i32,
    pub max_retry: i32,
}

impl TaskContext {
    /// 1-based attempt number.
    pub fn attempt(&self) -> i32 {
        self.retry_count + 1
    }

    /// Whether a retryable failure now will bury the task instead.
    pub fn is_final_attempt(&self) -> bool {
        self.retry_count >= self.max_retry
    }
}

/// Errors a task handler reports back to the worker.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The payload does not decode. Never retried.
    #[error("malformed task payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A failure that retrying cannot fix.
    #[error("{0}")]
    SkipRetry(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("{0}")]
    Retryable(String),
}

impl TaskError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskError::Database(_) | TaskError::Queue(_) | TaskError::Retryable(_)
        )
    }
}

/// Runs one kind of task.
///
/// The queue delivers at least once, so handlers must tolerate running the
/// same payload again after a crash or an expired lease.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, ctx: &TaskContext, payload: serde_json::Value) -> Result<(), TaskError>;

    /// Called once the task will not run again, right before it is buried.
    ///
    /// This also runs when the final attempt's lease expired and `handle`
    /// never got a chance to report a failure. A retryable error here keeps
    /// the task around and the hook runs again after a backoff.
    async fn on_exhausted(
        &self,
        _ctx: &TaskContext,
        _payload: serde_json::Value,
    ) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Decode a task payload, mapping failures to [`TaskError::Malformed`].
pub fn decode<T: serde::de::DeserializeOwned>(payload: serde_json::Value) -> Result<T, TaskError> {
    Ok(serde_json::from_value(payload)?)
}
