//! Task queue worker settings.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Number of concurrent worker loops.
    pub concurrency: usize,
    /// How long an idle worker sleeps before polling the queue again.
    pub poll_interval: Duration,
    /// How long a claimed task stays leased before another worker may reclaim it.
    pub lease: Duration,
    /// Retries granted to each enqueued task after its first attempt.
    pub max_retry: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            poll_interval: Duration::from_millis(1000),
            lease: Duration::from_secs(300),
            max_retry: 3,
        }
    }
}
