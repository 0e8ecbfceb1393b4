//! Worker pool draining the task queue.

use super::{Task, TaskContext, TaskHandler, TaskKind, TaskQueue};
use crate::config::WorkerConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Backoff exponent cap (2^11 = 2048 seconds).
const MAX_BACKOFF_EXPONENT: u32 = 11;
const MAX_JITTER_MS: u64 = 1000;

/// Completed tasks are kept this long for inspection.
const COMPLETED_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn backoff(retry_count: u32) -> Duration {
    Duration::from_secs(2u64.pow(retry_count.min(MAX_BACKOFF_EXPONENT)))
}

/// Delay before the next attempt: 2^retry_count seconds, capped, plus up to
/// one second of random jitter.
pub fn calculate_retry_delay(retry_count: u32) -> Duration {
    backoff(retry_count) + Duration::from_millis(rand::random_range(0..=MAX_JITTER_MS))
}

struct Shared {
    queue: TaskQueue,
    config: WorkerConfig,
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
    kinds: Vec<&'static str>,
}

/// A fixed number of worker loops pulling tasks from the queue.
pub struct WorkerPool {
    queue: TaskQueue,
    config: WorkerConfig,
    handlers: HashMap<TaskKind, Arc<dyn TaskHandler>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorkerPool {
    pub fn new(queue: TaskQueue, config: WorkerConfig, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            queue,
            config,
            handlers: HashMap::new(),
            shutdown_rx,
        }
    }

    pub fn register(mut self, kind: TaskKind, handler: impl TaskHandler + 'static) -> Self {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    /// Run until shutdown. Tasks already in flight finish first.
    pub async fn run(self) {
        let mut kinds: Vec<&'static str> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        let concurrency = self.config.concurrency.max(1);
        info!(concurrency, kinds = ?kinds, "Worker pool started");

        let shared = Arc::new(Shared {
            queue: self.queue,
            config: self.config,
            handlers: self.handlers,
            kinds,
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..concurrency {
            workers.spawn(worker_loop(worker_id, shared.clone(), self.shutdown_rx.clone()));
        }
        workers.spawn(housekeeping_loop(shared.clone(), self.shutdown_rx.clone()));

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Worker loop aborted");
            }
        }
        info!("Worker pool shutdown complete");
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let notify = shared.queue.notifier();
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Register interest before polling so a wake-up between an empty
        // claim and the select is not lost.
        let notified = notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match shared.queue.claim(&shared.kinds, shared.config.lease).await {
            Ok(Some(task)) => {
                execute(&shared, task).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => error!(worker_id, error = %e, "Failed to claim task"),
        }

        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = &mut notified => {}
            _ = tokio::time::sleep(shared.config.poll_interval) => {}
        }
    }
    debug!(worker_id, "Worker loop stopped");
}

async fn execute(shared: &Shared, task: Task) {
    let ctx = TaskContext {
        task_id: task.id,
        retry_count: task.retry_count,
        max_retry: task.max_retry,
    };

    let handler = task
        .kind
        .parse::<TaskKind>()
        .ok()
        .and_then(|kind| shared.handlers.get(&kind));
    let Some(handler) = handler else {
        error!(task_id = task.id, kind = %task.kind, "No handler registered for task");
        bury(shared, task.id, "no handler registered").await;
        return;
    };

    if task.retry_count > task.max_retry {
        warn!(task_id = task.id, kind = %task.kind, "Lease expired on final attempt");
        exhaust(shared, &**handler, &ctx, task.payload, "lease expired on final attempt")
            .await;
        return;
    }

    debug!(task_id = task.id, kind = %task.kind, attempt = ctx.attempt(), "Running task");
    match handler.handle(&ctx, task.payload.clone()).await {
        Ok(()) => {
            if let Err(e) = shared.queue.complete(task.id).await {
                error!(task_id = task.id, error = %e, "Failed to mark task completed");
            }
        }
        Err(e) if e.is_retryable() && !ctx.is_final_attempt() => {
            let delay = calculate_retry_delay(u32::try_from(task.retry_count).unwrap_or(0));
            warn!(
                task_id = task.id,
                kind = %task.kind,
                attempt = ctx.attempt(),
                retry_in_ms = delay.as_millis() as u64,
                error = %e,
                "Task failed, will retry"
            );
            if let Err(db) = shared.queue.retry(task.id, delay, &e.to_string()).await {
                error!(task_id = task.id, error = %db, "Failed to reschedule task");
            }
        }
        Err(e) => {
            error!(
                task_id = task.id,
                kind = %task.kind,
                attempt = ctx.attempt(),
                error = %e,
                "Task failed permanently"
            );
            exhaust(shared, &**handler, &ctx, task.payload, &e.to_string()).await;
        }
    }
}

/// Run the handler's exhaustion hook, then bury the task.
///
/// If the hook fails with a retryable error the task is deferred instead, so
/// whatever the hook has to finish is not lost with it.
async fn exhaust(
    shared: &Shared,
    handler: &dyn TaskHandler,
    ctx: &TaskContext,
    payload: serde_json::Value,
    reason: &str,
) {
    match handler.on_exhausted(ctx, payload).await {
        Ok(()) => bury(shared, ctx.task_id, reason).await,
        Err(e) if e.is_retryable() => {
            let delay = calculate_retry_delay(u32::try_from(ctx.retry_count).unwrap_or(0));
            warn!(
                task_id = ctx.task_id,
                retry_in_ms = delay.as_millis() as u64,
                error = %e,
                "Exhaustion hook failed, will run it again"
            );
            if let Err(db) = shared.queue.defer_exhausted(ctx.task_id, delay, &e.to_string()).await {
                error!(task_id = ctx.task_id, error = %db, "Failed to defer exhausted task");
            }
        }
        Err(e) => {
            error!(task_id = ctx.task_id, error = %e, "Exhaustion hook failed permanently");
            bury(shared, ctx.task_id, reason).await;
        }
    }
}

async fn bury(shared: &Shared, task_id: i64, reason: &str) {
    if let Err(e) = shared.queue.bury(task_id, reason).await {
        error!(task_id, error = %e, "Failed to bury task");
    }
}

async fn housekeeping_loop(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                match shared.queue.purge_completed(COMPLETED_RETENTION).await {
                    Ok(0) => {}
                    Ok(purged) => info!(purged, "Purged completed tasks"),
                    Err(e) => error!(error = %e, "Failed to purge completed tasks"),
                }
            }
        }
    }
}
