//! Durable task queue on Postgres.
//!
//! Tasks live in the `tasks` table. Workers claim them with
//! `FOR UPDATE SKIP LOCKED` under a time-limited lease; a task whose lease
//! runs out is handed to the next worker, so every task runs at least once.

mod handler;
mod task;
mod worker;

pub use handler::{TaskContext, TaskError, TaskHandler, decode};
pub use task::{Task, TaskKind, TaskPayload, TaskStatus, UnknownTaskKind};
pub use worker::{WorkerPool, calculate_retry_delay};

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

const TASK_COLUMNS: &str = "id, kind, payload, status, retry_count, max_retry, run_at, locked_until, last_error, created_at, updated_at";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Handle to the task table. Cheap to clone.
#[derive(Clone)]
pub struct TaskQueue {
    pool: PgPool,
    notify: Arc<Notify>,
    default_max_retry: i32,
}

impl TaskQueue {
    pub fn new(pool: PgPool, default_max_retry: i32) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
            default_max_retry,
        }
    }

    /// Enqueue a task for immediate execution and wake idle workers.
    pub async fn enqueue<P: TaskPayload>(&self, payload: &P) -> Result<i64, QueueError> {
        let id = Self::insert(&self.pool, P::KIND, payload, self.default_max_retry).await?;
        self.wake();
        Ok(id)
    }

    /// Enqueue a task inside the caller's transaction.
    ///
    /// Workers are not woken; call [`wake`](Self::wake) after committing.
    pub async fn enqueue_tx<P: TaskPayload>(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        payload: &P,
    ) -> Result<i64, QueueError> {
        Self::insert(&mut **tx, P::KIND, payload, self.default_max_retry).await
    }

    async fn insert<'e, P: TaskPayload>(
        executor: impl sqlx::PgExecutor<'e>,
        kind: TaskKind,
        payload: &P,
        max_retry: i32,
    ) -> Result<i64, QueueError> {
        let payload = serde_json::to_value(payload)?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO tasks (kind, payload, status, max_retry)
            VALUES ($1, $2, 'queued', $3)
            RETURNING id
            "#,
        )
        .bind(kind.as_str())
        .bind(payload)
        .bind(max_retry)
        .fetch_one(executor)
        .await?;
        tracing::debug!(task_id = id, kind = %kind, "Task enqueued");
        Ok(id)
    }

    /// Wake workers waiting for new tasks.
    pub fn wake(&self) {
        self.notify.notify_waiters();
    }

    pub(crate) fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Lease the next due task of one of `kinds`.
    ///
    /// A running task whose lease has expired is reclaimed, and the lost
    /// attempt counts towards its retries.
    pub async fn claim(&self, kinds: &[&str], lease: Duration) -> Result<Option<Task>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE tasks SET
                status = 'running',
                locked_until = now() + make_interval(secs => $2),
                retry_count = CASE WHEN status = 'running' THEN retry_count + 1 ELSE retry_count END,
                updated_at = now()
            WHERE id = (
                SELECT id FROM tasks
                WHERE kind = ANY($1)
                  AND ((status = 'queued' AND run_at <= now())
                    OR (status = 'running' AND locked_until < now()))
                ORDER BY run_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {TASK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(kinds)
            .bind(lease.as_secs_f64())
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn complete(&self, task_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tasks SET status = 'completed', locked_until = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put a failed task back in the queue to run again after `delay`.
    pub async fn retry(&self, task_id: i64, delay: Duration, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tasks SET
                status = 'queued',
                retry_count = retry_count + 1,
                run_at = now() + make_interval(secs => $2),
                locked_until = NULL,
                last_error = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .bind(delay.as_secs_f64())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Put back a task whose retries are spent but whose exhaustion hook
    /// failed. The next claim goes straight to the hook again.
    pub async fn defer_exhausted(
        &self,
        task_id: i64,
        delay: Duration,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tasks SET
                status = 'queued',
                retry_count = GREATEST(retry_count, max_retry) + 1,
                run_at = now() + make_interval(secs => $2),
                locked_until = NULL,
                last_error = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .bind(delay.as_secs_f64())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Give up on a task for good.
    pub async fn bury(&self, task_id: i64, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE tasks SET status = 'dead', locked_until = NULL, last_error = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete completed tasks last touched more than `older_than` ago.
    pub async fn purge_completed(&self, older_than: Duration) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE status = 'completed' AND updated_at < now() - make_interval(secs => $1)
            "#,
        )
        .bind(older_than.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
