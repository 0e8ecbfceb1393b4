//! Broadcast fan-out.
//!
//! - `PrepareBatchesHandler` receives `broadcast:prepare_batches`, resolves
//!   the eligible recipients, charges the whole fan-out against the quota
//!   once and enqueues one `broadcast:delivery` task per batch
//! - `BroadcastDeliveryHandler` writes one batch of notifications, records
//!   the attempt on the batch row and settles the broadcast once no batch is
//!   left unfinished

use crate::entities::broadcast::Broadcast;
use crate::entities::broadcast_batch::BroadcastBatch;
use crate::entities::notification::Notification;
use crate::entities::plan::{Metric, Plan};
use crate::entities::{BatchStatus, BroadcastStatus};
use crate::queue::{TaskContext, TaskError, TaskHandler, TaskKind, TaskPayload, TaskQueue, decode};
use crate::quota::{QuotaError, UsageEvent, check_and_consume};
use crate::resolution::list_eligible_recipients;
use crate::utils::batching::partition;
use async_trait::async_trait;
use herald_sdk::objects::Target;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareBatchesPayload {
    pub user_id: i64,
    pub project_id: i64,
    pub broadcast_id: i64,
}

impl TaskPayload for PrepareBatchesPayload {
    const KIND: TaskKind = TaskKind::BroadcastPrepareBatches;
}

/// Everything needed to deliver one batch without reading the broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastDeliveryPayload {
    pub project_id: i64,
    pub broadcast_id: i64,
    pub batch_id: i64,
    pub recipients: Vec<String>,
    pub target: Target,
    pub payload: serde_json::Value,
    /// Unix seconds.
    pub expires_at: i64,
}

impl TaskPayload for BroadcastDeliveryPayload {
    const KIND: TaskKind = TaskKind::BroadcastDelivery;
}

pub struct PrepareBatchesHandler {
    pool: PgPool,
    queue: TaskQueue,
}

impl PrepareBatchesHandler {
    pub fn new(pool: PgPool, queue: TaskQueue) -> Self {
        Self { pool, queue }
    }

    async fn prepare(&self, job: PrepareBatchesPayload) -> Result<(), TaskError> {
        let broadcast_id = job.broadcast_id;
        let mut tx = self.pool.begin().await?;

        let Some(broadcast) = Broadcast::lock_tx(&mut tx, broadcast_id).await? else {
            warn!(broadcast_id, "Broadcast no longer exists, skipping");
            return Ok(());
        };
        if broadcast.is_terminal() {
            debug!(broadcast_id, status = ?broadcast.status, "Broadcast already settled");
            return Ok(());
        }
        if BroadcastBatch::exists_for_broadcast_tx(&mut tx, broadcast_id).await? {
            // An earlier run committed its batches; their delivery tasks are queued.
            debug!(broadcast_id, "Batches already prepared");
            return Ok(());
        }

        let target = broadcast.target();
        let recipients = list_eligible_recipients(&mut *tx, job.project_id, &target).await?;
        let now = OffsetDateTime::now_utc();

        if recipients.is_empty() {
            Broadcast::finish(&mut *tx, broadcast_id, BroadcastStatus::Completed, now).await?;
            tx.commit().await?;
            info!(broadcast_id, target = %target, "No eligible recipients, broadcast completed");
            return Ok(());
        }

        let event = UsageEvent {
            user_id: job.user_id,
            project_id: job.project_id,
            metric: Metric::Notifications,
            amount: recipients.len() as i64,
        };
        let consumption = match check_and_consume(&mut tx, &event, now).await {
            Ok(consumption) => consumption,
            Err(e @ QuotaError::QuotaExceeded { .. }) => {
                Broadcast::finish(&mut *tx, broadcast_id, BroadcastStatus::QuotaExceeded, now)
                    .await?;
                tx.commit().await?;
                info!(broadcast_id, error = %e, "Broadcast blocked by quota");
                return Ok(());
            }
            Err(e @ QuotaError::MetricNotInPlan(..)) => {
                Broadcast::finish(&mut *tx, broadcast_id, BroadcastStatus::Failed, now).await?;
                tx.commit().await?;
                error!(broadcast_id, error = %e, "Plan misconfigured, broadcast failed");
                return Err(TaskError::SkipRetry(e.to_string()));
            }
            Err(QuotaError::Database(e)) => return Err(e.into()),
        };

        let expires_at = (now + Plan::get(consumption.plan).retention).unix_timestamp();
        let slices = partition(&recipients);
        let batch_ids = BroadcastBatch::insert_many_tx(&mut tx, broadcast_id, &slices).await?;
        for (batch_id, slice) in batch_ids.iter().zip(&slices) {
            let delivery = BroadcastDeliveryPayload {
                project_id: job.project_id,
                broadcast_id,
                batch_id: *batch_id,
                recipients: slice.to_vec(),
                target: target.clone(),
                payload: broadcast.payload.clone(),
                expires_at,
            };
            self.queue.enqueue_tx(&mut tx, &delivery).await?;
        }
        tx.commit().await?;
        self.queue.wake();

        info!(
            broadcast_id,
            recipients = recipients.len(),
            batches = batch_ids.len(),
            "Broadcast batches prepared"
        );
        Ok(())
    }
}

#[async_trait]
impl TaskHandler for PrepareBatchesHandler {
    #[tracing::instrument(skip_all, err, fields(task_id = ctx.task_id, attempt = ctx.attempt()))]
    async fn handle(&self, ctx: &TaskContext, payload: serde_json::Value) -> Result<(), TaskError> {
        let job: PrepareBatchesPayload = decode(payload)?;
        self.prepare(job).await
    }

    /// Without batches nothing else would ever finish the broadcast.
    async fn on_exhausted(
        &self,
        _ctx: &TaskContext,
        payload: serde_json::Value,
    ) -> Result<(), TaskError> {
        let job: PrepareBatchesPayload = decode(payload)?;
        let now = OffsetDateTime::now_utc();
        if Broadcast::fail_unprepared(&self.pool, job.broadcast_id, now).await? {
            warn!(broadcast_id = job.broadcast_id, "Batch preparation gave up, broadcast failed");
        }
        Ok(())
    }
}

pub struct BroadcastDeliveryHandler {
    pool: PgPool,
}

impl BroadcastDeliveryHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_notifications(
        &self,
        job: &BroadcastDeliveryPayload,
        expires_at: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let inserted = Notification::insert_broadcast_batch_tx(
            &mut tx,
            job.project_id,
            job.broadcast_id,
            &job.recipients,
            &job.target,
            &job.payload,
            expires_at,
        )
        .await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn deliver(&self, ctx: &TaskContext, job: BroadcastDeliveryPayload) -> Result<(), TaskError> {
        let started = Instant::now();
        let attempt = ctx.attempt();
        let expires_at = OffsetDateTime::from_unix_timestamp(job.expires_at)
            .map_err(|e| TaskError::SkipRetry(format!("invalid expires_at: {e}")))?;

        if !BroadcastBatch::mark_processing(&self.pool, job.batch_id, attempt).await? {
            debug!(batch_id = job.batch_id, "Batch already settled or removed");
            settle_broadcast(&self.pool, job.broadcast_id).await?;
            return Ok(());
        }

        let outcome = self.insert_notifications(&job, expires_at).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(inserted) => {
                BroadcastBatch::mark_attempted(
                    &self.pool,
                    job.batch_id,
                    BatchStatus::Completed,
                    attempt,
                    duration_ms,
                )
                .await?;
                info!(
                    broadcast_id = job.broadcast_id,
                    batch_id = job.batch_id,
                    inserted,
                    duration_ms,
                    "Batch delivered"
                );
                settle_broadcast(&self.pool, job.broadcast_id).await?;
                Ok(())
            }
            Err(e) => {
                let status = if ctx.is_final_attempt() {
                    BatchStatus::Failed
                } else {
                    BatchStatus::Pending
                };
                BroadcastBatch::mark_attempted(&self.pool, job.batch_id, status, attempt, duration_ms)
                    .await?;
                warn!(
                    broadcast_id = job.broadcast_id,
                    batch_id = job.batch_id,
                    attempt,
                    status = ?status,
                    error = %e,
                    "Batch delivery failed"
                );
                settle_broadcast(&self.pool, job.broadcast_id).await?;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl TaskHandler for BroadcastDeliveryHandler {
    #[tracing::instrument(skip_all, err, fields(task_id = ctx.task_id, attempt = ctx.attempt()))]
    async fn handle(&self, ctx: &TaskContext, payload: serde_json::Value) -> Result<(), TaskError> {
        let job: BroadcastDeliveryPayload = decode(payload)?;
        self.deliver(ctx, job).await
    }

    /// The batch may still be `processing` if the last attempt died or could
    /// not record its outcome.
    async fn on_exhausted(
        &self,
        _ctx: &TaskContext,
        payload: serde_json::Value,
    ) -> Result<(), TaskError> {
        let job: BroadcastDeliveryPayload = decode(payload)?;
        if BroadcastBatch::fail_unfinished(&self.pool, job.batch_id).await? {
            warn!(
                broadcast_id = job.broadcast_id,
                batch_id = job.batch_id,
                "Batch out of retries, marked failed"
            );
        }
        settle_broadcast(&self.pool, job.broadcast_id).await?;
        Ok(())
    }
}

/// Terminal status of a broadcast whose batches have all finished.
pub fn settled_status(failed_batches: i64) -> BroadcastStatus {
    if failed_batches == 0 {
        BroadcastStatus::Completed
    } else {
        BroadcastStatus::Failed
    }
}

/// Finish the broadcast if none of its batches is pending or processing.
///
/// Safe to call any number of times and from concurrent deliveries: counts
/// are read from the batch rows, and only the first finishing write lands.
pub async fn settle_broadcast(pool: &PgPool, broadcast_id: i64) -> Result<(), sqlx::Error> {
    let unfinished = BroadcastBatch::count_unfinished(pool, broadcast_id).await?;
    if unfinished > 0 {
        debug!(broadcast_id, unfinished, "Broadcast still has unfinished batches");
        return Ok(());
    }
    let failed = BroadcastBatch::count_failed(pool, broadcast_id).await?;
    let status = settled_status(failed);
    if Broadcast::finish(pool, broadcast_id, status, OffsetDateTime::now_utc()).await? {
        info!(broadcast_id, status = ?status, failed_batches = failed, "Broadcast settled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_status() {
        assert_eq!(settled_status(0), BroadcastStatus::Completed);
        assert_eq!(settled_status(1), BroadcastStatus::Failed);
    }

    #[test]
    fn test_delivery_payload_is_self_contained() {
        let payload = BroadcastDeliveryPayload {
            project_id: 1,
            broadcast_id: 2,
            batch_id: 3,
            recipients: vec!["alice".into(), "bob".into()],
            target: Target::new("posts", "rust", "new_comment"),
            payload: serde_json::json!({"title": "hi"}),
            expires_at: 1_700_000_000,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["target"]["topic"], "rust");
        assert_eq!(json["recipients"][1], "bob");
        let decoded: BroadcastDeliveryPayload = decode(json).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_prepare_payload_rejects_missing_fields() {
        let result = decode::<PrepareBatchesPayload>(serde_json::json!({"broadcast_id": 1}));
        assert!(matches!(result, Err(TaskError::Malformed(_))));
    }
}
