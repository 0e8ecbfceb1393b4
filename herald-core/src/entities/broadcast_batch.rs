use crate::entities::BatchStatus;
use crate::framework::DatabaseProcessor;
use herald_sdk::objects::BroadcastBatch as SdkBroadcastBatch;
use kanau::processor::Processor;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

/// A batch without its recipient list, which can be large.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BroadcastBatchSummary {
    pub id: i64,
    pub broadcast_id: i64,
    pub status: BatchStatus,
    pub attempt: i32,
    pub duration_ms: Option<i64>,
    pub recipient_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl BroadcastBatchSummary {
    pub fn to_object(&self) -> SdkBroadcastBatch {
        SdkBroadcastBatch {
            id: self.id,
            status: self.status.into(),
            attempt: self.attempt,
            duration_ms: self.duration_ms,
            recipient_count: self.recipient_count,
        }
    }
}

/// Per-status recipient totals of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct BatchRecipientCounts {
    pub delivered: i64,
    pub failed: i64,
}

/// Namespace for batch writes that share the caller's transaction or
/// executor.
pub struct BroadcastBatch;

impl BroadcastBatch {
    /// Persist one `pending` batch per slice and return their ids in order.
    pub async fn insert_many_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        broadcast_id: i64,
        slices: &[&[String]],
    ) -> Result<Vec<i64>, sqlx::Error> {
        if slices.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO broadcast_batches (broadcast_id, recipients, status) ");
        builder.push_values(slices, |mut row, slice| {
            row.push_bind(broadcast_id)
                .push_bind(*slice)
                .push_bind(BatchStatus::Pending);
        });
        builder.push(" RETURNING id");
        // Postgres returns rows of a multi-value INSERT in VALUES order.
        builder
            .build_query_scalar::<i64>()
            .fetch_all(&mut **tx)
            .await
    }

    pub async fn exists_for_broadcast_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        broadcast_id: i64,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM broadcast_batches WHERE broadcast_id = $1)",
        )
        .bind(broadcast_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Claim a batch for delivery. Returns `false` when the batch is gone or
    /// has already reached a terminal status.
    pub async fn mark_processing<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        batch_id: i64,
        attempt: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE broadcast_batches
            SET status = 'processing', attempt = $2, updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(batch_id)
        .bind(attempt)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the outcome of one delivery attempt.
    pub async fn mark_attempted<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        batch_id: i64,
        status: BatchStatus,
        attempt: i32,
        duration_ms: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE broadcast_batches
            SET status = $2, attempt = $3, duration_ms = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .bind(status)
        .bind(attempt)
        .bind(duration_ms)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Fail a batch that never finished. Returns `false` when it already
    /// reached a terminal status or is gone.
    pub async fn fail_unfinished<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        batch_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE broadcast_batches SET status = 'failed', updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(batch_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Batches still `pending` or `processing`.
    pub async fn count_unfinished<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        broadcast_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM broadcast_batches
            WHERE broadcast_id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(broadcast_id)
        .fetch_one(executor)
        .await
    }

    pub async fn count_failed<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        broadcast_id: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM broadcast_batches WHERE broadcast_id = $1 AND status = 'failed'",
        )
        .bind(broadcast_id)
        .fetch_one(executor)
        .await
    }

    pub async fn delete_for_project_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM broadcast_batches
            WHERE broadcast_id IN (SELECT id FROM broadcasts WHERE project_id = $1)
            "#,
        )
        .bind(project_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListBroadcastBatches {
    pub broadcast_id: i64,
}

impl Processor<ListBroadcastBatches> for DatabaseProcessor {
    type Output = Vec<BroadcastBatchSummary>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListBroadcastBatches")]
    async fn process(
        &self,
        query: ListBroadcastBatches,
    ) -> Result<Vec<BroadcastBatchSummary>, sqlx::Error> {
        sqlx::query_as::<_, BroadcastBatchSummary>(
            r#"
            SELECT id, broadcast_id, status, attempt, duration_ms,
                   cardinality(recipients)::bigint AS recipient_count,
                   created_at, updated_at
            FROM broadcast_batches
            WHERE broadcast_id = $1
            ORDER BY id
            "#,
        )
        .bind(query.broadcast_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetBatchRecipientCounts {
    pub broadcast_id: i64,
}

impl Processor<GetBatchRecipientCounts> for DatabaseProcessor {
    type Output = BatchRecipientCounts;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBatchRecipientCounts")]
    async fn process(
        &self,
        query: GetBatchRecipientCounts,
    ) -> Result<BatchRecipientCounts, sqlx::Error> {
        sqlx::query_as::<_, BatchRecipientCounts>(
            r#"
            SELECT
                COALESCE(SUM(cardinality(recipients)) FILTER (WHERE status = 'completed'), 0)::bigint AS delivered,
                COALESCE(SUM(cardinality(recipients)) FILTER (WHERE status = 'failed'), 0)::bigint AS failed
            FROM broadcast_batches
            WHERE broadcast_id = $1
            "#,
        )
        .bind(query.broadcast_id)
        .fetch_one(&self.pool)
        .await
    }
}
