use crate::entities::BroadcastStatus;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use herald_sdk::objects::{Broadcast as SdkBroadcast, Target};
use kanau::processor::Processor;
use time::OffsetDateTime;

const BROADCAST_COLUMNS: &str =
    "id, project_id, channel, topic, event, payload, status, completed_at, created_at";

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Broadcast {
    pub id: i64,
    pub project_id: i64,
    pub channel: CompactString,
    pub topic: CompactString,
    pub event: CompactString,
    pub payload: serde_json::Value,
    pub status: BroadcastStatus,
    /// Set exactly once, when the broadcast reaches a terminal status.
    pub completed_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl Broadcast {
    pub fn target(&self) -> Target {
        Target::new(self.channel.clone(), self.topic.clone(), self.event.clone())
    }

    pub fn is_terminal(&self) -> bool {
        self.status != BroadcastStatus::Enqueued
    }

    pub fn to_object(&self) -> SdkBroadcast {
        SdkBroadcast {
            id: self.id,
            target: self.target(),
            payload: self.payload.clone(),
            status: self.status.into(),
            completed_at: self.completed_at.map(super::unix),
            created_at: super::unix(self.created_at),
        }
    }

    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
        target: &Target,
        payload: &serde_json::Value,
    ) -> Result<Broadcast, sqlx::Error> {
        let sql = format!(
            "INSERT INTO broadcasts (project_id, channel, topic, event, payload, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {BROADCAST_COLUMNS}"
        );
        sqlx::query_as::<_, Broadcast>(&sql)
            .bind(project_id)
            .bind(target.channel.as_str())
            .bind(target.topic.as_str())
            .bind(target.event.as_str())
            .bind(payload)
            .bind(BroadcastStatus::Enqueued)
            .fetch_one(&mut **tx)
            .await
    }

    /// Load the broadcast and hold its row lock until the transaction ends.
    pub async fn lock_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        broadcast_id: i64,
    ) -> Result<Option<Broadcast>, sqlx::Error> {
        let sql = format!("SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Broadcast>(&sql)
            .bind(broadcast_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Move an unfinished broadcast to a terminal status.
    ///
    /// Only the first call stamps `completed_at`; later calls match no row and
    /// return `false`.
    pub async fn finish<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        broadcast_id: i64,
        status: BroadcastStatus,
        now: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE broadcasts SET status = $2, completed_at = $3
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(broadcast_id)
        .bind(status)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fail a broadcast whose batches were never written.
    ///
    /// Once batches exist their deliveries settle the broadcast, so this
    /// matches no row then.
    pub async fn fail_unprepared<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        broadcast_id: i64,
        now: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE broadcasts SET status = 'failed', completed_at = $2
            WHERE id = $1
              AND completed_at IS NULL
              AND NOT EXISTS (SELECT 1 FROM broadcast_batches WHERE broadcast_id = $1)
            "#,
        )
        .bind(broadcast_id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_project_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM broadcasts WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetBroadcast {
    pub project_id: i64,
    pub broadcast_id: i64,
}

impl Processor<GetBroadcast> for DatabaseProcessor {
    type Output = Option<Broadcast>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBroadcast")]
    async fn process(&self, query: GetBroadcast) -> Result<Option<Broadcast>, sqlx::Error> {
        let sql =
            format!("SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, Broadcast>(&sql)
            .bind(query.broadcast_id)
            .bind(query.project_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListBroadcasts {
    pub project_id: i64,
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListBroadcasts> for DatabaseProcessor {
    type Output = Vec<Broadcast>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListBroadcasts")]
    async fn process(&self, query: ListBroadcasts) -> Result<Vec<Broadcast>, sqlx::Error> {
        let sql = format!(
            "SELECT {BROADCAST_COLUMNS} FROM broadcasts WHERE project_id = $1 \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Broadcast>(&sql)
            .bind(query.project_id)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Delete settled broadcasts with their batches. `None` deletes every
/// settled broadcast of the project. Broadcasts still `enqueued` are kept.
///
/// Notifications already delivered stay in their inboxes.
pub struct DeleteBroadcasts {
    pub project_id: i64,
    pub ids: Option<Vec<i64>>,
}

impl Processor<DeleteBroadcasts> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteBroadcasts")]
    async fn process(&self, query: DeleteBroadcasts) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let doomed = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM broadcasts
            WHERE project_id = $1
              AND status <> 'enqueued'
              AND ($2::bigint[] IS NULL OR id = ANY($2))
            FOR UPDATE
            "#,
        )
        .bind(query.project_id)
        .bind(query.ids)
        .fetch_all(&mut *tx)
        .await?;
        if doomed.is_empty() {
            return Ok(0);
        }
        sqlx::query("DELETE FROM broadcast_batches WHERE broadcast_id = ANY($1)")
            .bind(&doomed)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM broadcasts WHERE id = ANY($1)")
            .bind(&doomed)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
