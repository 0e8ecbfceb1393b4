use crate::entities::NotificationStatus;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use herald_sdk::objects::Target;
use herald_sdk::objects::notification::{Notification as SdkNotification, ProjectOverview};
use kanau::processor::Processor;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

const NOTIFICATION_COLUMNS: &str = "id, project_id, recipient_external_id, broadcast_id, channel, topic, event, payload, status, read_at, opened_at, expires_at, created_at";

/// Rows per multi-value INSERT. Postgres caps bind parameters at 65535.
const INSERT_CHUNK: usize = 1000;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub project_id: i64,
    pub recipient_external_id: String,
    pub broadcast_id: Option<i64>,
    pub channel: CompactString,
    pub topic: CompactString,
    pub event: CompactString,
    pub payload: serde_json::Value,
    pub status: NotificationStatus,
    pub read_at: Option<OffsetDateTime>,
    pub opened_at: Option<OffsetDateTime>,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl Notification {
    pub fn target(&self) -> Target {
        Target::new(self.channel.clone(), self.topic.clone(), self.event.clone())
    }

    pub fn to_object(&self) -> SdkNotification {
        SdkNotification {
            id: self.id,
            recipient_id: self.recipient_external_id.clone(),
            broadcast_id: self.broadcast_id,
            target: self.target(),
            payload: self.payload.clone(),
            status: self.status.into(),
            read_at: self.read_at.map(super::unix),
            opened_at: self.opened_at.map(super::unix),
            expires_at: super::unix(self.expires_at),
            created_at: super::unix(self.created_at),
        }
    }
}

/// A notification about to be written.
#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
    pub project_id: i64,
    pub recipient_external_id: &'a str,
    pub broadcast_id: Option<i64>,
    pub target: &'a Target,
    pub payload: &'a serde_json::Value,
    pub status: NotificationStatus,
    pub expires_at: OffsetDateTime,
}

impl Notification {
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        new: NewNotification<'_>,
    ) -> Result<Notification, sqlx::Error> {
        let sql = format!(
            "INSERT INTO notifications \
             (project_id, recipient_external_id, broadcast_id, channel, topic, event, payload, status, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {NOTIFICATION_COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&sql)
            .bind(new.project_id)
            .bind(new.recipient_external_id)
            .bind(new.broadcast_id)
            .bind(new.target.channel.as_str())
            .bind(new.target.topic.as_str())
            .bind(new.target.event.as_str())
            .bind(new.payload)
            .bind(new.status)
            .bind(new.expires_at)
            .fetch_one(&mut **tx)
            .await
    }

    /// Write one delivered notification per recipient of a broadcast batch.
    ///
    /// Recipients that already hold a notification for this broadcast are
    /// skipped, so a redelivered batch writes nothing twice. Returns the
    /// number of rows actually inserted.
    pub async fn insert_broadcast_batch_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
        broadcast_id: i64,
        recipients: &[String],
        target: &Target,
        payload: &serde_json::Value,
        expires_at: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let mut inserted = 0;
        for chunk in recipients.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO notifications \
                 (project_id, recipient_external_id, broadcast_id, channel, topic, event, payload, status, expires_at) ",
            );
            builder.push_values(chunk, |mut row, recipient| {
                row.push_bind(project_id)
                    .push_bind(recipient.as_str())
                    .push_bind(broadcast_id)
                    .push_bind(target.channel.as_str())
                    .push_bind(target.topic.as_str())
                    .push_bind(target.event.as_str())
                    .push_bind(payload)
                    .push_bind(NotificationStatus::Delivered)
                    .push_bind(expires_at);
            });
            builder.push(
                " ON CONFLICT (broadcast_id, recipient_external_id) \
                 WHERE broadcast_id IS NOT NULL DO NOTHING",
            );
            inserted += builder.build().execute(&mut **tx).await?.rows_affected();
        }
        Ok(inserted)
    }

    pub async fn delete_for_recipient_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
        external_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE project_id = $1 AND recipient_external_id = $2",
        )
        .bind(project_id)
        .bind(external_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_for_project_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        project_id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    /// Ids strictly lower than the cursor, newest first.
    Before(i64),
    /// Ids strictly higher than the cursor, still returned newest first.
    After(i64),
    Latest,
}

#[derive(Debug, Clone)]
/// One page of a recipient's unexpired notifications, newest first.
pub struct ListRecipientNotifications {
    pub project_id: i64,
    pub external_id: String,
    pub direction: CursorDirection,
    pub limit: i64,
    pub now: OffsetDateTime,
}

impl Processor<ListRecipientNotifications> for DatabaseProcessor {
    type Output = Vec<Notification>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListRecipientNotifications")]
    async fn process(
        &self,
        query: ListRecipientNotifications,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(NOTIFICATION_COLUMNS);
        builder.push(" FROM notifications WHERE project_id = ");
        builder.push_bind(query.project_id);
        builder.push(" AND recipient_external_id = ");
        builder.push_bind(query.external_id);
        builder.push(" AND expires_at > ");
        builder.push_bind(query.now);
        match query.direction {
            CursorDirection::Before(id) => {
                builder.push(" AND id < ").push_bind(id);
                builder.push(" ORDER BY id DESC LIMIT ").push_bind(query.limit);
            }
            CursorDirection::After(id) => {
                // Take the oldest rows above the cursor, then flip to newest first.
                builder.push(" AND id > ").push_bind(id);
                builder.push(" ORDER BY id ASC LIMIT ").push_bind(query.limit);
            }
            CursorDirection::Latest => {
                builder.push(" ORDER BY id DESC LIMIT ").push_bind(query.limit);
            }
        }
        let mut rows = builder
            .build_query_as::<Notification>()
            .fetch_all(&self.pool)
            .await?;
        if matches!(query.direction, CursorDirection::After(_)) {
            rows.reverse();
        }
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
pub struct CountUnreadNotifications {
    pub project_id: i64,
    pub external_id: String,
    pub now: OffsetDateTime,
}

impl Processor<CountUnreadNotifications> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountUnreadNotifications")]
    async fn process(&self, query: CountUnreadNotifications) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE project_id = $1
              AND recipient_external_id = $2
              AND read_at IS NULL
              AND expires_at > $3
            "#,
        )
        .bind(query.project_id)
        .bind(query.external_id)
        .bind(query.now)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Set or clear read/opened timestamps. An empty `ids` targets every
/// notification of the recipient.
pub struct UpdateNotificationState {
    pub project_id: i64,
    pub external_id: String,
    pub ids: Vec<i64>,
    pub read: Option<bool>,
    pub opened: Option<bool>,
    pub now: OffsetDateTime,
}

impl Processor<UpdateNotificationState> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateNotificationState")]
    async fn process(&self, update: UpdateNotificationState) -> Result<u64, sqlx::Error> {
        if update.read.is_none() && update.opened.is_none() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE notifications SET ");
        let mut assignments = builder.separated(", ");
        if let Some(read) = update.read {
            assignments.push("read_at = ");
            assignments.push_bind_unseparated(read.then_some(update.now));
        }
        if let Some(opened) = update.opened {
            assignments.push("opened_at = ");
            assignments.push_bind_unseparated(opened.then_some(update.now));
        }
        builder.push(" WHERE project_id = ");
        builder.push_bind(update.project_id);
        builder.push(" AND recipient_external_id = ");
        builder.push_bind(update.external_id);
        if !update.ids.is_empty() {
            builder.push(" AND id = ANY(").push_bind(update.ids).push(")");
        }
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Delete notifications. An empty `ids` deletes all of the recipient's.
pub struct DeleteRecipientNotifications {
    pub project_id: i64,
    pub external_id: String,
    pub ids: Vec<i64>,
}

impl Processor<DeleteRecipientNotifications> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteRecipientNotifications")]
    async fn process(&self, query: DeleteRecipientNotifications) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE project_id = $1
              AND recipient_external_id = $2
              AND (cardinality($3::bigint[]) = 0 OR id = ANY($3))
            "#,
        )
        .bind(query.project_id)
        .bind(query.external_id)
        .bind(query.ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetProjectOverview {
    pub project_id: i64,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
struct OverviewRow {
    total_direct_sent: i64,
    total_broadcasts_sent: i64,
    total_notifications: i64,
}

impl Processor<GetProjectOverview> for DatabaseProcessor {
    type Output = ProjectOverview;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetProjectOverview")]
    async fn process(&self, query: GetProjectOverview) -> Result<ProjectOverview, sqlx::Error> {
        let row = sqlx::query_as::<_, OverviewRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM notifications
                  WHERE project_id = $1 AND broadcast_id IS NULL) AS total_direct_sent,
                (SELECT COUNT(*) FROM broadcasts WHERE project_id = $1) AS total_broadcasts_sent,
                (SELECT COUNT(*) FROM notifications WHERE project_id = $1) AS total_notifications
            "#,
        )
        .bind(query.project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(ProjectOverview {
            total_direct_sent: row.total_direct_sent,
            total_broadcasts_sent: row.total_broadcasts_sent,
            total_notifications: row.total_notifications,
        })
    }
}
