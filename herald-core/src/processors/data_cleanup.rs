//! Deletion of a recipient's or a whole project's data.
//!
//! Each handler removes everything in one transaction. Deleting rows that
//! are already gone is a no-op, so redelivery is harmless. Usage rows stay:
//! they count against the owning user, not the project.

use crate::entities::api_key::ApiKey;
use crate::entities::broadcast::Broadcast;
use crate::entities::broadcast_batch::BroadcastBatch;
use crate::entities::notification::Notification;
use crate::entities::preference::Preference;
use crate::entities::project::Project;
use crate::entities::recipient::Recipient;
use crate::queue::{TaskContext, TaskError, TaskHandler, TaskKind, TaskPayload, decode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRecipientDataPayload {
    pub project_id: i64,
    /// Normalized external id.
    pub recipient_id: String,
}

impl TaskPayload for DeleteRecipientDataPayload {
    const KIND: TaskKind = TaskKind::RecipientDeleteData;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProjectDataPayload {
    pub project_id: i64,
}

impl TaskPayload for DeleteProjectDataPayload {
    const KIND: TaskKind = TaskKind::ProjectDeleteData;
}

pub struct DeleteRecipientDataHandler {
    pool: PgPool,
}

impl DeleteRecipientDataHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskHandler for DeleteRecipientDataHandler {
    #[tracing::instrument(skip_all, err, fields(task_id = ctx.task_id))]
    async fn handle(&self, ctx: &TaskContext, payload: serde_json::Value) -> Result<(), TaskError> {
        let job: DeleteRecipientDataPayload = decode(payload)?;
        let mut tx = self.pool.begin().await?;
        let preferences =
            Preference::delete_for_recipient_tx(&mut tx, job.project_id, &job.recipient_id).await?;
        let notifications =
            Notification::delete_for_recipient_tx(&mut tx, job.project_id, &job.recipient_id)
                .await?;
        let recipients = Recipient::delete_tx(&mut tx, job.project_id, &job.recipient_id).await?;
        tx.commit().await?;
        info!(
            project_id = job.project_id,
            recipient_id = %job.recipient_id,
            preferences,
            notifications,
            recipients,
            "Recipient data deleted"
        );
        Ok(())
    }
}

pub struct DeleteProjectDataHandler {
    pool: PgPool,
}

impl DeleteProjectDataHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskHandler for DeleteProjectDataHandler {
    #[tracing::instrument(skip_all, err, fields(task_id = ctx.task_id))]
    async fn handle(&self, ctx: &TaskContext, payload: serde_json::Value) -> Result<(), TaskError> {
        let DeleteProjectDataPayload { project_id } = decode(payload)?;
        let mut tx = self.pool.begin().await?;
        ApiKey::delete_for_project_tx(&mut tx, project_id).await?;
        let notifications = Notification::delete_for_project_tx(&mut tx, project_id).await?;
        Preference::delete_for_project_tx(&mut tx, project_id).await?;
        let recipients = Recipient::delete_for_project_tx(&mut tx, project_id).await?;
        BroadcastBatch::delete_for_project_tx(&mut tx, project_id).await?;
        let broadcasts = Broadcast::delete_for_project_tx(&mut tx, project_id).await?;
        let projects = Project::delete_tx(&mut tx, project_id).await?;
        tx.commit().await?;
        info!(
            project_id,
            notifications, recipients, broadcasts, projects, "Project data deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kinds() {
        assert_eq!(DeleteRecipientDataPayload::KIND.as_str(), "recipient:delete_data");
        assert_eq!(DeleteProjectDataPayload::KIND.as_str(), "project:delete_data");
    }

    #[test]
    fn test_recipient_payload_shape() {
        let payload: DeleteRecipientDataPayload =
            decode(serde_json::json!({"project_id": 4, "recipient_id": "alice"})).unwrap();
        assert_eq!(payload.project_id, 4);
        assert_eq!(payload.recipient_id, "alice");
    }
}
