use super::{ProjectContext, ServiceError};
use crate::entities::broadcast::{
    Broadcast as BroadcastRow, DeleteBroadcasts, GetBroadcast, ListBroadcasts,
};
use crate::entities::broadcast_batch::{GetBatchRecipientCounts, ListBroadcastBatches};
use crate::entities::notification::GetProjectOverview;
use crate::framework::DatabaseProcessor;
use herald_sdk::objects::notification::ProjectOverview;
use herald_sdk::objects::{
    Affected, Broadcast, BroadcastDetail, DeleteBroadcastsRequest, PageQuery, Validate,
    clamp_pagination,
};
use kanau::processor::Processor;
use tracing::info;

pub struct BroadcastService {
    db: DatabaseProcessor,
}

impl BroadcastService {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }

    pub async fn list(&self, ctx: ProjectContext, page: PageQuery) -> Result<Vec<Broadcast>, ServiceError> {
        let (limit, offset) = clamp_pagination(page.limit, page.offset);
        let broadcasts = self
            .db
            .process(ListBroadcasts {
                project_id: ctx.project_id,
                limit,
                offset,
            })
            .await?;
        Ok(broadcasts.iter().map(BroadcastRow::to_object).collect())
    }

    /// A broadcast with its batches and per-outcome recipient counts.
    pub async fn get(&self, ctx: ProjectContext, broadcast_id: i64) -> Result<BroadcastDetail, ServiceError> {
        let broadcast = self
            .db
            .process(GetBroadcast {
                project_id: ctx.project_id,
                broadcast_id,
            })
            .await?
            .ok_or(ServiceError::NotFound("broadcast"))?;
        let batches = self.db.process(ListBroadcastBatches { broadcast_id }).await?;
        let counts = self.db.process(GetBatchRecipientCounts { broadcast_id }).await?;
        Ok(BroadcastDetail {
            broadcast: broadcast.to_object(),
            batches: batches.iter().map(|b| b.to_object()).collect(),
            delivered_recipient_count: counts.delivered,
            failed_recipient_count: counts.failed,
        })
    }

    /// Delete the given settled broadcasts. Unknown ids and broadcasts still
    /// being delivered are skipped.
    pub async fn delete(
        &self,
        ctx: ProjectContext,
        request: DeleteBroadcastsRequest,
    ) -> Result<Affected, ServiceError> {
        request.validate()?;
        let affected = self
            .db
            .process(DeleteBroadcasts {
                project_id: ctx.project_id,
                ids: Some(request.ids),
            })
            .await?;
        info!(project_id = ctx.project_id, affected, "Broadcasts deleted");
        Ok(Affected { affected })
    }

    /// Delete every settled broadcast of the project.
    pub async fn delete_all(&self, ctx: ProjectContext) -> Result<Affected, ServiceError> {
        let affected = self
            .db
            .process(DeleteBroadcasts {
                project_id: ctx.project_id,
                ids: None,
            })
            .await?;
        info!(project_id = ctx.project_id, affected, "All settled broadcasts deleted");
        Ok(Affected { affected })
    }

    pub async fn overview(&self, ctx: ProjectContext) -> Result<ProjectOverview, ServiceError> {
        Ok(self
            .db
            .process(GetProjectOverview {
                project_id: ctx.project_id,
            })
            .await?)
    }
}
