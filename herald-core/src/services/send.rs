use super::{ProjectContext, ServiceError};
use crate::entities::NotificationStatus;
use crate::entities::broadcast::Broadcast;
use crate::entities::notification::{NewNotification, Notification};
use crate::entities::plan::{Metric, Plan, PlanId};
use crate::entities::preference::ProjectPreferenceExists;
use crate::entities::recipient::{Recipient, normalize_external_id};
use crate::framework::DatabaseProcessor;
use crate::processors::PrepareBatchesPayload;
use crate::queue::TaskQueue;
use crate::quota::{QuotaError, UsageEvent, check_and_consume};
use crate::resolution::resolve_for_recipient;
use herald_sdk::objects::send::{SendRequest, SendResponse};
use herald_sdk::objects::{Target, Validate, ValidationErrors};
use kanau::processor::Processor;
use time::OffsetDateTime;
use tracing::info;

pub const MUTED_MESSAGE: &str =
    "No notification was sent. Recipient's preferences do not allow delivery.";
pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "Notification was recorded but not delivered: the notification quota for this period is exhausted.";
pub const BROADCAST_MESSAGE: &str =
    "Broadcast created. It will be delivered to all eligible recipients.";

pub struct SendService {
    db: DatabaseProcessor,
    queue: TaskQueue,
}

impl SendService {
    pub fn new(db: DatabaseProcessor, queue: TaskQueue) -> Self {
        Self { db, queue }
    }

    /// Send to one recipient, or broadcast when no recipient is given.
    pub async fn send(
        &self,
        ctx: ProjectContext,
        request: SendRequest,
    ) -> Result<SendResponse, ServiceError> {
        request.validate()?;
        let SendRequest {
            recipient_id,
            target,
            payload,
        } = request;
        let Some(target) = target else {
            return Err(ValidationErrors::single(
                "Target is required",
                "Every notification needs a channel, topic and event",
                "target",
                serde_json::Value::Null,
            )
            .into());
        };
        match recipient_id {
            Some(recipient_id) => {
                self.send_direct(ctx, &normalize_external_id(&recipient_id), target, payload)
                    .await
            }
            None => self.send_broadcast(ctx, target, payload).await,
        }
    }

    async fn send_direct(
        &self,
        ctx: ProjectContext,
        external_id: &str,
        target: Target,
        payload: serde_json::Value,
    ) -> Result<SendResponse, ServiceError> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.begin().await?;

        // Direct sends may address recipients the tenant never registered.
        Recipient::create_if_missing(&mut tx, ctx.project_id, external_id).await?;

        let resolution = resolve_for_recipient(&mut tx, ctx.project_id, external_id, &target).await?;
        if !resolution.enabled {
            tx.commit().await?;
            info!(project_id = ctx.project_id, recipient_id = external_id, target = %target, "Direct send muted by preferences");
            return Ok(SendResponse {
                notification: None,
                broadcast: None,
                message: MUTED_MESSAGE.to_string(),
            });
        }

        let event = UsageEvent {
            user_id: ctx.user_id,
            project_id: ctx.project_id,
            metric: Metric::Notifications,
            amount: 1,
        };
        let (status, plan) = match check_and_consume(&mut tx.tx, &event, now).await {
            Ok(consumption) => (NotificationStatus::Delivered, consumption.plan),
            Err(QuotaError::QuotaExceeded { plan, .. }) => (NotificationStatus::QuotaExceeded, plan),
            Err(e) => return Err(e.into()),
        };

        let notification = Notification::insert_tx(
            &mut tx.tx,
            NewNotification {
                project_id: ctx.project_id,
                recipient_external_id: external_id,
                broadcast_id: None,
                target: &target,
                payload: &payload,
                status,
                expires_at: now + Plan::get(plan).retention,
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            project_id = ctx.project_id,
            notification_id = notification.id,
            status = ?status,
            "Direct notification recorded"
        );
        Ok(SendResponse {
            message: direct_message(status, plan, external_id),
            notification: Some(notification.to_object()),
            broadcast: None,
        })
    }

    async fn send_broadcast(
        &self,
        ctx: ProjectContext,
        target: Target,
        payload: serde_json::Value,
    ) -> Result<SendResponse, ServiceError> {
        let defined = self
            .db
            .process(ProjectPreferenceExists {
                project_id: ctx.project_id,
                target: target.clone(),
            })
            .await?;
        if !defined {
            return Err(ValidationErrors::single(
                "No matching project preference",
                "Create a project preference for this target before broadcasting to it",
                "target",
                &target,
            )
            .into());
        }

        let mut tx = self.db.pool.begin().await?;
        let broadcast = Broadcast::insert_tx(&mut tx, ctx.project_id, &target, &payload).await?;
        self.queue
            .enqueue_tx(
                &mut tx,
                &PrepareBatchesPayload {
                    user_id: ctx.user_id,
                    project_id: ctx.project_id,
                    broadcast_id: broadcast.id,
                },
            )
            .await?;
        tx.commit().await?;
        self.queue.wake();

        info!(project_id = ctx.project_id, broadcast_id = broadcast.id, target = %target, "Broadcast enqueued");
        Ok(SendResponse {
            notification: None,
            broadcast: Some(broadcast.to_object()),
            message: BROADCAST_MESSAGE.to_string(),
        })
    }
}

fn direct_message(status: NotificationStatus, plan: PlanId, external_id: &str) -> String {
    match status {
        NotificationStatus::Delivered => {
            format!("Direct notification sent successfully to recipient {external_id}.")
        }
        NotificationStatus::QuotaExceeded => format!("{QUOTA_EXCEEDED_MESSAGE} Plan: {plan}."),
    }
}
