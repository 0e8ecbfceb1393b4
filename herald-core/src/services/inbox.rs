//! A recipient's notifications.

use super::{ProjectContext, ServiceError};
use crate::entities::notification::{
    CountUnreadNotifications, CursorDirection, DeleteRecipientNotifications,
    ListRecipientNotifications, Notification as NotificationRow, UpdateNotificationState,
};
use crate::entities::recipient::normalize_external_id;
use crate::framework::DatabaseProcessor;
use herald_sdk::objects::notification::{
    Cursor, DeleteNotificationsRequest, NotificationCursorQuery, NotificationPage, UnreadCount,
    UpdateNotificationsRequest,
};
use herald_sdk::objects::{Affected, Validate};
use kanau::processor::Processor;
use time::OffsetDateTime;

pub struct InboxService {
    db: DatabaseProcessor,
}

impl InboxService {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
        query: NotificationCursorQuery,
    ) -> Result<NotificationPage, ServiceError> {
        query.validate()?;
        let direction = match (query.before, query.after) {
            (Some(before), _) => CursorDirection::Before(before),
            (None, Some(after)) => CursorDirection::After(after),
            (None, None) => CursorDirection::Latest,
        };
        let rows = self
            .db
            .process(ListRecipientNotifications {
                project_id: ctx.project_id,
                external_id: normalize_external_id(recipient_id),
                direction,
                limit: query.limit,
                now: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(NotificationPage {
            cursor: page_cursor(&rows),
            notifications: rows.iter().map(NotificationRow::to_object).collect(),
        })
    }

    pub async fn unread_count(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
    ) -> Result<UnreadCount, ServiceError> {
        let unread_count = self
            .db
            .process(CountUnreadNotifications {
                project_id: ctx.project_id,
                external_id: normalize_external_id(recipient_id),
                now: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(UnreadCount { unread_count })
    }

    pub async fn update_state(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
        request: UpdateNotificationsRequest,
    ) -> Result<Affected, ServiceError> {
        request.validate()?;
        let affected = self
            .db
            .process(UpdateNotificationState {
                project_id: ctx.project_id,
                external_id: normalize_external_id(recipient_id),
                ids: request.ids,
                read: request.state.read,
                opened: request.state.opened,
                now: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(Affected { affected })
    }

    pub async fn delete(
        &self,
        ctx: ProjectContext,
        recipient_id: &str,
        request: DeleteNotificationsRequest,
    ) -> Result<Affected, ServiceError> {
        let affected = self
            .db
            .process(DeleteRecipientNotifications {
                project_id: ctx.project_id,
                external_id: normalize_external_id(recipient_id),
                ids: request.ids,
            })
            .await?;
        Ok(Affected { affected })
    }
}

/// Cursors pointing past both ends of a newest-first page.
fn page_cursor(rows: &[NotificationRow]) -> Cursor {
    Cursor {
        before: rows.last().map(|n| n.id),
        after: rows.first().map(|n| n.id),
    }
}
