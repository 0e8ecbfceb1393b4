//! Notification objects and recipient inbox requests.

use serde::{Deserialize, Serialize};

use super::{Target, Validate, ValidationErrors};

const DEFAULT_CURSOR_LIMIT: i64 = 10;
const MAX_CURSOR_LIMIT: i64 = 100;

/// Notification status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `herald-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Delivered,
    QuotaExceeded,
}

/// A notification addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: String,
    pub broadcast_id: Option<i64>,
    pub target: Target,
    pub payload: serde_json::Value,
    pub status: NotificationStatus,
    pub read_at: Option<i64>,
    pub opened_at: Option<i64>,
    pub expires_at: i64,
    pub created_at: i64,
}

/// Cursor query for a recipient's notifications, newest first.
///
/// `before` pages towards older notifications, `after` towards newer ones.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationCursorQuery {
    pub before: Option<i64>,
    pub after: Option<i64>,
    #[serde(default = "default_cursor_limit")]
    pub limit: i64,
}

fn default_cursor_limit() -> i64 {
    DEFAULT_CURSOR_LIMIT
}

impl Validate for NotificationCursorQuery {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.before.is_some() && self.after.is_some() {
            errors.add(
                "Conflicting cursor",
                "Only one of before and after can be set",
                "before",
                self.before,
            );
        }
        if !(1..=MAX_CURSOR_LIMIT).contains(&self.limit) {
            errors.add(
                "Invalid limit",
                format!("Limit must be between 1 and {MAX_CURSOR_LIMIT}"),
                "limit",
                self.limit,
            );
        }
        errors.into_result()
    }
}

/// Cursor returned alongside a page of notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub before: Option<i64>,
    pub after: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub cursor: Cursor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread_count: i64,
}

/// Read/opened flags to set (`true`) or clear (`false`). `None` leaves the
/// flag untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStateUpdate {
    #[serde(default)]
    pub read: Option<bool>,
    #[serde(default)]
    pub opened: Option<bool>,
}

/// Body of `PATCH /v1/recipients/{recipient}/notifications`.
///
/// An empty `ids` list applies the update to all of the recipient's notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotificationsRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
    pub state: NotificationStateUpdate,
}

impl Validate for UpdateNotificationsRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        if self.state.read.is_none() && self.state.opened.is_none() {
            return Err(ValidationErrors::single(
                "Nothing to update",
                "Set at least one of state.read and state.opened",
                "state",
                &self.state,
            ));
        }
        Ok(())
    }
}

/// Body of `DELETE /v1/recipients/{recipient}/notifications`.
///
/// An empty `ids` list deletes all of the recipient's notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteNotificationsRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
}

/// Per-project delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub total_direct_sent: i64,
    pub total_broadcasts_sent: i64,
    pub total_notifications: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_query_defaults() {
        let query: NotificationCursorQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 10);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_cursor_query_rejects_both_directions() {
        let query = NotificationCursorQuery {
            before: Some(10),
            after: Some(2),
            limit: 10,
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_cursor_query_limit_bounds() {
        let query = NotificationCursorQuery {
            before: None,
            after: None,
            limit: 101,
        };
        assert_eq!(query.validate().unwrap_err().as_slice()[0].property, "limit");
    }

    #[test]
    fn test_update_requires_some_state() {
        let request: UpdateNotificationsRequest =
            serde_json::from_str(r#"{"state":{}}"#).unwrap();
        assert!(request.validate().is_err());

        let request: UpdateNotificationsRequest =
            serde_json::from_str(r#"{"ids":[1,2],"state":{"read":true}}"#).unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&NotificationStatus::QuotaExceeded).unwrap(),
            "\"quota_exceeded\""
        );
    }
}
