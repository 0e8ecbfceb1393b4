pub mod api_key;
pub mod broadcast;
pub mod broadcast_batch;
pub mod notification;
pub mod plan;
pub mod preference;
pub mod project;
pub mod recipient;
pub mod subscription;
pub mod usage;

use herald_sdk::objects::admin::ApiKeyScope as SdkApiKeyScope;
use herald_sdk::objects::{
    BatchStatus as SdkBatchStatus, BroadcastStatus as SdkBroadcastStatus,
    NotificationStatus as SdkNotificationStatus,
};

/// Notification status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `herald_sdk::objects::NotificationStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "notification_status")]
pub enum NotificationStatus {
    Delivered,
    QuotaExceeded,
}

impl From<NotificationStatus> for SdkNotificationStatus {
    fn from(value: NotificationStatus) -> Self {
        match value {
            NotificationStatus::Delivered => SdkNotificationStatus::Delivered,
            NotificationStatus::QuotaExceeded => SdkNotificationStatus::QuotaExceeded,
        }
    }
}

/// Broadcast status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `herald_sdk::objects::BroadcastStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "broadcast_status")]
pub enum BroadcastStatus {
    Enqueued,
    Completed,
    QuotaExceeded,
    Failed,
}

impl From<BroadcastStatus> for SdkBroadcastStatus {
    fn from(value: BroadcastStatus) -> Self {
        match value {
            BroadcastStatus::Enqueued => SdkBroadcastStatus::Enqueued,
            BroadcastStatus::Completed => SdkBroadcastStatus::Completed,
            BroadcastStatus::QuotaExceeded => SdkBroadcastStatus::QuotaExceeded,
            BroadcastStatus::Failed => SdkBroadcastStatus::Failed,
        }
    }
}

/// Broadcast batch status for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "batch_status")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<BatchStatus> for SdkBatchStatus {
    fn from(value: BatchStatus) -> Self {
        match value {
            BatchStatus::Pending => SdkBatchStatus::Pending,
            BatchStatus::Processing => SdkBatchStatus::Processing,
            BatchStatus::Completed => SdkBatchStatus::Completed,
            BatchStatus::Failed => SdkBatchStatus::Failed,
        }
    }
}

/// API key scope for database operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "api_key_scope")]
pub enum ApiKeyScope {
    Full,
    Recipient,
}

impl From<ApiKeyScope> for SdkApiKeyScope {
    fn from(value: ApiKeyScope) -> Self {
        match value {
            ApiKeyScope::Full => SdkApiKeyScope::Full,
            ApiKeyScope::Recipient => SdkApiKeyScope::Recipient,
        }
    }
}

impl From<SdkApiKeyScope> for ApiKeyScope {
    fn from(value: SdkApiKeyScope) -> Self {
        match value {
            SdkApiKeyScope::Full => ApiKeyScope::Full,
            SdkApiKeyScope::Recipient => ApiKeyScope::Recipient,
        }
    }
}

/// Convert a stored timestamp to the unix seconds used on the wire.
pub(crate) fn unix(at: time::OffsetDateTime) -> i64 {
    at.unix_timestamp()
}
