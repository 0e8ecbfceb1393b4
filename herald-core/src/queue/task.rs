use serde::Serialize;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use time::OffsetDateTime;

/// Every kind of background task the workers know how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    BroadcastPrepareBatches,
    BroadcastDelivery,
    RecipientDeleteData,
    ProjectDeleteData,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::BroadcastPrepareBatches,
        TaskKind::BroadcastDelivery,
        TaskKind::RecipientDeleteData,
        TaskKind::ProjectDeleteData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::BroadcastPrepareBatches => "broadcast:prepare_batches",
            TaskKind::BroadcastDelivery => "broadcast:delivery",
            TaskKind::RecipientDeleteData => "recipient:delete_data",
            TaskKind::ProjectDeleteData => "project:delete_data",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task kind: {0}")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownTaskKind(s.to_string()))
    }
}

/// A JSON task payload bound to its task kind.
pub trait TaskPayload: Serialize + DeserializeOwned {
    const KIND: TaskKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "task_status")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    /// Out of retries or failed with a non-retryable error.
    Dead,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    /// Retries already spent. Zero on the first attempt.
    pub retry_count: i32,
    pub max_retry: i32,
    pub run_at: OffsetDateTime,
    pub locked_until: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.as_str().parse::<TaskKind>(), Ok(kind));
        }
        assert_eq!(
            "broadcast:prepare_batches".parse::<TaskKind>(),
            Ok(TaskKind::BroadcastPrepareBatches)
        );
    }

    #[test]
    fn test_unknown_kind() {
        assert_eq!(
            "email:send".parse::<TaskKind>(),
            Err(UnknownTaskKind("email:send".to_string()))
        );
    }
}
