//! Broadcast objects.

use serde::{Deserialize, Serialize};

use super::{Target, Validate, ValidationErrors};

/// Broadcast status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `herald-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    Enqueued,
    Completed,
    QuotaExceeded,
    Failed,
}

impl BroadcastStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BroadcastStatus::Enqueued)
    }
}

/// Broadcast batch status for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: i64,
    pub target: Target,
    pub payload: serde_json::Value,
    pub status: BroadcastStatus,
    pub completed_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastBatch {
    pub id: i64,
    pub status: BatchStatus,
    pub attempt: i32,
    pub duration_ms: Option<i64>,
    pub recipient_count: i64,
}

/// A broadcast together with the state of its batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastDetail {
    #[serde(flatten)]
    pub broadcast: Broadcast,
    pub batches: Vec<BroadcastBatch>,
    /// Recipients in batches that completed.
    pub delivered_recipient_count: i64,
    /// Recipients in batches that exhausted their retries.
    pub failed_recipient_count: i64,
}

/// Delete the listed broadcasts. Broadcasts still being delivered are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBroadcastsRequest {
    pub ids: Vec<i64>,
}

impl Validate for DeleteBroadcastsRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        if self.ids.is_empty() {
            return Err(ValidationErrors::single(
                "Broadcast IDs are required",
                "Provide at least one broadcast ID",
                "ids",
                &self.ids,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!BroadcastStatus::Enqueued.is_terminal());
        assert!(BroadcastStatus::Completed.is_terminal());
        assert!(BroadcastStatus::QuotaExceeded.is_terminal());
        assert!(BroadcastStatus::Failed.is_terminal());
    }

    #[test]
    fn test_detail_is_flattened() {
        let detail = BroadcastDetail {
            broadcast: Broadcast {
                id: 7,
                target: Target::new("posts", "p1", "liked"),
                payload: serde_json::json!({}),
                status: BroadcastStatus::Completed,
                completed_at: Some(1_700_000_100),
                created_at: 1_700_000_000,
            },
            batches: vec![],
            delivered_recipient_count: 0,
            failed_recipient_count: 0,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["status"], "completed");
        assert_eq!(json["target"]["event"], "liked");
    }

    #[test]
    fn test_delete_requires_ids() {
        assert!(DeleteBroadcastsRequest { ids: vec![] }.validate().is_err());
        let request: DeleteBroadcastsRequest = serde_json::from_str(r#"{"ids":[1,2]}"#).unwrap();
        assert!(request.validate().is_ok());
    }
}
