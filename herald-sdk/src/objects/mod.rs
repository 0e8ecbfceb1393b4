pub mod admin;
pub mod broadcast;
pub mod error;
pub mod notification;
pub mod preference;
pub mod recipient;
pub mod send;
pub mod validation;

pub use broadcast::{
    BatchStatus, Broadcast, BroadcastBatch, BroadcastDetail, BroadcastStatus,
    DeleteBroadcastsRequest,
};
pub use error::ErrorBody;
pub use notification::{Notification, NotificationStatus};
pub use validation::{FieldError, Validate, ValidationErrors};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Topic wildcard matching every topic of a channel. Only valid on preferences.
pub const TOPIC_ANY: &str = "any";

/// Topic marker for targets without a topic dimension.
pub const TOPIC_NONE: &str = "none";

/// Upper bound for a notification payload, measured on its JSON encoding.
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024;

/// A `(channel, topic, event)` triple identifying a notification category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub channel: CompactString,
    pub topic: CompactString,
    pub event: CompactString,
}

impl Target {
    pub fn new(
        channel: impl Into<CompactString>,
        topic: impl Into<CompactString>,
        event: impl Into<CompactString>,
    ) -> Self {
        Self {
            channel: channel.into(),
            topic: topic.into(),
            event: event.into(),
        }
    }

    /// Validate the target for use on a preference record.
    ///
    /// `prefix` is prepended to property paths (e.g. `"target."`).
    pub fn validate_as_preference(&self, prefix: &str, errors: &mut ValidationErrors) {
        require_non_empty(&self.channel, "Channel", &format!("{prefix}channel"), errors);
        require_non_empty(&self.topic, "Topic", &format!("{prefix}topic"), errors);
        require_non_empty(&self.event, "Event", &format!("{prefix}event"), errors);
    }

    /// Validate the target for use on a notification or broadcast.
    ///
    /// Same as [`validate_as_preference`](Self::validate_as_preference), but
    /// the `any` wildcard is rejected.
    pub fn validate_as_notification(&self, prefix: &str, errors: &mut ValidationErrors) {
        self.validate_as_preference(prefix, errors);
        if self.topic == TOPIC_ANY {
            errors.add(
                "Topic cannot be \"any\"",
                "Notifications must carry a concrete topic or \"none\"",
                format!("{prefix}topic"),
                &self.topic,
            );
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.channel, self.topic, self.event)
    }
}

fn require_non_empty(value: &str, name: &str, property: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(
            format!("{name} is required"),
            format!("{name} cannot be empty"),
            property,
            value,
        );
    }
}

/// Size of a payload's JSON encoding in bytes.
pub fn payload_size(payload: &serde_json::Value) -> usize {
    serde_json::to_vec(payload)
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX)
}

/// Validate a notification payload: present and at most [`MAX_PAYLOAD_BYTES`].
pub fn validate_payload(payload: &serde_json::Value, errors: &mut ValidationErrors) {
    if payload.is_null() {
        errors.add(
            "Payload is required",
            "Payload cannot be null",
            "payload",
            serde_json::Value::Null,
        );
        return;
    }
    let size = payload_size(payload);
    if size > MAX_PAYLOAD_BYTES {
        errors.add(
            "Payload is too large",
            format!("Payload must be at most {MAX_PAYLOAD_BYTES} bytes, got {size}"),
            "payload",
            size,
        );
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 200;
const MAX_OFFSET: i64 = 100_000;

/// Offset-based pagination query.
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

/// Clamp limit and offset to safe maximums.
pub fn clamp_pagination(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_LIMIT), offset.clamp(0, MAX_OFFSET))
}

/// Number of rows touched by a bulk update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affected {
    pub affected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_target_rejects_any() {
        let mut errors = ValidationErrors::default();
        Target::new("posts", "any", "new_comment").validate_as_notification("target.", &mut errors);
        let errors = errors.into_inner();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].property, "target.topic");

        let mut errors = ValidationErrors::default();
        Target::new("posts", "any", "new_comment").validate_as_preference("", &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_empty_fields_reported_individually() {
        let mut errors = ValidationErrors::default();
        Target::new("", " ", "").validate_as_preference("", &mut errors);
        let properties: Vec<_> = errors
            .into_inner()
            .into_iter()
            .map(|e| e.property)
            .collect();
        assert_eq!(properties, vec!["channel", "topic", "event"]);
    }

    #[test]
    fn test_payload_size_cap() {
        let mut errors = ValidationErrors::default();
        validate_payload(&serde_json::json!({ "title": "hello" }), &mut errors);
        assert!(errors.is_empty());

        let big = "x".repeat(MAX_PAYLOAD_BYTES);
        let mut errors = ValidationErrors::default();
        validate_payload(&serde_json::json!({ "body": big }), &mut errors);
        assert_eq!(errors.into_inner()[0].property, "payload");

        let mut errors = ValidationErrors::default();
        validate_payload(&serde_json::Value::Null, &mut errors);
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_clamp_pagination() {
        assert_eq!(clamp_pagination(0, -5), (1, 0));
        assert_eq!(clamp_pagination(500, 10), (200, 10));
        assert_eq!(clamp_pagination(20, 1_000_000), (20, 100_000));
    }
}
