use serde::{Deserialize, Serialize};

use super::{Broadcast, Notification, Target, Validate, ValidationErrors, validate_payload};

/// Body of `POST /v1/send`.
///
/// With `recipient_id` this is a direct send, otherwise a broadcast to every
/// eligible recipient of `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub target: Option<Target>,
    pub payload: serde_json::Value,
}

impl SendRequest {
    pub fn is_direct(&self) -> bool {
        self.recipient_id.is_some()
    }
}

impl Validate for SendRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if let Some(recipient_id) = &self.recipient_id
            && recipient_id.trim().is_empty()
        {
            errors.add(
                "Recipient is required",
                "Recipient ID cannot be empty when present",
                "recipient_id",
                recipient_id,
            );
        }

        match &self.target {
            Some(target) => target.validate_as_notification("target.", &mut errors),
            None => errors.add(
                "Target is required",
                "Every notification needs a channel, topic and event",
                "target",
                serde_json::Value::Null,
            ),
        }

        validate_payload(&self.payload, &mut errors);
        errors.into_result()
    }
}

/// Response of `POST /v1/send`. Exactly one of the two records is set,
/// unless a direct send was muted by the recipient's preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResponse {
    pub notification: Option<Notification>,
    pub broadcast: Option<Broadcast>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(recipient_id: Option<&str>, target: Option<Target>) -> SendRequest {
        SendRequest {
            recipient_id: recipient_id.map(str::to_owned),
            target,
            payload: serde_json::json!({ "title": "New comment" }),
        }
    }

    #[test]
    fn test_direct_and_broadcast_detection() {
        let target = Target::new("posts", "post-1", "new_comment");
        assert!(request(Some("alice"), Some(target.clone())).is_direct());
        assert!(!request(None, Some(target)).is_direct());
    }

    #[test]
    fn test_broadcast_requires_target() {
        let errors = request(None, None).validate().unwrap_err();
        assert_eq!(errors.as_slice()[0].property, "target");
    }

    #[test]
    fn test_blank_recipient_rejected() {
        let target = Target::new("posts", "post-1", "new_comment");
        let errors = request(Some("  "), Some(target)).validate().unwrap_err();
        assert_eq!(errors.as_slice()[0].property, "recipient_id");
    }

    #[test]
    fn test_valid_request() {
        let target = Target::new("posts", "none", "digest");
        assert!(request(None, Some(target)).validate().is_ok());
    }

    #[test]
    fn test_deserialize_minimal_body() {
        let body = r#"{"target":{"channel":"posts","topic":"p1","event":"liked"},"payload":{"a":1}}"#;
        let parsed: SendRequest = serde_json::from_str(body).unwrap();
        assert!(parsed.recipient_id.is_none());
        assert_eq!(parsed.target.unwrap().event, "liked");
    }
}
