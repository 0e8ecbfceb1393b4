use serde::{Deserialize, Serialize};

use super::{FieldError, Validate, ValidationErrors};

const MAX_EXTERNAL_ID_LEN: usize = 255;

/// Upper bound on recipients in one batch create.
pub const MAX_BATCH_RECIPIENTS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Client-supplied identifier, stored lower-cased.
    pub recipient_id: String,
    pub name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRecipientRequest {
    pub recipient_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for CreateRecipientRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let id = self.recipient_id.trim();
        if id.is_empty() {
            errors.add(
                "Recipient ID is required",
                "Recipient ID cannot be empty",
                "recipient_id",
                &self.recipient_id,
            );
        } else if id.len() > MAX_EXTERNAL_ID_LEN {
            errors.add(
                "Recipient ID is too long",
                format!("Recipient ID must be at most {MAX_EXTERNAL_ID_LEN} bytes"),
                "recipient_id",
                &self.recipient_id,
            );
        }
        errors.into_result()
    }
}

/// Replace a recipient's name. An absent or `null` name clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecipientRequest {
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for UpdateRecipientRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match &self.name {
            Some(name) if name.trim().is_empty() => Err(ValidationErrors::single(
                "Name is required",
                "Name cannot be empty, send null to clear it",
                "name",
                name,
            )),
            _ => Ok(()),
        }
    }
}

/// Create or update many recipients at once.
///
/// Invalid entries do not fail the request; they are reported back in
/// [`BatchCreateRecipientsResult::failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreateRecipientsRequest {
    pub recipients: Vec<CreateRecipientRequest>,
}

impl Validate for BatchCreateRecipientsRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let count = self.recipients.len();
        if count == 0 {
            return Err(ValidationErrors::single(
                "Recipients are required",
                "Provide at least one recipient",
                "recipients",
                count,
            ));
        }
        if count > MAX_BATCH_RECIPIENTS {
            return Err(ValidationErrors::single(
                "Too many recipients",
                format!("A batch holds at most {MAX_BATCH_RECIPIENTS} recipients"),
                "recipients",
                count,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecipientRef {
    pub recipient_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecipientFailure {
    pub recipient_id: String,
    /// Position of the entry in the request.
    pub batch_index: usize,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchCreateRecipientsResult {
    pub created: Vec<BatchRecipientRef>,
    pub updated: Vec<BatchRecipientRef>,
    pub failed: Vec<BatchRecipientFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_recipient_id() {
        let ok = CreateRecipientRequest {
            recipient_id: "User-42".to_owned(),
            name: None,
        };
        assert!(ok.validate().is_ok());

        let empty = CreateRecipientRequest {
            recipient_id: "".to_owned(),
            name: Some("Nobody".to_owned()),
        };
        assert!(empty.validate().is_err());

        let long = CreateRecipientRequest {
            recipient_id: "a".repeat(256),
            name: None,
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_update_name_may_be_cleared_but_not_blank() {
        let clear: UpdateRecipientRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(clear.name, None);
        assert!(clear.validate().is_ok());
        assert!(UpdateRecipientRequest { name: Some("Ada".into()) }.validate().is_ok());
        assert!(UpdateRecipientRequest { name: Some("  ".into()) }.validate().is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        let entry = CreateRecipientRequest {
            recipient_id: "alice".into(),
            name: None,
        };
        let empty = BatchCreateRecipientsRequest { recipients: vec![] };
        assert!(empty.validate().is_err());
        let full = BatchCreateRecipientsRequest {
            recipients: vec![entry.clone(); MAX_BATCH_RECIPIENTS],
        };
        assert!(full.validate().is_ok());
        let over = BatchCreateRecipientsRequest {
            recipients: vec![entry; MAX_BATCH_RECIPIENTS + 1],
        };
        assert!(over.validate().is_err());
    }
}
