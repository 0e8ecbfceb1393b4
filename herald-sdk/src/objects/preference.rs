//! Preference objects at project and recipient scope.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::{Target, Validate, ValidationErrors};

/// A project-level default for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPreference {
    pub id: i64,
    pub target: Target,
    pub label: String,
    pub default_enabled: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectPreferenceRequest {
    pub target: Target,
    pub label: String,
    pub default_enabled: bool,
}

impl Validate for CreateProjectPreferenceRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        self.target.validate_as_preference("target.", &mut errors);
        if self.label.trim().is_empty() {
            errors.add("Label is required", "Label cannot be empty", "label", &self.label);
        }
        errors.into_result()
    }
}

/// A recipient-level override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientPreference {
    pub id: i64,
    pub recipient_id: String,
    pub target: Target,
    pub enabled: bool,
    pub updated_at: i64,
}

/// Body of `PATCH /v1/recipients/{recipient}/preferences`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertRecipientPreferenceRequest {
    pub channel: CompactString,
    pub topic: CompactString,
    pub event: CompactString,
    pub enabled: bool,
}

impl UpsertRecipientPreferenceRequest {
    pub fn target(&self) -> Target {
        Target::new(self.channel.clone(), self.topic.clone(), self.event.clone())
    }
}

impl Validate for UpsertRecipientPreferenceRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        self.target().validate_as_preference("", &mut errors);
        errors.into_result()
    }
}

/// A target passed as query parameters (`?channel=&topic=&event=`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetQuery {
    pub channel: CompactString,
    pub topic: CompactString,
    pub event: CompactString,
}

impl TargetQuery {
    pub fn into_target(self) -> Target {
        Target::new(self.channel, self.topic, self.event)
    }

    /// Validate as the target of a notification, i.e. reject `any`.
    pub fn validate_as_notification(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        self.clone()
            .into_target()
            .validate_as_notification("", &mut errors);
        errors.into_result()
    }

    pub fn validate_as_preference(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        self.clone().into_target().validate_as_preference("", &mut errors);
        errors.into_result()
    }
}

/// Resolved state of a target for one recipient.
///
/// `inherited` is `true` when no recipient-level override decided the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceState {
    pub enabled: bool,
    pub inherited: bool,
}

/// Response of `GET /v1/recipients/{recipient}/preferences/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceCheckResponse {
    pub target: Target,
    pub state: PreferenceState,
}

/// One project-defined target with the recipient's effective state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePreference {
    pub target: Target,
    pub label: String,
    pub state: PreferenceState,
}
