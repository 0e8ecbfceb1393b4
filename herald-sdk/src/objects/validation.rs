//! Field-level validation errors.

use serde::{Deserialize, Serialize};

/// One invalid input field, shaped for form rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub message: String,
    pub description: String,
    /// Path of the offending property, e.g. `target.topic`.
    pub property: String,
    pub value: serde_json::Value,
}

/// A list of [`FieldError`]s collected while validating one request.
#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
#[error("{} invalid field(s)", .0.len())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn add(
        &mut self,
        message: impl Into<String>,
        description: impl Into<String>,
        property: impl Into<String>,
        value: impl Serialize,
    ) {
        self.0.push(FieldError {
            message: message.into(),
            description: description.into(),
            property: property.into(),
            value: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        });
    }

    /// A single-field error list.
    pub fn single(
        message: impl Into<String>,
        description: impl Into<String>,
        property: impl Into<String>,
        value: impl Serialize,
    ) -> Self {
        let mut errors = Self::default();
        errors.add(message, description, property, value);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was collected, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }
}

/// Request bodies that can check themselves before reaching a service.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}
