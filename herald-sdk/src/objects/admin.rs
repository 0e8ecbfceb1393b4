//! Admin API request and response types.

use serde::{Deserialize, Serialize};

use super::{Validate, ValidationErrors};

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub user_id: i64,
    pub name: String,
}

impl Validate for CreateProjectRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.user_id <= 0 {
            errors.add(
                "User is required",
                "User ID must be a positive integer",
                "user_id",
                self.user_id,
            );
        }
        if self.name.trim().is_empty() {
            errors.add("Name is required", "Name cannot be empty", "name", &self.name);
        }
        errors.into_result()
    }
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

/// What an API key may do.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `herald-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyScope {
    /// Every tenant endpoint, including sends.
    Full,
    /// Recipient-facing endpoints only (inbox and preferences).
    Recipient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    pub scope: ApiKeyScope,
}

impl Validate for CreateApiKeyRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        if self.name.trim().is_empty() {
            return Err(ValidationErrors::single(
                "Name is required",
                "Name cannot be empty",
                "name",
                &self.name,
            ));
        }
        Ok(())
    }
}

/// A stored key as listed to admins. The token itself is never shown again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub scope: ApiKeyScope,
    pub created_at: i64,
}

/// A freshly created key. `token` is only ever returned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedApiKey {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub scope: ApiKeyScope,
    pub token: String,
    pub created_at: i64,
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Free,
    Pro,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricUsage {
    pub metric: String,
    pub used: i64,
    /// `None` means unlimited.
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub user_id: i64,
    pub plan: PlanId,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub metrics: Vec<MetricUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_project_validation() {
        let bad = CreateProjectRequest {
            user_id: 0,
            name: "".to_owned(),
        };
        assert_eq!(bad.validate().unwrap_err().as_slice().len(), 2);

        let good = CreateProjectRequest {
            user_id: 1,
            name: "Acme".to_owned(),
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_scope_wire_format() {
        let request: CreateApiKeyRequest =
            serde_json::from_str(r#"{"name":"inbox widget","scope":"recipient"}"#).unwrap();
        assert_eq!(request.scope, ApiKeyScope::Recipient);
    }
}
