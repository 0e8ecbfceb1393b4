//! Application services behind the HTTP handlers.
//!
//! Services validate input, run the queries and map failures onto
//! [`ServiceError`], which the server turns into responses without looking
//! at error strings.

pub mod billing;
pub mod broadcasts;
pub mod inbox;
pub mod preferences;
pub mod projects;
pub mod recipients;
pub mod send;

use crate::queue::QueueError;
use crate::quota::QuotaError;
use herald_sdk::objects::ValidationErrors;
use thiserror::Error;

/// The tenant a request acts for, as resolved from its API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectContext {
    pub project_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<sqlx::Error> for ServiceError {
    fn from(value: sqlx::Error) -> Self {
        ServiceError::Internal(Box::new(value))
    }
}

impl From<QueueError> for ServiceError {
    fn from(value: QueueError) -> Self {
        ServiceError::Internal(Box::new(value))
    }
}

impl From<QuotaError> for ServiceError {
    fn from(value: QuotaError) -> Self {
        match value {
            e @ QuotaError::QuotaExceeded { .. } => ServiceError::QuotaExceeded(e.to_string()),
            e => ServiceError::Internal(Box::new(e)),
        }
    }
}

/// Whether the error is a unique-constraint violation.
pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Map a unique violation to [`ServiceError::Conflict`], anything else to
/// an internal error.
pub(crate) fn conflict_on_unique(error: sqlx::Error, message: &str) -> ServiceError {
    if is_unique_violation(&error) {
        ServiceError::Conflict(message.to_string())
    } else {
        error.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::plan::{Metric, PlanId};

    #[test]
    fn test_quota_error_mapping() {
        let exceeded = QuotaError::QuotaExceeded {
            metric: Metric::Notifications,
            plan: PlanId::Free,
            used: 10_000,
            requested: 1,
            limit: 10_000,
        };
        assert!(matches!(
            ServiceError::from(exceeded),
            ServiceError::QuotaExceeded(_)
        ));
        let misconfigured = QuotaError::MetricNotInPlan(Metric::Notifications, PlanId::Pro);
        assert!(matches!(
            ServiceError::from(misconfigured),
            ServiceError::Internal(_)
        ));
    }

    #[test]
    fn test_row_not_found_is_not_a_conflict() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(matches!(
            conflict_on_unique(sqlx::Error::RowNotFound, "dup"),
            ServiceError::Internal(_)
        ));
    }
}
