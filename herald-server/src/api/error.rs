//! Mapping of service errors onto HTTP responses.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use herald_core::services::ServiceError;
use herald_sdk::objects::{ErrorBody, ValidationErrors};
use uuid::Uuid;

/// Error returned by every API handler.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        ApiError(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(ServiceError::InvalidInput(ValidationErrors::single(
            "Invalid request body",
            rejection.body_text(),
            "body",
            serde_json::Value::Null,
        )))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(ServiceError::InvalidInput(ValidationErrors::single(
            "Invalid query string",
            rejection.body_text(),
            "query",
            serde_json::Value::Null,
        )))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.0 {
            ServiceError::InvalidInput(errors) => ErrorBody {
                message: "The request is invalid".to_string(),
                errors: errors.into_inner(),
                correlation_id: None,
            },
            ServiceError::Conflict(message) | ServiceError::QuotaExceeded(message) => {
                ErrorBody::new(message)
            }
            ServiceError::NotFound(what) => {
                let mut message = what.to_string();
                if let Some(first) = message.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                ErrorBody::new(format!("{message} not found"))
            }
            ServiceError::Unauthorized => ErrorBody::new("Missing or invalid credentials"),
            ServiceError::Forbidden => {
                ErrorBody::new("This API key is not allowed to perform this operation")
            }
            ServiceError::Internal(error) => {
                let correlation_id = Uuid::now_v7();
                tracing::error!(%correlation_id, error = %error, "Internal server error");
                ErrorBody {
                    message: "Internal server error".to_string(),
                    errors: Vec::new(),
                    correlation_id: Some(correlation_id),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

/// `Json<T>` whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query<T>` whose rejections use the API error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(error: ServiceError) -> (StatusCode, ErrorBody) {
        let response = ApiError(error).into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_errors_carry_fields() {
        let (status, body) = body_of(ServiceError::InvalidInput(ValidationErrors::single(
            "Invalid topic",
            "Topic must not be empty",
            "target.topic",
            "",
        )))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.errors.len(), 1);
        assert_eq!(body.errors[0].property, "target.topic");
        assert!(body.correlation_id.is_none());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(
            body_of(ServiceError::Conflict("dup".into())).await.0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            body_of(ServiceError::Forbidden).await.0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            body_of(ServiceError::QuotaExceeded("over".into())).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
        let (status, body) = body_of(ServiceError::NotFound("recipient")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "Recipient not found");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let (status, body) = body_of(ServiceError::from(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Internal server error");
        assert!(body.correlation_id.is_some());
    }
}
