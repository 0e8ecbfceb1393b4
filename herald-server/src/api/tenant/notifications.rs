use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use herald_core::services::ServiceError;
use herald_core::services::inbox::InboxService;
use herald_sdk::objects::notification::{
    DeleteNotificationsRequest, NotificationCursorQuery, NotificationPage, UnreadCount,
    UpdateNotificationsRequest,
};
use herald_sdk::objects::{Affected, ValidationErrors};

use crate::api::error::{ApiError, ApiJson, ApiQuery};
use crate::api::extractors::ApiKeyAuth;
use crate::state::AppState;

/// `GET /recipients/{recipient}/notifications?before=&after=&limit=`
pub async fn list_notifications(
    State(state): State<AppState>,
    ApiKeyAuth(caller): ApiKeyAuth,
    Path(recipient_id): Path<String>,
    ApiQuery(query): ApiQuery<NotificationCursorQuery>,
) -> Result<Json<NotificationPage>, ApiError> {
    let page = InboxService::new(state.processor())
        .list(caller.context, &recipient_id, query)
        .await?;
    Ok(Json(page))
}

/// `GET /recipients/{recipient}/notifications/unread-count`
pub async fn unread_count(
    State(state): State<AppState>,
    ApiKeyAuth(caller): ApiKeyAuth,
    Path(recipient_id): Path<String>,
) -> Result<Json<UnreadCount>, ApiError> {
    let count = InboxService::new(state.processor())
        .unread_count(caller.context, &recipient_id)
        .await?;
    Ok(Json(count))
}

/// `PATCH /recipients/{recipient}/notifications`
pub async fn update_notifications(
    State(state): State<AppState>,
    ApiKeyAuth(caller): ApiKeyAuth,
    Path(recipient_id): Path<String>,
    ApiJson(request): ApiJson<UpdateNotificationsRequest>,
) -> Result<Json<Affected>, ApiError> {
    let affected = InboxService::new(state.processor())
        .update_state(caller.context, &recipient_id, request)
        .await?;
    Ok(Json(affected))
}

/// `DELETE /recipients/{recipient}/notifications`: the body is optional;
/// without one every notification of the recipient is deleted.
pub async fn delete_notifications(
    State(state): State<AppState>,
    ApiKeyAuth(caller): ApiKeyAuth,
    Path(recipient_id): Path<String>,
    body: Bytes,
) -> Result<Json<Affected>, ApiError> {
    let request = parse_optional_body(&body)?;
    let affected = InboxService::new(state.processor())
        .delete(caller.context, &recipient_id, request)
        .await?;
    Ok(Json(affected))
}

fn parse_optional_body(body: &[u8]) -> Result<DeleteNotificationsRequest, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DeleteNotificationsRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        ValidationErrors::single(
            "Invalid request body",
            e.to_string(),
            "body",
            serde_json::Value::Null,
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_deletes_everything() {
        assert!(parse_optional_body(b"").unwrap().ids.is_empty());
        assert!(parse_optional_body(b"  \n").unwrap().ids.is_empty());
        assert_eq!(parse_optional_body(br#"{"ids":[3,4]}"#).unwrap().ids, vec![3, 4]);
        assert!(matches!(
            parse_optional_body(b"{\"ids\":\"x\"}"),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
