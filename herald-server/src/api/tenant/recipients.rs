use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use herald_core::services::recipients::RecipientService;
use herald_sdk::objects::PageQuery;
use herald_sdk::objects::recipient::{
    BatchCreateRecipientsRequest, BatchCreateRecipientsResult, CreateRecipientRequest, Recipient,
    UpdateRecipientRequest,
};

use crate::api::error::{ApiError, ApiJson, ApiQuery};
use crate::api::extractors::FullAccess;
use crate::state::AppState;

fn service(state: &AppState) -> RecipientService {
    RecipientService::new(state.processor(), state.queue.clone())
}

/// `POST /recipients`
pub async fn create_recipient(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    ApiJson(request): ApiJson<CreateRecipientRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let recipient = service(&state).create(caller.context, request).await?;
    Ok((StatusCode::CREATED, Json(recipient)))
}

/// `GET /recipients`
pub async fn list_recipients(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Recipient>>, ApiError> {
    Ok(Json(service(&state).list(caller.context, page).await?))
}

/// `GET /recipients/{recipient}`
pub async fn get_recipient(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    Path(recipient_id): Path<String>,
) -> Result<Json<Recipient>, ApiError> {
    Ok(Json(service(&state).get(caller.context, &recipient_id).await?))
}

/// `POST /recipients/batch`: invalid entries are listed under `failed`.
pub async fn batch_create_recipients(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    ApiJson(request): ApiJson<BatchCreateRecipientsRequest>,
) -> Result<(StatusCode, Json<BatchCreateRecipientsResult>), ApiError> {
    let result = service(&state).batch_create(caller.context, request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// `PATCH /recipients/{recipient}`
pub async fn update_recipient(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    Path(recipient_id): Path<String>,
    ApiJson(request): ApiJson<UpdateRecipientRequest>,
) -> Result<Json<Recipient>, ApiError> {
    let recipient = service(&state)
        .update(caller.context, &recipient_id, request)
        .await?;
    Ok(Json(recipient))
}

/// `DELETE /recipients/{recipient}`: the data is removed in the background.
pub async fn delete_recipient(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    Path(recipient_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service(&state).delete(caller.context, &recipient_id).await?;
    Ok(StatusCode::ACCEPTED)
}
