use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use herald_core::services::preferences::PreferenceService;
use herald_sdk::objects::preference::{
    CreateProjectPreferenceRequest, EffectivePreference, PreferenceCheckResponse,
    ProjectPreference, RecipientPreference, TargetQuery, UpsertRecipientPreferenceRequest,
};

use crate::api::error::{ApiError, ApiJson, ApiQuery};
use crate::api::extractors::{ApiKeyAuth, FullAccess};
use crate::state::AppState;

// Project defaults need a full-scope key.

/// `POST /preferences`
pub async fn create_project_preference(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    ApiJson(request): ApiJson<CreateProjectPreferenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let preference = PreferenceService::new(state.processor())
        .create_project_preference(caller.context, request)
        .await?;
    Ok((StatusCode::CREATED, Json(preference)))
}

/// `GET /preferences`
pub async fn list_project_preferences(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
) -> Result<Json<Vec<ProjectPreference>>, ApiError> {
    let preferences = PreferenceService::new(state.processor())
        .list_project_preferences(caller.context)
        .await?;
    Ok(Json(preferences))
}

/// `DELETE /preferences/{id}`
pub async fn delete_project_preference(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    Path(preference_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    PreferenceService::new(state.processor())
        .delete_project_preference(caller.context, preference_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// Recipient overrides are open to recipient-scoped keys.

/// `GET /recipients/{recipient}/preferences`: effective state of every
/// project-defined target.
pub async fn list_recipient_preferences(
    State(state): State<AppState>,
    ApiKeyAuth(caller): ApiKeyAuth,
    Path(recipient_id): Path<String>,
) -> Result<Json<Vec<EffectivePreference>>, ApiError> {
    let preferences = PreferenceService::new(state.processor())
        .list_recipient_preferences(caller.context, &recipient_id)
        .await?;
    Ok(Json(preferences))
}

/// `PATCH /recipients/{recipient}/preferences`
pub async fn upsert_recipient_preference(
    State(state): State<AppState>,
    ApiKeyAuth(caller): ApiKeyAuth,
    Path(recipient_id): Path<String>,
    ApiJson(request): ApiJson<UpsertRecipientPreferenceRequest>,
) -> Result<Json<RecipientPreference>, ApiError> {
    let preference = PreferenceService::new(state.processor())
        .upsert_recipient_preference(caller.context, &recipient_id, request)
        .await?;
    Ok(Json(preference))
}

/// `DELETE /recipients/{recipient}/preferences?channel=&topic=&event=`:
/// drop one override so the project default applies again.
pub async fn delete_recipient_preference(
    State(state): State<AppState>,
    ApiKeyAuth(caller): ApiKeyAuth,
    Path(recipient_id): Path<String>,
    ApiQuery(query): ApiQuery<TargetQuery>,
) -> Result<StatusCode, ApiError> {
    PreferenceService::new(state.processor())
        .delete_recipient_preference(caller.context, &recipient_id, query)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /recipients/{recipient}/preferences/check?channel=&topic=&event=`
pub async fn check_preference(
    State(state): State<AppState>,
    ApiKeyAuth(caller): ApiKeyAuth,
    Path(recipient_id): Path<String>,
    ApiQuery(query): ApiQuery<TargetQuery>,
) -> Result<Json<PreferenceCheckResponse>, ApiError> {
    let response = PreferenceService::new(state.processor())
        .check(caller.context, &recipient_id, query)
        .await?;
    Ok(Json(response))
}
