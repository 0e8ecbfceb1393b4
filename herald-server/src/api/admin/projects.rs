use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use herald_core::services::projects::ProjectService;
use herald_sdk::objects::admin::{ApiKey, CreateApiKeyRequest, CreateProjectRequest, Project};

use crate::api::error::{ApiError, ApiJson};
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

fn service(state: &AppState) -> ProjectService {
    ProjectService::new(state.processor(), state.queue.clone())
}

/// `POST /projects`
pub async fn create_project(
    State(state): State<AppState>,
    _auth: AdminAuth,
    ApiJson(request): ApiJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = service(&state).create(request).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `GET /users/{user_id}/projects`
pub async fn list_projects(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(service(&state).list_for_user(user_id).await?))
}

/// `DELETE /projects/{id}`: keys, recipients, preferences, notifications
/// and broadcasts are removed by a background task. Usage stays with the user.
pub async fn delete_project(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(project_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    service(&state).delete(project_id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /projects/{id}/api-keys`: the token is only shown in this response.
pub async fn create_api_key(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(project_id): Path<i64>,
    ApiJson(request): ApiJson<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let keys = state.config.api_keys.read().await.clone();
    let created = service(&state)
        .create_api_key(project_id, request, &keys)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /projects/{id}/api-keys`: tokens are never included.
pub async fn list_api_keys(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<ApiKey>>, ApiError> {
    Ok(Json(service(&state).list_api_keys(project_id).await?))
}
