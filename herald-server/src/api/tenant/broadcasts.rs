use axum::{
    Json,
    extract::{Path, State},
};
use herald_core::services::broadcasts::BroadcastService;
use herald_sdk::objects::notification::ProjectOverview;
use herald_sdk::objects::{
    Affected, Broadcast, BroadcastDetail, DeleteBroadcastsRequest, PageQuery,
};

use crate::api::error::{ApiError, ApiJson, ApiQuery};
use crate::api::extractors::FullAccess;
use crate::state::AppState;

/// `GET /overview`
pub async fn overview(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
) -> Result<Json<ProjectOverview>, ApiError> {
    let overview = BroadcastService::new(state.processor())
        .overview(caller.context)
        .await?;
    Ok(Json(overview))
}

/// `GET /broadcasts`: newest first.
pub async fn list_broadcasts(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Broadcast>>, ApiError> {
    let broadcasts = BroadcastService::new(state.processor())
        .list(caller.context, page)
        .await?;
    Ok(Json(broadcasts))
}

/// `GET /broadcasts/{id}`: the broadcast with its batches.
pub async fn get_broadcast(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    Path(broadcast_id): Path<i64>,
) -> Result<Json<BroadcastDetail>, ApiError> {
    let detail = BroadcastService::new(state.processor())
        .get(caller.context, broadcast_id)
        .await?;
    Ok(Json(detail))
}

/// `DELETE /broadcasts` with `{"ids": [...]}`: broadcasts still being
/// delivered are skipped.
pub async fn delete_broadcasts(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    ApiJson(request): ApiJson<DeleteBroadcastsRequest>,
) -> Result<Json<Affected>, ApiError> {
    let affected = BroadcastService::new(state.processor())
        .delete(caller.context, request)
        .await?;
    Ok(Json(affected))
}

/// `DELETE /broadcasts/all`: every settled broadcast of the project.
pub async fn delete_all_broadcasts(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
) -> Result<Json<Affected>, ApiError> {
    let affected = BroadcastService::new(state.processor())
        .delete_all(caller.context)
        .await?;
    Ok(Json(affected))
}
