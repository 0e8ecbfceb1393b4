use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use herald_core::services::send::SendService;
use herald_sdk::objects::send::SendRequest;

use crate::api::error::{ApiError, ApiJson};
use crate::api::extractors::FullAccess;
use crate::state::AppState;

/// `POST /send`: send to one recipient, or broadcast when `recipient_id`
/// is absent.
///
/// Broadcasts are answered with `202 Accepted`; delivery happens in the
/// background.
pub async fn send(
    State(state): State<AppState>,
    FullAccess(caller): FullAccess,
    ApiJson(request): ApiJson<SendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let is_direct = request.is_direct();
    let response = SendService::new(state.processor(), state.queue.clone())
        .send(caller.context, request)
        .await?;
    let status = if is_direct {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(response)))
}
