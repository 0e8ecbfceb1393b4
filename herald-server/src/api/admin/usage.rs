use axum::{
    Json,
    extract::{Path, State},
};
use herald_core::services::billing::BillingService;
use herald_sdk::objects::admin::UsageSummary;

use crate::api::error::ApiError;
use crate::api::extractors::AdminAuth;
use crate::state::AppState;

/// `GET /users/{user_id}/usage`
pub async fn usage_summary(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(user_id): Path<i64>,
) -> Result<Json<UsageSummary>, ApiError> {
    let summary = BillingService::new(state.processor())
        .usage_summary(user_id)
        .await?;
    Ok(Json(summary))
}
