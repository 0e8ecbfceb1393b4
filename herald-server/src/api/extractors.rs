//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `ApiKeyAuth`: resolves `Authorization: Bearer <token>` to the calling
//!   project (any key scope).
//! - `FullAccess`: like `ApiKeyAuth` but rejects `recipient`-scoped keys.
//! - `AdminAuth`: verifies the `Herald-Admin-Authorization` header against
//!   the argon2-hashed admin secret.

use axum::{extract::FromRequestParts, http::request::Parts};
use herald_core::services::ServiceError;
use herald_core::services::projects::{Caller, authenticate};
use herald_sdk::api_key::{ADMIN_AUTH_HEADER, AUTHORIZATION_HEADER, parse_bearer};

use super::error::ApiError;
use crate::state::AppState;

/// A request authenticated with a project API key of any scope.
pub struct ApiKeyAuth(pub Caller);

impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer)
            .ok_or(ServiceError::Unauthorized)?;

        let keys = state.config.api_keys.read().await.clone();
        let caller = authenticate(&state.processor(), &keys, token).await?;
        Ok(ApiKeyAuth(caller))
    }
}

/// A request authenticated with a `full`-scope API key.
pub struct FullAccess(pub Caller);

impl FromRequestParts<AppState> for FullAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ApiKeyAuth(caller) = ApiKeyAuth::from_request_parts(parts, state).await?;
        caller.require_full_scope()?;
        Ok(FullAccess(caller))
    }
}

/// A request carrying the admin secret.
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or(ServiceError::Unauthorized)?;

        let admin = state.config.admin.read().await;
        if admin.verify_secret(secret) {
            Ok(AdminAuth)
        } else {
            tracing::warn!("Rejected admin request with a wrong secret");
            Err(ServiceError::Unauthorized.into())
        }
    }
}
