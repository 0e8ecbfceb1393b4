//! Tenant API handlers.
//!
//! These endpoints are called by a project's backend (full-scope keys) or by
//! recipient-facing frontends (recipient-scoped keys), authenticated with
//! `Authorization: Bearer <token>`.
//!
//! # Endpoints
//!
//! - `POST   /send`                                         – direct send or broadcast
//! - `GET    /overview`                                     – project delivery counters
//! - `GET    /broadcasts`, `GET /broadcasts/{id}`           – broadcast history
//! - `DELETE /broadcasts`, `DELETE /broadcasts/all`         – delete settled broadcasts
//! - `POST   /recipients`, `GET /recipients`                – recipient administration
//! - `POST   /recipients/batch`                             – create or update many recipients
//! - `GET|PATCH|DELETE /recipients/{recipient}`             – one recipient
//! - `GET|PATCH|DELETE /recipients/{recipient}/preferences` – recipient overrides
//! - `GET    /recipients/{recipient}/preferences/check`     – resolve one target
//! - `GET|PATCH|DELETE /recipients/{recipient}/notifications` – inbox
//! - `GET    /recipients/{recipient}/notifications/unread-count`
//! - `POST   /preferences`, `GET /preferences`, `DELETE /preferences/{id}` – project defaults

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

mod broadcasts;
mod notifications;
mod preferences;
mod recipients;
mod send;

/// Build the tenant API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send::send))
        .route("/overview", get(broadcasts::overview))
        .route(
            "/broadcasts",
            get(broadcasts::list_broadcasts).delete(broadcasts::delete_broadcasts),
        )
        .route("/broadcasts/all", delete(broadcasts::delete_all_broadcasts))
        .route("/broadcasts/{id}", get(broadcasts::get_broadcast))
        .route(
            "/recipients",
            post(recipients::create_recipient).get(recipients::list_recipients),
        )
        .route("/recipients/batch", post(recipients::batch_create_recipients))
        .route(
            "/recipients/{recipient}",
            get(recipients::get_recipient)
                .patch(recipients::update_recipient)
                .delete(recipients::delete_recipient),
        )
        .route(
            "/recipients/{recipient}/preferences",
            get(preferences::list_recipient_preferences)
                .patch(preferences::upsert_recipient_preference)
                .delete(preferences::delete_recipient_preference),
        )
        .route(
            "/recipients/{recipient}/preferences/check",
            get(preferences::check_preference),
        )
        .route(
            "/recipients/{recipient}/notifications",
            get(notifications::list_notifications)
                .patch(notifications::update_notifications)
                .delete(notifications::delete_notifications),
        )
        .route(
            "/recipients/{recipient}/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/preferences",
            post(preferences::create_project_preference).get(preferences::list_project_preferences),
        )
        .route(
            "/preferences/{id}",
            delete(preferences::delete_project_preference),
        )
}

#[cfg(test)]
mod tests {
    use crate::server::tests::status_of;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_every_tenant_route_is_authenticated() {
        let routes = [
            ("POST", "/v1/send"),
            ("GET", "/v1/overview"),
            ("GET", "/v1/broadcasts"),
            ("GET", "/v1/broadcasts/1"),
            ("DELETE", "/v1/broadcasts"),
            ("DELETE", "/v1/broadcasts/all"),
            ("POST", "/v1/recipients"),
            ("POST", "/v1/recipients/batch"),
            ("GET", "/v1/recipients/alice"),
            ("PATCH", "/v1/recipients/alice"),
            ("DELETE", "/v1/recipients/alice"),
            ("GET", "/v1/recipients/alice/preferences"),
            ("PATCH", "/v1/recipients/alice/preferences"),
            ("DELETE", "/v1/recipients/alice/preferences"),
            ("GET", "/v1/recipients/alice/preferences/check"),
            ("GET", "/v1/recipients/alice/notifications"),
            ("PATCH", "/v1/recipients/alice/notifications"),
            ("DELETE", "/v1/recipients/alice/notifications"),
            ("GET", "/v1/recipients/alice/notifications/unread-count"),
            ("POST", "/v1/preferences"),
            ("GET", "/v1/preferences"),
            ("DELETE", "/v1/preferences/1"),
        ];
        for (method, uri) in routes {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap();
            assert_eq!(
                status_of(request).await,
                StatusCode::UNAUTHORIZED,
                "{method} {uri}"
            );
        }
    }
}
