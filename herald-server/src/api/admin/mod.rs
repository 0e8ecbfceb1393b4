//! Admin API handlers.
//!
//! These endpoints are called by the account/billing backend and require
//! the `Herald-Admin-Authorization` header with the plaintext admin secret.
//!
//! # Endpoints
//!
//! - `POST   /projects`                  – create a project for a user
//! - `GET    /users/{user_id}/projects`  – list a user's projects
//! - `DELETE /projects/{id}`             – delete a project and all of its data
//! - `POST   /projects/{id}/api-keys`    – issue an API key
//! - `GET    /projects/{id}/api-keys`    – list a project's keys
//! - `GET    /users/{user_id}/usage`     – plan, period and usage of a user

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

mod projects;
mod usage;

/// Build the Admin API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", post(projects::create_project))
        .route("/users/{user_id}/projects", get(projects::list_projects))
        .route("/projects/{id}", delete(projects::delete_project))
        .route(
            "/projects/{id}/api-keys",
            post(projects::create_api_key).get(projects::list_api_keys),
        )
        .route("/users/{user_id}/usage", get(usage::usage_summary))
}

#[cfg(test)]
mod tests {
    use crate::server::tests::status_of;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    #[tokio::test]
    async fn test_every_admin_route_is_authenticated() {
        let routes = [
            ("POST", "/admin/projects"),
            ("GET", "/admin/users/1/projects"),
            ("DELETE", "/admin/projects/1"),
            ("POST", "/admin/projects/1/api-keys"),
            ("GET", "/admin/projects/1/api-keys"),
            ("GET", "/admin/users/1/usage"),
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
