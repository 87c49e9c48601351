//! Admin routes for identity management.
//!
//! Mounted under `/admin` behind the admin-only session guard.

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::app::{AppState, dto, errors};
use crate::context::SessionContext;

use super::json_body;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/roles", get(list_roles))
}

/// POST /admin/register - create an inactive identity with the placeholder credential
pub async fn register(
    Extension(state): Extension<AppState>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(payload) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let request = match body.validate() {
        Ok(request) => request,
        Err(e) => return errors::validation_error(e.to_string()),
    };

    match state.identity.register(request).await {
        Ok(id) => {
            tracing::info!(
                identity_id = %id,
                registered_by = %session.identity().id,
                "identity registered"
            );
            (
                StatusCode::OK,
                Json(dto::CreatedUserResponse {
                    message: "user created successfully",
                    id: id.to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => errors::identity_error_to_response(e),
    }
}

/// GET /admin/roles - current role catalog snapshot
pub async fn list_roles(Extension(state): Extension<AppState>) -> Json<Vec<dto::RoleResponse>> {
    Json(
        state
            .identity
            .roles()
            .into_iter()
            .map(dto::RoleResponse::from)
            .collect(),
    )
}
