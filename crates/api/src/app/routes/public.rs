//! Unauthenticated routes: liveness, login/logout and account activation.

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};

use crate::app::{AppState, dto, errors};

use super::json_body;

pub fn router() -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/activate", post(activate))
}

pub async fn ping() -> Json<dto::MessageResponse> {
    Json(dto::MessageResponse { message: "pong" })
}

/// POST /login - exchange credentials for a session cookie
pub async fn login(
    Extension(state): Extension<AppState>,
    payload: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(payload) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    if let Err(e) = body.validate() {
        return errors::validation_error(e.to_string());
    }

    let identity = match state.identity.login(&body.username, &body.password).await {
        Ok(identity) => identity,
        Err(e) => return errors::identity_error_to_response(e),
    };
    let token = match state.identity.issue_session(&identity) {
        Ok(token) => token,
        Err(e) => return errors::identity_error_to_response(e),
    };

    tracing::info!(identity_id = %identity.id, role = identity.role.as_str(), "login succeeded");

    (
        StatusCode::OK,
        [(header::SET_COOKIE, state.cookie.set_cookie(&token))],
        Json(dto::MessageResponse {
            message: "Login successful",
        }),
    )
        .into_response()
}

/// POST /logout - drop the session cookie
pub async fn logout(Extension(state): Extension<AppState>) -> axum::response::Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, state.cookie.clear_cookie())],
        Json(dto::MessageResponse {
            message: "logged out",
        }),
    )
        .into_response()
}

/// POST /activate - set the real password and create the employee record
pub async fn activate(
    Extension(state): Extension<AppState>,
    payload: Result<Json<dto::ActivateAccountRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(payload) {
        Ok(body) => body,
        Err(resp) => return resp,
    };
    let id = match body.validate() {
        Ok(id) => id,
        Err(e) => return errors::validation_error(e.to_string()),
    };

    match state.identity.activate(id, body.name.trim(), &body.password).await {
        Ok(_) => (
            StatusCode::OK,
            Json(dto::MessageResponse {
                message: "Account activated successfully",
            }),
        )
            .into_response(),
        Err(e) => errors::identity_error_to_response(e),
    }
}
