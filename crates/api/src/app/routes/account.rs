use axum::{Json, Router, extract::Extension, routing::get};

use crate::app::dto;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new().route("/me", get(me))
}

/// GET /me - identity carried by the session token
pub async fn me(Extension(session): Extension<SessionContext>) -> Json<dto::MeResponse> {
    Json(dto::MeResponse::from(session.identity()))
}
