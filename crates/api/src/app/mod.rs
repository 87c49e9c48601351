//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `routes/`: HTTP routes + handlers (one file per access level)
//! - `dto.rs`: request/response DTOs and field validation
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use payd_auth::SessionCookie;
use payd_infra::IdentityService;

use crate::{authz, middleware};

pub mod dto;
pub mod errors;
pub mod routes;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityService>,
    pub cookie: SessionCookie,
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(identity: Arc<dyn IdentityService>, cookie: SessionCookie) -> Router {
    let guard = |allowed: &'static [&'static str]| middleware::AuthState {
        identity: Arc::clone(&identity),
        cookie,
        allowed,
    };

    let admin = routes::admin::router().route_layer(axum::middleware::from_fn_with_state(
        guard(authz::ADMIN_ONLY),
        middleware::session_middleware,
    ));
    let account = routes::account::router().route_layer(axum::middleware::from_fn_with_state(
        guard(authz::ANY_MEMBER),
        middleware::session_middleware,
    ));

    let state = AppState {
        identity: Arc::clone(&identity),
        cookie,
    };

    Router::new()
        .merge(routes::public::router())
        .merge(account)
        .nest("/admin", admin)
        .layer(ServiceBuilder::new().layer(Extension(state)))
}
