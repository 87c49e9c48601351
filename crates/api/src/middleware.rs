use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use payd_auth::SessionCookie;
use payd_core::ErrorKind;
use payd_infra::IdentityService;

use crate::app::errors;
use crate::authz;
use crate::context::SessionContext;

#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<dyn IdentityService>,
    pub cookie: SessionCookie,
    pub allowed: &'static [&'static str],
}

/// Verify the session cookie and enforce the route's allowed roles.
///
/// - missing/invalid/expired token: 401
/// - role not in `allowed`: 403
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_session_token(req.headers(), &state.cookie) else {
        return errors::kind_to_response(ErrorKind::Unauthenticated, "missing session cookie");
    };

    let session = match state.identity.verify_session(token) {
        Ok(identity) => SessionContext::new(identity),
        Err(e) => {
            tracing::debug!(error = %e, "rejected session token");
            return errors::identity_error_to_response(e);
        }
    };

    if let Err(e) = authz::authorize_session(&session, state.allowed) {
        return errors::kind_to_response(e.kind(), e.to_string());
    }

    req.extensions_mut().insert(session);
    next.run(req).await
}

fn extract_session_token<'a>(headers: &'a HeaderMap, cookie: &SessionCookie) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| cookie.extract(value))
}
