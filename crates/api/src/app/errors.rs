use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use payd_core::ErrorKind;
use payd_infra::IdentityError;

const INTERNAL_MESSAGE: &str = "internal error";

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation | ErrorKind::PreconditionFailed => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Response for any classified error. Internal details never leave the process.
pub fn kind_to_response(kind: ErrorKind, message: impl Into<String>) -> axum::response::Response {
    let message = if kind.is_internal() {
        INTERNAL_MESSAGE.to_string()
    } else {
        message.into()
    };
    json_error(status_for(kind), kind.code(), message)
}

pub fn identity_error_to_response(err: IdentityError) -> axum::response::Response {
    let kind = err.kind();
    if kind.is_internal() {
        tracing::error!(error = %err, "request failed");
    }
    kind_to_response(kind, err.to_string())
}

pub fn validation_error(message: impl Into<String>) -> axum::response::Response {
    kind_to_response(ErrorKind::Validation, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
