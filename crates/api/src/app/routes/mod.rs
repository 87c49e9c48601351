use axum::Json;
use axum::extract::rejection::JsonRejection;

use crate::app::errors;

pub mod account;
pub mod admin;
pub mod public;

/// Unwrap a JSON body, answering malformed input with the usual error shape.
pub(crate) fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, axum::response::Response> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| errors::validation_error(rejection.body_text()))
}
