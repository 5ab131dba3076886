//! Request handlers, one module per resource.
//!
//! Every handler returns `Result<Jsend<T>, AppError>`: the success half of the
//! envelope comes from `Jsend`, both failure halves from `AppError`.

pub mod photos;
pub mod users;

use axum::{Json, extract::rejection::JsonRejection};

use crate::error::AppError;

/// Unwraps a JSON body, turning any rejection (wrong content type, syntax error,
/// wrong field types) into the `json` violation.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(error = %rejection, "json body rejected");
        AppError::invalid_json()
    })
}
