use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::validation::Violations;

/// Jsend
///
/// Success half of the JSend envelope used by every endpoint:
/// `{"status": "success", "data": ...}`. The failure halves (`fail` and `error`)
/// are produced by `AppError`'s `IntoResponse` implementation.
#[derive(Debug, Clone)]
pub struct Jsend<T> {
    code: StatusCode,
    data: T,
}

impl<T> Jsend<T> {
    /// 200 OK with the given payload.
    pub fn ok(data: T) -> Self {
        Self {
            code: StatusCode::OK,
            data,
        }
    }

    /// 201 Created with the given payload.
    pub fn created(data: T) -> Self {
        Self {
            code: StatusCode::CREATED,
            data,
        }
    }
}

#[derive(Serialize)]
struct SuccessBody<T> {
    status: &'static str,
    data: T,
}

/// Body of a `fail` response: a client-caused problem keyed by field.
#[derive(Debug, Serialize)]
pub struct FailBody {
    pub status: &'static str,
    pub data: Violations,
}

impl FailBody {
    pub fn new(data: Violations) -> Self {
        Self {
            status: "fail",
            data,
        }
    }
}

/// Body of an `error` response: a server-side fault with its message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: String) -> Self {
        Self {
            status: "error",
            message,
        }
    }
}

impl<T: Serialize> IntoResponse for Jsend<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            status: "success",
            data: self.data,
        };
        (self.code, Json(body)).into_response()
    }
}
