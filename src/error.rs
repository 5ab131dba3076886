use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    auth::TokenError,
    ownership::ResourceKind,
    password::HashError,
    repository::RepoError,
    response::{ErrorBody, FailBody},
    storage::StorageError,
    validation::Violations,
};

/// AuthFailure
///
/// Why the authentication guard turned a request away. All variants answer 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization` header was sent.
    Missing,
    /// The header is not `<scheme> <token>` with a Bearer scheme.
    Malformed,
    /// Bad signature, expired, or an unreadable payload.
    InvalidToken,
    /// The token is valid but its subject no longer exists.
    SubjectNotFound,
}

/// AppError
///
/// The single error type returned by extractors and handlers. Client-caused
/// variants render as a JSend `fail` envelope keyed by field; `Internal` renders
/// as a JSend `error` envelope carrying the underlying message.
#[derive(Debug, Error, PartialEq)]
pub enum AppError {
    #[error("request failed validation: {0:?}")]
    Validation(Violations),
    #[error("unauthenticated: {0:?}")]
    Unauthenticated(AuthFailure),
    #[error("email and password do not match")]
    InvalidCredentials,
    #[error("old password does not match")]
    OldPasswordMismatch,
    #[error("caller does not own the resource")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(ResourceKind),
    #[error("invalid {0} id")]
    InvalidId(ResourceKind),
    #[error("email is already taken")]
    EmailTaken,
    #[error("photo owner could not be loaded")]
    OwnerMissing,
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// The request body could not be read as JSON.
    pub fn invalid_json() -> Self {
        Self::Validation(Violations::single("json", "Invalid json format"))
    }

    /// The request body could not be read as multipart form-data.
    pub fn invalid_form() -> Self {
        Self::Validation(Violations::single("form-data", "Invalid form-data format"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidId(_)
            | AppError::EmailTaken
            | AppError::OwnerMissing => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_)
            | AppError::InvalidCredentials
            | AppError::OldPasswordMismatch => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Field-keyed payload of the `fail` envelope for client-caused errors.
    pub fn violations(&self) -> Violations {
        match self {
            AppError::Validation(violations) => violations.clone(),
            AppError::Unauthenticated(AuthFailure::Missing) => {
                Violations::single("token", "There's no token provided, please login")
            }
            AppError::Unauthenticated(AuthFailure::Malformed) => {
                Violations::single("token", "Token provided is invalid")
            }
            AppError::Unauthenticated(AuthFailure::InvalidToken) => {
                Violations::single("token", "Token is invalid or has expired")
            }
            AppError::Unauthenticated(AuthFailure::SubjectNotFound) => {
                Violations::single("message", "There's no user found related to the token")
            }
            AppError::InvalidCredentials => {
                Violations::single("message", "Email and password provided doesn't match")
            }
            AppError::OldPasswordMismatch => Violations::single(
                "oldPassword",
                "old password doesn't match the current password.",
            ),
            AppError::Forbidden => Violations::single(
                "message",
                "Access denied, you are unauthorized to access this resource",
            ),
            AppError::NotFound(kind) => Violations::single(
                kind.as_str(),
                format!("There's no {kind} found related with provided {kind} id"),
            ),
            AppError::InvalidId(kind) => {
                Violations::single(format!("{kind}_id"), format!("Invalid {kind} ID"))
            }
            AppError::EmailTaken => Violations::single("email", "Email is already taken"),
            AppError::OwnerMissing => Violations::single(
                "message",
                "Can't populate owner of the photo, user with related userId is not found",
            ),
            AppError::Internal(_) => Violations::new(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Internal(message) => {
                tracing::error!(%message, "request failed with an internal fault");
                (status, Json(ErrorBody::new(message))).into_response()
            }
            other => (status, Json(FailBody::new(other.violations()))).into_response(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            // users.email is the only unique constraint in the schema.
            RepoError::Conflict(_) => AppError::EmailTaken,
            RepoError::MissingReference(_) => AppError::OwnerMissing,
            RepoError::Db(inner) => AppError::Internal(inner.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<HashError> for AppError {
    fn from(e: HashError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Internal(e.to_string())
    }
}
