use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::AppConfig,
    error::{AppError, AuthFailure},
    models::User,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the identity token. Tokens are stateless: nothing about them is
/// stored server-side and they stay valid until `exp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id, as a decimal string.
    pub sub: String,
    /// Expiration Time (exp): seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat): seconds since the epoch.
    pub iat: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(TokenError::InvalidSubject)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("token has expired")]
    Expired,
    #[error("token rejected: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("token subject is not a user id")]
    InvalidSubject,
}

/// TokenService
///
/// Issues and verifies HS256 identity tokens with an absolute expiry.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.jwt_expiration_minutes)
    }

    /// Mints a token whose subject is `user_id`.
    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Sign)
    }

    /// Checks signature, expiry and subject shape. Pure: verifying the same token
    /// twice yields the same claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        // `exp` is an absolute instant.
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e),
        })?;

        data.claims.user_id()?;
        Ok(data.claims)
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Once resolved it is stored
/// in the request extensions, so the ownership extractors and handlers that run
/// later in the same request read it from there instead of verifying again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Splits `"<scheme> <token>"`. Exactly two space-separated parts are accepted and
/// the scheme must be Bearer.
pub fn bearer_token(header_value: &str) -> Result<&str, AppError> {
    if header_value.trim().is_empty() {
        return Err(AppError::Unauthenticated(AuthFailure::Missing));
    }

    let mut parts = header_value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AppError::Unauthenticated(AuthFailure::Malformed)),
    }
}

/// The guard:
/// 1. Reuse an identity already resolved earlier in this request.
/// 2. Read and split the `Authorization` header.
/// 3. Verify the token.
/// 4. Resolve the subject against the store, so deleted users are locked out even
///    while their tokens are unexpired.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(resolved) = parts.extensions.get::<AuthUser>() {
            return Ok(resolved.clone());
        }

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthenticated(AuthFailure::Missing))?
            .to_str()
            .map_err(|_| AppError::Unauthenticated(AuthFailure::Malformed))?;
        let token = bearer_token(header_value)?;

        let tokens = TokenService::from_ref(state);
        let claims = tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            AppError::Unauthenticated(AuthFailure::InvalidToken)
        })?;
        let user_id = claims
            .user_id()
            .map_err(|_| AppError::Unauthenticated(AuthFailure::InvalidToken))?;

        let repo = RepositoryState::from_ref(state);
        let user = repo.get_user(user_id, false).await?.ok_or_else(|| {
            tracing::warn!(user_id, "token subject no longer exists");
            AppError::Unauthenticated(AuthFailure::SubjectNotFound)
        })?;

        let auth_user = AuthUser::from(&user);
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}
