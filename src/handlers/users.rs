use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::{
    AppState,
    error::AppError,
    handlers::json_body,
    models::{
        LoginRequest, NewUser, RegisterRequest, TokenResponse, UpdateUserRequest, UserChanges,
        UserProfile,
    },
    ownership::{OwnedUser, ResourceKind},
    response::Jsend,
    storage::filename_from_url,
    validation,
};

/// register_user
///
/// [Public Route] Creates an account and signs the new user in.
#[utoipa::path(
    post,
    path = "/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = TokenResponse),
        (status = 400, description = "Validation failed or email already taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Jsend<TokenResponse>, AppError> {
    let req = json_body(payload)?;

    let mut violations = validation::check(&req);
    if req.password != req.confirm_password {
        violations.insert("confirmPassword", "password must be matched");
    }
    violations.into_result()?;

    if state.repo.get_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::EmailTaken);
    }

    let password_hash = state.hasher.hash(&req.password)?;
    // A concurrent registration with the same email still trips users_email_key,
    // which RepoError::Conflict maps to EmailTaken.
    let user = state
        .repo
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = user.id, "user registered");
    let access_token = state.tokens.issue(user.id)?;
    Ok(Jsend::created(TokenResponse { access_token }))
}

/// login_user
///
/// [Public Route] Exchanges email and password for an access token. An unknown
/// email and a wrong password are indistinguishable to the client.
#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Email and password do not match")
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Jsend<TokenResponse>, AppError> {
    let req = json_body(payload)?;
    validation::check(&req).into_result()?;

    let Some(user) = state.repo.get_user_by_email(&req.email).await? else {
        state.hasher.match_decoy(&req.password);
        return Err(AppError::InvalidCredentials);
    };

    if !state.hasher.matches(&user.password_hash, &req.password) {
        tracing::info!(user_id = user.id, "login rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let access_token = state.tokens.issue(user.id)?;
    Ok(Jsend::ok(TokenResponse { access_token }))
}

/// update_user
///
/// [Authenticated Route] Replaces the caller's username, email and password.
///
/// *Authorization*: `OwnedUser` rejects unless `{userId}` is the caller.
#[utoipa::path(
    put,
    path = "/users/{userId}",
    params(("userId" = i64, Path, description = "Id of the account to update")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Validation failed or email already taken"),
        (status = 401, description = "Not signed in, or old password does not match"),
        (status = 403, description = "Not the account owner"),
        (status = 404, description = "No such user")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    OwnedUser(user): OwnedUser,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Jsend<UserProfile>, AppError> {
    let req = json_body(payload)?;

    let mut violations = validation::check(&req);
    if req.new_password != req.confirm_password {
        violations.insert("confirmPassword", "password must be matched with the new one");
    }
    violations.into_result()?;

    if !state.hasher.matches(&user.password_hash, &req.old_password) {
        return Err(AppError::OldPasswordMismatch);
    }

    if req.email != user.email {
        if let Some(holder) = state.repo.get_user_by_email(&req.email).await? {
            if holder.id != user.id {
                return Err(AppError::EmailTaken);
            }
        }
    }

    let password_hash = state.hasher.hash(&req.new_password)?;
    state
        .repo
        .update_user(
            user.id,
            UserChanges {
                username: req.username,
                email: req.email,
                password_hash,
            },
        )
        .await?
        .ok_or(AppError::NotFound(ResourceKind::User))?;

    let refreshed = state
        .repo
        .get_user(user.id, true)
        .await?
        .ok_or(AppError::NotFound(ResourceKind::User))?;

    tracing::info!(user_id = user.id, "user updated");
    Ok(Jsend::ok(UserProfile::from(&refreshed)))
}

/// delete_user
///
/// [Authenticated Route] Deletes the caller's account, its photos, and their files.
/// Responds with the account as it was before deletion.
#[utoipa::path(
    delete,
    path = "/users/{userId}",
    params(("userId" = i64, Path, description = "Id of the account to delete")),
    responses(
        (status = 200, description = "Deleted", body = UserProfile),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the account owner"),
        (status = 404, description = "No such user")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    OwnedUser(user): OwnedUser,
) -> Result<Jsend<UserProfile>, AppError> {
    let user = state
        .repo
        .get_user(user.id, true)
        .await?
        .ok_or(AppError::NotFound(ResourceKind::User))?;

    // Photo rows go with the user (ON DELETE CASCADE); their files do not.
    if !state.repo.delete_user(user.id).await? {
        return Err(AppError::NotFound(ResourceKind::User));
    }
    let mut first_failure = None;
    for photo in &user.photos {
        let filename = filename_from_url(&photo.photo_url);
        if let Err(e) = state.storage.remove(filename).await {
            tracing::error!(photo_id = photo.id, file = filename, error = %e, "photo file not removed");
            first_failure.get_or_insert(e);
        }
    }
    if let Some(e) = first_failure {
        return Err(e.into());
    }

    tracing::info!(user_id = user.id, photos = user.photos.len(), "user deleted");
    Ok(Jsend::ok(UserProfile::from(&user)))
}
