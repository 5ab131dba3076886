use std::fmt;

use axum::{
    extract::{FromRef, FromRequestParts, Path},
    http::request::Parts,
};
use serde::Deserialize;

use crate::{
    auth::{AuthUser, TokenService},
    error::AppError,
    models::{Photo, User},
    repository::{Repository, RepositoryState},
};

/// The kinds of resource that have an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Photo,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Photo => "photo",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ResourceRef
///
/// Which resource a request targets, taken from the route's path parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    User(i64),
    Photo(i64),
}

impl ResourceRef {
    /// Accepts only positive integers; anything else is `InvalidId` for `kind`.
    pub fn parse(kind: ResourceKind, raw: &str) -> Result<Self, AppError> {
        let id = raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(AppError::InvalidId(kind))?;
        Ok(match kind {
            ResourceKind::User => ResourceRef::User(id),
            ResourceKind::Photo => ResourceRef::Photo(id),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRef::User(_) => ResourceKind::User,
            ResourceRef::Photo(_) => ResourceKind::Photo,
        }
    }
}

/// A loaded resource that passed the ownership check.
#[derive(Debug, Clone)]
pub enum Resource {
    User(User),
    Photo(Photo),
}

impl Resource {
    pub fn owner_id(&self) -> i64 {
        match self {
            Resource::User(user) => user.id,
            Resource::Photo(photo) => photo.user_id,
        }
    }
}

/// Loads `target` and checks that `caller` owns it. A user owns their own account
/// and every photo whose `user_id` is theirs.
pub async fn authorize(
    repo: &dyn Repository,
    caller: &AuthUser,
    target: ResourceRef,
) -> Result<Resource, AppError> {
    let resource = match target {
        ResourceRef::User(id) => repo.get_user(id, false).await?.map(Resource::User),
        ResourceRef::Photo(id) => repo.get_photo(id, false).await?.map(Resource::Photo),
    }
    .ok_or(AppError::NotFound(target.kind()))?;

    if resource.owner_id() != caller.id {
        tracing::info!(
            caller = caller.id,
            owner = resource.owner_id(),
            kind = %target.kind(),
            "ownership check denied"
        );
        return Err(AppError::Forbidden);
    }
    Ok(resource)
}

#[derive(Deserialize)]
struct UserIdParam {
    #[serde(rename = "userId")]
    user_id: String,
}

#[derive(Deserialize)]
struct PhotoIdParam {
    #[serde(rename = "photoId")]
    photo_id: String,
}

/// Runs the guard, then the ownership check against the given path id.
async fn resolve<S>(
    parts: &mut Parts,
    state: &S,
    raw_id: Option<String>,
    kind: ResourceKind,
) -> Result<Resource, AppError>
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    let caller = AuthUser::from_request_parts(parts, state).await?;
    let raw = raw_id.ok_or_else(|| {
        tracing::error!(kind = %kind, "ownership extractor used on a route without an id parameter");
        AppError::Internal(format!("route has no {kind} id parameter"))
    })?;
    let target = ResourceRef::parse(kind, &raw)?;

    let repo = RepositoryState::from_ref(state);
    authorize(repo.as_ref(), &caller, target).await
}

/// OwnedUser
///
/// Extracts the `{userId}` account, rejecting unless the caller is that user.
#[derive(Debug, Clone)]
pub struct OwnedUser(pub User);

impl<S> FromRequestParts<S> for OwnedUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = Path::<UserIdParam>::from_request_parts(parts, state)
            .await
            .map(|Path(param)| param.user_id)
            .ok();
        match resolve(parts, state, raw, ResourceKind::User).await? {
            Resource::User(user) => Ok(OwnedUser(user)),
            Resource::Photo(_) => Err(AppError::Internal("expected a user resource".into())),
        }
    }
}

/// OwnedPhoto
///
/// Extracts the `{photoId}` photo, rejecting unless the caller owns it.
#[derive(Debug, Clone)]
pub struct OwnedPhoto(pub Photo);

impl<S> FromRequestParts<S> for OwnedPhoto
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = Path::<PhotoIdParam>::from_request_parts(parts, state)
            .await
            .map(|Path(param)| param.photo_id)
            .ok();
        match resolve(parts, state, raw, ResourceKind::Photo).await? {
            Resource::Photo(photo) => Ok(OwnedPhoto(photo)),
            Resource::User(_) => Err(AppError::Internal("expected a photo resource".into())),
        }
    }
}
