use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

// --- Core Records (Mapped to Database) ---

/// User
///
/// A registered account from the `users` table. `photos` is only filled when the
/// record was read with photos populated.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    // Unique across all users; enforced by the `users_email_key` index.
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub photos: Vec<Photo>,
}

/// Photo
///
/// A row from the `photos` table. `photo_url` is the public URL of the stored
/// image; its last path segment is the filename inside the file area.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Photo {
    pub id: i64,
    pub title: String,
    pub caption: String,
    pub photo_url: String,
    // FK to users.id (owner). Cascades on user deletion.
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub owner: Option<Box<User>>,
}

/// Fields needed to insert a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Full replacement of the mutable user columns.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub title: String,
    pub caption: String,
    pub photo_url: String,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct PhotoChanges {
    pub title: String,
    pub caption: String,
    pub photo_url: String,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /users/register`. Missing fields deserialize as empty
/// strings so that validation, not JSON parsing, reports them.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(
        length(min = 1, message = "email is required"),
        email(message = "email is not a valid email address")
    )]
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    // Checked against `password` by the handler, not by a declarative rule.
    pub confirm_password: String,
}

/// LoginRequest
///
/// Input payload for `POST /users/login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    #[validate(
        length(min = 1, message = "email is required"),
        email(message = "email is not a valid email address")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// UpdateUserRequest
///
/// Input payload for `PUT /users/{userId}`. Every column is replaced; the old
/// password proves the caller knows the current credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(
        length(min = 1, message = "email is required"),
        email(message = "email is not a valid email address")
    )]
    pub email: String,
    #[validate(length(min = 1, message = "oldPassword is required"))]
    pub old_password: String,
    #[validate(length(min = 6, message = "newPassword must be at least 6 characters"))]
    pub new_password: String,
    pub confirm_password: String,
}

/// PhotoForm
///
/// The validated shape of a photo create/update submission. Built by the photo
/// handlers from multipart fields plus the server-derived URL and owner.
#[derive(Debug, Clone, Validate, Default)]
pub struct PhotoForm {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub caption: String,
    #[validate(
        length(min = 1, message = "photo is required"),
        url(message = "photoUrl must be a valid URL")
    )]
    pub photo_url: String,
    #[validate(range(min = 1, message = "userId must reference a user"))]
    pub user_id: i64,
}

// --- Response Schemas (Output) ---

/// UserSummary
///
/// Public view of a user, embedded as the `owner` of a photo.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// PhotoSummary
///
/// A photo with its owner referenced by id only (listing and profile views).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PhotoSummary {
    pub id: i64,
    pub title: String,
    pub caption: String,
    pub photo_url: String,
    pub user_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Photo> for PhotoSummary {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id,
            title: photo.title.clone(),
            caption: photo.caption.clone(),
            photo_url: photo.photo_url.clone(),
            user_id: photo.user_id,
            created_at: photo.created_at,
            updated_at: photo.updated_at,
        }
    }
}

/// PhotoDetail
///
/// A photo hydrated with its owner; returned by create, update and delete.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PhotoDetail {
    pub id: i64,
    pub title: String,
    pub caption: String,
    pub photo_url: String,
    pub owner: UserSummary,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl PhotoDetail {
    pub fn new(photo: &Photo, owner: &User) -> Self {
        Self {
            id: photo.id,
            title: photo.title.clone(),
            caption: photo.caption.clone(),
            photo_url: photo.photo_url.clone(),
            owner: UserSummary::from(owner),
            created_at: photo.created_at,
            updated_at: photo.updated_at,
        }
    }
}

/// UserProfile
///
/// A user together with every photo they own.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub photos: Vec<PhotoSummary>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            photos: user.photos.iter().map(PhotoSummary::from).collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// TokenResponse
///
/// Returned by register and login; nothing else about the account is echoed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
}

/// PhotoList
///
/// Output of `GET /photos`, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PhotoList {
    pub photos: Vec<PhotoSummary>,
}
