use crate::models::{NewPhoto, NewUser, Photo, PhotoChanges, User, UserChanges};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};
use thiserror::Error;

/// RepoError
///
/// Storage failures the handlers care to tell apart. Constraint violations are
/// reported as their own variants; everything else is an opaque database fault.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A unique constraint rejected the write (e.g. `users_email_key`).
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    /// A foreign key pointed at a row that does not exist.
    #[error("referenced row does not exist: {0}")]
    MissingReference(String),
    #[error("database error: {0}")]
    Db(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return RepoError::Conflict(db.constraint().unwrap_or_default().to_string());
            }
            if db.is_foreign_key_violation() {
                return RepoError::MissingReference(db.constraint().unwrap_or_default().to_string());
            }
        }
        RepoError::Db(e.to_string())
    }
}

/// Repository Trait
///
/// The persistence contract for users and photos. Handlers, the guard and the
/// ownership checks only ever see `Arc<dyn Repository>`, so the Postgres store and
/// the in-memory store are interchangeable.
///
/// Lookups return `Ok(None)` for a missing row; `Err` is reserved for real faults.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Fails with `Conflict` when the email already belongs to another user.
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoError>;
    /// With `with_photos`, the user's photos are loaded newest first.
    async fn get_user(&self, id: i64, with_photos: bool) -> Result<Option<User>, RepoError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<Option<User>, RepoError>;
    /// Returns whether a row was removed. The user's photo rows go with it.
    async fn delete_user(&self, id: i64) -> Result<bool, RepoError>;

    // --- Photos ---
    /// Fails with `MissingReference` when `user_id` names no user.
    async fn create_photo(&self, new_photo: NewPhoto) -> Result<Photo, RepoError>;
    /// With `with_owner`, `photo.owner` is filled in when the owner still exists.
    async fn get_photo(&self, id: i64, with_owner: bool) -> Result<Option<Photo>, RepoError>;
    /// Every photo, newest first (`created_at DESC, id DESC`).
    async fn list_photos(&self) -> Result<Vec<Photo>, RepoError>;
    async fn update_photo(&self, id: i64, changes: PhotoChanges) -> Result<Option<Photo>, RepoError>;
    async fn delete_photo(&self, id: i64) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at, updated_at";
const PHOTO_COLUMNS: &str = "id, title, caption, photo_url, user_id, created_at, updated_at";

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL. Queries are bound at runtime so the crate
/// builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn photos_of(&self, user_id: i64) -> Result<Vec<Photo>, RepoError> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, Photo>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::debug!("create_user error: {:?}", e);
                RepoError::from(e)
            })
    }

    async fn get_user(&self, id: i64, with_photos: bool) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match user {
            Some(mut user) if with_photos => {
                user.photos = self.photos_of(user.id).await?;
                Ok(Some(user))
            }
            other => Ok(other),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<Option<User>, RepoError> {
        let sql = format!(
            r#"UPDATE users
               SET username = $1, email = $2, password_hash = $3, updated_at = NOW()
               WHERE id = $4
               RETURNING {USER_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(&changes.username)
            .bind(&changes.email)
            .bind(&changes.password_hash)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_photo(&self, new_photo: NewPhoto) -> Result<Photo, RepoError> {
        let sql = format!(
            "INSERT INTO photos (title, caption, photo_url, user_id) VALUES ($1, $2, $3, $4) RETURNING {PHOTO_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Photo>(&sql)
            .bind(&new_photo.title)
            .bind(&new_photo.caption)
            .bind(&new_photo.photo_url)
            .bind(new_photo.user_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_photo(&self, id: i64, with_owner: bool) -> Result<Option<Photo>, RepoError> {
        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1");
        let photo = sqlx::query_as::<_, Photo>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match photo {
            Some(mut photo) if with_owner => {
                photo.owner = self.get_user(photo.user_id, false).await?.map(Box::new);
                Ok(Some(photo))
            }
            other => Ok(other),
        }
    }

    async fn list_photos(&self) -> Result<Vec<Photo>, RepoError> {
        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos ORDER BY created_at DESC, id DESC");
        Ok(sqlx::query_as::<_, Photo>(&sql).fetch_all(&self.pool).await?)
    }

    async fn update_photo(&self, id: i64, changes: PhotoChanges) -> Result<Option<Photo>, RepoError> {
        let sql = format!(
            r#"UPDATE photos
               SET title = $1, caption = $2, photo_url = $3, updated_at = NOW()
               WHERE id = $4
               RETURNING {PHOTO_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, Photo>(&sql)
            .bind(&changes.title)
            .bind(&changes.caption)
            .bind(&changes.photo_url)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_photo(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    photos: BTreeMap<i64, Photo>,
    next_user_id: i64,
    next_photo_id: i64,
}

impl Tables {
    fn email_owner(&self, email: &str) -> Option<i64> {
        self.users.values().find(|u| u.email == email).map(|u| u.id)
    }

    fn photos_of(&self, user_id: i64) -> Vec<Photo> {
        let mut photos: Vec<Photo> = self
            .photos
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut photos);
        photos
    }
}

fn newest_first(photos: &mut [Photo]) {
    photos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// InMemoryRepository
///
/// A `Repository` over process memory with the same constraints as the SQL schema:
/// unique emails, photo owners must exist, and deleting a user deletes their photos.
/// Used by the test suites and handy for running the API without Postgres.
///
/// Timestamps come from `clock`, wall time unless built with `with_clock`.
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::with_clock(Utc::now)
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock: Box::new(clock),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave the maps half-written.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User, RepoError> {
        let mut tables = self.tables();
        if tables.email_owner(&new_user.email).is_some() {
            return Err(RepoError::Conflict("users_email_key".to_string()));
        }

        tables.next_user_id += 1;
        let now = (self.clock)();
        let user = User {
            id: tables.next_user_id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: now,
            updated_at: now,
            photos: Vec::new(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64, with_photos: bool) -> Result<Option<User>, RepoError> {
        let tables = self.tables();
        Ok(tables.users.get(&id).cloned().map(|mut user| {
            if with_photos {
                user.photos = tables.photos_of(id);
            }
            user
        }))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let tables = self.tables();
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<Option<User>, RepoError> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if tables.email_owner(&changes.email).is_some_and(|owner| owner != id) {
            return Err(RepoError::Conflict("users_email_key".to_string()));
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.username = changes.username;
        user.email = changes.email;
        user.password_hash = changes.password_hash;
        user.updated_at = (self.clock)();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepoError> {
        let mut tables = self.tables();
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        tables.photos.retain(|_, photo| photo.user_id != id);
        Ok(true)
    }

    async fn create_photo(&self, new_photo: NewPhoto) -> Result<Photo, RepoError> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&new_photo.user_id) {
            return Err(RepoError::MissingReference("photos_user_id_fkey".to_string()));
        }

        tables.next_photo_id += 1;
        let now = (self.clock)();
        let photo = Photo {
            id: tables.next_photo_id,
            title: new_photo.title,
            caption: new_photo.caption,
            photo_url: new_photo.photo_url,
            user_id: new_photo.user_id,
            created_at: now,
            updated_at: now,
            owner: None,
        };
        tables.photos.insert(photo.id, photo.clone());
        Ok(photo)
    }

    async fn get_photo(&self, id: i64, with_owner: bool) -> Result<Option<Photo>, RepoError> {
        let tables = self.tables();
        Ok(tables.photos.get(&id).cloned().map(|mut photo| {
            if with_owner {
                photo.owner = tables.users.get(&photo.user_id).cloned().map(Box::new);
            }
            photo
        }))
    }

    async fn list_photos(&self) -> Result<Vec<Photo>, RepoError> {
        let tables = self.tables();
        let mut photos: Vec<Photo> = tables.photos.values().cloned().collect();
        newest_first(&mut photos);
        Ok(photos)
    }

    async fn update_photo(&self, id: i64, changes: PhotoChanges) -> Result<Option<Photo>, RepoError> {
        let mut tables = self.tables();
        Ok(tables.photos.get_mut(&id).map(|photo| {
            photo.title = changes.title;
            photo.caption = changes.caption;
            photo.photo_url = changes.photo_url;
            photo.updated_at = (self.clock)();
            photo.clone()
        }))
    }

    async fn delete_photo(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.tables().photos.remove(&id).is_some())
    }
}
