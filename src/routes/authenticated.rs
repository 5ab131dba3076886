use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer added by `create_router`,
/// so handlers can rely on a resolved `AuthUser`. Routes with a `{userId}` or
/// `{photoId}` segment take `OwnedUser` / `OwnedPhoto`, which also enforce that the
/// caller owns the target.
///
/// `body_limit` is applied to the photo upload routes so an oversized file reaches
/// the upload guard and gets a field-level violation instead of a bare 413.
pub fn authenticated_routes(body_limit: usize) -> Router<AppState> {
    Router::<AppState>::new()
        // POST /photos
        // Uploads a new photo (multipart: title, caption, photo) owned by the caller.
        .route(
            "/photos",
            post(handlers::photos::create_photo).layer(DefaultBodyLimit::max(body_limit)),
        )
        // PUT/DELETE /photos/{photoId}
        // Owner-only edit (optionally replacing the file) and removal.
        .route(
            "/photos/{photoId}",
            put(handlers::photos::update_photo)
                .layer(DefaultBodyLimit::max(body_limit))
                .delete(handlers::photos::delete_photo),
        )
        // PUT/DELETE /users/{userId}
        // Owner-only account update and deletion (photos and files included).
        .route(
            "/users/{userId}",
            put(handlers::users::update_user).delete(handlers::users::delete_user),
        )
}
