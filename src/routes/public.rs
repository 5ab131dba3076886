use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that are **unauthenticated**: account creation, sign-in, and the
/// read-only photo feed.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /users/register
        // Creates an account and returns an access token for it.
        .route("/users/register", post(handlers::users::register_user))
        // POST /users/login
        // Exchanges email and password for an access token.
        .route("/users/login", post(handlers::users::login_user))
        // GET /photos
        // Every photo, newest first.
        .route("/photos", get(handlers::photos::list_photos))
}
