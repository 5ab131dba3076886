use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod ownership;
pub mod password;
pub mod repository;
pub mod response;
pub mod storage;
pub mod validation;

// Module for routing segregation (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::TokenService;
pub use config::{AppConfig, Env};
pub use error::AppError;
pub use password::{BcryptHasher, HasherState, PasswordHasher};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalStorage, MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Auto-generated OpenAPI document for every handler annotated with
/// `#[utoipa::path]`, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::users::register_user, handlers::users::login_user,
        handlers::users::update_user, handlers::users::delete_user,
        handlers::photos::list_photos, handlers::photos::create_photo,
        handlers::photos::update_photo, handlers::photos::delete_photo,
    ),
    components(
        schemas(
            models::RegisterRequest, models::LoginRequest, models::UpdateUserRequest,
            models::TokenResponse, models::UserSummary, models::UserProfile,
            models::PhotoSummary, models::PhotoDetail, models::PhotoList,
            handlers::photos::PhotoUploadForm,
        )
    ),
    tags(
        (name = "photo-vault", description = "Photo sharing API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, immutable container of every service the handlers need, shared
/// across all requests. Each piece is constructor-injected, so tests swap in the
/// in-memory repository and mock storage without touching handler code.
#[derive(Clone)]
pub struct AppState {
    /// Users and photos (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Backing file area for photo bytes.
    pub storage: StorageState,
    pub hasher: HasherState,
    /// Signs and verifies access tokens.
    pub tokens: TokenService,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors and handlers pull single components out of the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for HasherState {
    fn from_ref(app_state: &AppState) -> HasherState {
        app_state.hasher.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Runs the authentication guard in front of every authenticated route.
///
/// Extracting `AuthUser` verifies the bearer token and resolves its subject; on
/// failure the extractor's `AppError` rejection becomes the 401 response and the
/// handler never runs. On success the identity is already cached in the request
/// extensions for the handler's own extractors.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // In local mode photos live on disk and are served back from /public.
    let local_files = (state.config.env == Env::Local).then(|| state.config.upload_dir.clone());
    let body_limit = state.config.body_limit_bytes();

    // 2. Base Router Assembly
    let mut base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by the `auth_middleware`.
        .merge(
            authenticated::authenticated_routes(body_limit).route_layer(
                middleware::from_fn_with_state(state.clone(), auth_middleware),
            ),
        )
        // Apply the Unified State to all routes.
        .with_state(state);

    if let Some(dir) = local_files {
        base_router = base_router.nest_service("/public", ServeDir::new(dir));
    }

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer (Applied last, allowing all traffic in/out after processing)
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `http_request` span for `TraceLayer`, tagging it with the method, URI
/// and `x-request-id` so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
