#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use photo_vault::{
    AppConfig, AppState, BcryptHasher, HasherState, InMemoryRepository, MockStorageService,
    TokenService, create_router,
    models::{NewPhoto, NewUser, Photo, User},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const BOUNDARY: &str = "photo-vault-test-boundary";

/// Handles to the collaborators behind a test `AppState`, kept so tests can
/// arrange data and inspect side effects directly.
pub struct TestContext {
    pub state: AppState,
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with(MockStorageService::new(), AppConfig::default())
    }

    pub fn with(storage: MockStorageService, config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage: Arc::new(storage.clone()) as StorageState,
            hasher: Arc::new(BcryptHasher::new(config.bcrypt_cost)) as HasherState,
            tokens: TokenService::from_config(&config),
            config,
        };
        Self {
            state,
            repo,
            storage,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Inserts a user with a real bcrypt digest and returns it with a valid token.
    pub async fn seed_user(&self, username: &str, email: &str, password: &str) -> (User, String) {
        let user = self
            .repo
            .create_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: self.state.hasher.hash(password).unwrap(),
            })
            .await
            .unwrap();
        let token = self.state.tokens.issue(user.id).unwrap();
        (user, token)
    }

    /// Inserts a photo row and puts its file in the mock file area.
    pub async fn seed_photo(&self, owner_id: i64, title: &str, filename: &str) -> Photo {
        self.storage.seed(filename, b"seeded".to_vec());
        self.repo
            .create_photo(NewPhoto {
                title: title.to_string(),
                caption: format!("{title} caption"),
                photo_url: format!("{}/{}", self.state.config.public_base_url, filename),
                user_id: owner_id,
            })
            .await
            .unwrap()
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Builds a `multipart/form-data` body: text fields plus an optional `photo` file
/// given as (filename, content type, bytes).
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Vec<u8>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, bearer(token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Sends one request through the full router and decodes the JSON envelope.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
