mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{TestContext, empty_request, json_request, send};
use photo_vault::{
    BcryptHasher, PasswordHasher,
    password::HashError,
    repository::Repository,
};
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

fn register_payload(email: &str, password: &str, confirm: &str) -> Value {
    json!({
        "username": "jane",
        "email": email,
        "password": password,
        "confirmPassword": confirm
    })
}

fn update_payload(email: &str, old: &str, new: &str, confirm: &str) -> Value {
    json!({
        "username": "jane-renamed",
        "email": email,
        "oldPassword": old,
        "newPassword": new,
        "confirmPassword": confirm
    })
}

// --- Register ---

#[tokio::test]
async fn test_register_returns_token_for_new_user() {
    let ctx = TestContext::new();
    let (status, body) = send(
        ctx.router(),
        json_request(
            "POST",
            "/users/register",
            None,
            &register_payload("jane@example.com", "hunter22", "hunter22"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    let token = body["data"]["accessToken"].as_str().unwrap();

    let claims = ctx.state.tokens.verify(token).unwrap();
    let user = ctx
        .repo
        .get_user(claims.user_id().unwrap(), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.email, "jane@example.com");
    assert_ne!(user.password_hash, "hunter22", "password must be stored hashed");
}

#[tokio::test]
async fn test_register_reports_confirmation_mismatch() {
    let ctx = TestContext::new();
    let (status, body) = send(
        ctx.router(),
        json_request(
            "POST",
            "/users/register",
            None,
            &register_payload("jane@example.com", "hunter22", "hunter23"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["data"], json!({"confirmPassword": "password must be matched"}));
}

#[tokio::test]
async fn test_register_merges_mismatch_with_other_violations() {
    let ctx = TestContext::new();
    let payload = json!({"username": "", "email": "jane@example.com", "password": "abc", "confirmPassword": "xyz"});
    let (status, body) = send(ctx.router(), json_request("POST", "/users/register", None, &payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["confirmPassword"], "password must be matched");
    assert_eq!(body["data"]["username"], "username is required");
    assert_eq!(body["data"]["password"], "password must be at least 6 characters");
}

#[tokio::test]
async fn test_register_rejects_taken_email() {
    let ctx = TestContext::new();
    ctx.seed_user("jane", "jane@example.com", "hunter22").await;

    let (status, body) = send(
        ctx.router(),
        json_request(
            "POST",
            "/users/register",
            None,
            &register_payload("jane@example.com", "hunter22", "hunter22"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"], json!({"email": "Email is already taken"}));
}

#[tokio::test]
async fn test_register_rejects_malformed_json() {
    let ctx = TestContext::new();
    let request = Request::builder()
        .method("POST")
        .uri("/users/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(ctx.router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"status": "fail", "data": {"json": "Invalid json format"}})
    );
}

// --- Login ---

#[tokio::test]
async fn test_login_returns_token() {
    let ctx = TestContext::new();
    let (user, _) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;

    let payload = json!({"email": "jane@example.com", "password": "hunter22"});
    let (status, body) = send(ctx.router(), json_request("POST", "/users/login", None, &payload)).await;

    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["accessToken"].as_str().unwrap();
    assert_eq!(ctx.state.tokens.verify(token).unwrap().user_id().unwrap(), user.id);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let ctx = TestContext::new();
    ctx.seed_user("jane", "jane@example.com", "hunter22").await;

    let wrong_password = json!({"email": "jane@example.com", "password": "nope-nope"});
    let unknown_email = json!({"email": "ghost@example.com", "password": "hunter22"});

    let (status_a, body_a) =
        send(ctx.router(), json_request("POST", "/users/login", None, &wrong_password)).await;
    let (status_b, body_b) =
        send(ctx.router(), json_request("POST", "/users/login", None, &unknown_email)).await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_a, status_b);
    assert_eq!(body_a, body_b);
    assert_eq!(
        body_a["data"]["message"],
        "Email and password provided doesn't match"
    );
}

/// Counts decoy comparisons while delegating real work to bcrypt.
struct CountingHasher {
    inner: BcryptHasher,
    decoys: Arc<AtomicUsize>,
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        self.inner.hash(plaintext)
    }

    fn matches(&self, digest: &str, plaintext: &str) -> bool {
        self.inner.matches(digest, plaintext)
    }

    fn match_decoy(&self, plaintext: &str) {
        self.decoys.fetch_add(1, Ordering::SeqCst);
        self.inner.match_decoy(plaintext);
    }
}

#[tokio::test]
async fn test_login_with_unknown_email_still_compares_a_digest() {
    let decoys = Arc::new(AtomicUsize::new(0));
    let mut ctx = TestContext::new();
    ctx.state.hasher = Arc::new(CountingHasher {
        inner: BcryptHasher::new(4),
        decoys: decoys.clone(),
    });
    ctx.seed_user("jane", "jane@example.com", "hunter22").await;

    let unknown_email = json!({"email": "ghost@example.com", "password": "hunter22"});
    let (status, _) =
        send(ctx.router(), json_request("POST", "/users/login", None, &unknown_email)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(decoys.load(Ordering::SeqCst), 1);

    let wrong_password = json!({"email": "jane@example.com", "password": "nope-nope"});
    let (status, _) =
        send(ctx.router(), json_request("POST", "/users/login", None, &wrong_password)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(decoys.load(Ordering::SeqCst), 1, "a known email compares its own digest");
}

#[test]
fn test_decoy_comparison_never_panics() {
    let hasher = BcryptHasher::new(4);
    hasher.match_decoy("anything");
    hasher.match_decoy("");
}

#[tokio::test]
async fn test_login_validates_input() {
    let ctx = TestContext::new();
    let payload = json!({"email": "jane@example.com"});
    let (status, body) = send(ctx.router(), json_request("POST", "/users/login", None, &payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["password"], "password is required");
}

// --- Update ---

#[tokio::test]
async fn test_update_user_replaces_profile_and_password() {
    let ctx = TestContext::new();
    let (user, token) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;
    ctx.seed_photo(user.id, "Dunes", "dunes.jpg").await;

    let (status, body) = send(
        ctx.router(),
        json_request(
            "PUT",
            &format!("/users/{}", user.id),
            Some(&token),
            &update_payload("jane.new@example.com", "hunter22", "newpass1", "newpass1"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "jane-renamed");
    assert_eq!(body["data"]["email"], "jane.new@example.com");
    assert_eq!(body["data"]["photos"].as_array().unwrap().len(), 1);

    let login = json!({"email": "jane.new@example.com", "password": "newpass1"});
    let (status, _) = send(ctx.router(), json_request("POST", "/users/login", None, &login)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_user_keeping_own_email_is_allowed() {
    let ctx = TestContext::new();
    let (user, token) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;

    let (status, _) = send(
        ctx.router(),
        json_request(
            "PUT",
            &format!("/users/{}", user.id),
            Some(&token),
            &update_payload("jane@example.com", "hunter22", "newpass1", "newpass1"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_user_rejects_wrong_old_password() {
    let ctx = TestContext::new();
    let (user, token) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;

    let (status, body) = send(
        ctx.router(),
        json_request(
            "PUT",
            &format!("/users/{}", user.id),
            Some(&token),
            &update_payload("jane@example.com", "wrong-old", "newpass1", "newpass1"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["data"],
        json!({"oldPassword": "old password doesn't match the current password."})
    );
}

#[tokio::test]
async fn test_update_user_rejects_confirmation_mismatch() {
    let ctx = TestContext::new();
    let (user, token) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;

    let (status, body) = send(
        ctx.router(),
        json_request(
            "PUT",
            &format!("/users/{}", user.id),
            Some(&token),
            &update_payload("jane@example.com", "hunter22", "newpass1", "newpass2"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["data"]["confirmPassword"],
        "password must be matched with the new one"
    );
}

#[tokio::test]
async fn test_update_user_rejects_email_of_another_user() {
    let ctx = TestContext::new();
    let (user, token) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;
    ctx.seed_user("bob", "bob@example.com", "hunter22").await;

    let (status, body) = send(
        ctx.router(),
        json_request(
            "PUT",
            &format!("/users/{}", user.id),
            Some(&token),
            &update_payload("bob@example.com", "hunter22", "newpass1", "newpass1"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"], json!({"email": "Email is already taken"}));
}

// --- Delete ---

#[tokio::test]
async fn test_delete_user_removes_photos_and_files() {
    let ctx = TestContext::new();
    let (user, token) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;
    let (bob, _) = ctx.seed_user("bob", "bob@example.com", "hunter22").await;
    let first = ctx.seed_photo(user.id, "One", "one.jpg").await;
    let second = ctx.seed_photo(user.id, "Two", "two.jpg").await;
    ctx.seed_photo(bob.id, "Bob's", "bob.jpg").await;

    let (status, body) = send(
        ctx.router(),
        empty_request("DELETE", &format!("/users/{}", user.id), Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "jane@example.com");
    assert_eq!(body["data"]["photos"].as_array().unwrap().len(), 2);

    assert!(ctx.repo.get_user(user.id, false).await.unwrap().is_none());
    assert!(ctx.repo.get_photo(first.id, false).await.unwrap().is_none());
    assert!(ctx.repo.get_photo(second.id, false).await.unwrap().is_none());
    assert!(!ctx.storage.contains("one.jpg"));
    assert!(!ctx.storage.contains("two.jpg"));
    assert!(ctx.storage.contains("bob.jpg"), "other users' files are untouched");
}

#[tokio::test]
async fn test_delete_user_attempts_every_file_removal() {
    let ctx = TestContext::new();
    let (user, token) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;
    ctx.seed_photo(user.id, "One", "one.jpg").await;
    ctx.seed_photo(user.id, "Two", "two.jpg").await;
    ctx.seed_photo(user.id, "Three", "three.jpg").await;
    ctx.storage.fail_removal_of("two.jpg");

    let (status, body) = send(
        ctx.router(),
        empty_request("DELETE", &format!("/users/{}", user.id), Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(ctx.repo.get_user(user.id, false).await.unwrap().is_none());
    assert!(!ctx.storage.contains("one.jpg"));
    assert!(!ctx.storage.contains("three.jpg"));
    assert!(ctx.storage.contains("two.jpg"));
}

#[tokio::test]
async fn test_token_of_deleted_user_is_rejected() {
    let ctx = TestContext::new();
    let (user, token) = ctx.seed_user("jane", "jane@example.com", "hunter22").await;

    let uri = format!("/users/{}", user.id);
    let (status, _) = send(ctx.router(), empty_request("DELETE", &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(ctx.router(), empty_request("DELETE", &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["data"]["message"],
        "There's no user found related to the token"
    );
}
