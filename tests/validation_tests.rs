use photo_vault::{
    AppError,
    models::{LoginRequest, PhotoForm, RegisterRequest, UpdateUserRequest},
    validation::{Violations, camel_case, check, check_upload, extension_of},
};

fn allowed() -> Vec<String> {
    vec![".jpg".into(), ".jpeg".into(), ".png".into()]
}

fn valid_register() -> RegisterRequest {
    RegisterRequest {
        username: "jane".into(),
        email: "jane@example.com".into(),
        password: "hunter22".into(),
        confirm_password: "hunter22".into(),
    }
}

fn valid_photo_form() -> PhotoForm {
    PhotoForm {
        title: "Sunset".into(),
        caption: String::new(),
        photo_url: "http://localhost:3000/public/photos_1_1_sunset.jpg".into(),
        user_id: 1,
    }
}

#[test]
fn test_camel_case_conversion() {
    assert_eq!(camel_case("confirm_password"), "confirmPassword");
    assert_eq!(camel_case("photo_url"), "photoUrl");
    assert_eq!(camel_case("title"), "title");
    assert_eq!(camel_case("oldPassword"), "oldPassword");
}

#[test]
fn test_violations_add_keeps_first_and_insert_overwrites() {
    let mut violations = Violations::new();
    violations.add("email", "first");
    violations.add("email", "second");
    assert_eq!(violations.get("email"), Some("first"));

    violations.insert("email", "third");
    assert_eq!(violations.get("email"), Some("third"));
    assert_eq!(violations.len(), 1);
}

#[test]
fn test_empty_violations_pass() {
    assert_eq!(Violations::new().into_result(), Ok(()));

    let result = Violations::single("title", "title is required").into_result();
    assert!(matches!(result, Err(AppError::Validation(v)) if v.get("title") == Some("title is required")));
}

#[test]
fn test_valid_register_request_has_no_violations() {
    assert!(check(&valid_register()).is_empty());
}

#[test]
fn test_register_rules_collect_every_field() {
    let req = RegisterRequest {
        username: String::new(),
        email: "not-an-email".into(),
        password: "abc".into(),
        confirm_password: "abc".into(),
    };

    let violations = check(&req);
    assert_eq!(violations.get("username"), Some("username is required"));
    assert_eq!(violations.get("email"), Some("email is not a valid email address"));
    assert_eq!(
        violations.get("password"),
        Some("password must be at least 6 characters")
    );
    assert_eq!(violations.len(), 3);
}

#[test]
fn test_login_requires_password() {
    let req = LoginRequest {
        email: "jane@example.com".into(),
        password: String::new(),
    };
    let violations = check(&req);
    assert_eq!(violations.get("password"), Some("password is required"));
    assert!(!violations.contains("email"));
}

#[test]
fn test_update_user_keys_are_camel_case() {
    let req = UpdateUserRequest {
        username: "jane".into(),
        email: "jane@example.com".into(),
        old_password: String::new(),
        new_password: "123".into(),
        confirm_password: "123".into(),
    };
    let violations = check(&req);
    assert_eq!(violations.get("oldPassword"), Some("oldPassword is required"));
    assert_eq!(
        violations.get("newPassword"),
        Some("newPassword must be at least 6 characters")
    );
}

#[test]
fn test_photo_form_rules() {
    assert!(check(&valid_photo_form()).is_empty());

    let form = PhotoForm {
        title: String::new(),
        photo_url: "not a url".into(),
        user_id: 0,
        ..valid_photo_form()
    };
    let violations = check(&form);
    assert_eq!(violations.get("title"), Some("title is required"));
    assert_eq!(violations.get("photoUrl"), Some("photoUrl must be a valid URL"));
    assert_eq!(violations.get("userId"), Some("userId must reference a user"));
}

#[test]
fn test_missing_photo_url_is_reported() {
    let form = PhotoForm {
        photo_url: String::new(),
        ..valid_photo_form()
    };
    assert!(check(&form).contains("photoUrl"));
}

#[test]
fn test_extension_of() {
    assert_eq!(extension_of("holiday.JPG"), ".jpg");
    assert_eq!(extension_of("archive.tar.gz"), ".gz");
    assert_eq!(extension_of("README"), "");
    assert_eq!(extension_of("trailing."), "");
}

#[test]
fn test_upload_guard_rejects_extension() {
    let mut violations = Violations::new();
    check_upload(&mut violations, "cat.gif", 10, &allowed(), 2048);
    assert_eq!(
        violations.get("photo"),
        Some("photo with .gif extension is not allowed")
    );
}

#[test]
fn test_upload_guard_rejects_oversized_file() {
    let mut violations = Violations::new();
    check_upload(&mut violations, "cat.png", 2 * 1024 + 1, &allowed(), 2);
    assert_eq!(
        violations.get("photo"),
        Some("photo file is too large, the photo is larger than 2KB.")
    );
}

#[test]
fn test_upload_guard_accepts_file_at_limit() {
    let mut violations = Violations::new();
    check_upload(&mut violations, "cat.jpeg", 2 * 1024, &allowed(), 2);
    assert!(violations.is_empty());
}
