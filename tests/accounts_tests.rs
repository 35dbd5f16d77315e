//! Accounts endpoint integration tests
//!
//! Covers:
//! - `POST /accounts/register` and `POST /accounts/login` (session cookie)
//! - login throttling per client and username
//! - password change and secret-word reset
//! - `GET /accounts/home` per role
//! - `PUT /accounts/profile` instructor ID uniqueness
//! - `GET /accounts/search` (teachers only)

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::util::ServiceExt;

mod common;
use common::*;

use courpera::middleware::SESSION_COOKIE_NAME;
use courpera::models::user_profile::Role;

fn register_body(username: &str, role: &str) -> serde_json::Value {
    json!({
        "username": username,
        "email": format!("{}@example.com", username),
        "password": TEST_PASSWORD,
        "password2": TEST_PASSWORD,
        "role": role,
    })
}

/// POST /accounts/login and return (status, session cookie pair)
async fn do_login(app: &axum::Router, username: &str, password: &str) -> (StatusCode, Option<String>) {
    let request = Request::builder()
        .uri("/accounts/login")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"username": username, "password": password}).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|v| {
            let s = v.to_str().ok()?;
            s.starts_with(&format!("{}=", SESSION_COOKIE_NAME))
                .then(|| s.split(';').next().unwrap().to_string())
        });
    (status, cookie)
}

// ============================================================================
// Registration & Login
// ============================================================================

#[tokio::test]
async fn test_register_creates_account_and_session() {
    let state = build_test_app_state().await;
    let app = build_app(&state);

    let request = Request::builder()
        .uri("/accounts/register")
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(register_body("ada", "teacher").to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with(SESSION_COOKIE_NAME));
    assert!(cookie.contains("HttpOnly"));

    let session = cookie.split(';').next().unwrap();
    let (status, body) = get(&app, "/accounts/profile", Some(session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "ada");
    assert_eq!(body["role"], "teacher");
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords() {
    let state = build_test_app_state().await;
    let app = build_app(&state);

    let mut body = register_body("bob", "student");
    body["password2"] = json!("Something-Else-123");
    let (status, body) = post(&app, "/accounts/register", None, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "The two passwords do not match.");
}

#[tokio::test]
async fn test_register_rejects_weak_password_and_duplicate_username() {
    let state = build_test_app_state().await;
    let app = build_app(&state);

    let mut weak = register_body("carol", "student");
    weak["password"] = json!("short");
    weak["password2"] = json!("short");
    let (status, _) = post(&app, "/accounts/register", None, weak).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/accounts/register", None, register_body("carol", "student")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = post(&app, "/accounts/register", None, register_body("Carol", "student")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "This username is already taken.");
}

#[tokio::test]
async fn test_login_accepts_username_or_email() {
    let state = build_test_app_state().await;
    create_student(&state.db, "dave").await;
    let app = build_app(&state);

    let (status, cookie) = do_login(&app, "dave", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some());

    let (status, _) = do_login(&app, "DAVE@example.com", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_throttled() {
    let state = build_test_app_state().await;
    create_student(&state.db, "erin").await;
    let app = build_app(&state);

    for _ in 0..state.limits.login_max_attempts {
        let (status, _) = do_login(&app, "erin", "Wrong-Password-1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused while the window is full
    let (status, _) = do_login(&app, "erin", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_successful_login_resets_failures() {
    let state = build_test_app_state().await;
    create_student(&state.db, "fay").await;
    let app = build_app(&state);

    for _ in 0..state.limits.login_max_attempts - 1 {
        do_login(&app, "fay", "Wrong-Password-1").await;
    }
    let (status, _) = do_login(&app, "fay", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = do_login(&app, "fay", "Wrong-Password-1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_requires_session() {
    let state = build_test_app_state().await;
    let app = build_app(&state);

    let (status, body) = get(&app, "/accounts/home", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());

    let (status, _) = get(&app, "/accounts/home", Some("courpera_session=garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_is_accepted() {
    let state = build_test_app_state().await;
    let user = create_student(&state.db, "gus").await;
    let app = build_app(&state);

    let token = courpera::services::security::create_session_token(user.id).unwrap();
    let request = Request::builder()
        .uri("/accounts/profile")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Passwords
// ============================================================================

#[tokio::test]
async fn test_change_password_checks_old_password() {
    let state = build_test_app_state().await;
    let user = create_student(&state.db, "hana").await;
    let app = build_app(&state);
    let cookie = session_cookie(user.id);

    let (status, body) = post(
        &app,
        "/accounts/password/change",
        Some(&cookie),
        json!({"old_password": "nope", "new_password": "N3w-Password-Here"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Your old password was entered incorrectly.");

    let (status, _) = post(
        &app,
        "/accounts/password/change",
        Some(&cookie),
        json!({"old_password": TEST_PASSWORD, "new_password": "N3w-Password-Here"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = do_login(&app, "hana", "N3w-Password-Here").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_password_with_secret_word() {
    let state = build_test_app_state().await;
    create_user_with_secret(&state.db, "ivan", Role::Student, Some("Marmalade")).await;
    let app = build_app(&state);

    let (status, body) = post(
        &app,
        "/accounts/password/forgot",
        None,
        json!({"username": "ivan", "secret_word": "toast", "new_password": "Reset-Passw0rd!"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid username or secret word.");

    // Unknown users get the same answer
    let (_, unknown) = post(
        &app,
        "/accounts/password/forgot",
        None,
        json!({"username": "nobody", "secret_word": "toast", "new_password": "Reset-Passw0rd!"}),
    )
    .await;
    assert_eq!(unknown["detail"], body["detail"]);

    let (status, _) = post(
        &app,
        "/accounts/password/forgot",
        None,
        json!({"username": "ivan", "secret_word": "  marmalade ", "new_password": "Reset-Passw0rd!"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = do_login(&app, "ivan", "Reset-Passw0rd!").await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Home, Profile & Search
// ============================================================================

#[tokio::test]
async fn test_home_differs_by_role() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tess").await;
    let student = create_student(&state.db, "sam").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    enrol(&state.db, course.id, student.id).await;
    let app = build_app(&state);

    let (status, body) = get(&app, "/accounts/home", Some(&session_cookie(teacher.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["owned_courses"][0]["title"], "Rust 101");
    assert!(body.get("enrolments").is_none());

    let (status, body) = get(&app, "/accounts/home", Some(&session_cookie(student.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enrolments"][0]["course"]["id"], course.id);
    assert!(body["statuses"].as_array().unwrap().is_empty());
    assert!(body.get("owned_courses").is_none());
}

#[tokio::test]
async fn test_instructor_id_must_be_unique() {
    let state = build_test_app_state().await;
    let first = create_teacher(&state.db, "t1").await;
    let second = create_teacher(&state.db, "t2").await;
    let app = build_app(&state);

    let (status, body) = send(
        &app,
        "PUT",
        "/accounts/profile",
        Some(&session_cookie(first.id)),
        Some(json!({"instructor_id": "INS-1", "full_name": "Tina First"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instructor_id"], "INS-1");
    assert_eq!(body["full_name"], "Tina First");

    let (status, body) = send(
        &app,
        "PUT",
        "/accounts/profile",
        Some(&session_cookie(second.id)),
        Some(json!({"instructor_id": "INS-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "This instructor ID is already in use.");
}

#[tokio::test]
async fn test_search_is_teacher_only() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "teach").await;
    let student = create_student(&state.db, "stuart").await;
    create_student(&state.db, "stella").await;
    let app = build_app(&state);

    let (status, _) = get(&app, "/accounts/search?q=st", Some(&session_cookie(student.id))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get(&app, "/accounts/search?q=ST", Some(&session_cookie(teacher.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["username"], "stella");
    assert_eq!(body["results"][1]["username"], "stuart");

    let (_, body) = get(&app, "/accounts/search?q=", Some(&session_cookie(teacher.id))).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_avatar_redirects() {
    let state = build_test_app_state().await;
    let user = create_student(&state.db, "vera").await;
    let app = build_app(&state);

    let (status, headers, _) = get_raw(&app, &format!("/accounts/avatar/{}/64", user.id), None).await;
    assert_eq!(status, StatusCode::FOUND);
    assert!(headers.contains_key(header::LOCATION));

    let (status, _, _) = get_raw(&app, "/accounts/avatar/9999/64", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
