//! Test helpers shared by the integration tests.
//!
//! Builds an in-memory database, an `AppState` with a private media root and
//! relaxed limits, and small factories for users, courses and enrolments.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tower::util::ServiceExt;

use courpera::config::throttle::ThrottleConfig;
use courpera::endpoints::create_router;
use courpera::middleware::SESSION_COOKIE_NAME;
use courpera::models::user_profile::Role;
use courpera::models::{course, enrolment, user};
use courpera::services::accounts::{create_account, NewAccount};
use courpera::services::security::create_session_token;
use courpera::state::{AppState, Limits};

/// Satisfies the password policy
pub const TEST_PASSWORD: &str = "Corr3ct-Horse-Battery";

/// Create an in-memory SQLite database with all migrations applied
pub async fn create_test_db() -> DatabaseConnection {
    courpera::db::connect_with_url("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// A fresh media root under the system temp directory
pub fn temp_media_root() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("courpera-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("Failed to create media root");
    dir
}

/// Limits roomy enough that only tests aimed at a limit ever hit one
pub fn test_limits() -> Limits {
    Limits {
        login_max_attempts: 5,
        login_window: Duration::from_secs(300),
        upload_rate: 50,
        upload_window: Duration::from_secs(60),
        max_upload_bytes: 1024 * 1024,
        media_root: temp_media_root(),
        api: ThrottleConfig {
            user_per_minute: 1000,
            anon_per_minute: 1000,
        },
    }
}

pub fn build_app_state_with_db(db: DatabaseConnection) -> AppState {
    AppState::with_limits(db, test_limits())
}

pub async fn build_test_app_state() -> AppState {
    build_app_state_with_db(create_test_db().await)
}

pub fn build_app(state: &AppState) -> Router {
    create_router(state.clone())
}

// ============================================================================
// Factories
// ============================================================================

pub async fn create_user(db: &DatabaseConnection, username: &str, role: Role) -> user::Model {
    create_user_with_secret(db, username, role, None).await
}

pub async fn create_user_with_secret(
    db: &DatabaseConnection,
    username: &str,
    role: Role,
    secret_word: Option<&str>,
) -> user::Model {
    let (created, _) = create_account(
        db,
        NewAccount {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: TEST_PASSWORD.to_string(),
            role,
            secret_word: secret_word.map(str::to_string),
        },
    )
    .await
    .expect("Failed to create test user");
    created
}

pub async fn create_teacher(db: &DatabaseConnection, username: &str) -> user::Model {
    create_user(db, username, Role::Teacher).await
}

pub async fn create_student(db: &DatabaseConnection, username: &str) -> user::Model {
    create_user(db, username, Role::Student).await
}

pub async fn create_course(db: &DatabaseConnection, owner_id: i64, title: &str) -> course::Model {
    let now = chrono::Utc::now();
    course::ActiveModel {
        owner_id: Set(owner_id),
        title: Set(title.to_string()),
        description: Set(format!("About {}", title)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create course")
}

pub async fn enrol(db: &DatabaseConnection, course_id: i64, student_id: i64) -> enrolment::Model {
    enrolment::ActiveModel {
        course_id: Set(course_id),
        student_id: Set(student_id),
        completed: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to enrol")
}

/// `Cookie` header value carrying a fresh session for the user
pub fn session_cookie(user_id: i64) -> String {
    let token = create_session_token(user_id).expect("Failed to sign session");
    format!("{}={}", SESSION_COOKIE_NAME, token)
}

// ============================================================================
// Requests
// ============================================================================

/// Send a request and return the status and the body parsed as JSON
/// (`Value::Null` when the body is empty or not JSON).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, cookie, None).await
}

pub async fn post(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, cookie, Some(body)).await
}

/// One part of a multipart body
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

const BOUNDARY: &str = "courpera-test-boundary";

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn post_multipart(
    app: &Router,
    uri: &str,
    cookie: &str,
    parts: &[Part<'_>],
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Raw GET returning status, headers and body bytes
pub async fn get_raw(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().uri(uri).method("GET");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}
