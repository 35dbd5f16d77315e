//! Notification inbox and status update tests

mod common;

use axum::http::StatusCode;
use sea_orm::{EntityTrait, Set};
use serde_json::json;

use common::*;
use courpera::models::notification::{self, NotificationKind};

/// A teacher whose course three students have enrolled in, through the API
async fn teacher_with_enrolments(
    state: &courpera::state::AppState,
    app: &axum::Router,
) -> String {
    let teacher = create_teacher(&state.db, "tina").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    for name in ["sam", "sue", "sid"] {
        let student = create_student(&state.db, name).await;
        let (status, _) = post(
            app,
            &format!("/courses/{}/enrol", course.id),
            Some(&session_cookie(student.id)),
            json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    session_cookie(teacher.id)
}

#[tokio::test]
async fn test_inbox_lists_newest_first_with_counts() {
    let state = build_test_app_state().await;
    let app = build_app(&state);
    let cookie = teacher_with_enrolments(&state, &app).await;

    let (status, body) = get(&app, "/activity/notifications", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["unread"], 3);
    let list = body["notifications"].as_array().unwrap();
    assert_eq!(list[0]["message"], "New enrolment: sid in Rust 101");
    assert_eq!(list[0]["kind"], "enrolment");

    let (_, page) = get(&app, "/activity/notifications?limit=1&offset=1", Some(&cookie)).await;
    let list = page["notifications"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["message"], "New enrolment: sue in Rust 101");
}

#[tokio::test]
async fn test_mark_read_and_read_all() {
    let state = build_test_app_state().await;
    let app = build_app(&state);
    let cookie = teacher_with_enrolments(&state, &app).await;

    let (_, recent) = get(&app, "/activity/notifications/recent?limit=2", Some(&cookie)).await;
    assert_eq!(recent["unread"], 3);
    assert_eq!(recent["results"].as_array().unwrap().len(), 2);
    let first_id = recent["results"][0]["id"].as_i64().unwrap();

    let (status, body) = post(
        &app,
        &format!("/activity/notifications/{}/read", first_id),
        Some(&cookie),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, recent) = get(&app, "/activity/notifications/recent", Some(&cookie)).await;
    assert_eq!(recent["unread"], 2);
    assert_eq!(recent["results"][0]["read"], true);

    let (status, _) = post(&app, "/activity/notifications/read-all", Some(&cookie), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, inbox) = get(&app, "/activity/notifications", Some(&cookie)).await;
    assert_eq!(inbox["unread"], 0);
    assert_eq!(inbox["total"], 3);
}

#[tokio::test]
async fn test_cannot_read_someone_elses_notification() {
    let state = build_test_app_state().await;
    let app = build_app(&state);
    let cookie = teacher_with_enrolments(&state, &app).await;
    let (_, recent) = get(&app, "/activity/notifications/recent", Some(&cookie)).await;
    let id = recent["results"][0]["id"].as_i64().unwrap();

    let stranger = create_teacher(&state.db, "terry").await;
    let (status, _) = post(
        &app,
        &format!("/activity/notifications/{}/read", id),
        Some(&session_cookie(stranger.id)),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notification_limits_are_capped() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let start = chrono::Utc::now() - chrono::Duration::hours(3);
    let rows: Vec<notification::ActiveModel> = (0..120)
        .map(|i| notification::ActiveModel {
            user_id: Set(teacher.id),
            actor_id: Set(None),
            kind: Set(NotificationKind::Enrolment),
            course_id: Set(None),
            message: Set(format!("note {}", i)),
            read: Set(false),
            created_at: Set(start + chrono::Duration::seconds(i)),
            ..Default::default()
        })
        .collect();
    notification::Entity::insert_many(rows).exec(&state.db).await.unwrap();
    let app = build_app(&state);
    let cookie = session_cookie(teacher.id);

    let (_, inbox) = get(&app, "/activity/notifications", Some(&cookie)).await;
    assert_eq!(inbox["notifications"].as_array().unwrap().len(), 20);
    assert_eq!(inbox["total"], 120);

    let (_, inbox) = get(&app, "/activity/notifications?limit=500", Some(&cookie)).await;
    let list = inbox["notifications"].as_array().unwrap();
    assert_eq!(list.len(), 100);
    assert_eq!(list[0]["message"], "note 119");

    let (_, recent) = get(&app, "/activity/notifications/recent", Some(&cookie)).await;
    assert_eq!(recent["results"].as_array().unwrap().len(), 10);

    let (_, recent) = get(&app, "/activity/notifications/recent?limit=500", Some(&cookie)).await;
    assert_eq!(recent["results"].as_array().unwrap().len(), 50);
    assert_eq!(recent["unread"], 120);
}

#[tokio::test]
async fn test_inbox_requires_session() {
    let state = build_test_app_state().await;
    let app = build_app(&state);

    let (status, _) = get(&app, "/activity/notifications", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_student_posts_status() {
    let state = build_test_app_state().await;
    let student = create_student(&state.db, "sam").await;
    let app = build_app(&state);
    let cookie = session_cookie(student.id);

    let (status, body) = post(&app, "/activity/status", Some(&cookie), json!({"text": "  revising  "})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["text"], "revising");

    let (status, body) = post(&app, "/activity/status", Some(&cookie), json!({"text": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid status update.");

    let long = "x".repeat(281);
    let (status, _) = post(&app, "/activity/status", Some(&cookie), json!({"text": long})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_teacher_cannot_post_status() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let app = build_app(&state);

    let (status, body) = post(
        &app,
        "/activity/status",
        Some(&session_cookie(teacher.id)),
        json!({"text": "hello"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Student role required.");
}
