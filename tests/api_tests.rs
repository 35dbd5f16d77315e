//! REST API under /api/v1: pagination, scoping, writes and throttling

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;
use courpera::config::throttle::ThrottleConfig;
use courpera::state::{AppState, Limits};

#[tokio::test]
async fn test_course_list_paginates() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    for title in ["Algebra", "Biology", "Chemistry"] {
        create_course(&state.db, teacher.id, title).await;
    }
    let app = build_app(&state);

    let (status, body) = get(&app, "/api/v1/courses?page_size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert!(body["previous"].is_null());
    assert_eq!(body["next"], "/api/v1/courses?page=2&page_size=2");
    let titles: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Algebra", "Biology"]);

    let (status, body) = get(&app, "/api/v1/courses?page=2&page_size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["next"].is_null());
    assert_eq!(body["previous"], "/api/v1/courses?page=1&page_size=2");
    assert_eq!(body["results"][0]["title"], "Chemistry");

    let (status, _) = get(&app, "/api/v1/courses?page=3&page_size=2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, "/api/v1/courses?page=abc", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_course_search_and_ordering() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    create_course(&state.db, teacher.id, "Rust basics").await;
    create_course(&state.db, teacher.id, "Advanced Rust").await;
    create_course(&state.db, teacher.id, "Pottery").await;
    let app = build_app(&state);

    let (_, body) = get(&app, "/api/v1/courses?search=rust&ordering=-title", None).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["title"], "Rust basics");
    assert_eq!(body["results"][1]["title"], "Advanced Rust");

    // Owner usernames match too
    let (_, body) = get(&app, "/api/v1/courses?search=TIN", None).await;
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_course_retrieve_is_members_only() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let student = create_student(&state.db, "sam").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let app = build_app(&state);
    let uri = format!("/api/v1/courses/{}", course.id);

    let (status, _) = get(&app, &uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get(&app, &uri, Some(&session_cookie(student.id))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    enrol(&state.db, course.id, student.id).await;
    let (status, body) = get(&app, &uri, Some(&session_cookie(student.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Rust 101");
}

#[tokio::test]
async fn test_create_update_delete_course() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let student = create_student(&state.db, "sam").await;
    let app = build_app(&state);
    let request = json!({"title": "Networks", "description": "Packets"});

    let (status, _) = post(&app, "/api/v1/courses", None, request.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post(&app, "/api/v1/courses", Some(&session_cookie(student.id)), request.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Only teachers can create courses.");

    let cookie = session_cookie(teacher.id);
    let (status, body) = post(&app, "/api/v1/courses", Some(&cookie), request).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/v1/courses/{}", id),
        Some(&cookie),
        Some(json!({"title": "Computer Networks"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Computer Networks");
    assert_eq!(body["description"], "Packets");

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/courses/{}", id), Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &format!("/api/v1/courses/{}", id), Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_enrolment_create_and_duplicate() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let student = create_student(&state.db, "sam").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let app = build_app(&state);
    let cookie = session_cookie(student.id);

    let (status, body) = post(&app, "/api/v1/enrolments", Some(&cookie), json!({"course": course.id})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["course"], course.id);
    assert_eq!(body["student"]["username"], "sam");

    let (status, body) = post(&app, "/api/v1/enrolments", Some(&cookie), json!({"course": course.id})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Already enrolled in this course.");

    let (status, body) = post(&app, "/api/v1/enrolments", Some(&cookie), json!({"course": 9999})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid course.");

    let (status, _) = post(
        &app,
        "/api/v1/enrolments",
        Some(&session_cookie(teacher.id)),
        json!({"course": course.id}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_enrolment_visibility() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let other_teacher = create_teacher(&state.db, "terry").await;
    let sam = create_student(&state.db, "sam").await;
    let sue = create_student(&state.db, "sue").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let sam_row = enrol(&state.db, course.id, sam.id).await;
    enrol(&state.db, course.id, sue.id).await;
    let app = build_app(&state);

    let (_, body) = get(&app, "/api/v1/enrolments", Some(&session_cookie(sam.id))).await;
    assert_eq!(body["count"], 1);

    let (_, body) = get(&app, "/api/v1/enrolments", Some(&session_cookie(teacher.id))).await;
    assert_eq!(body["count"], 2);

    let (_, body) = get(&app, "/api/v1/enrolments", Some(&session_cookie(other_teacher.id))).await;
    assert_eq!(body["count"], 0);

    let (status, body) = get(&app, "/api/v1/enrolments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, _) = get(
        &app,
        &format!("/api/v1/enrolments/{}", sam_row.id),
        Some(&session_cookie(sue.id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/enrolments/{}", sam_row.id),
        Some(&session_cookie(sue.id)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/v1/enrolments/{}", sam_row.id),
        Some(&session_cookie(sam.id)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_feedback_through_api() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let sam = create_student(&state.db, "sam").await;
    let sue = create_student(&state.db, "sue").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    enrol(&state.db, course.id, sam.id).await;
    enrol(&state.db, course.id, sue.id).await;
    let app = build_app(&state);
    let cookie = session_cookie(sam.id);

    let (status, body) = post(
        &app,
        "/api/v1/feedback",
        Some(&cookie),
        json!({"course": course.id, "rating": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = post(
        &app,
        "/api/v1/feedback",
        Some(&cookie),
        json!({"course": course.id, "rating": 4, "comment": "Nice", "anonymous": true}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["student"].is_null());
    let id = body["id"].as_i64().unwrap();

    let (status, body) = post(
        &app,
        "/api/v1/feedback",
        Some(&cookie),
        json!({"course": course.id, "rating": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "You have already left feedback for this course.");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/v1/feedback/{}", id),
        Some(&session_cookie(sue.id)),
        Some(json!({"rating": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Cannot edit others' feedback.");

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/v1/feedback/{}", id),
        Some(&cookie),
        Some(json!({"rating": 2, "anonymous": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 2);
    assert_eq!(body["student"], sam.id);

    let (_, body) = get(&app, &format!("/api/v1/feedback?course={}", course.id), None).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_feedback_requires_enrolment() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let student = create_student(&state.db, "sam").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let app = build_app(&state);

    let (status, body) = post(
        &app,
        "/api/v1/feedback",
        Some(&session_cookie(student.id)),
        json!({"course": course.id, "rating": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Enrol before leaving feedback.");
}

#[tokio::test]
async fn test_status_list_is_own_only() {
    let state = build_test_app_state().await;
    let sam = create_student(&state.db, "sam").await;
    let sue = create_student(&state.db, "sue").await;
    let app = build_app(&state);

    for text in ["one", "two"] {
        let (status, _) = post(&app, "/api/v1/status", Some(&session_cookie(sam.id)), json!({"text": text})).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    post(&app, "/api/v1/status", Some(&session_cookie(sue.id)), json!({"text": "mine"})).await;

    let (_, body) = get(&app, "/api/v1/status", Some(&session_cookie(sam.id))).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["text"], "two");

    let (_, body) = get(&app, "/api/v1/status", None).await;
    assert_eq!(body["count"], 0);

    let (status, _) = post(&app, "/api/v1/status", None, json!({"text": "anon"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_materials_scoped_to_member_courses() {
    use sea_orm::{ActiveModelTrait, Set};

    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let student = create_student(&state.db, "sam").await;
    let outsider = create_student(&state.db, "olly").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    enrol(&state.db, course.id, student.id).await;
    let row = courpera::models::material::ActiveModel {
        course_id: Set(course.id),
        uploaded_by: Set(Some(teacher.id)),
        title: Set("Week 1".to_string()),
        file: Set("materials/week1.pdf".to_string()),
        size_bytes: Set(10),
        mime: Set("application/pdf".to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap();
    let app = build_app(&state);

    let (_, body) = get(&app, "/api/v1/materials", Some(&session_cookie(student.id))).await;
    assert_eq!(body["count"], 1);
    let (_, body) = get(&app, "/api/v1/materials", Some(&session_cookie(teacher.id))).await;
    assert_eq!(body["count"], 1);
    let (_, body) = get(&app, "/api/v1/materials", Some(&session_cookie(outsider.id))).await;
    assert_eq!(body["count"], 0);

    let uri = format!("/api/v1/materials/{}", row.id);
    let (status, body) = get(&app, &uri, Some(&session_cookie(student.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Week 1");
    let (status, _) = get(&app, &uri, Some(&session_cookie(outsider.id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_search_is_teacher_only() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let student = create_student(&state.db, "sam").await;
    let app = build_app(&state);

    let (status, _) = get(&app, "/api/v1/search/users?q=sa", Some(&session_cookie(student.id))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = get(&app, "/api/v1/search/users?q=sa", Some(&session_cookie(teacher.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["username"], "sam");
}

#[tokio::test]
async fn test_anonymous_callers_are_throttled() {
    let db = create_test_db().await;
    let state = AppState::with_limits(
        db,
        Limits {
            api: ThrottleConfig {
                user_per_minute: 100,
                anon_per_minute: 3,
            },
            ..test_limits()
        },
    );
    let teacher = create_teacher(&state.db, "tina").await;
    let app = build_app(&state);

    for _ in 0..3 {
        let (status, _) = get(&app, "/api/v1/courses", None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = get(&app, "/api/v1/courses", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["detail"], "Request was throttled.");

    // Signed-in callers have their own budget
    let (status, _) = get(&app, "/api/v1/courses", Some(&session_cookie(teacher.id))).await;
    assert_eq!(status, StatusCode::OK);

    // Other routes are not throttled
    let (status, _) = get(&app, "/courses", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signed_in_callers_are_throttled_per_user() {
    let db = create_test_db().await;
    let state = AppState::with_limits(
        db,
        Limits {
            api: ThrottleConfig {
                user_per_minute: 2,
                anon_per_minute: 100,
            },
            ..test_limits()
        },
    );
    let tina = create_teacher(&state.db, "tina").await;
    let sam = create_student(&state.db, "sam").await;
    let app = build_app(&state);
    let tina_cookie = session_cookie(tina.id);

    for _ in 0..2 {
        let (status, _) = get(&app, "/api/v1/courses", Some(&tina_cookie)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = get(&app, "/api/v1/enrolments", Some(&tina_cookie)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["detail"], "Request was throttled.");

    // The budget belongs to the user, not the client
    let (status, _) = get(&app, "/api/v1/courses", Some(&session_cookie(sam.id))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app, "/api/v1/courses", None).await;
    assert_eq!(status, StatusCode::OK);
}
