//! Material upload, download and deletion tests

mod common;

use axum::http::{header, StatusCode};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

use common::*;
use courpera::models::{material, notification};
use courpera::state::Limits;

const PDF_BYTES: &[u8] = b"%PDF-1.4\n% test document\n";

fn pdf_upload<'a>(title: &'a str, file_name: &'a str) -> Vec<Part<'a>> {
    vec![
        Part::Text("title", title),
        Part::File {
            name: "file",
            file_name,
            content_type: "application/pdf",
            bytes: PDF_BYTES,
        },
    ]
}

#[tokio::test]
async fn test_owner_uploads_and_student_downloads() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let student = create_student(&state.db, "sam").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    enrol(&state.db, course.id, student.id).await;
    let app = build_app(&state);

    let (status, body) = post_multipart(
        &app,
        &format!("/materials/course/{}/upload", course.id),
        &session_cookie(teacher.id),
        &pdf_upload("Week 1", "week1.pdf"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Week 1");
    assert_eq!(body["mime"], "application/pdf");
    assert_eq!(body["size_bytes"], PDF_BYTES.len());
    let material_id = body["id"].as_i64().unwrap();

    let (status, headers, bytes) = get_raw(
        &app,
        &format!("/materials/{}/download", material_id),
        Some(&session_cookie(student.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(bytes, PDF_BYTES);
}

#[tokio::test]
async fn test_upload_notifies_enrolled_students() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let first = create_student(&state.db, "sam").await;
    let second = create_student(&state.db, "sue").await;
    let outsider = create_student(&state.db, "olly").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    enrol(&state.db, course.id, first.id).await;
    enrol(&state.db, course.id, second.id).await;
    let app = build_app(&state);

    let (status, _) = post_multipart(
        &app,
        &format!("/materials/course/{}/upload", course.id),
        &session_cookie(teacher.id),
        &pdf_upload("Slides", "slides.pdf"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for student in [&first, &second] {
        let notes = notification::Entity::find()
            .filter(notification::Column::UserId.eq(student.id))
            .all(&state.db)
            .await
            .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "New material in Rust 101: Slides");
    }
    let none = notification::Entity::find()
        .filter(notification::Column::UserId.eq(outsider.id))
        .all(&state.db)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_non_owner_cannot_upload() {
    let state = build_test_app_state().await;
    let owner = create_teacher(&state.db, "tina").await;
    let other = create_teacher(&state.db, "terry").await;
    let course = create_course(&state.db, owner.id, "Rust 101").await;
    let app = build_app(&state);

    let (status, body) = post_multipart(
        &app,
        &format!("/materials/course/{}/upload", course.id),
        &session_cookie(other.id),
        &pdf_upload("Week 1", "week1.pdf"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Only the course owner can do this.");
}

#[tokio::test]
async fn test_unsupported_extension_is_rejected() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let app = build_app(&state);

    let (status, body) = post_multipart(
        &app,
        &format!("/materials/course/{}/upload", course.id),
        &session_cookie(teacher.id),
        &[
            Part::Text("title", "Script"),
            Part::File {
                name: "file",
                file_name: "run.exe",
                content_type: "application/octet-stream",
                bytes: b"MZ",
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Unsupported file type.");

    let stored = material::Entity::find().all(&state.db).await.unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_missing_file_and_title() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let app = build_app(&state);
    let uri = format!("/materials/course/{}/upload", course.id);
    let cookie = session_cookie(teacher.id);

    let (status, body) = post_multipart(&app, &uri, &cookie, &[Part::Text("title", "Empty")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Please choose a file to upload.");

    let (status, _) = post_multipart(&app, &uri, &cookie, &pdf_upload("", "a.pdf")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_outsider_cannot_download() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let outsider = create_student(&state.db, "olly").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let app = build_app(&state);

    let (_, body) = post_multipart(
        &app,
        &format!("/materials/course/{}/upload", course.id),
        &session_cookie(teacher.id),
        &pdf_upload("Week 1", "week1.pdf"),
    )
    .await;
    let material_id = body["id"].as_i64().unwrap();

    let (status, _, _) = get_raw(
        &app,
        &format!("/materials/{}/download", material_id),
        Some(&session_cookie(outsider.id)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_owner_deletes_material() {
    let state = build_test_app_state().await;
    let teacher = create_teacher(&state.db, "tina").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let app = build_app(&state);
    let cookie = session_cookie(teacher.id);

    let (_, body) = post_multipart(
        &app,
        &format!("/materials/course/{}/upload", course.id),
        &cookie,
        &pdf_upload("Week 1", "week1.pdf"),
    )
    .await;
    let material_id = body["id"].as_i64().unwrap();

    let (status, body) = post(&app, &format!("/materials/{}/delete", material_id), Some(&cookie), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _, _) = get_raw(&app, &format!("/materials/{}/download", material_id), Some(&cookie)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rate_limit() {
    let db = create_test_db().await;
    let state = courpera::state::AppState::with_limits(
        db,
        Limits {
            upload_rate: 2,
            ..test_limits()
        },
    );
    let teacher = create_teacher(&state.db, "tina").await;
    let course = create_course(&state.db, teacher.id, "Rust 101").await;
    let app = build_app(&state);
    let uri = format!("/materials/course/{}/upload", course.id);
    let cookie = session_cookie(teacher.id);

    // Rejected uploads do not spend the budget
    for _ in 0..2 {
        let (status, body) = post_multipart(&app, &uri, &cookie, &pdf_upload("W", "virus.exe")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Unsupported file type.");
    }

    for _ in 0..2 {
        let (status, _) = post_multipart(&app, &uri, &cookie, &pdf_upload("W", "w.pdf")).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = post_multipart(&app, &uri, &cookie, &pdf_upload("W", "w.pdf")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
