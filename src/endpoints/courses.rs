use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use validator::Validate;

use crate::endpoints::extractors::{
    course_response, course_responses, find_course, is_owner, require_member, require_owner,
    user_summaries,
};
use crate::error::{AppError, Result};
use crate::middleware::permissions::{
    Authenticated, Authorized, MaybeAuthenticated, StudentOnly, TeacherOnly,
};
use crate::middleware::AuthenticatedUser;
use crate::models::prelude::*;
use crate::models::user_profile::Role;
use crate::models::{course, enrolment, feedback, material, user, user_profile};
use crate::schemas::{
    AddStudentRequest, CourseDetailResponse, CourseListItem, CourseRequest, CourseResponse,
    EnrolmentResult, FeedbackRequest, FeedbackResponse, MaterialResponse, RosterEntry,
    SearchQuery, UserSearchResponse,
};
use crate::services::accounts::{find_by_login, icontains, is_enrolled};
use crate::services::calendar::course_calendar;
use crate::services::notification::notify_enrolment;
use crate::state::{AppState, DbConn};

const SUGGESTION_LIMIT: u64 = 20;

/// Catalogue and calendar, open to anonymous callers
pub fn courses_public_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_courses))
        .route("/{id}/calendar.ics", get(course_calendar_ics))
        .with_state(state)
}

pub fn courses_routes(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_course))
        .route("/{id}", get(get_course).put(update_course))
        .route("/{id}/enrol", post(enrol))
        .route("/{id}/unenrol", post(unenrol))
        .route("/{id}/remove/{user_id}", post(remove_student))
        .route("/{id}/add-student", get(suggest_students).post(add_student))
        .route("/{id}/feedback", post(leave_feedback))
        .with_state(state)
}

// ============================================================================
// Shared Operations
// ============================================================================

/// Enrol a student; a new enrolment notifies the course owner.
///
/// Returns the enrolment and whether it was created by this call.
pub async fn enrol_student(
    db: &DbConn,
    course: &course::Model,
    student: &user::Model,
) -> Result<(enrolment::Model, bool)> {
    let inserted = Enrolment::insert(enrolment::ActiveModel {
        course_id: Set(course.id),
        student_id: Set(student.id),
        completed: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([enrolment::Column::CourseId, enrolment::Column::StudentId])
            .do_nothing()
            .to_owned(),
    )
    .exec(db)
    .await;

    let created = match inserted {
        Ok(_) => true,
        Err(DbErr::RecordNotInserted) => false,
        Err(e) => return Err(e.into()),
    };

    let row = Enrolment::find()
        .filter(enrolment::Column::CourseId.eq(course.id))
        .filter(enrolment::Column::StudentId.eq(student.id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal("Enrolment vanished after insert".to_string()))?;

    if created {
        notify_enrolment(db, course, student).await?;
        tracing::info!(course_id = course.id, student_id = student.id, "Student enrolled");
    }
    Ok((row, created))
}

/// Feedback with the author's username, newest first
pub async fn feedback_for_course(db: &DbConn, course_id: i64) -> Result<Vec<FeedbackResponse>> {
    let rows = Feedback::find()
        .filter(feedback::Column::CourseId.eq(course_id))
        .find_also_related(User)
        .order_by_desc(feedback::Column::CreatedAt)
        .order_by_desc(feedback::Column::Id)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(f, u)| FeedbackResponse::new(f, u.map(|u| u.username)))
        .collect())
}

/// Create or update the student's single feedback entry for the course
pub async fn upsert_feedback(
    db: &DbConn,
    course_id: i64,
    student: &AuthenticatedUser,
    request: FeedbackRequest,
) -> Result<(feedback::Model, bool)> {
    request.validate()?;
    let existing = Feedback::find()
        .filter(feedback::Column::CourseId.eq(course_id))
        .filter(feedback::Column::StudentId.eq(student.id()))
        .one(db)
        .await?;

    match existing {
        Some(row) => {
            let mut active: feedback::ActiveModel = row.into();
            active.rating = Set(request.rating);
            active.comment = Set(request.comment);
            active.anonymous = Set(request.anonymous);
            Ok((active.update(db).await?, false))
        }
        None => {
            let row = feedback::ActiveModel {
                course_id: Set(course_id),
                student_id: Set(student.id()),
                rating: Set(request.rating),
                comment: Set(request.comment),
                anonymous: Set(request.anonymous),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok((row, true))
        }
    }
}

pub fn validate_course(request: &CourseRequest) -> Result<()> {
    request.validate()?;
    if request.title.trim().is_empty() {
        return Err(AppError::BadRequest("Title must be 1-200 characters.".to_string()));
    }
    Ok(())
}

// ============================================================================
// Catalogue
// ============================================================================

#[utoipa::path(
    get,
    path = "/courses",
    tag = "Courses",
    responses((status = 200, body = Vec<CourseListItem>))
)]
async fn list_courses(
    State(state): State<AppState>,
    MaybeAuthenticated(viewer): MaybeAuthenticated,
) -> Result<Json<Vec<CourseListItem>>> {
    let courses = Course::find()
        .order_by_asc(course::Column::Title)
        .order_by_asc(course::Column::Id)
        .all(&state.db)
        .await?;

    let enrolled: HashSet<i64> = match &viewer {
        Some(user) => Enrolment::find()
            .filter(enrolment::Column::StudentId.eq(user.id()))
            .select_only()
            .column(enrolment::Column::CourseId)
            .into_tuple::<i64>()
            .all(&state.db)
            .await?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    let items = course_responses(&state.db, courses)
        .await?
        .into_iter()
        .map(|course| CourseListItem {
            enrolled: enrolled.contains(&course.id),
            course,
        })
        .collect();
    Ok(Json(items))
}

#[utoipa::path(
    post,
    path = "/courses",
    tag = "Courses",
    request_body = CourseRequest,
    responses((status = 201, body = CourseResponse), (status = 403))
)]
async fn create_course(
    State(state): State<AppState>,
    teacher: Authorized<TeacherOnly>,
    Json(request): Json<CourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>)> {
    validate_course(&request)?;
    let now = Utc::now();
    let created = course::ActiveModel {
        owner_id: Set(teacher.user_id()),
        title: Set(request.title.trim().to_string()),
        description: Set(request.description),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(course_id = created.id, owner_id = teacher.user_id(), "Course created");
    Ok((StatusCode::CREATED, Json(course_response(&state.db, created).await?)))
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    responses((status = 200, body = CourseDetailResponse), (status = 403), (status = 404))
)]
async fn get_course(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetailResponse>> {
    let me = auth.user();
    let found = find_course(&state.db, id).await?;
    let owner_view = is_owner(me, &found);
    let enrolled = is_enrolled(&state.db, found.id, me.id()).await?;
    if !owner_view && !enrolled {
        return Err(AppError::Forbidden("Enrol to access this course.".to_string()));
    }

    let materials = Material::find()
        .filter(material::Column::CourseId.eq(found.id))
        .order_by_desc(material::Column::CreatedAt)
        .all(&state.db)
        .await?
        .into_iter()
        .map(MaterialResponse::from)
        .collect();

    let feedback_list = feedback_for_course(&state.db, found.id).await?;

    let roster = if owner_view {
        let rows = Enrolment::find()
            .filter(enrolment::Column::CourseId.eq(found.id))
            .find_also_related(User)
            .order_by_asc(user::Column::Username)
            .all(&state.db)
            .await?;
        Some(
            rows.into_iter()
                .filter_map(|(e, u)| {
                    u.map(|u| RosterEntry {
                        enrolment_id: e.id,
                        student_id: u.id,
                        username: u.username,
                        email: u.email,
                        completed: e.completed,
                        enrolled_at: e.created_at,
                    })
                })
                .collect(),
        )
    } else {
        None
    };

    let my_feedback = if me.is_student() {
        Feedback::find()
            .filter(feedback::Column::CourseId.eq(found.id))
            .filter(feedback::Column::StudentId.eq(me.id()))
            .one(&state.db)
            .await?
            .map(|f| FeedbackResponse::new(f, Some(me.username().to_string())))
    } else {
        None
    };

    Ok(Json(CourseDetailResponse {
        course: course_response(&state.db, found).await?,
        is_owner: owner_view,
        is_enrolled: enrolled,
        materials,
        feedback: feedback_list,
        roster,
        my_feedback,
    }))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    request_body = CourseRequest,
    responses((status = 200, body = CourseResponse), (status = 403), (status = 404))
)]
async fn update_course(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
    Json(request): Json<CourseRequest>,
) -> Result<Json<CourseResponse>> {
    let found = find_course(&state.db, id).await?;
    require_owner(auth.user(), &found)?;
    validate_course(&request)?;

    let mut active: course::ActiveModel = found.into();
    active.title = Set(request.title.trim().to_string());
    active.description = Set(request.description);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    Ok(Json(course_response(&state.db, updated).await?))
}

// ============================================================================
// Enrolment
// ============================================================================

#[utoipa::path(
    post,
    path = "/courses/{id}/enrol",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    responses((status = 200, body = EnrolmentResult), (status = 403), (status = 404))
)]
async fn enrol(
    State(state): State<AppState>,
    student: Authorized<StudentOnly>,
    Path(id): Path<i64>,
) -> Result<Json<EnrolmentResult>> {
    let found = find_course(&state.db, id).await?;
    let (row, created) = enrol_student(&state.db, &found, &student.user().user).await?;
    Ok(Json(EnrolmentResult {
        course_id: row.course_id,
        student_id: row.student_id,
        created,
    }))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/unenrol",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    responses((status = 200), (status = 404))
)]
async fn unenrol(
    State(state): State<AppState>,
    student: Authorized<StudentOnly>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let found = find_course(&state.db, id).await?;
    let deleted = Enrolment::delete_many()
        .filter(enrolment::Column::CourseId.eq(found.id))
        .filter(enrolment::Column::StudentId.eq(student.user_id()))
        .exec(&state.db)
        .await?;
    Ok(Json(serde_json::json!({"success": true, "removed": deleted.rows_affected})))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/remove/{user_id}",
    tag = "Courses",
    params(
        ("id" = i64, Path, description = "Course ID"),
        ("user_id" = i64, Path, description = "Student to remove")
    ),
    responses((status = 200), (status = 403), (status = 404))
)]
async fn remove_student(
    State(state): State<AppState>,
    auth: Authenticated,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>> {
    let found = find_course(&state.db, id).await?;
    require_owner(auth.user(), &found)?;

    let deleted = Enrolment::delete_many()
        .filter(enrolment::Column::CourseId.eq(found.id))
        .filter(enrolment::Column::StudentId.eq(user_id))
        .exec(&state.db)
        .await?;
    tracing::info!(course_id = found.id, student_id = user_id, "Student removed from course");
    Ok(Json(serde_json::json!({"success": true, "removed": deleted.rows_affected})))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/add-student",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    request_body = AddStudentRequest,
    responses((status = 200, body = EnrolmentResult), (status = 400), (status = 403), (status = 404))
)]
async fn add_student(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
    Json(request): Json<AddStudentRequest>,
) -> Result<Json<EnrolmentResult>> {
    let found = find_course(&state.db, id).await?;
    require_owner(auth.user(), &found)?;

    let target = find_by_login(&state.db, &request.identifier)
        .await?
        .ok_or_else(|| AppError::NotFound("No user found for that username or e-mail.".to_string()))?;
    let role = UserProfile::find()
        .filter(user_profile::Column::UserId.eq(target.id))
        .one(&state.db)
        .await?
        .map(|p| p.role);
    if role != Some(Role::Student) {
        return Err(AppError::BadRequest("User is not a student.".to_string()));
    }

    let (row, created) = enrol_student(&state.db, &found, &target).await?;
    Ok(Json(EnrolmentResult {
        course_id: row.course_id,
        student_id: row.student_id,
        created,
    }))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/add-student",
    tag = "Courses",
    params(
        ("id" = i64, Path, description = "Course ID"),
        ("q" = String, Query, description = "Part of a username or e-mail")
    ),
    responses((status = 200, body = UserSearchResponse), (status = 403))
)]
async fn suggest_students(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<UserSearchResponse>> {
    let found = find_course(&state.db, id).await?;
    require_owner(auth.user(), &found)?;

    let q = query.q.trim();
    if q.is_empty() {
        return Ok(Json(UserSearchResponse {
            count: 0,
            results: vec![],
        }));
    }

    let enrolled: Vec<i64> = Enrolment::find()
        .filter(enrolment::Column::CourseId.eq(found.id))
        .select_only()
        .column(enrolment::Column::StudentId)
        .into_tuple()
        .all(&state.db)
        .await?;
    let students: Vec<i64> = UserProfile::find()
        .filter(user_profile::Column::Role.eq(Role::Student))
        .select_only()
        .column(user_profile::Column::UserId)
        .into_tuple()
        .all(&state.db)
        .await?;

    let candidates = User::find()
        .filter(
            Condition::any()
                .add(icontains(user::Column::Username, q))
                .add(icontains(user::Column::Email, q)),
        )
        .filter(user::Column::Id.is_in(students))
        .filter(user::Column::Id.is_not_in(enrolled))
        .order_by_asc(user::Column::Username)
        .limit(SUGGESTION_LIMIT)
        .all(&state.db)
        .await?;

    let mut summaries = user_summaries(&state.db, candidates.iter().map(|u| u.id)).await?;
    let results: Vec<_> = candidates
        .iter()
        .filter_map(|u| summaries.remove(&u.id))
        .collect();
    Ok(Json(UserSearchResponse {
        count: results.len(),
        results,
    }))
}

// ============================================================================
// Feedback & Calendar
// ============================================================================

#[utoipa::path(
    post,
    path = "/courses/{id}/feedback",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    request_body = FeedbackRequest,
    responses((status = 200, body = FeedbackResponse), (status = 400), (status = 403))
)]
async fn leave_feedback(
    State(state): State<AppState>,
    student: Authorized<StudentOnly>,
    Path(id): Path<i64>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>> {
    let found = find_course(&state.db, id).await?;
    require_member(
        &state.db,
        student.user(),
        &found,
        "Please enrol before leaving feedback.",
    )
    .await?;

    let (row, _) = upsert_feedback(&state.db, found.id, student.user(), request).await?;
    Ok(Json(FeedbackResponse::new(
        row,
        Some(student.user().username().to_string()),
    )))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/calendar.ics",
    tag = "Courses",
    params(("id" = i64, Path, description = "Course ID")),
    responses((status = 200, content_type = "text/calendar"), (status = 404))
)]
async fn course_calendar_ics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let found = find_course(&state.db, id).await?;
    let materials = Material::find()
        .filter(material::Column::CourseId.eq(found.id))
        .order_by_asc(material::Column::CreatedAt)
        .order_by_asc(material::Column::Id)
        .all(&state.db)
        .await?;

    let body = course_calendar(&found, &materials, Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=course-{}.ics", found.id),
            ),
        ],
        body,
    )
        .into_response())
}
