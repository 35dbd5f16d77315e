//! Versioned REST API mounted at `/api/v1`.
//!
//! Reads are open to anonymous callers and scoped by what the caller may see;
//! writes need a session.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};

use crate::endpoints::accounts::find_users;
use crate::endpoints::activity::create_status;
use crate::endpoints::courses::{enrol_student, upsert_feedback, validate_course};
use crate::endpoints::extractors::{
    course_response, course_responses, find_course, is_member, is_owner, require_owner,
    user_summaries, user_summary,
};
use crate::error::{AppError, Result};
use crate::middleware::permissions::{
    Authenticated, Authorized, MaybeAuthenticated, StudentOnly, TeacherOnly,
};
use crate::middleware::AuthenticatedUser;
use crate::models::prelude::*;
use crate::models::{course, enrolment, feedback, material, status, user};
use crate::schemas::{
    ApiFeedback, CoursePatch, CourseRequest, CourseResponse, CreateEnrolmentRequest,
    CreateFeedbackRequest, EnrolmentDto, FeedbackRequest, ListFilter, MaterialResponse,
    PageQuery, PageWindow, Paginated, SearchQuery, StatusRequest, StatusResponse, UserSearchResponse,
    UserSummary,
};
use crate::services::accounts::icontains;
use crate::state::{AppState, DbConn};

const BASE: &str = "/api/v1";

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/{id}",
            get(get_course)
                .put(update_course)
                .patch(update_course)
                .delete(delete_course),
        )
        .route("/enrolments", get(list_enrolments).post(create_enrolment))
        .route("/enrolments/{id}", get(get_enrolment).delete(delete_enrolment))
        .route("/materials", get(list_materials))
        .route("/materials/{id}", get(get_material))
        .route("/feedback", get(list_feedback).post(create_feedback))
        .route(
            "/feedback/{id}",
            get(get_feedback).put(update_feedback).patch(update_feedback),
        )
        .route("/status", get(list_status).post(post_status))
        .route("/search/users", get(search_users))
        .with_state(state)
}

// ============================================================================
// Helpers
// ============================================================================

/// Count the query, validate the page and fetch its rows
async fn fetch_page<E>(
    db: &DbConn,
    select: Select<E>,
    page: &PageQuery,
) -> Result<(Vec<E::Model>, u64, PageWindow)>
where
    E: EntityTrait,
    E::Model: Sync,
{
    let count = select.clone().count(db).await?;
    let window = page.window(count)?;
    let rows = select
        .offset(window.offset())
        .limit(window.page_size)
        .all(db)
        .await?;
    Ok((rows, count, window))
}

fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

/// Courses the user owns or is enrolled on
async fn member_course_ids(db: &DbConn, user: &AuthenticatedUser) -> Result<Vec<i64>> {
    let mut ids: Vec<i64> = if user.is_teacher() {
        Course::find()
            .filter(course::Column::OwnerId.eq(user.id()))
            .select_only()
            .column(course::Column::Id)
            .into_tuple()
            .all(db)
            .await?
    } else {
        Vec::new()
    };
    let enrolled: Vec<i64> = Enrolment::find()
        .filter(enrolment::Column::StudentId.eq(user.id()))
        .select_only()
        .column(enrolment::Column::CourseId)
        .into_tuple()
        .all(db)
        .await?;
    ids.extend(enrolled);
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Enrolments visible to the user: students see their own, teachers those on their courses
async fn visible_enrolments(db: &DbConn, viewer: Option<&AuthenticatedUser>) -> Result<Option<Select<Enrolment>>> {
    let Some(user) = viewer else {
        return Ok(None);
    };
    if user.is_student() {
        return Ok(Some(
            Enrolment::find().filter(enrolment::Column::StudentId.eq(user.id())),
        ));
    }
    let owned: Vec<i64> = Course::find()
        .filter(course::Column::OwnerId.eq(user.id()))
        .select_only()
        .column(course::Column::Id)
        .into_tuple()
        .all(db)
        .await?;
    Ok(Some(
        Enrolment::find().filter(enrolment::Column::CourseId.is_in(owned)),
    ))
}

async fn enrolment_dtos(db: &DbConn, rows: Vec<enrolment::Model>) -> Result<Vec<EnrolmentDto>> {
    let students = user_summaries(db, rows.iter().map(|e| e.student_id)).await?;
    Ok(rows
        .into_iter()
        .map(|e| {
            let student = students.get(&e.student_id).cloned();
            EnrolmentDto::new(e, student)
        })
        .collect())
}

fn empty_page<T>(path: &str) -> Paginated<T> {
    Paginated::new(
        Vec::new(),
        0,
        PageWindow {
            page: 1,
            page_size: crate::schemas::DEFAULT_PAGE_SIZE,
        },
        path,
        &[],
    )
}

// ============================================================================
// Users
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "API",
    params(PageQuery, ListFilter),
    responses((status = 200, body = Paginated<UserSummary>), (status = 404, description = "Invalid page"))
)]
async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Paginated<UserSummary>>> {
    let mut query = User::find();
    if let Some(term) = filter.search_term() {
        query = query.filter(
            Condition::any()
                .add(icontains(user::Column::Username, term))
                .add(icontains(user::Column::Email, term)),
        );
    }
    query = match filter.ordering(&["username", "id"]) {
        Some(("id", false)) => query.order_by_asc(user::Column::Id),
        Some(("id", true)) => query.order_by_desc(user::Column::Id),
        Some((_, true)) => query.order_by_desc(user::Column::Username),
        _ => query.order_by_asc(user::Column::Username),
    };

    let (users, count, window) = fetch_page(&state.db, query, &page).await?;
    let mut summaries = user_summaries(&state.db, users.iter().map(|u| u.id)).await?;
    let results = users
        .iter()
        .filter_map(|u| summaries.remove(&u.id))
        .collect();

    Ok(Json(Paginated::new(
        results,
        count,
        window,
        &url("/users"),
        &filter.link_params(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "User ID")),
    responses((status = 200, body = UserSummary), (status = 404))
)]
async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<UserSummary>> {
    Ok(Json(user_summary(&state.db, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/search/users",
    tag = "API",
    params(("q" = String, Query, description = "Partial username or e-mail")),
    responses((status = 200, body = UserSearchResponse), (status = 403, description = "Teachers only"))
)]
async fn search_users(
    State(state): State<AppState>,
    _teacher: Authorized<TeacherOnly>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<UserSearchResponse>> {
    Ok(Json(find_users(&state, &query.q).await?))
}

// ============================================================================
// Courses
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/courses",
    tag = "API",
    params(PageQuery, ListFilter),
    responses((status = 200, body = Paginated<CourseResponse>))
)]
async fn list_courses(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Paginated<CourseResponse>>> {
    let mut query = Course::find();
    if let Some(term) = filter.search_term() {
        let owners: Vec<i64> = User::find()
            .filter(icontains(user::Column::Username, term))
            .select_only()
            .column(user::Column::Id)
            .into_tuple()
            .all(&state.db)
            .await?;
        query = query.filter(
            Condition::any()
                .add(icontains(course::Column::Title, term))
                .add(icontains(course::Column::Description, term))
                .add(course::Column::OwnerId.is_in(owners)),
        );
    }
    query = match filter.ordering(&["title", "created_at", "updated_at"]) {
        Some(("created_at", desc)) => ordered(query, course::Column::CreatedAt, desc),
        Some(("updated_at", desc)) => ordered(query, course::Column::UpdatedAt, desc),
        Some((_, desc)) => ordered(query, course::Column::Title, desc),
        None => query.order_by_asc(course::Column::Title),
    }
    .order_by_asc(course::Column::Id);

    let (courses, count, window) = fetch_page(&state.db, query, &page).await?;
    let results = course_responses(&state.db, courses).await?;
    Ok(Json(Paginated::new(
        results,
        count,
        window,
        &url("/courses"),
        &filter.link_params(),
    )))
}

fn ordered<E: EntityTrait, C: ColumnTrait>(query: Select<E>, column: C, desc: bool) -> Select<E> {
    if desc {
        query.order_by_desc(column)
    } else {
        query.order_by_asc(column)
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/courses",
    tag = "API",
    request_body = CourseRequest,
    responses(
        (status = 201, body = CourseResponse),
        (status = 401),
        (status = 403, description = "Only teachers can create courses")
    )
)]
async fn create_course(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<CourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>)> {
    if !auth.user().is_teacher() {
        return Err(AppError::Forbidden(
            "Only teachers can create courses.".to_string(),
        ));
    }
    validate_course(&request)?;

    let now = Utc::now();
    let created = course::ActiveModel {
        owner_id: Set(auth.user_id()),
        title: Set(request.title.trim().to_string()),
        description: Set(request.description),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(course_id = created.id, owner_id = auth.user_id(), "Course created via API");
    Ok((StatusCode::CREATED, Json(course_response(&state.db, created).await?)))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "Course ID")),
    responses((status = 200, body = CourseResponse), (status = 403), (status = 404))
)]
async fn get_course(
    State(state): State<AppState>,
    MaybeAuthenticated(viewer): MaybeAuthenticated,
    Path(id): Path<i64>,
) -> Result<Json<CourseResponse>> {
    let course = find_course(&state.db, id).await?;
    let allowed = match &viewer {
        Some(user) => is_member(&state.db, user, &course).await?,
        None => false,
    };
    if !allowed {
        return Err(AppError::Forbidden("Enrol to access this course.".to_string()));
    }
    Ok(Json(course_response(&state.db, course).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/courses/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "Course ID")),
    request_body = CoursePatch,
    responses((status = 200, body = CourseResponse), (status = 400), (status = 403))
)]
async fn update_course(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
    Json(patch): Json<CoursePatch>,
) -> Result<Json<CourseResponse>> {
    let course = find_course(&state.db, id).await?;
    require_owner(auth.user(), &course)?;

    let request = CourseRequest {
        title: patch.title.unwrap_or_else(|| course.title.clone()),
        description: patch.description.unwrap_or_else(|| course.description.clone()),
    };
    validate_course(&request)?;

    let mut active: course::ActiveModel = course.into();
    active.title = Set(request.title.trim().to_string());
    active.description = Set(request.description);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    Ok(Json(course_response(&state.db, updated).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/courses/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "Course ID")),
    responses((status = 204), (status = 403), (status = 404))
)]
async fn delete_course(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let course = find_course(&state.db, id).await?;
    require_owner(auth.user(), &course)?;
    course.delete(&state.db).await?;
    tracing::info!(course_id = id, "Course deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Enrolments
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/enrolments",
    tag = "API",
    params(PageQuery, ListFilter),
    responses((status = 200, body = Paginated<EnrolmentDto>))
)]
async fn list_enrolments(
    State(state): State<AppState>,
    MaybeAuthenticated(viewer): MaybeAuthenticated,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Paginated<EnrolmentDto>>> {
    let path = url("/enrolments");
    let Some(mut query) = visible_enrolments(&state.db, viewer.as_ref()).await? else {
        page.window(0)?;
        return Ok(Json(empty_page(&path)));
    };
    if let Some(course_id) = filter.course {
        query = query.filter(enrolment::Column::CourseId.eq(course_id));
    }
    query = query.order_by_asc(enrolment::Column::Id);

    let (rows, count, window) = fetch_page(&state.db, query, &page).await?;
    let results = enrolment_dtos(&state.db, rows).await?;
    Ok(Json(Paginated::new(
        results,
        count,
        window,
        &path,
        &filter.link_params(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/enrolments/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "Enrolment ID")),
    responses((status = 200, body = EnrolmentDto), (status = 404))
)]
async fn get_enrolment(
    State(state): State<AppState>,
    MaybeAuthenticated(viewer): MaybeAuthenticated,
    Path(id): Path<i64>,
) -> Result<Json<EnrolmentDto>> {
    let found = match visible_enrolments(&state.db, viewer.as_ref()).await? {
        Some(query) => query.filter(enrolment::Column::Id.eq(id)).one(&state.db).await?,
        None => None,
    }
    .ok_or_else(|| AppError::NotFound("Enrolment not found.".to_string()))?;

    let mut dtos = enrolment_dtos(&state.db, vec![found]).await?;
    dtos.pop()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Enrolment not found.".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/v1/enrolments",
    tag = "API",
    request_body = CreateEnrolmentRequest,
    responses(
        (status = 201, body = EnrolmentDto),
        (status = 400, description = "Already enrolled"),
        (status = 401),
        (status = 403, description = "Students only")
    )
)]
async fn create_enrolment(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<CreateEnrolmentRequest>,
) -> Result<(StatusCode, Json<EnrolmentDto>)> {
    if !auth.user().is_student() {
        return Err(AppError::Forbidden("Only students can enrol.".to_string()));
    }
    let course = Course::find_by_id(request.course)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid course.".to_string()))?;

    let (row, created) = enrol_student(&state.db, &course, &auth.user().user).await?;
    if !created {
        return Err(AppError::BadRequest(
            "Already enrolled in this course.".to_string(),
        ));
    }

    let student = UserSummary::new(&auth.user().user, auth.user().role());
    Ok((StatusCode::CREATED, Json(EnrolmentDto::new(row, Some(student)))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/enrolments/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "Enrolment ID")),
    responses((status = 204), (status = 403), (status = 404))
)]
async fn delete_enrolment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let found = Enrolment::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrolment not found.".to_string()))?;
    let course = find_course(&state.db, found.course_id).await?;

    if found.student_id != auth.user_id() && !is_owner(auth.user(), &course) {
        return Err(AppError::Forbidden("Not permitted.".to_string()));
    }
    found.delete(&state.db).await?;
    tracing::info!(enrolment_id = id, by = auth.user_id(), "Enrolment removed via API");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Materials
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/materials",
    tag = "API",
    params(PageQuery, ListFilter),
    responses((status = 200, body = Paginated<MaterialResponse>))
)]
async fn list_materials(
    State(state): State<AppState>,
    MaybeAuthenticated(viewer): MaybeAuthenticated,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Paginated<MaterialResponse>>> {
    let path = url("/materials");
    let Some(user) = viewer else {
        page.window(0)?;
        return Ok(Json(empty_page(&path)));
    };

    let mut query = Material::find()
        .filter(material::Column::CourseId.is_in(member_course_ids(&state.db, &user).await?));
    if let Some(course_id) = filter.course {
        query = query.filter(material::Column::CourseId.eq(course_id));
    }
    query = query
        .order_by_desc(material::Column::CreatedAt)
        .order_by_desc(material::Column::Id);

    let (rows, count, window) = fetch_page(&state.db, query, &page).await?;
    Ok(Json(Paginated::new(
        rows.into_iter().map(MaterialResponse::from).collect(),
        count,
        window,
        &path,
        &filter.link_params(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "Material ID")),
    responses((status = 200, body = MaterialResponse), (status = 404))
)]
async fn get_material(
    State(state): State<AppState>,
    MaybeAuthenticated(viewer): MaybeAuthenticated,
    Path(id): Path<i64>,
) -> Result<Json<MaterialResponse>> {
    let not_found = || AppError::NotFound("Material not found.".to_string());
    let user = viewer.ok_or_else(not_found)?;
    let found = Material::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(not_found)?;
    let course = find_course(&state.db, found.course_id).await?;
    if !is_member(&state.db, &user, &course).await? {
        return Err(not_found());
    }
    Ok(Json(found.into()))
}

// ============================================================================
// Feedback
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/feedback",
    tag = "API",
    params(PageQuery, ListFilter),
    responses((status = 200, body = Paginated<ApiFeedback>))
)]
async fn list_feedback(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Paginated<ApiFeedback>>> {
    let mut query = Feedback::find();
    if let Some(course_id) = filter.course {
        query = query.filter(feedback::Column::CourseId.eq(course_id));
    }
    query = match filter.ordering(&["created_at", "rating"]) {
        Some(("rating", desc)) => ordered(query, feedback::Column::Rating, desc),
        Some((_, false)) => query.order_by_asc(feedback::Column::CreatedAt),
        _ => query.order_by_desc(feedback::Column::CreatedAt),
    }
    .order_by_desc(feedback::Column::Id);

    let (rows, count, window) = fetch_page(&state.db, query, &page).await?;
    Ok(Json(Paginated::new(
        rows.into_iter().map(ApiFeedback::from).collect(),
        count,
        window,
        &url("/feedback"),
        &filter.link_params(),
    )))
}

async fn find_feedback(db: &DbConn, id: i64) -> Result<feedback::Model> {
    Feedback::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Feedback not found.".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/v1/feedback/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "Feedback ID")),
    responses((status = 200, body = ApiFeedback), (status = 404))
)]
async fn get_feedback(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ApiFeedback>> {
    Ok(Json(find_feedback(&state.db, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/feedback",
    tag = "API",
    request_body = CreateFeedbackRequest,
    responses(
        (status = 201, body = ApiFeedback),
        (status = 400, description = "Invalid rating or duplicate"),
        (status = 401),
        (status = 403)
    )
)]
async fn create_feedback(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<CreateFeedbackRequest>,
) -> Result<(StatusCode, Json<ApiFeedback>)> {
    if !auth.user().is_student() {
        return Err(AppError::Forbidden(
            "Only students can leave feedback.".to_string(),
        ));
    }
    let course = Course::find_by_id(request.course)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid course.".to_string()))?;
    if !is_member(&state.db, auth.user(), &course).await? {
        return Err(AppError::Forbidden(
            "Enrol before leaving feedback.".to_string(),
        ));
    }

    let existing = Feedback::find()
        .filter(feedback::Column::CourseId.eq(course.id))
        .filter(feedback::Column::StudentId.eq(auth.user_id()))
        .count(&state.db)
        .await?;
    if existing > 0 {
        return Err(AppError::BadRequest(
            "You have already left feedback for this course.".to_string(),
        ));
    }

    let (row, _) = upsert_feedback(
        &state.db,
        course.id,
        auth.user(),
        FeedbackRequest {
            rating: request.rating,
            comment: request.comment,
            anonymous: request.anonymous,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/feedback/{id}",
    tag = "API",
    params(("id" = i64, Path, description = "Feedback ID")),
    request_body = FeedbackRequest,
    responses((status = 200, body = ApiFeedback), (status = 400), (status = 403))
)]
async fn update_feedback(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<ApiFeedback>> {
    let found = find_feedback(&state.db, id).await?;
    if found.student_id != auth.user_id() {
        return Err(AppError::Forbidden(
            "Cannot edit others' feedback.".to_string(),
        ));
    }
    let (row, _) = upsert_feedback(&state.db, found.course_id, auth.user(), request).await?;
    Ok(Json(row.into()))
}

// ============================================================================
// Status Updates
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "API",
    params(PageQuery, ListFilter),
    responses((status = 200, body = Paginated<StatusResponse>))
)]
async fn list_status(
    State(state): State<AppState>,
    MaybeAuthenticated(viewer): MaybeAuthenticated,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Paginated<StatusResponse>>> {
    let path = url("/status");
    let Some(user) = viewer.filter(|u| u.is_student()) else {
        page.window(0)?;
        return Ok(Json(empty_page(&path)));
    };

    let query = match filter.ordering(&["created_at", "id"]) {
        Some(("id", desc)) => ordered(Status::find(), status::Column::Id, desc),
        Some((_, false)) => Status::find().order_by_asc(status::Column::CreatedAt),
        _ => Status::find().order_by_desc(status::Column::CreatedAt),
    }
    .filter(status::Column::UserId.eq(user.id()))
    .order_by_desc(status::Column::Id);

    let (rows, count, window) = fetch_page(&state.db, query, &page).await?;
    Ok(Json(Paginated::new(
        rows.into_iter().map(StatusResponse::from).collect(),
        count,
        window,
        &path,
        &filter.link_params(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/status",
    tag = "API",
    request_body = StatusRequest,
    responses((status = 201, body = StatusResponse), (status = 400), (status = 401), (status = 403))
)]
async fn post_status(
    State(state): State<AppState>,
    auth: Authorized<StudentOnly>,
    Json(request): Json<StatusRequest>,
) -> Result<(StatusCode, Json<StatusResponse>)> {
    let created = create_status(&state.db, auth.user_id(), &request.text).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}
