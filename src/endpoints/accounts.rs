use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set,
};
use serde::Serialize;
use validator::Validate;

use crate::config::CONFIG;
use crate::endpoints::extractors::{course_responses, user_summaries};
use crate::error::{AppError, Result};
use crate::middleware::auth::SESSION_COOKIE_NAME;
use crate::middleware::permissions::{Authenticated, Authorized, StudentOnly, TeacherOnly};
use crate::middleware::ClientKey;
use crate::models::prelude::*;
use crate::models::user_profile::Role;
use crate::models::{assignment, course, enrolment, grade, status, user, user_profile};
use crate::schemas::{
    ChangePasswordRequest, CourseGrades, CourseResponse, ForgotPasswordRequest, LoginRequest,
    RegisterRequest, SearchQuery, StatusResponse, StudentGradeEntry, StudentGradesResponse,
    UpdateProfileRequest, UserResponse, UserSearchResponse,
};
use crate::services::accounts::{
    create_account, ensure_profile, find_by_login, icontains, NewAccount,
};
use crate::services::avatar::avatar_url;
use crate::services::security::{
    create_session_token, hash_password, hash_secret_word, validate_password, verify_password,
    verify_secret_word,
};
use crate::state::AppState;

const SEARCH_LIMIT: u64 = 50;
const HOME_STATUS_LIMIT: u64 = 20;

/// Routes reachable without a session
pub fn accounts_public_routes(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/password/forgot", post(forgot_password))
        .route("/avatar/{user_id}/{size}", get(avatar))
        .with_state(state)
}

pub fn accounts_routes(state: AppState) -> Router {
    Router::new()
        .route("/password/change", post(change_password))
        .route("/home", get(home))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/search", get(search_users))
        .route("/grades", get(my_grades))
        .with_state(state)
}

// ============================================================================
// Session Cookie Helpers
// ============================================================================

pub fn session_cookie(token: &str) -> HeaderValue {
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE_NAME,
        token,
        CONFIG.auth.session_ttl_secs,
        if CONFIG.auth.secure_cookies { "; Secure" } else { "" }
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn clear_session_cookie() -> HeaderValue {
    let cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE_NAME
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

// ============================================================================
// Registration & Sessions
// ============================================================================

#[utoipa::path(
    post,
    path = "/accounts/register",
    tag = "Accounts",
    request_body = RegisterRequest,
    responses(
        (status = 201, body = UserResponse),
        (status = 400, description = "Validation failed")
    )
)]
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response> {
    request.validate()?;
    if request.password != request.password2 {
        return Err(AppError::BadRequest("The two passwords do not match.".to_string()));
    }
    validate_password(&request.password)?;

    let (created, profile) = create_account(
        &state.db,
        NewAccount {
            username: request.username,
            email: request.email,
            password: request.password,
            role: request.role,
            secret_word: request.secret_word,
        },
    )
    .await?;

    let token = create_session_token(created.id)?;
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(UserResponse::from_parts(&created, &profile)),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/accounts/login",
    tag = "Accounts",
    request_body = LoginRequest,
    responses(
        (status = 200, body = UserResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many failed attempts")
    )
)]
async fn login(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    let throttle_key = format!("{}:{}", client, request.username.trim().to_lowercase());
    if state.login_limiter.is_blocked(&throttle_key) {
        tracing::warn!(client = %client, "Login throttled");
        return Err(AppError::TooManyRequests(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let found = find_by_login(&state.db, &request.username)
        .await?
        .filter(|u| u.is_active && verify_password(&request.password, &u.password_hash));

    let Some(found) = found else {
        state.login_limiter.record(&throttle_key);
        return Err(AppError::Unauthorized(
            "Invalid username or password.".to_string(),
        ));
    };

    state.login_limiter.reset(&throttle_key);
    let profile = ensure_profile(&state.db, found.id).await?;
    let token = create_session_token(found.id)?;
    tracing::info!(user_id = found.id, "User logged in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(UserResponse::from_parts(&found, &profile)),
    )
        .into_response())
}

#[utoipa::path(post, path = "/accounts/logout", tag = "Accounts", responses((status = 200)))]
async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({"success": true})),
    )
        .into_response()
}

// ============================================================================
// Passwords
// ============================================================================

#[utoipa::path(
    post,
    path = "/accounts/password/change",
    tag = "Accounts",
    request_body = ChangePasswordRequest,
    responses((status = 200), (status = 400))
)]
async fn change_password(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    let current = &auth.user().user;
    if !verify_password(&request.old_password, &current.password_hash) {
        return Err(AppError::BadRequest(
            "Your old password was entered incorrectly.".to_string(),
        ));
    }
    validate_password(&request.new_password)?;

    let mut active: user::ActiveModel = current.clone().into();
    active.password_hash = Set(hash_password(&request.new_password)?);
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    tracing::info!(user_id = current.id, "Password changed");
    Ok(Json(serde_json::json!({"success": true})))
}

#[utoipa::path(
    post,
    path = "/accounts/password/forgot",
    tag = "Accounts",
    request_body = ForgotPasswordRequest,
    responses((status = 200), (status = 400))
)]
async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    validate_password(&request.new_password)?;

    let generic = || AppError::BadRequest("Invalid username or secret word.".to_string());

    let found = find_by_login(&state.db, &request.username)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(generic)?;
    let profile = ensure_profile(&state.db, found.id).await?;
    let verified = profile
        .secret_word_hash
        .as_deref()
        .is_some_and(|hash| verify_secret_word(&request.secret_word, hash));
    if !verified {
        return Err(generic());
    }

    let user_id = found.id;
    let mut active: user::ActiveModel = found.into();
    active.password_hash = Set(hash_password(&request.new_password)?);
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    tracing::info!(user_id, "Password reset with secret word");
    Ok(Json(serde_json::json!({"success": true})))
}

// ============================================================================
// Dashboard & Profile
// ============================================================================

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct EnrolledCourse {
    pub enrolment_id: i64,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
    pub course: CourseResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HomeResponse {
    pub user: UserResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owned_courses: Option<Vec<CourseResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrolments: Option<Vec<EnrolledCourse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<StatusResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grades: Option<Vec<CourseGrades>>,
}

#[utoipa::path(get, path = "/accounts/home", tag = "Accounts", responses((status = 200, body = HomeResponse)))]
async fn home(State(state): State<AppState>, auth: Authenticated) -> Result<Json<HomeResponse>> {
    let me = auth.user();
    let mut response = HomeResponse {
        user: UserResponse::from_parts(&me.user, &me.profile),
        owned_courses: None,
        enrolments: None,
        statuses: None,
        grades: None,
    };

    match me.role() {
        Role::Teacher => {
            let owned = Course::find()
                .filter(course::Column::OwnerId.eq(me.id()))
                .order_by_asc(course::Column::Title)
                .all(&state.db)
                .await?;
            response.owned_courses = Some(course_responses(&state.db, owned).await?);
        }
        Role::Student => {
            let rows = Enrolment::find()
                .filter(enrolment::Column::StudentId.eq(me.id()))
                .find_also_related(Course)
                .order_by_desc(enrolment::Column::CreatedAt)
                .all(&state.db)
                .await?;
            let (enrolments, courses): (Vec<_>, Vec<_>) = rows
                .into_iter()
                .filter_map(|(e, c)| c.map(|c| (e, c)))
                .unzip();
            let courses = course_responses(&state.db, courses).await?;
            response.enrolments = Some(
                enrolments
                    .into_iter()
                    .zip(courses)
                    .map(|(e, course)| EnrolledCourse {
                        enrolment_id: e.id,
                        completed: e.completed,
                        enrolled_at: e.created_at,
                        course,
                    })
                    .collect(),
            );

            let statuses = Status::find()
                .filter(status::Column::UserId.eq(me.id()))
                .order_by_desc(status::Column::CreatedAt)
                .limit(HOME_STATUS_LIMIT)
                .all(&state.db)
                .await?;
            response.statuses = Some(statuses.into_iter().map(Into::into).collect());
            response.grades = Some(released_grades(&state, me.id()).await?);
        }
    }

    Ok(Json(response))
}

#[utoipa::path(get, path = "/accounts/profile", tag = "Accounts", responses((status = 200, body = UserResponse)))]
async fn get_profile(auth: Authenticated) -> Json<UserResponse> {
    let me = auth.user();
    Json(UserResponse::from_parts(&me.user, &me.profile))
}

#[utoipa::path(
    put,
    path = "/accounts/profile",
    tag = "Accounts",
    request_body = UpdateProfileRequest,
    responses((status = 200, body = UserResponse), (status = 400))
)]
async fn update_profile(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>> {
    request.validate()?;
    let me = auth.user();
    let mut active: user_profile::ActiveModel = me.profile.clone().into();

    if let Some(full_name) = request.full_name {
        active.full_name = Set(full_name.trim().to_string());
    }
    if let Some(phone) = request.phone {
        active.phone = Set(phone.trim().to_string());
    }
    if let Some(student_number) = request.student_number {
        active.student_number = Set(student_number.trim().to_string());
    }
    if let Some(role) = request.role {
        active.role = Set(role);
    }
    if let Some(instructor_id) = request.instructor_id {
        let instructor_id = instructor_id.trim().to_string();
        if instructor_id.is_empty() {
            active.instructor_id = Set(None);
        } else {
            let taken = UserProfile::find()
                .filter(user_profile::Column::InstructorId.eq(instructor_id.as_str()))
                .filter(user_profile::Column::UserId.ne(me.id()))
                .one(&state.db)
                .await?;
            if taken.is_some() {
                return Err(AppError::BadRequest(
                    "This instructor ID is already in use.".to_string(),
                ));
            }
            active.instructor_id = Set(Some(instructor_id));
        }
    }
    if let Some(word) = request.secret_word.as_deref().map(str::trim) {
        if !word.is_empty() {
            active.secret_word_hash = Set(Some(hash_secret_word(word)?));
        }
    }
    active.updated_at = Set(Utc::now());
    let profile = active.update(&state.db).await?;

    Ok(Json(UserResponse::from_parts(&me.user, &profile)))
}

// ============================================================================
// Search & Avatars
// ============================================================================

#[utoipa::path(
    get,
    path = "/accounts/search",
    tag = "Accounts",
    params(("q" = String, Query, description = "Part of a username or e-mail")),
    responses((status = 200, body = UserSearchResponse), (status = 403))
)]
async fn search_users(
    State(state): State<AppState>,
    _teacher: Authorized<TeacherOnly>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<UserSearchResponse>> {
    Ok(Json(find_users(&state, &query.q).await?))
}

/// Case-insensitive partial match on username or e-mail, capped at 50
pub async fn find_users(state: &AppState, q: &str) -> Result<UserSearchResponse> {
    let q = q.trim();
    if q.is_empty() {
        return Ok(UserSearchResponse {
            count: 0,
            results: vec![],
        });
    }

    let users = User::find()
        .filter(
            Condition::any()
                .add(icontains(user::Column::Username, q))
                .add(icontains(user::Column::Email, q)),
        )
        .order_by_asc(user::Column::Username)
        .limit(SEARCH_LIMIT)
        .all(&state.db)
        .await?;

    let mut summaries = user_summaries(&state.db, users.iter().map(|u| u.id)).await?;
    let results: Vec<_> = users
        .iter()
        .filter_map(|u| summaries.remove(&u.id))
        .collect();

    Ok(UserSearchResponse {
        count: results.len(),
        results,
    })
}

#[utoipa::path(
    get,
    path = "/accounts/avatar/{user_id}/{size}",
    tag = "Accounts",
    params(
        ("user_id" = i64, Path, description = "User ID"),
        ("size" = u32, Path, description = "Pixel size, clamped to 16..=512")
    ),
    responses((status = 302, description = "Redirect to the avatar image"), (status = 404))
)]
async fn avatar(
    State(state): State<AppState>,
    Path((user_id, size)): Path<(i64, u32)>,
) -> Result<Response> {
    let found = User::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
    let role = UserProfile::find()
        .filter(user_profile::Column::UserId.eq(found.id))
        .one(&state.db)
        .await?
        .map(|p| p.role)
        .unwrap_or(Role::Student);

    let location = avatar_url(found.id, &CONFIG.auth.avatar_salt, role, size);
    let location = HeaderValue::from_str(&location)
        .map_err(|e| AppError::Internal(format!("Invalid avatar URL: {}", e)))?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

// ============================================================================
// Grades
// ============================================================================

#[utoipa::path(
    get,
    path = "/accounts/grades",
    tag = "Accounts",
    responses((status = 200, body = StudentGradesResponse), (status = 403))
)]
async fn my_grades(
    State(state): State<AppState>,
    student: Authorized<StudentOnly>,
) -> Result<Json<StudentGradesResponse>> {
    Ok(Json(StudentGradesResponse {
        courses: released_grades(&state, student.user_id()).await?,
    }))
}

fn percentage(achieved: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    (achieved / max * 10000.0).round() / 100.0
}

/// Released grades grouped by course, courses ordered by title
async fn released_grades(state: &AppState, student_id: i64) -> Result<Vec<CourseGrades>> {
    let rows = Grade::find()
        .filter(grade::Column::StudentId.eq(student_id))
        .filter(grade::Column::ReleasedAt.is_not_null())
        .find_also_related(Assignment)
        .order_by_asc(grade::Column::Id)
        .all(&state.db)
        .await?;

    let course_ids: Vec<i64> = rows.iter().map(|(g, _)| g.course_id).collect();
    let titles: BTreeMap<i64, String> = Course::find()
        .filter(course::Column::Id.is_in(course_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.title))
        .collect();

    let mut grouped: BTreeMap<i64, Vec<StudentGradeEntry>> = BTreeMap::new();
    for (g, a) in rows {
        let title = a.map(|a: assignment::Model| a.title).unwrap_or_default();
        grouped.entry(g.course_id).or_default().push(StudentGradeEntry {
            assignment_id: g.assignment_id,
            assignment: title,
            achieved_marks: g.achieved_marks,
            max_marks: g.max_marks,
            released_at: g.released_at,
        });
    }

    let mut courses: Vec<CourseGrades> = grouped
        .into_iter()
        .map(|(course_id, grades)| {
            let achieved: f64 = grades.iter().map(|g| g.achieved_marks).sum();
            let max: f64 = grades.iter().map(|g| g.max_marks).sum();
            CourseGrades {
                course_id,
                course: titles.get(&course_id).cloned().unwrap_or_default(),
                percentage: percentage(achieved, max),
                grades,
            }
        })
        .collect();
    courses.sort_by(|a, b| a.course.cmp(&b.course));
    Ok(courses)
}
