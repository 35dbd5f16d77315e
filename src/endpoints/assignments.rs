use std::collections::HashMap;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};

use crate::endpoints::extractors::{find_course, is_owner, require_member, require_owner};
use crate::endpoints::files::{stream_stored_file, MultipartForm};
use crate::error::{AppError, Result};
use crate::middleware::permissions::Authenticated;
use crate::middleware::AuthenticatedUser;
use crate::models::assignment::AssignmentKind;
use crate::models::prelude::*;
use crate::models::{
    assignment, attempt, course, quiz_answer_choice, quiz_question, student_answer,
    student_file_submission, student_text_answer,
};
use crate::schemas::{
    AssignmentResponse, AssignmentSummary, AttemptFeedbackResponse, AttemptListResponse,
    AttemptMarking, AttemptSummary, CourseAssignmentsResponse, CreateAssignmentRequest,
    GradeAttemptRequest, GradeAttemptResponse, ManageAction, ManageResponse, QuestionDto,
    SubmitResponse, TakeResponse, TextAnswerDto,
};
use crate::services::accounts::is_enrolled;
use crate::services::grading::{
    deadline_delta, grade_quiz, load_questions, marks_from_score, quiz_readiness, time_until,
    upsert_grade, QuestionWithChoices,
};
use crate::services::uploads::{discard_on_error, store_file, validate_paper, SUBMISSIONS_DIR};
use crate::state::{AppState, DbConn};

const DEFAULT_OPEN_DAYS: i64 = 7;

pub fn assignments_routes(state: AppState) -> Router {
    let body_limit = (state.limits.max_upload_bytes as usize).saturating_mul(2);

    Router::new()
        .route("/course/{course_id}", get(course_assignments))
        .route("/course/{course_id}/create", post(create_assignment))
        .route("/{id}/delete", post(delete_assignment))
        .route("/{id}/manage", get(get_manage).post(post_manage))
        .route("/{id}/take", get(take_assignment))
        .route(
            "/{id}/submit",
            post(submit_assignment).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{id}/attempts", get(list_attempts))
        .route("/attempt/{attempt_id}/feedback", get(attempt_feedback))
        .route("/attempt/{attempt_id}/file", get(attempt_file))
        .route("/attempt/{attempt_id}/grade", post(grade_attempt))
        .with_state(state)
}

// ============================================================================
// Helpers
// ============================================================================

async fn find_assignment(db: &DbConn, id: i64) -> Result<(assignment::Model, course::Model)> {
    let found = Assignment::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found.".to_string()))?;
    let course = find_course(db, found.course_id).await?;
    Ok((found, course))
}

async fn find_attempt(db: &DbConn, id: i64) -> Result<attempt::Model> {
    Attempt::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found.".to_string()))
}

async fn attempts_used<C: ConnectionTrait>(db: &C, assignment_id: i64, student_id: i64) -> Result<u64> {
    Ok(Attempt::find()
        .filter(attempt::Column::AssignmentId.eq(assignment_id))
        .filter(attempt::Column::StudentId.eq(student_id))
        .count(db)
        .await?)
}

async fn has_attempts(db: &DbConn, assignment_id: i64) -> Result<bool> {
    Ok(Attempt::find()
        .filter(attempt::Column::AssignmentId.eq(assignment_id))
        .count(db)
        .await?
        > 0)
}

/// Highest number of attempts any single student has made
async fn most_attempts_by_one_student(db: &DbConn, assignment_id: i64) -> Result<u64> {
    let students: Vec<i64> = Attempt::find()
        .filter(attempt::Column::AssignmentId.eq(assignment_id))
        .select_only()
        .column(attempt::Column::StudentId)
        .into_tuple()
        .all(db)
        .await?;
    let mut counts: HashMap<i64, u64> = HashMap::new();
    for student in students {
        *counts.entry(student).or_default() += 1;
    }
    Ok(counts.into_values().max().unwrap_or(0))
}

/// Gate for students starting or submitting an attempt; checks run in a fixed order
pub fn check_can_take(a: &assignment::Model, used: u64, now: DateTime<Utc>) -> Result<()> {
    if !a.is_published {
        return Err(AppError::BadRequest("Assignment is not published.".to_string()));
    }
    if !a.is_available_at(now) {
        return Err(AppError::BadRequest("Assignment is not available yet.".to_string()));
    }
    if !a.is_open_at(now) {
        return Err(AppError::BadRequest("Deadline has passed.".to_string()));
    }
    if used >= a.attempts_allowed.max(0) as u64 {
        return Err(AppError::BadRequest("No attempts left.".to_string()));
    }
    Ok(())
}

fn attempts_left(a: &assignment::Model, used: u64) -> u64 {
    (a.attempts_allowed.max(0) as u64).saturating_sub(used)
}

async fn manage_view(db: &DbConn, a: assignment::Model) -> Result<ManageResponse> {
    let questions = load_questions(db, a.id).await?;
    let readiness = (a.kind == AssignmentKind::Quiz).then(|| quiz_readiness(&questions));
    let locked = has_attempts(db, a.id).await?;
    Ok(ManageResponse {
        questions: questions
            .iter()
            .map(|q| QuestionDto::from_loaded(q, true))
            .collect(),
        assignment: a.into(),
        readiness,
        locked,
    })
}

// ============================================================================
// Listing & Creation
// ============================================================================

#[utoipa::path(
    get,
    path = "/assignments/course/{course_id}",
    tag = "Assignments",
    params(("course_id" = i64, Path, description = "Course ID")),
    responses((status = 200, body = CourseAssignmentsResponse), (status = 403))
)]
async fn course_assignments(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseAssignmentsResponse>> {
    let course = find_course(&state.db, course_id).await?;
    require_member(&state.db, auth.user(), &course, "Enrol to access this course.").await?;
    let owner_view = is_owner(auth.user(), &course);

    let mut query = Assignment::find().filter(assignment::Column::CourseId.eq(course.id));
    if !owner_view {
        query = query.filter(assignment::Column::IsPublished.eq(true));
    }
    let assignments = query
        .order_by_asc(assignment::Column::Title)
        .order_by_asc(assignment::Column::Id)
        .all(&state.db)
        .await?;

    let used: HashMap<i64, u64> = if owner_view {
        HashMap::new()
    } else {
        let ids: Vec<i64> = assignments.iter().map(|a| a.id).collect();
        let rows: Vec<i64> = Attempt::find()
            .filter(attempt::Column::AssignmentId.is_in(ids))
            .filter(attempt::Column::StudentId.eq(auth.user_id()))
            .select_only()
            .column(attempt::Column::AssignmentId)
            .into_tuple()
            .all(&state.db)
            .await?;
        rows.into_iter().fold(HashMap::new(), |mut acc, id| {
            *acc.entry(id).or_default() += 1;
            acc
        })
    };

    let now = Utc::now();
    let mut summaries = Vec::with_capacity(assignments.len());
    for a in assignments {
        let readiness = if a.kind == AssignmentKind::Quiz {
            Some(quiz_readiness(&load_questions(&state.db, a.id).await?))
        } else {
            None
        };
        let (attempts_used, left) = if owner_view {
            (None, None)
        } else {
            let n = used.get(&a.id).copied().unwrap_or(0);
            (Some(n), Some(attempts_left(&a, n)))
        };
        summaries.push(AssignmentSummary {
            available: a.is_available_at(now),
            time_left: a.deadline.map(|d| time_until(d, now)),
            readiness,
            attempts_used,
            attempts_left: left,
            assignment: a.into(),
        });
    }

    Ok(Json(CourseAssignmentsResponse {
        course_id: course.id,
        owner_view,
        assignments: summaries,
    }))
}

#[utoipa::path(
    post,
    path = "/assignments/course/{course_id}/create",
    tag = "Assignments",
    params(("course_id" = i64, Path, description = "Course ID")),
    request_body = CreateAssignmentRequest,
    responses((status = 201, body = AssignmentResponse), (status = 400), (status = 403))
)]
async fn create_assignment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(course_id): Path<i64>,
    Json(request): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>)> {
    let course = find_course(&state.db, course_id).await?;
    require_owner(auth.user(), &course)?;

    let now = Utc::now();
    let (title, max_marks) = request.check(now)?;
    let created = assignment::ActiveModel {
        course_id: Set(course.id),
        kind: Set(request.kind),
        title: Set(title),
        instructions: Set(request.instructions),
        available_from: Set(request.available_from),
        deadline: Set(request.deadline),
        max_marks: Set(max_marks),
        attempts_allowed: Set(request.attempts_allowed),
        is_published: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    tracing::info!(assignment_id = created.id, course_id = course.id, kind = ?created.kind, "Assignment created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    post,
    path = "/assignments/{id}/delete",
    tag = "Assignments",
    params(("id" = i64, Path, description = "Assignment ID")),
    responses((status = 200), (status = 400), (status = 403))
)]
async fn delete_assignment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let (found, course) = find_assignment(&state.db, id).await?;
    require_owner(auth.user(), &course)?;
    if has_attempts(&state.db, found.id).await? {
        return Err(AppError::BadRequest("Cannot delete: attempts exist.".to_string()));
    }
    found.delete(&state.db).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

// ============================================================================
// Management
// ============================================================================

#[utoipa::path(
    get,
    path = "/assignments/{id}/manage",
    tag = "Assignments",
    params(("id" = i64, Path, description = "Assignment ID")),
    responses((status = 200, body = ManageResponse), (status = 403))
)]
async fn get_manage(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<ManageResponse>> {
    let (found, course) = find_assignment(&state.db, id).await?;
    require_owner(auth.user(), &course)?;
    Ok(Json(manage_view(&state.db, found).await?))
}

#[utoipa::path(
    post,
    path = "/assignments/{id}/manage",
    tag = "Assignments",
    params(("id" = i64, Path, description = "Assignment ID")),
    responses((status = 200, body = ManageResponse), (status = 400), (status = 403))
)]
async fn post_manage(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
    Json(action): Json<ManageAction>,
) -> Result<Json<ManageResponse>> {
    let (found, course) = find_assignment(&state.db, id).await?;
    require_owner(auth.user(), &course)?;

    let locked = has_attempts(&state.db, found.id).await?;
    if locked && !action.allowed_when_locked(found.kind) {
        return Err(AppError::BadRequest(
            "Assignment is locked: attempts exist.".to_string(),
        ));
    }

    let updated = apply_action(&state.db, found, action, locked).await?;
    Ok(Json(manage_view(&state.db, updated).await?))
}

fn require_text(text: &str, max_chars: usize, message: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > max_chars {
        return Err(AppError::BadRequest(message.to_string()));
    }
    Ok(text.to_string())
}

async fn find_question(db: &DbConn, a: &assignment::Model, question_id: i64) -> Result<quiz_question::Model> {
    QuizQuestion::find_by_id(question_id)
        .filter(quiz_question::Column::AssignmentId.eq(a.id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found.".to_string()))
}

async fn find_choice(
    db: &DbConn,
    a: &assignment::Model,
    choice_id: i64,
) -> Result<(quiz_answer_choice::Model, quiz_question::Model)> {
    let (choice, question) = QuizAnswerChoice::find_by_id(choice_id)
        .find_also_related(QuizQuestion)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Answer option not found.".to_string()))?;
    match question {
        Some(q) if q.assignment_id == a.id => Ok((choice, q)),
        _ => Err(AppError::NotFound("Answer option not found.".to_string())),
    }
}

fn require_questions(a: &assignment::Model) -> Result<()> {
    if a.kind == AssignmentKind::Paper {
        return Err(AppError::BadRequest(
            "Paper assignments have no questions.".to_string(),
        ));
    }
    Ok(())
}

fn require_quiz(a: &assignment::Model) -> Result<()> {
    if a.kind != AssignmentKind::Quiz {
        return Err(AppError::BadRequest("Not a quiz assignment.".to_string()));
    }
    Ok(())
}

async fn apply_action(
    db: &DbConn,
    a: assignment::Model,
    action: ManageAction,
    locked: bool,
) -> Result<assignment::Model> {
    let now = Utc::now();

    match action {
        ManageAction::UpdateMeta(request) => {
            let used = most_attempts_by_one_student(db, a.id).await?;
            let (title, max_marks) = request.check(now, used)?;
            let mut active: assignment::ActiveModel = a.into();
            active.title = Set(title);
            active.instructions = Set(request.instructions);
            active.available_from = Set(request.available_from);
            active.deadline = Set(request.deadline);
            active.attempts_allowed = Set(request.attempts_allowed);
            if request.max_marks.is_some() {
                active.max_marks = Set(max_marks);
            }
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
        ManageAction::SetAvailableNow => {
            let mut active: assignment::ActiveModel = a.into();
            active.available_from = Set(Some(now));
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
        ManageAction::SetDeadlineDelta {
            deadline_delta: code,
            available_from,
        } => {
            let delta = deadline_delta(code.trim())
                .ok_or_else(|| AppError::BadRequest("Invalid deadline option.".to_string()))?;
            let base = available_from.or(a.available_from).unwrap_or(now);
            let mut active: assignment::ActiveModel = a.into();
            active.deadline = Set(Some(base + delta));
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
        ManageAction::UpdateQuestion { question_id, text } => {
            require_questions(&a)?;
            let text = require_text(&text, 10_000, "Question text is required.")?;
            let question = find_question(db, &a, question_id).await?;
            let mut active: quiz_question::ActiveModel = question.into();
            active.text = Set(text);
            active.update(db).await?;
            Ok(a)
        }
        ManageAction::AddQuestion { text } => {
            require_questions(&a)?;
            let text = require_text(&text, 10_000, "Question text is required.")?;
            let last = QuizQuestion::find()
                .filter(quiz_question::Column::AssignmentId.eq(a.id))
                .order_by_desc(quiz_question::Column::Order)
                .one(db)
                .await?
                .map_or(0, |q| q.order);
            quiz_question::ActiveModel {
                assignment_id: Set(a.id),
                order: Set(last + 1),
                text: Set(text),
                ..Default::default()
            }
            .insert(db)
            .await?;
            Ok(a)
        }
        ManageAction::DeleteQuestion { question_id } => {
            require_questions(&a)?;
            let question = find_question(db, &a, question_id).await?;
            question.delete(db).await?;
            Ok(a)
        }
        ManageAction::AddChoice {
            question_id,
            text,
            is_correct,
        } => {
            require_quiz(&a)?;
            let question = find_question(db, &a, question_id).await?;
            let text = require_text(&text, 500, "Answer text must be 1-500 characters.")?;

            let txn = db.begin().await?;
            let last = QuizAnswerChoice::find()
                .filter(quiz_answer_choice::Column::QuestionId.eq(question.id))
                .order_by_desc(quiz_answer_choice::Column::Order)
                .one(&txn)
                .await?
                .map_or(0, |c| c.order);
            let created = quiz_answer_choice::ActiveModel {
                question_id: Set(question.id),
                order: Set(last + 1),
                text: Set(text),
                is_correct: Set(is_correct),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            if is_correct {
                clear_other_correct(&txn, question.id, created.id).await?;
            }
            txn.commit().await?;
            Ok(a)
        }
        ManageAction::DeleteChoice { choice_id } => {
            require_quiz(&a)?;
            let (choice, question) = find_choice(db, &a, choice_id).await?;
            if a.is_published {
                let remaining = QuizAnswerChoice::find()
                    .filter(quiz_answer_choice::Column::QuestionId.eq(question.id))
                    .count(db)
                    .await?;
                if remaining <= 2 {
                    return Err(AppError::BadRequest(
                        "Cannot delete: a published question must have at least two choices."
                            .to_string(),
                    ));
                }
            }
            choice.delete(db).await?;
            Ok(a)
        }
        ManageAction::MarkCorrect { choice_id } => {
            require_quiz(&a)?;
            let (choice, question) = find_choice(db, &a, choice_id).await?;
            let txn = db.begin().await?;
            clear_other_correct(&txn, question.id, choice.id).await?;
            let mut active: quiz_answer_choice::ActiveModel = choice.into();
            active.is_correct = Set(true);
            active.update(&txn).await?;
            txn.commit().await?;
            Ok(a)
        }
        ManageAction::Publish => {
            if a.kind == AssignmentKind::Quiz {
                let questions = load_questions(db, a.id).await?;
                if !quiz_readiness(&questions).ready {
                    return Err(AppError::BadRequest(
                        "Quiz is not ready; fix issues before publishing.".to_string(),
                    ));
                }
            }
            let available_from = a.available_from.unwrap_or(now);
            let deadline = a
                .deadline
                .unwrap_or(available_from + chrono::Duration::days(DEFAULT_OPEN_DAYS));
            let mut active: assignment::ActiveModel = a.into();
            active.available_from = Set(Some(available_from));
            active.deadline = Set(Some(deadline));
            active.is_published = Set(true);
            active.updated_at = Set(now);
            let published = active.update(db).await?;
            tracing::info!(assignment_id = published.id, "Assignment published");
            Ok(published)
        }
        ManageAction::Unpublish => {
            if locked {
                return Err(AppError::BadRequest(
                    "Cannot unpublish: attempts exist.".to_string(),
                ));
            }
            let mut active: assignment::ActiveModel = a.into();
            active.is_published = Set(false);
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
    }
}

/// Keep a single correct answer per question
async fn clear_other_correct<C: ConnectionTrait>(db: &C, question_id: i64, keep: i64) -> Result<()> {
    QuizAnswerChoice::update_many()
        .col_expr(quiz_answer_choice::Column::IsCorrect, Expr::value(false))
        .filter(quiz_answer_choice::Column::QuestionId.eq(question_id))
        .filter(quiz_answer_choice::Column::Id.ne(keep))
        .exec(db)
        .await?;
    Ok(())
}

// ============================================================================
// Taking & Submitting
// ============================================================================

fn require_ready(a: &assignment::Model, questions: &[QuestionWithChoices]) -> Result<()> {
    if a.kind == AssignmentKind::Quiz && !quiz_readiness(questions).ready {
        return Err(AppError::BadRequest("Quiz is not ready.".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/assignments/{id}/take",
    tag = "Assignments",
    params(("id" = i64, Path, description = "Assignment ID")),
    responses((status = 200, body = TakeResponse), (status = 400), (status = 403))
)]
async fn take_assignment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<TakeResponse>> {
    let (found, course) = find_assignment(&state.db, id).await?;
    require_member(&state.db, auth.user(), &course, "Enrol to access this course.").await?;

    let used = attempts_used(&state.db, found.id, auth.user_id()).await?;
    if !is_owner(auth.user(), &course) {
        check_can_take(&found, used, Utc::now())?;
    }

    let questions = load_questions(&state.db, found.id).await?;
    require_ready(&found, &questions)?;

    Ok(Json(TakeResponse {
        questions: questions
            .iter()
            .map(|q| QuestionDto::from_loaded(q, false))
            .collect(),
        attempts_used: used,
        attempts_left: attempts_left(&found, used),
        assignment: found.into(),
    }))
}

#[utoipa::path(
    post,
    path = "/assignments/{id}/submit",
    tag = "Assignments",
    params(("id" = i64, Path, description = "Assignment ID")),
    responses((status = 201, body = SubmitResponse), (status = 400), (status = 403))
)]
async fn submit_assignment(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let (found, course) = find_assignment(&state.db, id).await?;
    if !is_enrolled(&state.db, course.id, auth.user_id()).await? {
        return Err(AppError::Forbidden(
            "Only enrolled students can submit.".to_string(),
        ));
    }

    let form = MultipartForm::read(multipart).await?;
    let now = Utc::now();
    let txn = state.db.begin().await?;

    let used = attempts_used(&txn, found.id, auth.user_id()).await?;
    check_can_take(&found, used, now)?;
    let questions = load_questions(&txn, found.id).await?;
    require_ready(&found, &questions)?;

    let mut created = attempt::ActiveModel {
        assignment_id: Set(found.id),
        student_id: Set(auth.user_id()),
        attempt_no: Set(used as i32 + 1),
        submitted_at: Set(now),
        score: Set(None),
        marks_awarded: Set(None),
        graded_by: Set(None),
        graded_at: Set(None),
        feedback_text: Set(String::new()),
        override_reason: Set(String::new()),
        released: Set(false),
        released_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(
            "Another submission for this assignment is in progress.".to_string(),
        ),
        _ => e.into(),
    })?;

    let mut stored_file: Option<String> = None;
    match found.kind {
        AssignmentKind::Quiz => {
            let selected = collect_choices(&form, &questions)?;
            let rows: Vec<student_answer::ActiveModel> = selected
                .iter()
                .map(|(&question_id, &choice_id)| student_answer::ActiveModel {
                    attempt_id: Set(created.id),
                    question_id: Set(question_id),
                    choice_id: Set(choice_id),
                    ..Default::default()
                })
                .collect();
            if !rows.is_empty() {
                StudentAnswer::insert_many(rows).exec(&txn).await?;
            }

            let result = grade_quiz(&questions, &selected);
            let mut active: attempt::ActiveModel = created.into();
            active.score = Set(Some(result.score));
            active.marks_awarded = Set(Some(marks_from_score(result.score, found.max_marks)));
            active.released = Set(true);
            active.released_at = Set(Some(now));
            created = active.update(&txn).await?;

            upsert_grade(&txn, &found, auth.user_id()).await?;
        }
        AssignmentKind::Paper => {
            let file = form
                .file("submission_file")
                .ok_or_else(|| AppError::BadRequest("Please upload a file.".to_string()))?;
            validate_paper(
                file.content_type.as_deref(),
                &file.file_name,
                file.size(),
                state.limits.max_upload_bytes,
            )?;
            let stored =
                store_file(state.media_root(), SUBMISSIONS_DIR, &file.file_name, &file.bytes).await?;
            let saved = student_file_submission::ActiveModel {
                attempt_id: Set(created.id),
                file: Set(stored.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await;
            discard_on_error(state.media_root(), &stored, saved).await?;
            stored_file = Some(stored);
        }
        AssignmentKind::Exam => {
            let mut rows = Vec::with_capacity(questions.len());
            for q in &questions {
                let text = form.text(&format!("text_{}", q.question.id));
                if text.is_empty() {
                    return Err(AppError::BadRequest("Please answer all questions.".to_string()));
                }
                rows.push(student_text_answer::ActiveModel {
                    attempt_id: Set(created.id),
                    question_id: Set(q.question.id),
                    text: Set(text.to_string()),
                    ..Default::default()
                });
            }
            if !rows.is_empty() {
                StudentTextAnswer::insert_many(rows).exec(&txn).await?;
            }
        }
    }

    let committed = txn.commit().await;
    match &stored_file {
        Some(stored) => discard_on_error(state.media_root(), stored, committed).await?,
        None => committed?,
    }
    tracing::info!(
        attempt_id = created.id,
        assignment_id = found.id,
        student_id = auth.user_id(),
        "Attempt submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            attempt_id: created.id,
            attempt_no: created.attempt_no,
            score: created.score,
            feedback_url: format!("/assignments/attempt/{}/feedback", created.id),
        }),
    ))
}

/// Read `answer_{question_id}` fields; every question must have a valid choice
pub fn collect_choices(
    form: &MultipartForm,
    questions: &[QuestionWithChoices],
) -> Result<HashMap<i64, i64>> {
    let mut selected = HashMap::with_capacity(questions.len());
    for q in questions {
        let raw = form.text(&format!("answer_{}", q.question.id));
        if raw.is_empty() {
            return Err(AppError::BadRequest("Please answer all questions.".to_string()));
        }
        let choice_id: i64 = raw
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid answer selection.".to_string()))?;
        if !q.has_choice(choice_id) {
            return Err(AppError::BadRequest("Invalid answer selection.".to_string()));
        }
        selected.insert(q.question.id, choice_id);
    }
    Ok(selected)
}

// ============================================================================
// Feedback & Marking
// ============================================================================

/// The submitting student or the course owner
fn can_view_attempt(user: &AuthenticatedUser, attempt: &attempt::Model, course: &course::Model) -> bool {
    attempt.student_id == user.id() || is_owner(user, course)
}

#[utoipa::path(
    get,
    path = "/assignments/attempt/{attempt_id}/feedback",
    tag = "Assignments",
    params(("attempt_id" = i64, Path, description = "Attempt ID")),
    responses((status = 200, body = AttemptFeedbackResponse), (status = 403), (status = 404))
)]
async fn attempt_feedback(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(attempt_id): Path<i64>,
) -> Result<Json<AttemptFeedbackResponse>> {
    let found = find_attempt(&state.db, attempt_id).await?;
    let (a, course) = find_assignment(&state.db, found.assignment_id).await?;
    if !can_view_attempt(auth.user(), &found, &course) {
        return Err(AppError::Forbidden("Not permitted.".to_string()));
    }
    let visible = found.released || is_owner(auth.user(), &course);

    let marking = visible.then(|| AttemptMarking {
        score: found.score,
        marks_awarded: found.marks_awarded,
        max_marks: a.max_marks,
        feedback_text: found.feedback_text.clone(),
        graded_at: found.graded_at,
        released_at: found.released_at,
    });

    let mut response = AttemptFeedbackResponse {
        attempt_id: found.id,
        attempt_no: found.attempt_no,
        student_id: found.student_id,
        submitted_at: found.submitted_at,
        released: found.released,
        assignment: a.clone().into(),
        marking,
        quiz: None,
        text_answers: vec![],
        file_url: None,
    };

    match a.kind {
        AssignmentKind::Quiz => {
            if visible {
                let questions = load_questions(&state.db, a.id).await?;
                let selected: HashMap<i64, i64> = found
                    .find_related(StudentAnswer)
                    .all(&state.db)
                    .await?
                    .into_iter()
                    .map(|sa| (sa.question_id, sa.choice_id))
                    .collect();
                response.quiz = Some(grade_quiz(&questions, &selected));
            }
        }
        AssignmentKind::Paper => {
            let has_file = found
                .find_related(StudentFileSubmission)
                .one(&state.db)
                .await?
                .is_some();
            if has_file {
                response.file_url = Some(format!("/assignments/attempt/{}/file", found.id));
            }
        }
        AssignmentKind::Exam => {
            let questions: HashMap<i64, String> = QuizQuestion::find()
                .filter(quiz_question::Column::AssignmentId.eq(a.id))
                .all(&state.db)
                .await?
                .into_iter()
                .map(|q| (q.id, q.text))
                .collect();
            response.text_answers = found
                .find_related(StudentTextAnswer)
                .order_by_asc(student_text_answer::Column::Id)
                .all(&state.db)
                .await?
                .into_iter()
                .map(|ta| TextAnswerDto {
                    question: questions.get(&ta.question_id).cloned().unwrap_or_default(),
                    question_id: ta.question_id,
                    text: ta.text,
                })
                .collect();
        }
    }

    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/assignments/attempt/{attempt_id}/file",
    tag = "Assignments",
    params(("attempt_id" = i64, Path, description = "Attempt ID")),
    responses((status = 200, description = "Submitted file"), (status = 403), (status = 404))
)]
async fn attempt_file(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(attempt_id): Path<i64>,
) -> Result<Response> {
    let found = find_attempt(&state.db, attempt_id).await?;
    let (_, course) = find_assignment(&state.db, found.assignment_id).await?;
    if !can_view_attempt(auth.user(), &found, &course) {
        return Err(AppError::Forbidden("Not permitted.".to_string()));
    }

    let submission = found
        .find_related(StudentFileSubmission)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No file was submitted.".to_string()))?;
    let mime = crate::services::uploads::guess_mime(&submission.file).unwrap_or("application/octet-stream");
    stream_stored_file(state.media_root(), &submission.file, mime).await
}

#[utoipa::path(
    get,
    path = "/assignments/{id}/attempts",
    tag = "Assignments",
    params(("id" = i64, Path, description = "Assignment ID")),
    responses((status = 200, body = AttemptListResponse), (status = 403))
)]
async fn list_attempts(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<AttemptListResponse>> {
    let (found, course) = find_assignment(&state.db, id).await?;
    require_owner(auth.user(), &course)?;

    let rows = Attempt::find()
        .filter(attempt::Column::AssignmentId.eq(found.id))
        .find_also_related(User)
        .order_by_desc(attempt::Column::SubmittedAt)
        .order_by_desc(attempt::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(AttemptListResponse {
        assignment: found.into(),
        attempts: rows
            .into_iter()
            .map(|(a, u)| AttemptSummary::new(a, u.map(|u| u.username).unwrap_or_default()))
            .collect(),
    }))
}

/// Validate a manual mark against the assignment and any automatic score
pub fn check_manual_mark(
    a: &assignment::Model,
    current: &attempt::Model,
    request: &GradeAttemptRequest,
) -> Result<()> {
    if !request.marks_awarded.is_finite()
        || request.marks_awarded < 0.0
        || request.marks_awarded > a.max_marks
    {
        return Err(AppError::BadRequest(format!(
            "Marks must be between 0 and {}.",
            a.max_marks
        )));
    }
    let auto_marks = (a.kind == AssignmentKind::Quiz)
        .then_some(current.score)
        .flatten()
        .map(|score| marks_from_score(score, a.max_marks));
    let changed = auto_marks.is_some_and(|m| (m - request.marks_awarded).abs() > f64::EPSILON);
    let has_reason = request
        .override_reason
        .as_deref()
        .is_some_and(|r| !r.trim().is_empty());
    if changed && !has_reason {
        return Err(AppError::BadRequest(
            "An override reason is required when changing an automatic quiz score.".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/assignments/attempt/{attempt_id}/grade",
    tag = "Assignments",
    params(("attempt_id" = i64, Path, description = "Attempt ID")),
    request_body = GradeAttemptRequest,
    responses((status = 200, body = GradeAttemptResponse), (status = 400), (status = 403))
)]
async fn grade_attempt(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(attempt_id): Path<i64>,
    Json(request): Json<GradeAttemptRequest>,
) -> Result<Json<GradeAttemptResponse>> {
    let found = find_attempt(&state.db, attempt_id).await?;
    let (a, course) = find_assignment(&state.db, found.assignment_id).await?;
    require_owner(auth.user(), &course)?;
    check_manual_mark(&a, &found, &request)?;

    let now = Utc::now();
    let student_id = found.student_id;
    let already_released = found.released_at;

    let txn = state.db.begin().await?;
    let mut active: attempt::ActiveModel = found.into();
    active.marks_awarded = Set(Some(request.marks_awarded));
    active.feedback_text = Set(request.feedback_text.trim().to_string());
    if let Some(reason) = request.override_reason.as_deref().map(str::trim) {
        if !reason.is_empty() {
            active.override_reason = Set(reason.to_string());
        }
    }
    active.graded_by = Set(Some(auth.user_id()));
    active.graded_at = Set(Some(now));
    if request.release {
        active.released = Set(true);
        active.released_at = Set(Some(already_released.unwrap_or(now)));
    }
    let updated = active.update(&txn).await?;
    let stored = upsert_grade(&txn, &a, student_id).await?;
    txn.commit().await?;

    tracing::info!(
        attempt_id = updated.id,
        graded_by = auth.user_id(),
        released = updated.released,
        "Attempt graded"
    );

    Ok(Json(GradeAttemptResponse {
        attempt_id: updated.id,
        marks_awarded: request.marks_awarded,
        released: updated.released,
        grade: stored.map(Into::into),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn assignment(kind: AssignmentKind) -> assignment::Model {
        let now = Utc::now();
        assignment::Model {
            id: 1,
            course_id: 1,
            kind,
            title: "Week 1".to_string(),
            instructions: String::new(),
            available_from: None,
            deadline: None,
            max_marks: 20.0,
            attempts_allowed: 2,
            is_published: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn attempt_with_score(score: Option<f64>) -> attempt::Model {
        attempt::Model {
            id: 1,
            assignment_id: 1,
            student_id: 2,
            attempt_no: 1,
            submitted_at: Utc::now(),
            score,
            marks_awarded: score.map(|s| s / 5.0),
            graded_by: None,
            graded_at: None,
            feedback_text: String::new(),
            override_reason: String::new(),
            released: true,
            released_at: None,
        }
    }

    fn mark(marks: f64, reason: Option<&str>) -> GradeAttemptRequest {
        GradeAttemptRequest {
            marks_awarded: marks,
            feedback_text: String::new(),
            override_reason: reason.map(str::to_string),
            release: true,
        }
    }

    #[test]
    fn test_take_checks_run_in_order() {
        let now = Utc::now();
        let mut a = assignment(AssignmentKind::Paper);
        a.is_published = false;
        a.deadline = Some(now - Duration::hours(1));
        let err = check_can_take(&a, 0, now).unwrap_err();
        assert!(err.to_string().contains("not published"));

        a.is_published = true;
        a.available_from = Some(now + Duration::hours(1));
        let err = check_can_take(&a, 0, now).unwrap_err();
        assert!(err.to_string().contains("not available yet"));

        a.available_from = None;
        let err = check_can_take(&a, 0, now).unwrap_err();
        assert!(err.to_string().contains("Deadline has passed."));

        a.deadline = None;
        let err = check_can_take(&a, 2, now).unwrap_err();
        assert!(err.to_string().contains("No attempts left."));
        assert!(check_can_take(&a, 1, now).is_ok());
    }

    #[test]
    fn test_deadline_is_exclusive() {
        let now = Utc::now();
        let mut a = assignment(AssignmentKind::Exam);
        a.deadline = Some(now);
        assert!(check_can_take(&a, 0, now).is_err());
    }

    #[test]
    fn test_attempts_left_saturates() {
        let a = assignment(AssignmentKind::Quiz);
        assert_eq!(attempts_left(&a, 0), 2);
        assert_eq!(attempts_left(&a, 5), 0);
    }

    #[test]
    fn test_manual_mark_bounds() {
        let a = assignment(AssignmentKind::Paper);
        let current = attempt_with_score(None);
        assert!(check_manual_mark(&a, &current, &mark(-1.0, None)).is_err());
        assert!(check_manual_mark(&a, &current, &mark(20.5, None)).is_err());
        assert!(check_manual_mark(&a, &current, &mark(20.0, None)).is_ok());
    }

    #[test]
    fn test_quiz_override_needs_reason() {
        let a = assignment(AssignmentKind::Quiz);
        let current = attempt_with_score(Some(50.0));

        // 50% of 20 marks is 10
        assert!(check_manual_mark(&a, &current, &mark(10.0, None)).is_ok());
        let err = check_manual_mark(&a, &current, &mark(12.0, None)).unwrap_err();
        assert!(err.to_string().contains("override reason"));
        assert!(check_manual_mark(&a, &current, &mark(12.0, Some("  "))).is_err());
        assert!(check_manual_mark(&a, &current, &mark(12.0, Some("Ambiguous question"))).is_ok());
    }
}
