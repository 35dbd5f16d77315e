use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::assignment::{self, AssignmentKind};
use crate::models::attempt;
use crate::services::grading::{QuestionWithChoices, QuizResult, Readiness};

fn default_attempts() -> i32 {
    1
}

/// Check the scheduling fields shared by create and `update_meta`
pub fn validate_schedule(
    available_from: Option<DateTime<Utc>>,
    deadline: Option<DateTime<Utc>>,
    attempts_allowed: i32,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(deadline) = deadline {
        if deadline <= now {
            return Err(AppError::BadRequest("Deadline must be in the future.".to_string()));
        }
        if let Some(from) = available_from {
            if from >= deadline {
                return Err(AppError::BadRequest(
                    "Availability must be before the deadline.".to_string(),
                ));
            }
        }
    }
    if attempts_allowed < 1 {
        return Err(AppError::BadRequest("Attempts must be at least 1.".to_string()));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(AppError::BadRequest("Title must be 1-200 characters.".to_string()));
    }
    Ok(title.to_string())
}

fn validate_max_marks(max_marks: Option<f64>) -> Result<f64> {
    match max_marks {
        None => Ok(100.0),
        Some(m) if m.is_finite() && m > 0.0 => Ok(m),
        Some(_) => Err(AppError::BadRequest("Maximum marks must be positive.".to_string())),
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateAssignmentRequest {
    #[serde(rename = "type")]
    pub kind: AssignmentKind,
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_attempts")]
    pub attempts_allowed: i32,
    #[serde(default)]
    pub max_marks: Option<f64>,
}

impl CreateAssignmentRequest {
    /// Returns the cleaned title and max marks
    pub fn check(&self, now: DateTime<Utc>) -> Result<(String, f64)> {
        let title = validate_title(&self.title)?;
        validate_schedule(self.available_from, self.deadline, self.attempts_allowed, now)?;
        Ok((title, validate_max_marks(self.max_marks)?))
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct AssignmentMetaRequest {
    pub title: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_attempts")]
    pub attempts_allowed: i32,
    #[serde(default)]
    pub max_marks: Option<f64>,
}

impl AssignmentMetaRequest {
    pub fn check(&self, now: DateTime<Utc>, attempts_used: u64) -> Result<(String, f64)> {
        let title = validate_title(&self.title)?;
        validate_schedule(self.available_from, self.deadline, self.attempts_allowed, now)?;
        if (self.attempts_allowed as u64) < attempts_used {
            return Err(AppError::BadRequest(format!(
                "Cannot set attempts below attempts already used ({}).",
                attempts_used
            )));
        }
        Ok((title, validate_max_marks(self.max_marks)?))
    }
}

/// Actions posted to the manage endpoint, tagged by `action`
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageAction {
    UpdateMeta(AssignmentMetaRequest),
    SetAvailableNow,
    SetDeadlineDelta {
        deadline_delta: String,
        #[serde(default)]
        available_from: Option<DateTime<Utc>>,
    },
    UpdateQuestion {
        question_id: i64,
        text: String,
    },
    AddQuestion {
        text: String,
    },
    DeleteQuestion {
        question_id: i64,
    },
    AddChoice {
        question_id: i64,
        text: String,
        #[serde(default)]
        is_correct: bool,
    },
    DeleteChoice {
        choice_id: i64,
    },
    MarkCorrect {
        choice_id: i64,
    },
    Publish,
    Unpublish,
}

impl ManageAction {
    /// Actions that stay open once attempts exist. `unpublish` passes so it can
    /// report its own error.
    pub fn allowed_when_locked(&self, kind: AssignmentKind) -> bool {
        match self {
            ManageAction::UpdateMeta(_)
            | ManageAction::SetAvailableNow
            | ManageAction::SetDeadlineDelta { .. }
            | ManageAction::Unpublish => true,
            ManageAction::UpdateQuestion { .. } => kind == AssignmentKind::Quiz,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AssignmentResponse {
    pub id: i64,
    pub course_id: i64,
    #[serde(rename = "type")]
    pub kind: AssignmentKind,
    pub title: String,
    pub instructions: String,
    pub available_from: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub max_marks: f64,
    pub attempts_allowed: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<assignment::Model> for AssignmentResponse {
    fn from(a: assignment::Model) -> Self {
        Self {
            id: a.id,
            course_id: a.course_id,
            kind: a.kind,
            title: a.title,
            instructions: a.instructions,
            available_from: a.available_from,
            deadline: a.deadline,
            max_marks: a.max_marks,
            attempts_allowed: a.attempts_allowed,
            is_published: a.is_published,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// Course listing entry with availability and, for students, attempt counts
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AssignmentSummary {
    #[serde(flatten)]
    pub assignment: AssignmentResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Readiness>,
    pub available: bool,
    pub time_left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_left: Option<u64>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CourseAssignmentsResponse {
    pub course_id: i64,
    pub owner_view: bool,
    pub assignments: Vec<AssignmentSummary>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ChoiceDto {
    pub id: i64,
    pub order: i32,
    pub text: String,
    /// Only revealed to the course owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QuestionDto {
    pub id: i64,
    pub order: i32,
    pub text: String,
    pub choices: Vec<ChoiceDto>,
}

impl QuestionDto {
    pub fn from_loaded(q: &QuestionWithChoices, reveal_answers: bool) -> Self {
        Self {
            id: q.question.id,
            order: q.question.order,
            text: q.question.text.clone(),
            choices: q
                .choices
                .iter()
                .map(|c| ChoiceDto {
                    id: c.id,
                    order: c.order,
                    text: c.text.clone(),
                    is_correct: reveal_answers.then_some(c.is_correct),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ManageResponse {
    pub assignment: AssignmentResponse,
    pub questions: Vec<QuestionDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Readiness>,
    /// True once any attempt exists
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TakeResponse {
    pub assignment: AssignmentResponse,
    pub questions: Vec<QuestionDto>,
    pub attempts_used: u64,
    pub attempts_left: u64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    pub attempt_id: i64,
    pub attempt_no: i32,
    pub score: Option<f64>,
    pub feedback_url: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AttemptSummary {
    pub id: i64,
    pub student_id: i64,
    pub student: String,
    pub attempt_no: i32,
    pub submitted_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub marks_awarded: Option<f64>,
    pub graded_at: Option<DateTime<Utc>>,
    pub released: bool,
}

impl AttemptSummary {
    pub fn new(a: attempt::Model, student: String) -> Self {
        Self {
            id: a.id,
            student_id: a.student_id,
            student,
            attempt_no: a.attempt_no,
            submitted_at: a.submitted_at,
            score: a.score,
            marks_awarded: a.marks_awarded,
            graded_at: a.graded_at,
            released: a.released,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AttemptListResponse {
    pub assignment: AssignmentResponse,
    pub attempts: Vec<AttemptSummary>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TextAnswerDto {
    pub question_id: i64,
    pub question: String,
    pub text: String,
}

/// Marking fields of an attempt; hidden from the student until release
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AttemptMarking {
    pub score: Option<f64>,
    pub marks_awarded: Option<f64>,
    pub max_marks: f64,
    pub feedback_text: String,
    pub graded_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AttemptFeedbackResponse {
    pub attempt_id: i64,
    pub attempt_no: i32,
    pub student_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub released: bool,
    pub assignment: AssignmentResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marking: Option<AttemptMarking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_answers: Vec<TextAnswerDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct GradeAttemptRequest {
    pub marks_awarded: f64,
    #[serde(default)]
    pub feedback_text: String,
    #[serde(default)]
    pub override_reason: Option<String>,
    #[serde(default)]
    pub release: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct GradeResponse {
    pub assignment_id: i64,
    pub course_id: i64,
    pub student_id: i64,
    pub attempt_id: Option<i64>,
    pub achieved_marks: f64,
    pub max_marks: f64,
    pub released_at: Option<DateTime<Utc>>,
}

impl From<crate::models::grade::Model> for GradeResponse {
    fn from(g: crate::models::grade::Model) -> Self {
        Self {
            assignment_id: g.assignment_id,
            course_id: g.course_id,
            student_id: g.student_id,
            attempt_id: g.attempt_id,
            achieved_marks: g.achieved_marks,
            max_marks: g.max_marks,
            released_at: g.released_at,
        }
    }
}

/// Result of marking an attempt
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct GradeAttemptResponse {
    pub attempt_id: i64,
    pub marks_awarded: f64,
    pub released: bool,
    pub grade: Option<GradeResponse>,
}

/// One released grade on the student's grades page
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct StudentGradeEntry {
    pub assignment_id: i64,
    pub assignment: String,
    pub achieved_marks: f64,
    pub max_marks: f64,
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CourseGrades {
    pub course_id: i64,
    pub course: String,
    pub grades: Vec<StudentGradeEntry>,
    /// Sum of achieved over sum of max marks, as a percentage
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct StudentGradesResponse {
    pub courses: Vec<CourseGrades>,
}
