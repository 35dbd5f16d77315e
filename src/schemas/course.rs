use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::material::MaterialResponse;
use super::user::UserSummary;
use crate::models::{course, feedback};

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters."))]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CourseResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub owner: UserSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseResponse {
    pub fn new(course: course::Model, owner: UserSummary) -> Self {
        Self {
            id: course.id,
            title: course.title,
            description: course.description,
            owner,
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }
}

/// Catalogue entry with the caller's enrolment state
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CourseListItem {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub enrolled: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct RosterEntry {
    pub enrolment_id: i64,
    pub student_id: i64,
    pub username: String,
    pub email: String,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CourseDetailResponse {
    pub course: CourseResponse,
    pub is_owner: bool,
    pub is_enrolled: bool,
    pub materials: Vec<MaterialResponse>,
    pub feedback: Vec<FeedbackResponse>,
    /// Present for the course owner only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roster: Option<Vec<RosterEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_feedback: Option<FeedbackResponse>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct AddStudentRequest {
    /// Exact username or e-mail
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct EnrolmentResult {
    pub course_id: i64,
    pub student_id: i64,
    /// False when the student was already enrolled
    pub created: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct FeedbackRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    pub rating: i16,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters."))]
    pub comment: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct FeedbackResponse {
    pub id: i64,
    pub course_id: i64,
    /// Hidden when the feedback is anonymous
    pub student: Option<String>,
    pub rating: i16,
    pub comment: String,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl FeedbackResponse {
    pub fn new(feedback: feedback::Model, username: Option<String>) -> Self {
        Self {
            id: feedback.id,
            course_id: feedback.course_id,
            student: if feedback.anonymous { None } else { username },
            rating: feedback.rating,
            comment: feedback.comment,
            anonymous: feedback.anonymous,
            created_at: feedback.created_at,
        }
    }
}
