//! Payloads of the versioned REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserSummary;
use crate::models::{enrolment, feedback};

/// Filters shared by the list endpoints; each endpoint reads the ones it supports
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct ListFilter {
    pub search: Option<String>,
    pub course: Option<i64>,
    /// Field name, prefixed with `-` for descending order
    pub ordering: Option<String>,
}

impl ListFilter {
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Resolve `ordering` against the allowed fields, returning the field and
    /// whether it is descending
    pub fn ordering<'a>(&'a self, allowed: &[&str]) -> Option<(&'a str, bool)> {
        let raw = self.ordering.as_deref()?.trim();
        let (field, desc) = match raw.strip_prefix('-') {
            Some(field) => (field, true),
            None => (raw, false),
        };
        allowed.contains(&field).then_some((field, desc))
    }

    /// Filters to repeat in pagination links
    pub fn link_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(search) = self.search_term() {
            params.push(("search", search.to_string()));
        }
        if let Some(course) = self.course {
            params.push(("course", course.to_string()));
        }
        if let Some(ordering) = &self.ordering {
            params.push(("ordering", ordering.clone()));
        }
        params
    }
}

/// Partial course update; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct EnrolmentDto {
    pub id: i64,
    pub course: i64,
    pub student: Option<UserSummary>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl EnrolmentDto {
    pub fn new(e: enrolment::Model, student: Option<UserSummary>) -> Self {
        Self {
            id: e.id,
            course: e.course_id,
            student,
            completed: e.completed,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateEnrolmentRequest {
    pub course: i64,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ApiFeedback {
    pub id: i64,
    pub course: i64,
    /// Hidden when the feedback is anonymous
    pub student: Option<i64>,
    pub rating: i16,
    pub comment: String,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl From<feedback::Model> for ApiFeedback {
    fn from(f: feedback::Model) -> Self {
        Self {
            id: f.id,
            course: f.course_id,
            student: (!f.anonymous).then_some(f.student_id),
            rating: f.rating,
            comment: f.comment,
            anonymous: f.anonymous,
            created_at: f.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateFeedbackRequest {
    pub course: i64,
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(ordering: Option<&str>) -> ListFilter {
        ListFilter {
            ordering: ordering.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_ordering_allows_known_fields_only() {
        let allowed = ["title", "created_at"];
        assert_eq!(filter(Some("title")).ordering(&allowed), Some(("title", false)));
        assert_eq!(
            filter(Some("-created_at")).ordering(&allowed),
            Some(("created_at", true))
        );
        assert_eq!(filter(Some("password")).ordering(&allowed), None);
        assert_eq!(filter(None).ordering(&allowed), None);
    }

    #[test]
    fn test_link_params_skip_blank_search() {
        let f = ListFilter {
            search: Some("  ".to_string()),
            course: Some(3),
            ordering: None,
        };
        assert_eq!(f.link_params(), vec![("course", "3".to_string())]);
    }
}
