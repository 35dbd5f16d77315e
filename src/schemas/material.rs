use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::material;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct MaterialResponse {
    pub id: i64,
    pub course: i64,
    pub title: String,
    pub size_bytes: i64,
    pub mime: String,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub file_url: String,
}

impl From<material::Model> for MaterialResponse {
    fn from(m: material::Model) -> Self {
        Self {
            file_url: format!("/materials/{}/download", m.id),
            id: m.id,
            course: m.course_id,
            title: m.title,
            size_bytes: m.size_bytes,
            mime: m.mime,
            uploaded_by: m.uploaded_by,
            created_at: m.created_at,
        }
    }
}
