use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::notification::{self, NotificationKind};
use crate::models::status;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct NotificationDto {
    pub id: i64,
    pub kind: NotificationKind,
    pub course_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<notification::Model> for NotificationDto {
    fn from(n: notification::Model) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            course_id: n.course_id,
            actor_id: n.actor_id,
            message: n.message,
            read: n.read,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct InboxResponse {
    pub notifications: Vec<NotificationDto>,
    pub total: u64,
    pub unread: u64,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct InboxQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct RecentQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct RecentNotification {
    pub id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct RecentResponse {
    pub unread: u64,
    pub results: Vec<RecentNotification>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct StatusRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct StatusResponse {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<status::Model> for StatusResponse {
    fn from(s: status::Model) -> Self {
        Self {
            id: s.id,
            text: s.text,
            created_at: s.created_at,
        }
    }
}

/// Chat history line
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ChatHistoryEntry {
    pub sender: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ChatHistoryResponse {
    pub results: Vec<ChatHistoryEntry>,
}
