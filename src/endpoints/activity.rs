use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};

use crate::error::{AppError, Result};
use crate::middleware::permissions::{Authenticated, Authorized, StudentOnly};
use crate::models::status;
use crate::schemas::{
    InboxQuery, InboxResponse, NotificationDto, RecentNotification, RecentQuery, RecentResponse,
    StatusRequest, StatusResponse,
};
use crate::state::AppState;

pub const MAX_STATUS_CHARS: usize = 280;

pub fn activity_routes(state: AppState) -> Router {
    Router::new()
        .route("/notifications", get(get_inbox))
        .route("/notifications/recent", get(get_recent))
        .route("/notifications/{id}/read", post(mark_as_read))
        .route("/notifications/read-all", post(mark_all_as_read))
        .route("/status", post(post_status))
        .with_state(state)
}

/// Trimmed status text, rejecting blank or overlong updates
pub fn validate_status(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() || text.chars().count() > MAX_STATUS_CHARS {
        return Err(AppError::BadRequest("Invalid status update.".to_string()));
    }
    Ok(text.to_string())
}

pub async fn create_status<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    text: &str,
) -> Result<status::Model> {
    let text = validate_status(text)?;
    let created = status::ActiveModel {
        user_id: Set(user_id),
        text: Set(text),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(created)
}

// ============================================================================
// Notifications
// ============================================================================

#[utoipa::path(
    get,
    path = "/activity/notifications",
    tag = "Activity",
    params(
        ("limit" = Option<u64>, Query, description = "Number of notifications to return"),
        ("offset" = Option<u64>, Query, description = "Offset for pagination"),
    ),
    responses(
        (status = 200, body = InboxResponse)
    )
)]
async fn get_inbox(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<InboxQuery>,
) -> Result<Json<InboxResponse>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0);

    let notifications = state
        .notification
        .get_user_notifications(auth.user_id(), limit, offset)
        .await?;
    let total = state.notification.get_total_count(auth.user_id()).await?;
    let unread = state.notification.get_unread_count(auth.user_id()).await?;

    Ok(Json(InboxResponse {
        notifications: notifications.into_iter().map(NotificationDto::from).collect(),
        total,
        unread,
    }))
}

#[utoipa::path(
    get,
    path = "/activity/notifications/recent",
    tag = "Activity",
    params(("limit" = Option<u64>, Query, description = "Number of notifications to return")),
    responses(
        (status = 200, body = RecentResponse)
    )
)]
async fn get_recent(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>> {
    let limit = query.limit.unwrap_or(10).clamp(1, 50);
    let unread = state.notification.get_unread_count(auth.user_id()).await?;
    let results = state
        .notification
        .get_user_notifications(auth.user_id(), limit, 0)
        .await?
        .into_iter()
        .map(|n| RecentNotification {
            id: n.id,
            message: n.message,
            created_at: n.created_at,
            read: n.read,
        })
        .collect();

    Ok(Json(RecentResponse { unread, results }))
}

#[utoipa::path(
    post,
    path = "/activity/notifications/{id}/read",
    tag = "Activity",
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 404)
    )
)]
async fn mark_as_read(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    state.notification.mark_as_read(id, auth.user_id()).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[utoipa::path(
    post,
    path = "/activity/notifications/read-all",
    tag = "Activity",
    responses(
        (status = 200, body = serde_json::Value)
    )
)]
async fn mark_all_as_read(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<serde_json::Value>> {
    let updated = state.notification.mark_all_as_read(auth.user_id()).await?;
    tracing::debug!(user_id = auth.user_id(), updated, "Notifications marked read");
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// Status Updates
// ============================================================================

#[utoipa::path(
    post,
    path = "/activity/status",
    tag = "Activity",
    request_body = StatusRequest,
    responses(
        (status = 201, body = StatusResponse),
        (status = 400, description = "Blank or too long"),
        (status = 403, description = "Students only")
    )
)]
async fn post_status(
    State(state): State<AppState>,
    auth: Authorized<StudentOnly>,
    Json(request): Json<StatusRequest>,
) -> Result<(StatusCode, Json<StatusResponse>)> {
    let created = create_status(&state.db, auth.user_id(), &request.text).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}
