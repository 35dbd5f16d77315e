use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use tracing::debug;

use crate::endpoints::extractors::{find_course, is_member};
use crate::error::{AppError, Result};
use crate::middleware::permissions::Authenticated;
use crate::middleware::AuthenticatedUser;
use crate::models::chat_message;
use crate::models::prelude::*;
use crate::schemas::{ChatHistoryEntry, ChatHistoryResponse};
use crate::services::chat::{
    next_frame, parse_incoming, room_name, truncate_message, ChatEvent, MessageRateLimiter,
};
use crate::state::AppState;

/// Close code for sockets that may not join the room
pub const CLOSE_NOT_PERMITTED: u16 = 4001;
const HISTORY_LIMIT: u64 = 50;

pub fn messaging_routes(state: AppState) -> Router {
    Router::new()
        .route("/course/{course_id}/history", get(chat_history))
        .with_state(state)
}

pub fn chat_socket_routes(state: AppState) -> Router {
    Router::new()
        .route("/course/{course_id}", get(ws_handler))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/messaging/course/{course_id}/history",
    tag = "Messaging",
    params(("course_id" = i64, Path, description = "Course ID")),
    responses(
        (status = 200, body = ChatHistoryResponse),
        (status = 403, description = "Not a member of the course")
    )
)]
async fn chat_history(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(course_id): Path<i64>,
) -> Result<Json<ChatHistoryResponse>> {
    let course = find_course(&state.db, course_id).await?;
    if !is_member(&state.db, auth.user(), &course).await? {
        return Err(AppError::Forbidden("Not permitted".to_string()));
    }

    let mut rows = ChatMessage::find()
        .filter(chat_message::Column::Room.eq(room_name(course.id)))
        .find_also_related(User)
        .order_by_desc(chat_message::Column::CreatedAt)
        .order_by_desc(chat_message::Column::Id)
        .limit(HISTORY_LIMIT)
        .all(&state.db)
        .await?;
    rows.reverse();

    let results = rows
        .into_iter()
        .map(|(m, sender)| ChatHistoryEntry {
            sender: sender.map(|u| u.username).unwrap_or_default(),
            message: m.text,
            created_at: m.created_at,
        })
        .collect();

    Ok(Json(ChatHistoryResponse { results }))
}

// ============================================================================
// WebSocket Handler
// ============================================================================

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    auth: Authenticated,
    Path(course_id): Path<i64>,
) -> impl IntoResponse {
    debug!(user_id = auth.user_id(), course_id, "Chat upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth.0, course_id))
}

async fn may_join(state: &AppState, user: &AuthenticatedUser, course_id: i64) -> bool {
    match find_course(&state.db, course_id).await {
        Ok(course) => is_member(&state.db, user, &course).await.unwrap_or(false),
        Err(_) => false,
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user: AuthenticatedUser, course_id: i64) {
    if !may_join(&state, &user, course_id).await {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_NOT_PERMITTED,
                reason: "Not permitted".into(),
            })))
            .await;
        return;
    }

    let room = room_name(course_id);
    let mut rx = state.chat.subscribe(&room).await;
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(user_id = user.id(), room = %room, "Chat client connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = next_frame(&mut rx).await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_room = room.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut limiter = MessageRateLimiter::new();
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(frame)) => {
                    let Some(text) = parse_incoming(frame.as_str()) else {
                        continue;
                    };
                    if !limiter.allow() {
                        debug!(user_id = user.id(), "Chat message dropped by rate limit");
                        continue;
                    }
                    if let Err(e) = relay_message(&recv_state, &recv_room, course_id, &user, &text).await {
                        tracing::warn!(user_id = user.id(), "Chat message not delivered: {}", e);
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Chat client requested close");
                    break;
                }
                Err(e) => {
                    debug!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    // The receiver must be dropped before the room can be released
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        },
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        },
    }

    state.chat.release(&room).await;
    tracing::info!(room = %room, "Chat client disconnected");
}

/// Store the message, then fan it out to the room
async fn relay_message(
    state: &AppState,
    room: &str,
    course_id: i64,
    user: &AuthenticatedUser,
    text: &str,
) -> Result<()> {
    let text = truncate_message(text);
    chat_message::ActiveModel {
        room: Set(room.to_string()),
        course_id: Set(Some(course_id)),
        sender_id: Set(user.id()),
        text: Set(text.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    let frame = serde_json::to_string(&ChatEvent::message(user.username(), &text))?;
    state.chat.publish(room, frame).await;
    Ok(())
}
