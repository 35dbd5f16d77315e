//! Session authentication middleware
//!
//! Accepts the `courpera_session` cookie or an `Authorization: Bearer` header.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{EntityTrait, QueryFilter, ColumnTrait};

use crate::models::user;
use crate::models::user_profile::{self, Role};
use crate::services::accounts::ensure_profile;
use crate::services::security::decode_session_token;
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "courpera_session";

/// Authenticated user stored in request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user: user::Model,
    pub profile: user_profile::Model,
}

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn is_teacher(&self) -> bool {
        self.profile.role == Role::Teacher
    }

    pub fn is_student(&self) -> bool {
        self.profile.role == Role::Student
    }
}

/// Auth middleware for protected routes. Returns 401 without a valid session.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match extract_session_token(req.headers()) {
        Some(t) => t,
        None => return unauthorized_response("Authentication required"),
    };

    let auth_user = match resolve_user(&state, &token).await {
        Ok(u) => u,
        Err(msg) => return unauthorized_response(&msg),
    };

    req.extensions_mut().insert(auth_user);
    next.run(req).await
}

/// Attach the user when a valid session is present, otherwise pass the request through
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Some(token) = extract_session_token(req.headers()) {
        match resolve_user(&state, &token).await {
            Ok(auth_user) => {
                req.extensions_mut().insert(auth_user);
            }
            Err(msg) => tracing::debug!("Ignoring invalid session: {}", msg),
        }
    }
    next.run(req).await
}

/// Session token from the Bearer header, falling back to the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    let cookie_str = headers.get(header::COOKIE)?.to_str().ok()?;
    let prefix = format!("{}=", SESSION_COOKIE_NAME);
    cookie_str
        .split(';')
        .map(str::trim)
        .find_map(|c| c.strip_prefix(prefix.as_str()))
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Validate a token and load the active user with their profile
async fn resolve_user(state: &AppState, token: &str) -> Result<AuthenticatedUser, String> {
    let claims = decode_session_token(token).map_err(|_| "Invalid or expired session".to_string())?;

    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| "Invalid session subject".to_string())?;

    let found_user = user::Entity::find_by_id(user_id)
        .filter(user::Column::IsActive.eq(true))
        .one(&state.db)
        .await
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| "User not found or inactive".to_string())?;

    let profile = ensure_profile(&state.db, found_user.id)
        .await
        .map_err(|e| format!("Profile error: {}", e))?;

    Ok(AuthenticatedUser {
        user: found_user,
        profile,
    })
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "detail": message
        })),
    )
        .into_response()
}
