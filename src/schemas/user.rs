use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::user;
use crate::models::user_profile::{self, Role};

fn default_role() -> Role {
    Role::Student
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters."))]
    pub username: String,
    #[validate(email(message = "Enter a valid e-mail address."))]
    pub email: String,
    pub password: String,
    pub password2: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    #[validate(length(max = 100, message = "Secret word is too long."))]
    pub secret_word: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// Username or e-mail
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ForgotPasswordRequest {
    pub username: String,
    pub secret_word: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 200, message = "Full name is too long."))]
    pub full_name: Option<String>,
    #[validate(length(max = 50, message = "Phone number is too long."))]
    pub phone: Option<String>,
    #[validate(length(max = 50, message = "Student number is too long."))]
    pub student_number: Option<String>,
    pub role: Option<Role>,
    #[validate(length(max = 16, message = "Instructor ID must be at most 16 characters."))]
    pub instructor_id: Option<String>,
    #[validate(length(max = 100, message = "Secret word is too long."))]
    pub secret_word: Option<String>,
}

/// Public identity of a user
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl UserSummary {
    pub fn new(user: &user::Model, role: Role) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role,
        }
    }
}

/// The signed-in user's own account and profile
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    pub phone: String,
    pub student_number: String,
    pub instructor_id: Option<String>,
    pub avatar_url: String,
    pub has_secret_word: bool,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_parts(user: &user::Model, profile: &user_profile::Model) -> Self {
        let avatar_url = if profile.avatar_url.is_empty() {
            format!("/accounts/avatar/{}/64", user.id)
        } else {
            profile.avatar_url.clone()
        };
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: profile.role,
            full_name: profile.full_name.clone(),
            phone: profile.phone.clone(),
            student_number: profile.student_number.clone(),
            instructor_id: profile.instructor_id.clone(),
            avatar_url,
            has_secret_word: profile.secret_word_hash.is_some(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UserSearchResponse {
    pub count: usize,
    pub results: Vec<UserSummary>,
}
