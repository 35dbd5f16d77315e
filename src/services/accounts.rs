//! User and profile lifecycle shared by registration, sign-in and the session middleware.

use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};

use crate::error::{AppError, Result};
use crate::models::user_profile::{self, Role};
use crate::models::{enrolment, user};
use crate::services::security::{hash_password, hash_secret_word};

/// Everything needed to create an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub secret_word: Option<String>,
}

/// Case-insensitive equality on a string column
pub fn iequals<C: ColumnTrait>(column: C, value: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).eq(value.to_lowercase())
}

/// Case-insensitive substring match on a string column
pub fn icontains<C: ColumnTrait>(column: C, value: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(format!("%{}%", value.to_lowercase()))
}

/// Find a user by exact username or e-mail, ignoring case
pub async fn find_by_login<C: ConnectionTrait>(db: &C, identifier: &str) -> Result<Option<user::Model>> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Ok(None);
    }
    let found = user::Entity::find()
        .filter(
            Condition::any()
                .add(iequals(user::Column::Username, identifier))
                .add(iequals(user::Column::Email, identifier)),
        )
        .one(db)
        .await?;
    Ok(found)
}

/// Create the user and its profile in one transaction
pub async fn create_account<C>(db: &C, account: NewAccount) -> Result<(user::Model, user_profile::Model)>
where
    C: ConnectionTrait + TransactionTrait,
{
    let username = account.username.trim().to_string();
    let email = account.email.trim().to_lowercase();

    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required.".to_string()));
    }
    if email.is_empty() {
        return Err(AppError::BadRequest("E-mail is required.".to_string()));
    }

    let txn = db.begin().await?;

    let taken = user::Entity::find()
        .filter(iequals(user::Column::Username, &username))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(AppError::BadRequest("This username is already taken.".to_string()));
    }

    let email_taken = user::Entity::find()
        .filter(iequals(user::Column::Email, &email))
        .one(&txn)
        .await?;
    if email_taken.is_some() {
        return Err(AppError::BadRequest(
            "An account with this e-mail already exists.".to_string(),
        ));
    }

    let now = Utc::now();
    let created = user::ActiveModel {
        username: Set(username),
        email: Set(email),
        password_hash: Set(hash_password(&account.password)?),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let secret_word_hash = match account.secret_word.as_deref().map(str::trim) {
        Some(word) if !word.is_empty() => Some(hash_secret_word(word)?),
        _ => None,
    };

    let profile = create_profile(&txn, created.id, account.role, secret_word_hash).await?;

    txn.commit().await?;
    tracing::info!(user_id = created.id, role = %profile.role, "Account created");

    Ok((created, profile))
}

pub async fn create_profile<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    role: Role,
    secret_word_hash: Option<String>,
) -> Result<user_profile::Model> {
    let now = Utc::now();
    let profile = user_profile::ActiveModel {
        user_id: Set(user_id),
        role: Set(role),
        full_name: Set(String::new()),
        phone: Set(String::new()),
        student_number: Set(String::new()),
        avatar_url: Set(String::new()),
        instructor_id: Set(None),
        secret_word_hash: Set(secret_word_hash),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(profile)
}

/// Load the user's profile, creating a default student profile if it is missing
pub async fn ensure_profile<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<user_profile::Model> {
    let existing = user_profile::Entity::find()
        .filter(user_profile::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    match existing {
        Some(profile) => Ok(profile),
        None => {
            tracing::warn!(user_id, "Profile missing, creating default");
            create_profile(db, user_id, Role::Student, None).await
        }
    }
}

/// Whether the student is enrolled on the course
pub async fn is_enrolled<C: ConnectionTrait>(db: &C, course_id: i64, student_id: i64) -> Result<bool> {
    let found = enrolment::Entity::find()
        .filter(enrolment::Column::CourseId.eq(course_id))
        .filter(enrolment::Column::StudentId.eq(student_id))
        .one(db)
        .await?;
    Ok(found.is_some())
}
