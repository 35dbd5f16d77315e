//! Course lookups and membership checks shared by the endpoint modules.

use std::collections::HashMap;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::error::{AppError, Result};
use crate::middleware::AuthenticatedUser;
use crate::models::prelude::*;
use crate::models::user_profile::Role;
use crate::models::{course, user, user_profile};
use crate::schemas::{CourseResponse, UserSummary};
use crate::services::accounts::is_enrolled;
use crate::state::DbConn;

pub async fn find_course(db: &DbConn, course_id: i64) -> Result<course::Model> {
    Course::find_by_id(course_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found.".to_string()))
}

/// The course owner, who must also hold the teacher role
pub fn is_owner(user: &AuthenticatedUser, course: &course::Model) -> bool {
    user.is_teacher() && course.owner_id == user.id()
}

/// Owner or enrolled user
pub async fn is_member(db: &DbConn, user: &AuthenticatedUser, course: &course::Model) -> Result<bool> {
    if is_owner(user, course) {
        return Ok(true);
    }
    is_enrolled(db, course.id, user.id()).await
}

pub fn require_owner(user: &AuthenticatedUser, course: &course::Model) -> Result<()> {
    if is_owner(user, course) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the course owner can do this.".to_string(),
        ))
    }
}

/// Fail with 403 and `message` unless the user is a member of the course
pub async fn require_member(
    db: &DbConn,
    user: &AuthenticatedUser,
    course: &course::Model,
    message: &str,
) -> Result<()> {
    if is_member(db, user, course).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(message.to_string()))
    }
}

/// Public identities for a set of users, keyed by id
pub async fn user_summaries(
    db: &DbConn,
    ids: impl IntoIterator<Item = i64>,
) -> Result<HashMap<i64, UserSummary>> {
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users = User::find()
        .filter(user::Column::Id.is_in(ids.clone()))
        .all(db)
        .await?;
    let roles: HashMap<i64, Role> = UserProfile::find()
        .filter(user_profile::Column::UserId.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.user_id, p.role))
        .collect();

    Ok(users
        .iter()
        .map(|u| {
            let role = roles.get(&u.id).copied().unwrap_or(Role::Student);
            (u.id, UserSummary::new(u, role))
        })
        .collect())
}

pub async fn user_summary(db: &DbConn, user_id: i64) -> Result<UserSummary> {
    user_summaries(db, [user_id])
        .await?
        .remove(&user_id)
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

/// Serialize courses with their owners, preserving order
pub async fn course_responses(db: &DbConn, courses: Vec<course::Model>) -> Result<Vec<CourseResponse>> {
    let owners = user_summaries(db, courses.iter().map(|c| c.owner_id)).await?;
    courses
        .into_iter()
        .map(|c| {
            let owner = owners
                .get(&c.owner_id)
                .cloned()
                .ok_or_else(|| AppError::Internal(format!("Owner of course {} missing", c.id)))?;
            Ok(CourseResponse::new(c, owner))
        })
        .collect()
}

pub async fn course_response(db: &DbConn, course: course::Model) -> Result<CourseResponse> {
    let owner = user_summary(db, course.owner_id).await?;
    Ok(CourseResponse::new(course, owner))
}
