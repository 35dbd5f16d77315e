//! In-app notifications: creation hooks and the per-user inbox.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::error::{AppError, Result};
use crate::models::notification::{self, NotificationKind};
use crate::models::{course, enrolment, material, user};

/// Inbox access for the signed-in user
#[derive(Clone)]
pub struct NotificationService {
    db: DatabaseConnection,
}

impl NotificationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Newest-first page of a user's notifications
    pub async fn get_user_notifications(
        &self,
        user_id: i64,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<notification::Model>> {
        let notifications = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(notifications)
    }

    pub async fn get_total_count(&self, user_id: i64) -> Result<u64> {
        let count = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn get_unread_count(&self, user_id: i64) -> Result<u64> {
        let count = notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    /// Mark one of the user's notifications as read
    pub async fn mark_as_read(&self, notification_id: i64, user_id: i64) -> Result<()> {
        let found = notification::Entity::find_by_id(notification_id)
            .filter(notification::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if !found.read {
            let mut active: notification::ActiveModel = found.into();
            active.read = Set(true);
            active.update(&self.db).await?;
        }

        Ok(())
    }

    pub async fn mark_all_as_read(&self, user_id: i64) -> Result<u64> {
        let result = notification::Entity::update_many()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .col_expr(
                notification::Column::Read,
                sea_orm::sea_query::Expr::value(true),
            )
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

fn new_notification(
    user_id: i64,
    actor_id: Option<i64>,
    kind: NotificationKind,
    course_id: i64,
    message: String,
) -> notification::ActiveModel {
    notification::ActiveModel {
        user_id: Set(user_id),
        actor_id: Set(actor_id),
        kind: Set(kind),
        course_id: Set(Some(course_id)),
        message: Set(message),
        read: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
}

/// Tell the course owner that a student enrolled
pub async fn notify_enrolment<C: ConnectionTrait>(
    db: &C,
    course: &course::Model,
    student: &user::Model,
) -> Result<()> {
    new_notification(
        course.owner_id,
        Some(student.id),
        NotificationKind::Enrolment,
        course.id,
        format!("New enrolment: {} in {}", student.username, course.title),
    )
    .insert(db)
    .await?;

    tracing::debug!(course_id = course.id, student_id = student.id, "Enrolment notification created");
    Ok(())
}

/// Tell every enrolled student about a new material. Returns how many were notified.
pub async fn notify_material<C: ConnectionTrait>(
    db: &C,
    course: &course::Model,
    material: &material::Model,
) -> Result<usize> {
    let student_ids: Vec<i64> = enrolment::Entity::find()
        .filter(enrolment::Column::CourseId.eq(course.id))
        .select_only()
        .column(enrolment::Column::StudentId)
        .into_tuple()
        .all(db)
        .await?;

    if student_ids.is_empty() {
        return Ok(0);
    }

    let message = format!("New material in {}: {}", course.title, material.title);
    let rows: Vec<notification::ActiveModel> = student_ids
        .iter()
        .map(|&student_id| {
            new_notification(
                student_id,
                material.uploaded_by,
                NotificationKind::Material,
                course.id,
                message.clone(),
            )
        })
        .collect();

    let count = rows.len();
    notification::Entity::insert_many(rows).exec(db).await?;

    tracing::debug!(course_id = course.id, count, "Material notifications created");
    Ok(count)
}
