use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of assessment; drives how submissions are collected and graded
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum AssignmentKind {
    #[sea_orm(string_value = "quiz")]
    Quiz,
    #[sea_orm(string_value = "paper")]
    Paper,
    #[sea_orm(string_value = "exam")]
    Exam,
}

impl AssignmentKind {
    /// Quizzes are marked automatically and released on submission
    pub fn auto_released(&self) -> bool {
        matches!(self, AssignmentKind::Quiz)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub course_id: i64,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub kind: AssignmentKind,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub instructions: String,
    pub available_from: Option<DateTimeUtc>,
    pub deadline: Option<DateTimeUtc>,
    pub max_marks: f64,
    pub attempts_allowed: i32,
    pub is_published: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Students may start once the availability time has passed (or none is set)
    pub fn is_available_at(&self, now: DateTimeUtc) -> bool {
        self.available_from.map_or(true, |from| now >= from)
    }

    /// Submissions are accepted strictly before the deadline
    pub fn is_open_at(&self, now: DateTimeUtc) -> bool {
        self.deadline.map_or(true, |deadline| now < deadline)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id",
        on_delete = "Cascade"
    )]
    Course,
    #[sea_orm(has_many = "super::quiz_question::Entity")]
    Questions,
    #[sea_orm(has_many = "super::attempt::Entity")]
    Attempts,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::quiz_question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Questions.def()
    }
}

impl Related<super::attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attempts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
