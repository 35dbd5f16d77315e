use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attempts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub attempt_no: i32,
    pub submitted_at: DateTimeUtc,
    /// Automatic quiz score as a percentage
    pub score: Option<f64>,
    pub marks_awarded: Option<f64>,
    pub graded_by: Option<i64>,
    pub graded_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text")]
    pub feedback_text: String,
    #[sea_orm(column_type = "Text")]
    pub override_reason: String,
    pub released: bool,
    pub released_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::assignment::Entity",
        from = "Column::AssignmentId",
        to = "super::assignment::Column::Id",
        on_delete = "Cascade"
    )]
    Assignment,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::GradedBy",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Grader,
    #[sea_orm(has_many = "super::student_answer::Entity")]
    Answers,
    #[sea_orm(has_many = "super::student_text_answer::Entity")]
    TextAnswers,
    #[sea_orm(has_many = "super::student_file_submission::Entity")]
    FileSubmissions,
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignment.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::student_answer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Answers.def()
    }
}

impl Related<super::student_text_answer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TextAnswers.def()
    }
}

impl Related<super::student_file_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileSubmissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
