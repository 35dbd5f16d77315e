//! Migration: Create attempts and the per-attempt answer tables

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_users::Users;
use super::m20250101_000004_create_assignments::{Assignments, QuizAnswerChoices, QuizQuestions};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Attempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attempts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Attempts::AssignmentId).big_integer().not_null())
                    .col(ColumnDef::new(Attempts::StudentId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Attempts::AttemptNo)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Attempts::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Attempts::Score).double().null())
                    .col(ColumnDef::new(Attempts::MarksAwarded).double().null())
                    .col(ColumnDef::new(Attempts::GradedBy).big_integer().null())
                    .col(
                        ColumnDef::new(Attempts::GradedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Attempts::FeedbackText)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Attempts::OverrideReason)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(Attempts::Released)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Attempts::ReleasedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Attempts::Table, Attempts::AssignmentId)
                            .to(Assignments::Table, Assignments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Attempts::Table, Attempts::StudentId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Attempts::Table, Attempts::GradedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attempts_assignment_student_no")
                    .table(Attempts::Table)
                    .col(Attempts::AssignmentId)
                    .col(Attempts::StudentId)
                    .col(Attempts::AttemptNo)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attempts_released")
                    .table(Attempts::Table)
                    .col(Attempts::Released)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StudentAnswers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudentAnswers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StudentAnswers::AttemptId).big_integer().not_null())
                    .col(ColumnDef::new(StudentAnswers::QuestionId).big_integer().not_null())
                    .col(ColumnDef::new(StudentAnswers::ChoiceId).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(StudentAnswers::Table, StudentAnswers::AttemptId)
                            .to(Attempts::Table, Attempts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(StudentAnswers::Table, StudentAnswers::QuestionId)
                            .to(QuizQuestions::Table, QuizQuestions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(StudentAnswers::Table, StudentAnswers::ChoiceId)
                            .to(QuizAnswerChoices::Table, QuizAnswerChoices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_student_answers_attempt_question")
                    .table(StudentAnswers::Table)
                    .col(StudentAnswers::AttemptId)
                    .col(StudentAnswers::QuestionId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StudentTextAnswers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudentTextAnswers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StudentTextAnswers::AttemptId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StudentTextAnswers::QuestionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StudentTextAnswers::Text).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(StudentTextAnswers::Table, StudentTextAnswers::AttemptId)
                            .to(Attempts::Table, Attempts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(StudentTextAnswers::Table, StudentTextAnswers::QuestionId)
                            .to(QuizQuestions::Table, QuizQuestions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StudentFileSubmissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudentFileSubmissions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StudentFileSubmissions::AttemptId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StudentFileSubmissions::File).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(StudentFileSubmissions::Table, StudentFileSubmissions::AttemptId)
                            .to(Attempts::Table, Attempts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StudentFileSubmissions::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StudentTextAnswers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StudentAnswers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Attempts::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
pub enum Attempts {
    Table,
    Id,
    AssignmentId,
    StudentId,
    AttemptNo,
    SubmittedAt,
    Score,
    MarksAwarded,
    GradedBy,
    GradedAt,
    FeedbackText,
    OverrideReason,
    Released,
    ReleasedAt,
}

#[derive(Iden)]
enum StudentAnswers {
    Table,
    Id,
    AttemptId,
    QuestionId,
    ChoiceId,
}

#[derive(Iden)]
enum StudentTextAnswers {
    Table,
    Id,
    AttemptId,
    QuestionId,
    Text,
}

#[derive(Iden)]
enum StudentFileSubmissions {
    Table,
    Id,
    AttemptId,
    File,
}
