//! Quiz marking, readiness checks, deadline helpers and grade bookkeeping.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{assignment, attempt, grade, quiz_answer_choice, quiz_question};

/// A question together with its choices in display order
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithChoices {
    #[serde(flatten)]
    pub question: quiz_question::Model,
    pub choices: Vec<quiz_answer_choice::Model>,
}

impl QuestionWithChoices {
    pub fn correct_choices(&self) -> impl Iterator<Item = &quiz_answer_choice::Model> {
        self.choices.iter().filter(|c| c.is_correct)
    }

    pub fn has_choice(&self, choice_id: i64) -> bool {
        self.choices.iter().any(|c| c.id == choice_id)
    }
}

/// Load an assignment's questions and choices, both ordered by (order, id)
pub async fn load_questions<C: ConnectionTrait>(
    db: &C,
    assignment_id: i64,
) -> Result<Vec<QuestionWithChoices>> {
    let questions = quiz_question::Entity::find()
        .filter(quiz_question::Column::AssignmentId.eq(assignment_id))
        .order_by_asc(quiz_question::Column::Order)
        .order_by_asc(quiz_question::Column::Id)
        .all(db)
        .await?;

    let ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
    let mut by_question: HashMap<i64, Vec<quiz_answer_choice::Model>> = HashMap::new();
    if !ids.is_empty() {
        let choices = quiz_answer_choice::Entity::find()
            .filter(quiz_answer_choice::Column::QuestionId.is_in(ids))
            .order_by_asc(quiz_answer_choice::Column::Order)
            .order_by_asc(quiz_answer_choice::Column::Id)
            .all(db)
            .await?;
        for choice in choices {
            by_question.entry(choice.question_id).or_default().push(choice);
        }
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let choices = by_question.remove(&question.id).unwrap_or_default();
            QuestionWithChoices { question, choices }
        })
        .collect())
}

// ============================================================================
// Quiz marking
// ============================================================================

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QuestionResult {
    pub question_id: i64,
    pub selected_choice_id: Option<i64>,
    pub correct_choice_id: Option<i64>,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QuizResult {
    pub total: usize,
    pub correct: usize,
    /// Percentage, rounded to two decimals
    pub score: f64,
    pub per_question: Vec<QuestionResult>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mark a quiz. `selected` maps question id to the chosen choice id.
///
/// A question without a correct choice can never be answered correctly.
pub fn grade_quiz(questions: &[QuestionWithChoices], selected: &HashMap<i64, i64>) -> QuizResult {
    let per_question: Vec<QuestionResult> = questions
        .iter()
        .map(|q| {
            let correct_choice_id = q.correct_choices().next().map(|c| c.id);
            let selected_choice_id = selected.get(&q.question.id).copied();
            let correct = matches!(
                (selected_choice_id, correct_choice_id),
                (Some(s), Some(c)) if s == c
            );
            QuestionResult {
                question_id: q.question.id,
                selected_choice_id,
                correct_choice_id,
                correct,
            }
        })
        .collect();

    let total = per_question.len();
    let correct = per_question.iter().filter(|r| r.correct).count();
    let score = if total == 0 {
        0.0
    } else {
        round2(correct as f64 / total as f64 * 100.0)
    };

    QuizResult {
        total,
        correct,
        score,
        per_question,
    }
}

/// Marks for a percentage score on an assignment worth `max_marks`
pub fn marks_from_score(score: f64, max_marks: f64) -> f64 {
    round2(score / 100.0 * max_marks)
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Readiness {
    pub ready: bool,
    pub issues: Vec<String>,
}

/// Whether a quiz can be taken: at least one question, and every question has
/// two or more choices with exactly one marked correct.
pub fn quiz_readiness(questions: &[QuestionWithChoices]) -> Readiness {
    let mut issues = Vec::new();
    if questions.is_empty() {
        issues.push("Quiz has no questions.".to_string());
    }
    for q in questions {
        let label = q.question.label();
        if q.correct_choices().count() != 1 {
            issues.push(format!(
                "Question {}: must have exactly one correct answer.",
                label
            ));
        }
        if q.choices.len() < 2 {
            issues.push(format!(
                "Question {}: must have at least two answer choices.",
                label
            ));
        }
    }
    Readiness {
        ready: issues.is_empty(),
        issues,
    }
}

// ============================================================================
// Deadlines
// ============================================================================

/// Preset deadline offsets offered on the manage page
pub fn deadline_delta(code: &str) -> Option<Duration> {
    match code {
        "1d" => Some(Duration::days(1)),
        "3d" => Some(Duration::days(3)),
        "1w" => Some(Duration::weeks(1)),
        "2w" => Some(Duration::weeks(2)),
        "1m" => Some(Duration::days(30)),
        "3m" => Some(Duration::days(90)),
        _ => None,
    }
}

/// Compact time remaining until `deadline`, e.g. `2d 3h`, `3h 15m` or `0m`.
///
/// Minutes only appear when there are no whole days and under six hours left.
pub fn time_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (deadline - now).num_seconds();
    if seconds <= 0 {
        return "0m".to_string();
    }
    let minutes = seconds / 60;
    let days = minutes / 1440;
    let hours = (minutes % 1440) / 60;
    let mins = minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if days == 0 && mins > 0 && hours < 6 {
        parts.push(format!("{}m", mins));
    }
    if parts.is_empty() {
        parts.push("0m".to_string());
    }
    parts.join(" ")
}

// ============================================================================
// Grade records
// ============================================================================

/// Pick the attempt that defines the student's grade.
///
/// Quizzes keep the best marks; papers and exams keep the latest released attempt.
pub fn select_grading_attempt(
    kind: assignment::AssignmentKind,
    attempts: &[attempt::Model],
) -> Option<&attempt::Model> {
    let marked = attempts.iter().filter(|a| a.marks_awarded.is_some());
    match kind {
        assignment::AssignmentKind::Quiz => marked.filter(|a| a.released).max_by(|a, b| {
            a.marks_awarded
                .unwrap_or(0.0)
                .total_cmp(&b.marks_awarded.unwrap_or(0.0))
                .then(b.attempt_no.cmp(&a.attempt_no))
        }),
        _ => marked
            .filter(|a| a.released)
            .max_by_key(|a| a.attempt_no),
    }
}

/// Bring the student's grade row in line with their attempts.
///
/// Runs in its own transaction (a savepoint when called inside one). Returns the
/// stored grade, or `None` when no released attempt defines one yet.
pub async fn upsert_grade<C>(
    db: &C,
    assignment: &assignment::Model,
    student_id: i64,
) -> Result<Option<grade::Model>>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let attempts = attempt::Entity::find()
        .filter(attempt::Column::AssignmentId.eq(assignment.id))
        .filter(attempt::Column::StudentId.eq(student_id))
        .all(&txn)
        .await?;

    let Some(chosen) = select_grading_attempt(assignment.kind, &attempts) else {
        txn.commit().await?;
        return Ok(None);
    };

    let now = Utc::now();
    let released_at = if chosen.released {
        chosen.released_at.or(Some(now))
    } else {
        None
    };

    // Concurrent first grades for the same student collapse into one row
    grade::Entity::insert(grade::ActiveModel {
        assignment_id: Set(assignment.id),
        course_id: Set(assignment.course_id),
        student_id: Set(student_id),
        attempt_id: Set(Some(chosen.id)),
        achieved_marks: Set(chosen.marks_awarded.unwrap_or(0.0)),
        max_marks: Set(assignment.max_marks),
        released_at: Set(released_at),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([grade::Column::AssignmentId, grade::Column::StudentId])
            .update_columns([
                grade::Column::AttemptId,
                grade::Column::AchievedMarks,
                grade::Column::MaxMarks,
                grade::Column::ReleasedAt,
                grade::Column::UpdatedAt,
            ])
            .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    let stored = grade::Entity::find()
        .filter(grade::Column::AssignmentId.eq(assignment.id))
        .filter(grade::Column::StudentId.eq(student_id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Internal("Grade vanished after upsert".to_string()))?;

    txn.commit().await?;
    tracing::debug!(
        assignment_id = assignment.id,
        student_id,
        attempt_id = chosen.id,
        "Grade updated"
    );
    Ok(Some(stored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn question(id: i64, order: i32, choices: &[(i64, bool)]) -> QuestionWithChoices {
        QuestionWithChoices {
            question: quiz_question::Model {
                id,
                assignment_id: 1,
                order,
                text: format!("Q{}", id),
            },
            choices: choices
                .iter()
                .enumerate()
                .map(|(i, (cid, correct))| quiz_answer_choice::Model {
                    id: *cid,
                    question_id: id,
                    order: i as i32 + 1,
                    text: format!("C{}", cid),
                    is_correct: *correct,
                })
                .collect(),
        }
    }

    fn attempt(no: i32, marks: Option<f64>, released: bool) -> attempt::Model {
        attempt::Model {
            id: i64::from(no) * 10,
            assignment_id: 1,
            student_id: 2,
            attempt_no: no,
            submitted_at: Utc::now(),
            score: None,
            marks_awarded: marks,
            graded_by: None,
            graded_at: None,
            feedback_text: String::new(),
            override_reason: String::new(),
            released,
            released_at: None,
        }
    }

    #[test]
    fn test_grade_quiz_counts_correct_answers() {
        let qs = vec![
            question(1, 1, &[(11, true), (12, false)]),
            question(2, 2, &[(21, false), (22, true)]),
            question(3, 3, &[(31, true), (32, false)]),
        ];
        let selected = HashMap::from([(1, 11), (2, 21), (3, 31)]);

        let result = grade_quiz(&qs, &selected);
        assert_eq!(result.total, 3);
        assert_eq!(result.correct, 2);
        assert_eq!(result.score, 66.67);
        assert!(!result.per_question[1].correct);
        assert_eq!(result.per_question[1].correct_choice_id, Some(22));
    }

    #[test]
    fn test_grade_quiz_without_correct_choice_is_incorrect() {
        let qs = vec![question(1, 1, &[(11, false), (12, false)])];
        let result = grade_quiz(&qs, &HashMap::from([(1, 11)]));
        assert_eq!(result.correct, 0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_grade_quiz_empty() {
        let result = grade_quiz(&[], &HashMap::new());
        assert_eq!(result.total, 0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_marks_from_score() {
        assert_eq!(marks_from_score(50.0, 20.0), 10.0);
        assert_eq!(marks_from_score(66.67, 100.0), 66.67);
    }

    #[test]
    fn test_readiness_reports_issues() {
        let empty = quiz_readiness(&[]);
        assert!(!empty.ready);
        assert_eq!(empty.issues, vec!["Quiz has no questions."]);

        let qs = vec![
            question(7, 1, &[(1, true)]),
            question(8, 0, &[(2, true), (3, true)]),
        ];
        let result = quiz_readiness(&qs);
        assert!(!result.ready);
        assert_eq!(
            result.issues,
            vec![
                "Question 1: must have at least two answer choices.",
                "Question 8: must have exactly one correct answer.",
            ]
        );
    }

    #[test]
    fn test_readiness_ok() {
        let qs = vec![question(1, 1, &[(1, true), (2, false)])];
        assert!(quiz_readiness(&qs).ready);
    }

    #[test]
    fn test_deadline_delta_codes() {
        assert_eq!(deadline_delta("1d"), Some(Duration::days(1)));
        assert_eq!(deadline_delta("1w"), Some(Duration::days(7)));
        assert_eq!(deadline_delta("1m"), Some(Duration::days(30)));
        assert_eq!(deadline_delta("3m"), Some(Duration::days(90)));
        assert_eq!(deadline_delta("5y"), None);
    }

    #[test]
    fn test_time_until_formats() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let at = |secs: i64| now + Duration::seconds(secs);

        assert_eq!(time_until(at(-10), now), "0m");
        assert_eq!(time_until(at(30), now), "0m");
        assert_eq!(time_until(at(3 * 3600 + 15 * 60), now), "3h 15m");
        assert_eq!(time_until(at(7 * 3600 + 15 * 60), now), "7h");
        assert_eq!(time_until(at(2 * 86400 + 3 * 3600 + 59), now), "2d 3h");
        assert_eq!(time_until(at(86400 + 20 * 60), now), "1d");
    }

    #[test]
    fn test_select_attempt_quiz_keeps_best() {
        let attempts = vec![
            attempt(1, Some(40.0), true),
            attempt(2, Some(90.0), true),
            attempt(3, Some(70.0), true),
        ];
        let chosen = select_grading_attempt(assignment::AssignmentKind::Quiz, &attempts).unwrap();
        assert_eq!(chosen.attempt_no, 2);
    }

    #[test]
    fn test_select_attempt_paper_keeps_latest_released() {
        let attempts = vec![
            attempt(1, Some(80.0), true),
            attempt(2, Some(50.0), true),
            attempt(3, Some(99.0), false),
        ];
        let chosen = select_grading_attempt(assignment::AssignmentKind::Paper, &attempts).unwrap();
        assert_eq!(chosen.attempt_no, 2);
    }

    #[test]
    fn test_select_attempt_ignores_unreleased_work() {
        let attempts = vec![attempt(1, Some(80.0), false), attempt(2, None, false)];
        assert!(select_grading_attempt(assignment::AssignmentKind::Exam, &attempts).is_none());
    }
}
