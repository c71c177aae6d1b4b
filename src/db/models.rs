use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{OptionLabel, SessionStatus, UserRole};
use crate::services::grading::Score;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) login_key: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) department: Option<String>,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    /// Minutes added to every exam this user starts.
    pub(crate) extra_time_minutes: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) course_code: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) visible: bool,
    pub(crate) allow_review: bool,
    pub(crate) allow_result: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Storage shape of a question; options live in four columns.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) text: String,
    pub(crate) fingerprint: String,
    pub(crate) option_a: String,
    pub(crate) option_b: String,
    pub(crate) option_c: String,
    pub(crate) option_d: String,
    pub(crate) correct_option: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) text: String,
    pub(crate) fingerprint: String,
    pub(crate) options: [String; 4],
    pub(crate) correct_option: OptionLabel,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl TryFrom<QuestionRow> for Question {
    type Error = String;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let correct_option = OptionLabel::parse(row.correct_option.trim()).ok_or_else(|| {
            format!("question {} has invalid correct option '{}'", row.id, row.correct_option)
        })?;

        Ok(Self {
            id: row.id,
            exam_id: row.exam_id,
            text: row.text,
            fingerprint: row.fingerprint,
            options: [row.option_a, row.option_b, row.option_c, row.option_d],
            correct_option,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ExamSession {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SessionStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) duration_seconds: i64,
    pub(crate) remaining_seconds: i64,
    pub(crate) finalized_at: Option<PrimitiveDateTime>,
    pub(crate) score: Option<i32>,
    pub(crate) total_questions: Option<i32>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
    #[sqlx(skip)]
    pub(crate) answers: HashMap<String, OptionLabel>,
}

impl ExamSession {
    /// Grade snapshot written at finalization, if grading has completed.
    pub(crate) fn grade(&self) -> Option<Score> {
        match (self.score, self.total_questions) {
            (Some(correct), Some(total)) => Some(Score::new(correct as u32, total as u32)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SessionAnswerRow {
    pub(crate) session_id: String,
    pub(crate) question_id: String,
    pub(crate) option_label: String,
}
