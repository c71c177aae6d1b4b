use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Exam, Question};
use crate::db::types::OptionLabel;

const MAX_DURATION_MINUTES: i32 = 24 * 60;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[serde(alias = "courseCode")]
    #[validate(length(min = 1, max = 32, message = "course_code must be 1-32 characters"))]
    pub(crate) course_code: String,
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub(crate) title: String,
    #[serde(alias = "durationMinutes", alias = "duration")]
    #[validate(range(min = 1, max = 1440, message = "duration_minutes must be 1-1440"))]
    pub(crate) duration_minutes: i32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct ExamUpdate {
    #[serde(default, alias = "courseCode")]
    #[validate(length(min = 1, max = 32, message = "course_code must be 1-32 characters"))]
    pub(crate) course_code: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub(crate) title: Option<String>,
    #[serde(default, alias = "durationMinutes", alias = "duration")]
    #[validate(range(min = 1, max = 1440, message = "duration_minutes must be 1-1440"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default)]
    pub(crate) visible: Option<bool>,
    #[serde(default, alias = "allowReview")]
    pub(crate) allow_review: Option<bool>,
    #[serde(default, alias = "allowResult")]
    pub(crate) allow_result: Option<bool>,
}

impl ExamUpdate {
    /// Applies the provided fields, trimming text. Returns an error message when
    /// a text field is blank after trimming.
    pub(crate) fn apply_to(self, exam: &mut Exam) -> Result<(), String> {
        if let Some(course_code) = self.course_code {
            exam.course_code = non_blank(&course_code, "course_code")?;
        }
        if let Some(title) = self.title {
            exam.title = non_blank(&title, "title")?;
        }
        if let Some(duration_minutes) = self.duration_minutes {
            exam.duration_minutes = duration_minutes.clamp(1, MAX_DURATION_MINUTES);
        }
        if let Some(visible) = self.visible {
            exam.visible = visible;
        }
        if let Some(allow_review) = self.allow_review {
            exam.allow_review = allow_review;
        }
        if let Some(allow_result) = self.allow_result {
            exam.allow_result = allow_result;
        }
        Ok(())
    }
}

pub(crate) fn non_blank(value: &str, field: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("{field} must not be blank"))
    } else {
        Ok(trimmed.to_string())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) course_code: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) visible: bool,
    pub(crate) allow_review: bool,
    pub(crate) allow_result: bool,
    pub(crate) created_at: String,
}

impl ExamResponse {
    pub(crate) fn from_db(exam: Exam) -> Self {
        Self {
            id: exam.id,
            course_code: exam.course_code,
            title: exam.title,
            duration_minutes: exam.duration_minutes,
            visible: exam.visible,
            allow_review: exam.allow_review,
            allow_result: exam.allow_result,
            created_at: format_primitive(exam.created_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub(crate) text: String,
    #[validate(length(equal = 4, message = "exactly four options are required"))]
    pub(crate) options: Vec<String>,
    #[serde(alias = "correctOption", alias = "correctAnswer")]
    pub(crate) correct_option: String,
}

impl QuestionCreate {
    pub(crate) fn option_refs(&self) -> Option<[&str; 4]> {
        match self.options.as_slice() {
            [a, b, c, d] => Some([a.as_str(), b.as_str(), c.as_str(), d.as_str()]),
            _ => None,
        }
    }
}

/// Admin view of a question, answer key included.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) text: String,
    pub(crate) options: [String; 4],
    pub(crate) correct_option: OptionLabel,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            exam_id: question.exam_id,
            text: question.text,
            options: question.options,
            correct_option: question.correct_option,
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RegradeResponse {
    pub(crate) exam_id: String,
    pub(crate) regraded_sessions: usize,
}
