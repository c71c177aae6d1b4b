use sha2::{Digest, Sha256};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::Question;
use crate::db::types::OptionLabel;
use crate::store::ExamError;

/// A validated question body not yet bound to an exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuestionDraft {
    pub(crate) text: String,
    pub(crate) options: [String; 4],
    pub(crate) correct_option: OptionLabel,
}

/// Lowercased text with surrounding and repeated inner whitespace removed.
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Hex SHA-256 of the normalized question text.
pub(crate) fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(normalize_text(text).as_bytes()))
}

/// Trims every field and checks that nothing is empty and the key is one of A-D.
pub(crate) fn draft(
    text: &str,
    options: [&str; 4],
    correct_option: &str,
) -> Result<QuestionDraft, ExamError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ExamError::invalid_input("question text must not be empty"));
    }

    let options = options.map(|option| option.trim().to_string());
    if let Some(index) = options.iter().position(|option| option.is_empty()) {
        return Err(ExamError::invalid_input(format!(
            "option {} must not be empty",
            OptionLabel::ALL[index]
        )));
    }

    let correct_option = OptionLabel::parse(&correct_option.trim().to_ascii_uppercase())
        .ok_or_else(|| {
            ExamError::invalid_input(format!(
                "correct answer '{}' is not one of A, B, C, D",
                correct_option.trim()
            ))
        })?;

    Ok(QuestionDraft { text: text.to_string(), options, correct_option })
}

pub(crate) fn build(exam_id: &str, draft: QuestionDraft, now: PrimitiveDateTime) -> Question {
    Question {
        id: Uuid::new_v4().to_string(),
        exam_id: exam_id.to_string(),
        fingerprint: fingerprint(&draft.text),
        text: draft.text,
        options: draft.options,
        correct_option: draft.correct_option,
        created_at: now,
        updated_at: now,
    }
}

/// Applies an edited draft to an existing question, keeping its identity and
/// creation time.
pub(crate) fn apply(mut question: Question, draft: QuestionDraft, now: PrimitiveDateTime) -> Question {
    question.fingerprint = fingerprint(&draft.text);
    question.text = draft.text;
    question.options = draft.options;
    question.correct_option = draft.correct_option;
    question.updated_at = now;
    question
}
