use std::collections::HashMap;

use serde::Serialize;

use crate::db::models::Question;
use crate::db::types::OptionLabel;

/// Number of questions answered correctly out of the exam's question count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct Score {
    pub(crate) correct: u32,
    pub(crate) total: u32,
}

impl Score {
    pub(crate) fn new(correct: u32, total: u32) -> Self {
        Self { correct, total }
    }

    pub(crate) fn percent(self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (f64::from(self.correct) / f64::from(self.total)) * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct QuestionReview {
    pub(crate) question_id: String,
    pub(crate) selected: Option<OptionLabel>,
    pub(crate) correct_option: OptionLabel,
    pub(crate) is_correct: bool,
}

/// Counts questions whose recorded answer matches the key. Unanswered questions
/// count as incorrect and answers to questions outside the set are ignored.
pub(crate) fn grade(answers: &HashMap<String, OptionLabel>, questions: &[Question]) -> Score {
    let correct = questions
        .iter()
        .filter(|question| answers.get(&question.id) == Some(&question.correct_option))
        .count();

    Score::new(correct as u32, questions.len() as u32)
}

/// Per-question breakdown in question order.
pub(crate) fn review(
    answers: &HashMap<String, OptionLabel>,
    questions: &[Question],
) -> Vec<QuestionReview> {
    questions
        .iter()
        .map(|question| {
            let selected = answers.get(&question.id).copied();
            QuestionReview {
                question_id: question.id.clone(),
                selected,
                correct_option: question.correct_option,
                is_correct: selected == Some(question.correct_option),
            }
        })
        .collect()
}
