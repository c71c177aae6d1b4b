use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::Question;
use crate::db::types::{OptionLabel, SessionStatus};
use crate::services::grading::{QuestionReview, Score};
use crate::services::session_manager::{SessionResult, SessionView, Tick};

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) status: SessionStatus,
    pub(crate) started_at: String,
    pub(crate) deadline_at: String,
    pub(crate) duration_seconds: i64,
    pub(crate) remaining_seconds: i64,
    pub(crate) answers: BTreeMap<String, OptionLabel>,
}

impl SessionResponse {
    pub(crate) fn from_view(view: SessionView) -> Self {
        Self {
            id: view.session_id,
            exam_id: view.exam_id,
            status: view.status,
            started_at: format_primitive(view.started_at),
            deadline_at: format_primitive(view.deadline_at),
            duration_seconds: view.duration_seconds,
            remaining_seconds: view.remaining_seconds,
            answers: view.answers.into_iter().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OptionResponse {
    pub(crate) label: OptionLabel,
    pub(crate) text: String,
}

/// Student view of a question: no answer key, plus the student's current pick.
#[derive(Debug, Serialize)]
pub(crate) struct SessionQuestionResponse {
    pub(crate) id: String,
    pub(crate) number: usize,
    pub(crate) text: String,
    pub(crate) options: Vec<OptionResponse>,
    pub(crate) selected: Option<OptionLabel>,
}

impl SessionQuestionResponse {
    pub(crate) fn new(
        number: usize,
        question: Question,
        answers: &HashMap<String, OptionLabel>,
    ) -> Self {
        let selected = answers.get(&question.id).copied();
        Self {
            options: OptionLabel::ALL
                .into_iter()
                .zip(question.options)
                .map(|(label, text)| OptionResponse { label, text })
                .collect(),
            id: question.id,
            number,
            text: question.text,
            selected,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerRequest {
    #[serde(alias = "option_label", alias = "optionLabel", alias = "answer")]
    pub(crate) option: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) question_id: String,
    pub(crate) option: String,
    pub(crate) recorded: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct TickResponse {
    pub(crate) remaining_seconds: i64,
    pub(crate) status: SessionStatus,
}

impl From<Tick> for TickResponse {
    fn from(tick: Tick) -> Self {
        Self { remaining_seconds: tick.remaining_seconds, status: tick.status }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreResponse {
    pub(crate) correct: u32,
    pub(crate) total: u32,
    pub(crate) percent: f64,
}

impl From<Score> for ScoreResponse {
    fn from(score: Score) -> Self {
        Self { correct: score.correct, total: score.total, percent: score.percent() }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) session_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: SessionStatus,
    pub(crate) finalized_at: Option<String>,
    pub(crate) score: Option<ScoreResponse>,
    pub(crate) review: Option<Vec<QuestionReview>>,
}

impl ResultResponse {
    pub(crate) fn from_result(result: SessionResult) -> Self {
        Self {
            session_id: result.session.id,
            exam_id: result.session.exam_id,
            status: result.session.status,
            finalized_at: result.session.finalized_at.map(format_primitive),
            score: result.score.map(ScoreResponse::from),
            review: result.review,
        }
    }
}
