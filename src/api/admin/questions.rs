use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::core::time::to_primitive_utc;
use crate::db::models::Exam;
use crate::schemas::exam::{QuestionCreate, QuestionResponse};
use crate::services::question_import::{self, ImportReport};
use crate::services::questions::{self, QuestionDraft};
use crate::store::ExamError;

async fn load_exam(state: &AppState, exam_id: &str) -> Result<Exam, ApiError> {
    let exam = state.stores().catalog.find_exam(exam_id).await?.ok_or(ExamError::NotFound("Exam"))?;
    Ok(exam)
}

fn to_draft(payload: &QuestionCreate) -> Result<QuestionDraft, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let options = payload
        .option_refs()
        .ok_or_else(|| ApiError::BadRequest("exactly four options are required".to_string()))?;
    Ok(questions::draft(&payload.text, options, &payload.correct_option)?)
}

pub(super) async fn list_questions(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    let exam = load_exam(&state, &exam_id).await?;
    let questions = state.stores().catalog.list_questions(&exam.id).await?;
    Ok(Json(questions.into_iter().map(QuestionResponse::from_db).collect()))
}

pub(super) async fn create_question(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(exam_id): Path<String>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    let exam = load_exam(&state, &exam_id).await?;
    let draft = to_draft(&payload)?;

    let now = to_primitive_utc(state.clock().now());
    let question = questions::build(&exam.id, draft, now);
    if !state.stores().bank.insert_question(question.clone()).await? {
        return Err(ExamError::invalid_input("a question with the same text already exists in this exam")
            .into());
    }

    Ok((StatusCode::CREATED, Json(QuestionResponse::from_db(question))))
}

/// Accepts the CSV text as the raw request body.
pub(super) async fn import_questions(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(exam_id): Path<String>,
    body: String,
) -> Result<Json<ImportReport>, ApiError> {
    let exam = load_exam(&state, &exam_id).await?;
    let now = to_primitive_utc(state.clock().now());

    let report =
        question_import::import_questions(state.stores().bank.as_ref(), &exam.id, &body, now)
            .await?;
    tracing::info!(exam_id = %exam.id, admin_id = %admin.id, imported = report.imported, "CSV import finished");
    Ok(Json(report))
}

pub(super) async fn update_question(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(question_id): Path<String>,
    Json(payload): Json<QuestionCreate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let draft = to_draft(&payload)?;
    let existing = state.stores().bank.find_question(&question_id).await?;

    let now = to_primitive_utc(state.clock().now());
    let question = state.stores().bank.update_question(questions::apply(existing, draft, now)).await?;
    Ok(Json(QuestionResponse::from_db(question)))
}

pub(super) async fn delete_question(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(question_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.stores().bank.delete_question(&question_id).await?;
    tracing::info!(question_id = %question_id, admin_id = %admin.id, "Question deleted");
    Ok(StatusCode::NO_CONTENT)
}
