use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::core::time::to_primitive_utc;
use crate::db::models::Exam;
use crate::schemas::exam::{non_blank, ExamCreate, ExamResponse, ExamUpdate, RegradeResponse};
use crate::store::ExamError;

pub(super) async fn list_exams(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = state.stores().bank.list_exams().await?;
    Ok(Json(exams.into_iter().map(ExamResponse::from_db).collect()))
}

/// New exams start hidden with results and review withheld.
pub(super) async fn create_exam(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let course_code = non_blank(&payload.course_code, "course_code").map_err(ApiError::BadRequest)?;
    let title = non_blank(&payload.title, "title").map_err(ApiError::BadRequest)?;

    let now = to_primitive_utc(state.clock().now());
    let exam = state
        .stores()
        .bank
        .create_exam(Exam {
            id: Uuid::new_v4().to_string(),
            course_code,
            title,
            duration_minutes: payload.duration_minutes,
            visible: false,
            allow_review: false,
            allow_result: false,
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(exam_id = %exam.id, admin_id = %admin.id, "Exam created");
    Ok((StatusCode::CREATED, Json(ExamResponse::from_db(exam))))
}

pub(super) async fn update_exam(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(exam_id): Path<String>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ExamResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut exam =
        state.stores().catalog.find_exam(&exam_id).await?.ok_or(ExamError::NotFound("Exam"))?;
    payload.apply_to(&mut exam).map_err(ApiError::BadRequest)?;
    exam.updated_at = to_primitive_utc(state.clock().now());

    let exam = state.stores().bank.update_exam(exam).await?;
    tracing::info!(
        exam_id = %exam.id,
        admin_id = %admin.id,
        visible = exam.visible,
        allow_result = exam.allow_result,
        allow_review = exam.allow_review,
        "Exam updated"
    );
    Ok(Json(ExamResponse::from_db(exam)))
}

/// Deletes the exam with its questions, sessions and answers.
pub(super) async fn delete_exam(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(exam_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.stores().bank.delete_exam(&exam_id).await?;
    tracing::info!(exam_id = %exam_id, admin_id = %admin.id, "Exam deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn regrade_exam(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(exam_id): Path<String>,
) -> Result<Json<RegradeResponse>, ApiError> {
    let regraded_sessions = state.manager().regrade_exam(&exam_id).await?;
    tracing::info!(exam_id = %exam_id, admin_id = %admin.id, regraded_sessions, "Regrade requested");
    Ok(Json(RegradeResponse { exam_id, regraded_sessions }))
}
