use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStudent, CurrentUser};
use crate::core::state::AppState;
use crate::schemas::exam::ExamResponse;
use crate::schemas::session::SessionResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_visible)).route("/:exam_id/session", post(start_session))
}

async fn list_visible(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<ExamResponse>>, ApiError> {
    let exams = state.stores().catalog.list_visible_exams().await?;
    Ok(Json(exams.into_iter().map(ExamResponse::from_db).collect()))
}

/// Opens the caller's session for an exam, or returns the one already open.
async fn start_session(
    State(state): State<AppState>,
    CurrentStudent(student): CurrentStudent,
    Path(exam_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let view = state.manager().start_session(&student, &exam_id).await?;
    Ok(Json(SessionResponse::from_view(view)))
}
