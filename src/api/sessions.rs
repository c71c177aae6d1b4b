use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{require_own_session, CurrentUser};
use crate::api::pagination::{PageQuery, PaginatedResponse};
use crate::core::config::MAX_QUESTIONS_PER_PAGE;
use crate::core::state::AppState;
use crate::schemas::session::{
    AnswerRequest, AnswerResponse, ResultResponse, SessionQuestionResponse, SessionResponse,
    TickResponse,
};

#[cfg(test)]
mod tests;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:session_id", get(get_session))
        .route("/:session_id/questions", get(list_questions))
        .route("/:session_id/answers/:question_id", put(submit_answer))
        .route("/:session_id/tick", post(tick))
        .route("/:session_id/submit", post(submit))
        .route("/:session_id/result", get(result))
}

async fn get_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    require_own_session(&state, &user, &session_id).await?;
    let view = state.manager().view(&session_id).await?;
    Ok(Json(SessionResponse::from_view(view)))
}

/// One page of the session's questions in fixed order, numbered from 1.
async fn list_questions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<SessionQuestionResponse>>, ApiError> {
    require_own_session(&state, &user, &session_id).await?;
    let view = state.manager().view(&session_id).await?;

    let questions = state.stores().catalog.list_questions(&view.exam_id).await?;
    let (page, per_page) =
        query.resolve(state.settings().exam().questions_per_page, MAX_QUESTIONS_PER_PAGE);

    let answers = view.answers;
    Ok(Json(PaginatedResponse::from_all(questions, page, per_page, |(index, question)| {
        SessionQuestionResponse::new(index + 1, question, &answers)
    })))
}

async fn submit_answer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((session_id, question_id)): Path<(String, String)>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    require_own_session(&state, &user, &session_id).await?;
    state.manager().submit_answer(&session_id, &question_id, &payload.option).await?;

    Ok(Json(AnswerResponse { question_id, option: payload.option, recorded: true }))
}

async fn tick(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<TickResponse>, ApiError> {
    require_own_session(&state, &user, &session_id).await?;
    let tick = state.manager().tick(&session_id).await?;
    Ok(Json(tick.into()))
}

async fn submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    require_own_session(&state, &user, &session_id).await?;

    let graded = state.manager().submit(&session_id).await?;
    tracing::info!(
        session_id = %session_id,
        student_id = %user.id,
        status = graded.session.status.as_str(),
        "Exam session closed by student"
    );

    let result = state.manager().disclose(graded).await?;
    Ok(Json(ResultResponse::from_result(result)))
}

async fn result(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    require_own_session(&state, &user, &session_id).await?;
    let result = state.manager().result(&session_id).await?;
    Ok(Json(ResultResponse::from_result(result)))
}
