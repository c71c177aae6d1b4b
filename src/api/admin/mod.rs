use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::core::state::AppState;

mod exams;
mod questions;
mod users;

#[cfg(test)]
mod tests;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/exams", get(exams::list_exams).post(exams::create_exam))
        .route("/exams/:exam_id", patch(exams::update_exam).delete(exams::delete_exam))
        .route("/exams/:exam_id/regrade", post(exams::regrade_exam))
        .route(
            "/exams/:exam_id/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/exams/:exam_id/questions/import", post(questions::import_questions))
        .route(
            "/questions/:question_id",
            put(questions::update_question).delete(questions::delete_question),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/import", post(users::import_students))
        .route("/users/:user_id", patch(users::update_user).delete(users::delete_user))
}
