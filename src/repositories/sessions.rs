use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{ExamSession, SessionAnswerRow};
use crate::db::types::SessionStatus;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, student_id, status, started_at, duration_seconds, remaining_seconds, \
    finalized_at, score, total_questions, graded_at, created_at, updated_at";

pub(crate) struct CreateSession<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) duration_seconds: i64,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!("SELECT {COLUMNS} FROM exam_sessions WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_student_exam(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    exam_id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions WHERE student_id = $1 AND exam_id = $2"
    ))
    .bind(student_id)
    .bind(exam_id)
    .fetch_optional(executor)
    .await
}

/// Conditional create keyed on (student_id, exam_id). Returns false when another
/// caller already owns the pair.
pub(crate) async fn create_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    session: CreateSession<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO exam_sessions (
            id, exam_id, student_id, status, started_at, duration_seconds, remaining_seconds,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$6,$5,$5)
        ON CONFLICT (student_id, exam_id) DO NOTHING",
    )
    .bind(session.id)
    .bind(session.exam_id)
    .bind(session.student_id)
    .bind(SessionStatus::InProgress)
    .bind(session.started_at)
    .bind(session.duration_seconds)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Takes a share lock on the session row so a concurrent finalize waits for the
/// answer write (and vice versa).
pub(crate) async fn lock_for_answer(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<(SessionStatus, String)>, sqlx::Error> {
    sqlx::query_as::<_, (SessionStatus, String)>(
        "SELECT status, exam_id FROM exam_sessions WHERE id = $1 FOR SHARE",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn upsert_answer(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: &str,
    question_id: &str,
    option_label: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO session_answers (session_id, question_id, option_label, answered_at)
         VALUES ($1,$2,$3,$4)
         ON CONFLICT (session_id, question_id)
         DO UPDATE SET option_label = EXCLUDED.option_label, answered_at = EXCLUDED.answered_at",
    )
    .bind(session_id)
    .bind(question_id)
    .bind(option_label)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_answers(
    pool: &PgPool,
    session_ids: &[String],
) -> Result<Vec<SessionAnswerRow>, sqlx::Error> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, SessionAnswerRow>(
        "SELECT session_id, question_id, option_label FROM session_answers
         WHERE session_id = ANY($1)",
    )
    .bind(session_ids)
    .fetch_all(pool)
    .await
}

/// Moves an in-progress session to a terminal status. Returns false when the
/// session was already terminal (or missing).
pub(crate) async fn finalize(
    pool: &PgPool,
    id: &str,
    status: SessionStatus,
    remaining_seconds: i64,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_sessions
         SET status = $1, remaining_seconds = $2, finalized_at = $3, updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(status)
    .bind(remaining_seconds)
    .bind(now)
    .bind(id)
    .bind(SessionStatus::InProgress)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn record_grade(
    pool: &PgPool,
    id: &str,
    score: i32,
    total_questions: i32,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_sessions
         SET score = $1, total_questions = $2, graded_at = $3, updated_at = $3
         WHERE id = $4 AND status <> $5",
    )
    .bind(score)
    .bind(total_questions)
    .bind(now)
    .bind(id)
    .bind(SessionStatus::InProgress)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_overdue(
    pool: &PgPool,
    now: PrimitiveDateTime,
) -> Result<Vec<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions
         WHERE status = $1
           AND started_at + make_interval(secs => duration_seconds::double precision) <= $2
         ORDER BY started_at"
    ))
    .bind(SessionStatus::InProgress)
    .bind(now)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_terminal_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions
         WHERE exam_id = $1 AND status <> $2
         ORDER BY started_at"
    ))
    .bind(exam_id)
    .bind(SessionStatus::InProgress)
    .fetch_all(pool)
    .await
}

pub(crate) async fn delete_by_exam(pool: &PgPool, exam_id: &str) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM exam_sessions WHERE exam_id = $1").bind(exam_id).execute(pool).await?;
    Ok(result.rows_affected())
}
