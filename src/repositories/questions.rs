use sqlx::PgPool;

use crate::db::models::{Question, QuestionRow};

pub(crate) const COLUMNS: &str = "\
    id, exam_id, text, fingerprint, option_a, option_b, option_c, option_d, \
    correct_option, created_at, updated_at";

pub(crate) async fn list_by_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<QuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY created_at, seq"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<QuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRow>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn belongs_to_exam(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
    exam_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM questions WHERE id = $1 AND exam_id = $2)")
        .bind(question_id)
        .bind(exam_id)
        .fetch_one(executor)
        .await
}

/// Inserts unless the exam already holds a question with the same fingerprint.
pub(crate) async fn create_if_absent(
    pool: &PgPool,
    question: &Question,
) -> Result<bool, sqlx::Error> {
    let [option_a, option_b, option_c, option_d] = &question.options;
    let result = sqlx::query(
        "INSERT INTO questions (
            id, exam_id, text, fingerprint, option_a, option_b, option_c, option_d,
            correct_option, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        ON CONFLICT (exam_id, fingerprint) DO NOTHING",
    )
    .bind(&question.id)
    .bind(&question.exam_id)
    .bind(&question.text)
    .bind(&question.fingerprint)
    .bind(option_a)
    .bind(option_b)
    .bind(option_c)
    .bind(option_d)
    .bind(question.correct_option.as_str())
    .bind(question.created_at)
    .bind(question.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update(pool: &PgPool, question: &Question) -> Result<bool, sqlx::Error> {
    let [option_a, option_b, option_c, option_d] = &question.options;
    let result = sqlx::query(
        "UPDATE questions
         SET text = $1,
             fingerprint = $2,
             option_a = $3,
             option_b = $4,
             option_c = $5,
             option_d = $6,
             correct_option = $7,
             updated_at = $8
         WHERE id = $9",
    )
    .bind(&question.text)
    .bind(&question.fingerprint)
    .bind(option_a)
    .bind(option_b)
    .bind(option_c)
    .bind(option_d)
    .bind(question.correct_option.as_str())
    .bind(question.updated_at)
    .bind(&question.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
