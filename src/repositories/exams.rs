use sqlx::PgPool;

use crate::db::models::Exam;

pub(crate) const COLUMNS: &str = "\
    id, course_code, title, duration_minutes, visible, allow_review, allow_result, \
    created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_visible_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE id = $1 AND visible = TRUE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams ORDER BY created_at, id"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn list_visible(pool: &PgPool) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE visible = TRUE ORDER BY created_at, id"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(pool: &PgPool, exam: &Exam) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exams (
            id, course_code, title, duration_minutes, visible, allow_review, allow_result,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
    )
    .bind(&exam.id)
    .bind(&exam.course_code)
    .bind(&exam.title)
    .bind(exam.duration_minutes)
    .bind(exam.visible)
    .bind(exam.allow_review)
    .bind(exam.allow_result)
    .bind(exam.created_at)
    .bind(exam.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update(pool: &PgPool, exam: &Exam) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exams
         SET course_code = $1,
             title = $2,
             duration_minutes = $3,
             visible = $4,
             allow_review = $5,
             allow_result = $6,
             updated_at = $7
         WHERE id = $8",
    )
    .bind(&exam.course_code)
    .bind(&exam.title)
    .bind(exam.duration_minutes)
    .bind(exam.visible)
    .bind(exam.allow_review)
    .bind(exam.allow_result)
    .bind(exam.updated_at)
    .bind(&exam.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
