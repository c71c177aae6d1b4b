use sqlx::PgPool;

use crate::db::models::User;
use crate::db::types::UserRole;

const COLUMNS: &str = "\
    id, login_key, hashed_password, full_name, department, role, is_active, \
    extra_time_minutes, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_login_key(
    pool: &PgPool,
    login_key: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE login_key = $1"))
        .bind(login_key)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users ORDER BY created_at, id"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn list_by_role(pool: &PgPool, role: UserRole) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE role = $1 ORDER BY created_at, id"
    ))
    .bind(role)
    .fetch_all(pool)
    .await
}

/// Returns false when the login key is already taken.
pub(crate) async fn create(pool: &PgPool, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (
            id, login_key, hashed_password, full_name, department, role, is_active,
            extra_time_minutes, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        ON CONFLICT (login_key) DO NOTHING",
    )
    .bind(&user.id)
    .bind(&user.login_key)
    .bind(&user.hashed_password)
    .bind(&user.full_name)
    .bind(&user.department)
    .bind(user.role)
    .bind(user.is_active)
    .bind(user.extra_time_minutes)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update(pool: &PgPool, user: &User) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users
         SET login_key = $1,
             hashed_password = $2,
             full_name = $3,
             department = $4,
             role = $5,
             is_active = $6,
             extra_time_minutes = $7,
             updated_at = $8
         WHERE id = $9",
    )
    .bind(&user.login_key)
    .bind(&user.hashed_password)
    .bind(&user.full_name)
    .bind(&user.department)
    .bind(user.role)
    .bind(user.is_active)
    .bind(user.extra_time_minutes)
    .bind(user.updated_at)
    .bind(&user.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update_login_key(
    pool: &PgPool,
    id: &str,
    login_key: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET login_key = $1, updated_at = $2 WHERE id = $3")
        .bind(login_key)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
