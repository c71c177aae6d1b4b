use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::to_primitive_utc;
use crate::db::types::UserRole;
use crate::schemas::exam::non_blank;
use crate::schemas::user::{
    AdminUserCreate, AdminUserUpdate, RosterImportQuery, UserListQuery, UserResponse,
};
use crate::services::identity::{self, NewUser};
use crate::services::roster_import::{self, RosterError, RosterReport};
use crate::store::ExamError;

pub(super) async fn create_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(payload): Json<AdminUserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let login_key = identity::normalize_login_key(&payload.login);
    if login_key.is_empty() {
        return Err(ApiError::BadRequest("login must not be blank".to_string()));
    }

    let now = to_primitive_utc(state.clock().now());
    let user = identity::build_user(
        NewUser {
            login: &login_key,
            full_name: &payload.full_name,
            department: payload.department.as_deref(),
            role: payload.role,
            password: &payload.password,
        },
        now,
    )
    .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = state.stores().users.create_user(user).await?;
    tracing::info!(user_id = %user.id, admin_id = %admin.id, role = ?user.role, "User created");
    Ok((StatusCode::CREATED, Json(UserResponse::from_db(user))))
}

/// Students by default; `?role=admin` lists administrators.
pub(super) async fn list_users(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.stores().users.list_users(query.role.unwrap_or(UserRole::Student)).await?;
    Ok(Json(
        users.into_iter().filter(|user| query.matches(user)).map(UserResponse::from_db).collect(),
    ))
}

pub(super) async fn update_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<String>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let users = &state.stores().users;
    let mut user = users.find_user(&user_id).await?.ok_or(ExamError::NotFound("User"))?;

    if user.id == admin.id && payload.is_active == Some(false) {
        return Err(ApiError::BadRequest("You cannot deactivate your own account".to_string()));
    }

    if let Some(login) = payload.login.as_deref() {
        let login_key = identity::normalize_login_key(login);
        if login_key.is_empty() {
            return Err(ApiError::BadRequest("login must not be blank".to_string()));
        }
        user.login_key = login_key;
    }
    if let Some(full_name) = payload.full_name.as_deref() {
        user.full_name = non_blank(full_name, "full_name").map_err(ApiError::BadRequest)?;
    }
    if let Some(department) = payload.department.as_deref() {
        let department = department.trim();
        user.department = (!department.is_empty()).then(|| department.to_string());
    }
    if let Some(password) = payload.password.as_deref() {
        user.hashed_password = security::hash_password(password)
            .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;
    }
    if let Some(is_active) = payload.is_active {
        user.is_active = is_active;
    }
    if let Some(extra_time_minutes) = payload.extra_time_minutes {
        user.extra_time_minutes = extra_time_minutes;
    }
    user.updated_at = to_primitive_utc(state.clock().now());

    let user = users.update_user(user).await?;
    tracing::info!(
        user_id = %user.id,
        admin_id = %admin.id,
        extra_time_minutes = user.extra_time_minutes,
        is_active = user.is_active,
        "User updated"
    );
    Ok(Json(UserResponse::from_db(user)))
}

/// Deletes the account together with its exam sessions.
pub(super) async fn delete_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    state.stores().users.delete_user(&user_id).await?;
    tracing::info!(user_id = %user_id, admin_id = %admin.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts the roster CSV as the raw request body.
pub(super) async fn import_students(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Query(query): Query<RosterImportQuery>,
    body: String,
) -> Result<Json<RosterReport>, ApiError> {
    let now = to_primitive_utc(state.clock().now());
    let department = query.department.as_deref().map(str::trim).filter(|d| !d.is_empty());

    let report =
        roster_import::import_students(state.stores().users.as_ref(), &body, department, now)
            .await
            .map_err(|err| match err {
                RosterError::Store(err) => ApiError::from(err),
                RosterError::Security(err) => ApiError::internal(err, "Failed to hash password"),
            })?;

    tracing::info!(admin_id = %admin.id, created = report.created, "Roster import finished");
    Ok(Json(report))
}
