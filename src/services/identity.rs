use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::core::security::{self, SecurityError};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::store::{ExamError, UserDirectory};

#[derive(Debug, Error)]
pub(crate) enum LoginError {
    #[error("incorrect login or password")]
    BadCredentials,
    #[error("inactive user")]
    Inactive,
    #[error(transparent)]
    Store(#[from] ExamError),
}

/// Single lookup key for a user: trimmed and lowercased.
pub(crate) fn normalize_login_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn is_normalized(login_key: &str) -> bool {
    !login_key.is_empty() && normalize_login_key(login_key) == login_key
}

/// One indexed lookup by normalized key, then a hash check.
pub(crate) async fn authenticate(
    users: &dyn UserDirectory,
    login: &str,
    password: &str,
) -> Result<User, LoginError> {
    let login_key = normalize_login_key(login);
    if login_key.is_empty() {
        return Err(LoginError::BadCredentials);
    }

    let Some(user) = users.find_by_login_key(&login_key).await? else {
        return Err(LoginError::BadCredentials);
    };

    let verified = security::verify_password(password, &user.hashed_password).unwrap_or(false);
    if !verified {
        return Err(LoginError::BadCredentials);
    }

    if !user.is_active {
        return Err(LoginError::Inactive);
    }

    Ok(user)
}

pub(crate) struct NewUser<'a> {
    pub(crate) login: &'a str,
    pub(crate) full_name: &'a str,
    pub(crate) department: Option<&'a str>,
    pub(crate) role: UserRole,
    pub(crate) password: &'a str,
}

pub(crate) fn build_user(new: NewUser<'_>, now: PrimitiveDateTime) -> Result<User, SecurityError> {
    Ok(User {
        id: Uuid::new_v4().to_string(),
        login_key: normalize_login_key(new.login),
        hashed_password: security::hash_password(new.password)?,
        full_name: new.full_name.trim().to_string(),
        department: new
            .department
            .map(str::trim)
            .filter(|department| !department.is_empty())
            .map(str::to_string),
        role: new.role,
        is_active: true,
        extra_time_minutes: 0,
        created_at: now,
        updated_at: now,
    })
}
