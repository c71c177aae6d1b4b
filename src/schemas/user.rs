use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::User;
use crate::db::types::UserRole;

#[derive(Debug, Deserialize)]
pub(crate) struct UserLogin {
    #[serde(alias = "studentId", alias = "username")]
    pub(crate) login: String,
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminUserCreate {
    #[serde(alias = "studentId")]
    #[validate(length(min = 1, max = 64, message = "login must be 1-64 characters"))]
    pub(crate) login: String,
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub(crate) full_name: String,
    #[serde(default)]
    pub(crate) department: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub(crate) password: String,
    #[serde(default = "default_user_role")]
    pub(crate) role: UserRole,
}

/// Partial edit of an account; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct AdminUserUpdate {
    #[serde(default, alias = "studentId", alias = "matric")]
    #[validate(length(min = 1, max = 64, message = "login must be 1-64 characters"))]
    pub(crate) login: Option<String>,
    #[serde(default, alias = "fullName", alias = "name")]
    #[validate(length(min = 1, message = "full_name must not be empty"))]
    pub(crate) full_name: Option<String>,
    #[serde(default)]
    pub(crate) department: Option<String>,
    #[serde(default)]
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub(crate) password: Option<String>,
    #[serde(default, alias = "isActive")]
    pub(crate) is_active: Option<bool>,
    #[serde(default, alias = "extraTime", alias = "extraTimeMinutes")]
    #[validate(range(min = 0, max = 1440, message = "extra_time_minutes must be 0-1440"))]
    pub(crate) extra_time_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UserListQuery {
    #[serde(default)]
    pub(crate) role: Option<UserRole>,
    /// Case-insensitive match on login key or full name.
    #[serde(default)]
    pub(crate) search: Option<String>,
}

impl UserListQuery {
    pub(crate) fn matches(&self, user: &User) -> bool {
        let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = search.to_lowercase();
        user.login_key.contains(&needle) || user.full_name.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RosterImportQuery {
    /// Department for rows that do not name one.
    #[serde(default)]
    pub(crate) department: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) login_key: String,
    pub(crate) full_name: String,
    pub(crate) department: Option<String>,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) extra_time_minutes: i32,
    pub(crate) created_at: String,
}

impl UserResponse {
    pub(crate) fn from_db(user: User) -> Self {
        Self {
            id: user.id,
            login_key: user.login_key,
            full_name: user.full_name,
            department: user.department,
            role: user.role,
            is_active: user.is_active,
            extra_time_minutes: user.extra_time_minutes,
            created_at: format_primitive(user.created_at),
        }
    }
}

fn default_user_role() -> UserRole {
    UserRole::Student
}
