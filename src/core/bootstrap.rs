use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::to_primitive_utc;
use crate::db::types::UserRole;
use crate::services::identity::{self, NewUser};

/// Creates the configured superuser, or repairs its role, password and active flag.
pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let login_key = identity::normalize_login_key(&admin.first_superuser_login);
    let users = &state.stores().users;
    let now = to_primitive_utc(state.clock().now());

    if let Some(mut user) = users.find_by_login_key(&login_key).await? {
        let mut needs_update = false;

        let verified =
            security::verify_password(&admin.first_superuser_password, &user.hashed_password)
                .unwrap_or(false);
        if !verified {
            user.hashed_password = security::hash_password(&admin.first_superuser_password)?;
            needs_update = true;
        }

        if user.role != UserRole::Admin {
            user.role = UserRole::Admin;
            needs_update = true;
        }

        if !user.is_active {
            user.is_active = true;
            needs_update = true;
        }

        if needs_update {
            user.updated_at = now;
            users.update_user(user).await?;
            tracing::info!("Updated default superuser {login_key}");
        } else {
            tracing::info!("Default superuser already up to date");
        }

        return Ok(());
    }

    let user = identity::build_user(
        NewUser {
            login: &login_key,
            full_name: "Super Admin",
            department: None,
            role: UserRole::Admin,
            password: &admin.first_superuser_password,
        },
        now,
    )?;
    users.create_user(user).await?;

    tracing::info!("Created default superuser {login_key}");
    Ok(())
}
