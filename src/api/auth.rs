use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::redis::login_rate_key;
use crate::core::security;
use crate::core::state::AppState;
use crate::schemas::auth::TokenResponse;
use crate::schemas::user::{UserLogin, UserResponse};
use crate::services::identity;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login)).route("/me", get(me))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<UserLogin>,
) -> Result<Json<TokenResponse>, ApiError> {
    let login_key = identity::normalize_login_key(&payload.login);
    if login_key.is_empty() {
        return Err(ApiError::BadRequest("login must not be empty".to_string()));
    }

    let exam_settings = state.settings().exam();
    let allowed = state
        .redis()
        .rate_limit(
            &login_rate_key(&login_key),
            exam_settings.login_rate_limit,
            exam_settings.login_rate_window_seconds,
        )
        .await
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Login rate limiter unavailable; allowing request");
            true
        });
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many login attempts, try again later"));
    }

    let user =
        identity::authenticate(state.stores().users.as_ref(), &login_key, &payload.password)
            .await?;

    let token = security::create_access_token(&user.id, user.role, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User logged in");

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from_db(user))
}
