use anyhow::{Context, Result};

use crate::core::state::AppState;

/// Finalizes every overdue in-progress session as expired and grades it.
pub(crate) async fn close_expired_sessions(state: &AppState) -> Result<usize> {
    let closed =
        state.manager().expire_overdue().await.context("Failed to close expired sessions")?;

    tracing::debug!(closed_sessions = closed, "Expiry sweep finished");
    Ok(closed)
}
