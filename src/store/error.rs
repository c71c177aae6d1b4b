use thiserror::Error;

/// Failure kinds surfaced by the catalog, the session store and the manager.
#[derive(Debug, Error)]
pub(crate) enum ExamError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ExamError {
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<sqlx::Error> for ExamError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "Store call failed");
        Self::StoreUnavailable(err.to_string())
    }
}
