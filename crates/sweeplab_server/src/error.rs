use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sweeplab_core::error::{SessionError, SpecError, StoreError};

/// Errors returned by the sweep API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl From<SpecError> for ApiError {
    fn from(err: SpecError) -> Self {
        ApiError::InvalidParameters(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RunNotFound(id) => ApiError::RunNotFound(id),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Spec(e) => e.into(),
            SessionError::Store(e) => e.into(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::TaskFailed(err.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameters(_) | ApiError::InvalidRunId(_) => StatusCode::BAD_REQUEST,
            ApiError::RunNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) | ApiError::TaskFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Helper type for API results
pub type ApiResult<T> = Result<T, ApiError>;
