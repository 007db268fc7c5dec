use crate::workflow::{ValidationError, WorkflowError};
use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const QUOTA_EXCEEDED_DETAIL: &str =
    "Guests can only generate one caption per session. Please log in to continue.";
pub const INTERNAL_ERROR_DETAIL: &str = "Error processing image";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{}", QUOTA_EXCEEDED_DETAIL)]
    QuotaExceeded,

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

impl From<WorkflowError> for ApiError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::Validation(e) => e.into(),
            WorkflowError::QuotaExceeded => ApiError::QuotaExceeded,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        ApiError::Internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::QuotaExceeded => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::Internal(e) => {
                tracing::error!("request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_DETAIL.to_string(),
                )
            }
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}
