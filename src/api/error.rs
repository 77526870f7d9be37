//! Structured error responses for the JSON endpoints.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Database(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "Invalid request",
            Self::Database(_) => "Database error",
            Self::Internal(_) => "Unexpected error",
        }
    }

    /// Storage failures rooted in SQLite are reported as database errors,
    /// anything else as unexpected.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if err.chain().any(|cause| cause.is::<rusqlite::Error>()) {
            ApiError::Database(message)
        } else {
            ApiError::Internal(message)
        }
    }
}

/// `{"error": <kind>, "message": <detail>}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();
        let message = self.to_string();

        match &self {
            ApiError::BadRequest(_) => {
                tracing::debug!(error = kind, message = %message, "Client error");
            }
            _ => {
                error!(error = kind, message = %message, "API error");
            }
        }

        (
            status,
            Json(ErrorResponse {
                error: kind,
                message,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_anyhow(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
