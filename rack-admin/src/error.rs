//! Endpoint error type
//!
//! Renders as `{ "error": message }` with:
//! - 409 for duplicates
//! - 401 for rejected credentials
//! - 500 for system failures
//! - 400 for everything else (validation, backend rejections)

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rack_client::BackendError;
use serde_json::json;
use shared::error::{AppError, ErrorCategory, ErrorCode};

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.code {
            ErrorCode::AlreadyExists
            | ErrorCode::EmailAlreadyRegistered
            | ErrorCode::ProductCodeExists => StatusCode::CONFLICT,
            ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
            code if code.category() == ErrorCategory::System
                || code.http_status().is_server_error() =>
            {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        ApiError(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(AppError::with_message(
            ErrorCode::InvalidRequest,
            rejection.body_text(),
        ))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.0.code, message = %self.0.message, "Admin request failed");
        } else {
            tracing::debug!(code = %self.0.code, message = %self.0.message, "Admin request rejected");
        }
        (status, Json(json!({ "error": self.0.message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
