use crate::services::upload_service::UploadError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Message shown to callers for every storage failure; details stay in the logs.
const STORAGE_FAILURE_MESSAGE: &str = "file upload failed, please try again later";

/// An error rendered as the JSON failure envelope.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status, code and message.
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 Bad Request on malformed input.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    /// Shortcut for a 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "code": self.code,
            "message": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Unauthenticated => AppError::new(
                StatusCode::UNAUTHORIZED,
                "USER_AUTHORITY_ERROR",
                "login is required to upload files",
            ),
            UploadError::FileMissing => AppError::new(
                StatusCode::BAD_REQUEST,
                "FILE_NOT_EXIST_ERROR",
                "no file was supplied",
            ),
            UploadError::Decode(e) => {
                AppError::new(StatusCode::BAD_REQUEST, "FILE_DECODE_ERROR", e.to_string())
            }
            UploadError::ProviderUnavailable => AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "OSS_NOT_EXIST",
                "file storage is not configured",
            ),
            UploadError::UnsupportedType(reason) => AppError::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "FILE_TYPE_NOT_SUPPORT",
                reason,
            ),
            // Already logged with full detail by the upload service.
            UploadError::StorageOperationFailed(_) => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "OSS_EXCEPTION_ERROR",
                STORAGE_FAILURE_MESSAGE,
            ),
        }
    }
}
