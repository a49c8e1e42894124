//! Error types and handling
//!
//! Application-wide error type wrapping the module errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::recorder::RecordingError;
use crate::upload::{ClientError, UploadError, ValidationError};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("{0}")]
    Upload(#[from] UploadError),

    #[error("Library error: {0}")]
    Client(#[from] ClientError),

    #[error("Invalid input: {0}")]
    Input(String),
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::Upload(UploadError::Validation(error))
    }
}

/// Machine-readable error report
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Recording(RecordingError::CaptureUnavailable(_)) | AppError::Capture(_) => {
                "CAPTURE_UNAVAILABLE"
            }
            AppError::Recording(RecordingError::EmptyCapture) => "EMPTY_CAPTURE",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Upload(UploadError::Validation(_)) => "VALIDATION_ERROR",
            AppError::Upload(UploadError::Cancelled) => "UPLOAD_CANCELLED",
            AppError::Upload(_) => "UPLOAD_ERROR",
            AppError::Client(ClientError::NotFound(_)) => "NOT_FOUND",
            AppError::Client(ClientError::MediaUnavailable(_)) => "MEDIA_UNAVAILABLE",
            AppError::Client(_) => "LIBRARY_ERROR",
            AppError::Input(_) => "INVALID_INPUT",
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let empty: AppError = RecordingError::EmptyCapture.into();
        assert_eq!(empty.code(), "EMPTY_CAPTURE");

        let denied: AppError =
            RecordingError::CaptureUnavailable(CaptureError::PermissionDenied("screen".into())).into();
        assert_eq!(denied.code(), "CAPTURE_UNAVAILABLE");

        let invalid: AppError = ValidationError::MissingTitle.into();
        assert_eq!(invalid.code(), "VALIDATION_ERROR");

        let cancelled: AppError = UploadError::Cancelled.into();
        assert_eq!(cancelled.code(), "UPLOAD_CANCELLED");

        let oversize: AppError = UploadError::Oversize { size: 2, limit: 1 }.into();
        assert_eq!(oversize.code(), "UPLOAD_ERROR");
    }

    #[test]
    fn test_error_response() {
        let response: ErrorResponse = AppError::Client(ClientError::NotFound("7".into())).into();
        assert_eq!(response.code, "NOT_FOUND");
        assert_eq!(response.message, "Library error: Recording not found: 7");
    }
}
