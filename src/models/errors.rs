use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised while validating and saving uploaded files.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid upload configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Uploaded part for field '{field}' has no filename")]
    MissingFilename { field: String },

    #[error("Uploaded file '{file_name}' is empty")]
    EmptyFile { file_name: String },

    #[error("File extension not allowed: {file_name} (allowed: {allowed})")]
    DisallowedExtension { file_name: String, allowed: String },

    #[error("File too large: {size} > {max_size} bytes")]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("File content type not allowed: {detected} (allowed: {allowed})")]
    DisallowedSniffedType { detected: String, allowed: String },

    #[error("Failed to write {path}: {source}")]
    IOFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not determine content type of {path}")]
    TypeProbeFailed { path: String },

    #[error("Content type {content_type} does not start with {expected_prefix}")]
    ContentTypeMismatch {
        content_type: String,
        expected_prefix: String,
    },
}

impl UploadError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        UploadError::InvalidConfiguration { message: message.into() }
    }

    /// Stable machine-readable code for each kind.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
            UploadError::MissingFilename { .. } => "MISSING_FILENAME",
            UploadError::EmptyFile { .. } => "EMPTY_FILE",
            UploadError::DisallowedExtension { .. } => "DISALLOWED_EXTENSION",
            UploadError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            UploadError::DisallowedSniffedType { .. } => "DISALLOWED_FILE_TYPE",
            UploadError::IOFailure { .. } => "IO_FAILURE",
            UploadError::TypeProbeFailed { .. } => "TYPE_PROBE_FAILED",
            UploadError::ContentTypeMismatch { .. } => "CONTENT_TYPE_MISMATCH",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("File upload error: {message}")]
    FileUploadError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: String,
    pub severity: ErrorSeverity,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
}

pub struct ErrorHandler;

impl ErrorHandler {
    /// Converts an AppError into a status code and a user-facing ErrorResponse
    pub fn handle_error(error: &AppError) -> (StatusCode, ErrorResponse) {
        match error {
            AppError::Upload(upload) => Self::handle_upload_error(upload),

            AppError::FileUploadError { message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    success: false,
                    message: "Malformed multipart request".to_string(),
                    error_code: "UPLOAD_FAILED".to_string(),
                    severity: ErrorSeverity::Medium,
                    details: Some(message.clone()),
                },
            ),

            AppError::StorageError { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    success: false,
                    message: "Storage operation failed".to_string(),
                    error_code: "STORAGE_FAILED".to_string(),
                    severity: ErrorSeverity::High,
                    details: Some(message.clone()),
                },
            ),

            // The body was cut off before the file could be measured.
            AppError::PayloadTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse {
                    success: false,
                    message: "File too large".to_string(),
                    error_code: "FILE_TOO_LARGE".to_string(),
                    severity: ErrorSeverity::Low,
                    details: Some(format!("Request body exceeds {} bytes", limit)),
                },
            ),
        }
    }

    fn handle_upload_error(error: &UploadError) -> (StatusCode, ErrorResponse) {
        let (status, message, severity) = match error {
            UploadError::InvalidConfiguration { .. } => (
                StatusCode::BAD_REQUEST,
                "Upload request does not match the endpoint configuration",
                ErrorSeverity::Medium,
            ),
            UploadError::MissingFilename { .. } => (
                StatusCode::BAD_REQUEST,
                "Uploaded file has no name",
                ErrorSeverity::Low,
            ),
            UploadError::EmptyFile { .. } => (
                StatusCode::BAD_REQUEST,
                "Uploaded file is empty",
                ErrorSeverity::Low,
            ),
            UploadError::DisallowedExtension { .. } => (
                StatusCode::BAD_REQUEST,
                "File extension is not allowed",
                ErrorSeverity::Low,
            ),
            UploadError::FileTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "File too large",
                ErrorSeverity::Low,
            ),
            UploadError::DisallowedSniffedType { .. } => (
                StatusCode::BAD_REQUEST,
                "File content is not an accepted type",
                ErrorSeverity::Medium,
            ),
            UploadError::IOFailure { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save uploaded file",
                ErrorSeverity::High,
            ),
            UploadError::TypeProbeFailed { .. } | UploadError::ContentTypeMismatch { .. } => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Unsupported file format",
                ErrorSeverity::Medium,
            ),
        };

        // Server-side paths stay out of client responses.
        let details = match error {
            UploadError::IOFailure { .. } | UploadError::TypeProbeFailed { .. } => None,
            other => Some(other.to_string()),
        };

        (
            status,
            ErrorResponse {
                success: false,
                message: message.to_string(),
                error_code: error.code().to_string(),
                severity,
                details,
            },
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = ErrorHandler::handle_error(&self);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(body)).into_response()
    }
}

// Convenience functions for creating specific errors
impl AppError {
    pub fn file_upload_failed(message: impl Into<String>) -> Self {
        AppError::FileUploadError { message: message.into() }
    }

    pub fn storage_failed(message: impl Into<String>) -> Self {
        AppError::StorageError { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_too_large_maps_to_413() {
        let error = AppError::from(UploadError::FileTooLarge { size: 20, max_size: 10 });
        let (status, body) = ErrorHandler::handle_error(&error);
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body.error_code, "FILE_TOO_LARGE");
        assert_eq!(body.details.as_deref(), Some("File too large: 20 > 10 bytes"));
        assert!(!body.success);
    }

    #[test]
    fn test_io_failure_hides_path() {
        let error = AppError::from(UploadError::IOFailure {
            path: "/srv/uploads/x".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        let (status, body) = ErrorHandler::handle_error(&error);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.details.is_none());
        assert_eq!(body.severity, ErrorSeverity::High);
    }

    #[test]
    fn test_content_type_errors_map_to_415() {
        let error = AppError::from(UploadError::ContentTypeMismatch {
            content_type: "text/plain".to_string(),
            expected_prefix: "image/".to_string(),
        });
        let (status, _) = ErrorHandler::handle_error(&error);
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_truncated_body_maps_to_413() {
        let (status, body) = ErrorHandler::handle_error(&AppError::PayloadTooLarge { limit: 1024 });
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body.error_code, "FILE_TOO_LARGE");
    }

    #[test]
    fn test_malformed_multipart_maps_to_400() {
        let (status, body) = ErrorHandler::handle_error(&AppError::file_upload_failed("bad boundary"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error_code, "UPLOAD_FAILED");
    }
}
