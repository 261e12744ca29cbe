//! Error types shared by the controller, host and HTTP layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::MediaError;
use crate::persist::TranscodeError;

/// Errors surfaced to the UI layer as structured values
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Conversion error: {0}")]
    Conversion(#[from] TranscodeError),

    #[error("Camera and microphone access has not been granted")]
    PermissionRequired,

    #[error("No capture sources available")]
    NoCaptureSources,

    #[error("A recording session is already active")]
    SessionActive,

    #[error("Window host unavailable: {0}")]
    Host(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RecorderError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
            RecorderError::Media(MediaError::NotAllowed(_)) => "PERMISSION_DENIED",
            RecorderError::Media(_) => "MEDIA_ERROR",
            RecorderError::Conversion(_) => "CONVERSION_ERROR",
            RecorderError::PermissionRequired => "PERMISSION_REQUIRED",
            RecorderError::NoCaptureSources => "NO_CAPTURE_SOURCES",
            RecorderError::SessionActive => "SESSION_ACTIVE",
            RecorderError::Host(_) => "HOST_ERROR",
            RecorderError::Platform(_) => "PLATFORM_ERROR",
            RecorderError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

/// Error payload returned to the frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&RecorderError> for ErrorResponse {
    fn from(error: &RecorderError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<RecorderError> for ErrorResponse {
    fn from(error: RecorderError) -> Self {
        ErrorResponse::from(&error)
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;
