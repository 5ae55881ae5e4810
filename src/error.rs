#[cfg(feature = "web")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::core::array::ElementType;

/// Main error type for the library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O errors (file operations, child process pipes, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image conversion errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// An array holds a different element type than the one requested
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The element type the caller asked for.
        expected: ElementType,
        /// The element type actually stored.
        actual: ElementType,
    },

    /// Two operands (or an operand and its container) disagree on shape
    #[error("Shape mismatch: expected {expected:?}, found {actual:?}")]
    ShapeMismatch {
        /// The required shape.
        expected: Vec<usize>,
        /// The shape that was supplied.
        actual: Vec<usize>,
    },

    /// Unsupported number of dimensions
    #[error("Unsupported number of dimensions: {got} (supported: 1 to {max})")]
    Dimension {
        /// The number of dimensions supplied.
        got: usize,
        /// The maximum supported.
        max: usize,
    },

    /// No codec is registered for a file extension or name
    #[error("No codec registered for '{0}'")]
    UnknownCodec(String),

    /// Malformed or unsupported file contents
    #[error("Format error: {0}")]
    Format(String),

    /// A file holds no variable following the expected naming convention
    #[error("Uninitialized: {0}")]
    Uninitialized(String),

    /// An operation does not match the current state of a handle
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Errors reported by the external video tools
    #[error("Video error: {0}")]
    Video(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Standard error response format
#[derive(Serialize)]
#[derive(Debug)]
pub struct ErrorResponse {
    /// Error code (HTTP status code)
    pub code: u16,
    /// Error message
    pub message: String,
    /// Optional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Error {
    #[cfg(feature = "web")]
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::TypeMismatch { .. }
            | Self::ShapeMismatch { .. }
            | Self::Dimension { .. }
            | Self::Format(_)
            | Self::Uninitialized(_) => StatusCode::BAD_REQUEST,
            Self::UnknownCodec(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert the error to a JSON response
    pub fn to_json(&self) -> ErrorResponse {
        #[cfg(feature = "web")]
        let code = self.status_code().as_u16();
        #[cfg(not(feature = "web"))]
        let code = 500u16;

        let details = match self {
            Self::TypeMismatch { expected, actual } => {
                Some(format!("expected={} actual={}", expected, actual))
            }
            Self::ShapeMismatch { expected, actual } => {
                Some(format!("expected={:?} actual={:?}", expected, actual))
            }
            _ => None,
        };

        ErrorResponse {
            code,
            message: self.to_string(),
            details,
        }
    }
}

#[cfg(feature = "web")]
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let response = self.to_json();

        (status, Json(response)).into_response()
    }
}

#[cfg(feature = "web")]
impl From<axum::extract::multipart::MultipartError> for Error {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Error::InvalidInput(format!("multipart upload: {}", err))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Task join error: {}", err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for working with Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context to an error if the result is an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Internal(format!("{}: {}", context, e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            let context = f();
            Error::Internal(format!("{}: {}", context, e))
        })
    }
}
