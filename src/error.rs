//! Error types for audio-dl
//!
//! This module provides error handling for the acquisition pipeline, including:
//! - A classified error taxonomy (input, admission, workspace, execution, output)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for audio-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for audio-dl
///
/// Every variant is terminal for the request it classifies — nothing here is
/// retried automatically. Retrying a slow or failing external fetch inside the
/// same deadline window would only shorten the effective budget; the caller
/// decides whether to retry.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or non-allow-listed URL, rejected before any resource allocation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Concurrency gate saturated - no execution slot available
    #[error("too many concurrent downloads, try again later")]
    Overloaded,

    /// Workspace allocation or other filesystem failure
    #[error("resource error: {0}")]
    Resource(String),

    /// External tool exceeded the per-request deadline and was terminated
    #[error("download timed out")]
    TimedOut,

    /// Request was cancelled before the external tool completed
    #[error("download cancelled")]
    Cancelled,

    /// External tool reported failure (non-zero exit), diagnostic text attached
    ///
    /// The captured text is bounded at the source; it never exceeds the
    /// runner's stderr cap.
    #[error("download failed: {stderr}")]
    ToolFailed {
        /// Bounded stderr captured from the external tool
        stderr: String,
    },

    /// Result resolver found zero or multiple candidate output files
    #[error("expected exactly one output artifact, found {found}")]
    AmbiguousOutput {
        /// Number of recognized output files found in the workspace
        found: usize,
    },

    /// External tool could not be located or spawned (binary missing, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "AUDIO_DL_DEADLINE_SECS")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServer(String),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "timed_out",
///     "message": "download timed out"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "invalid_input", "overloaded")
    ///
    /// Clients can use this for programmatic error handling.
    pub code: String,

    /// Human-readable error message
    ///
    /// This is suitable for displaying to end users.
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps pipeline errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid configuration input)
            Error::Config { .. } => 400,

            // 422 Unprocessable Entity - URL fails the allow-listed shape
            Error::InvalidInput(_) => 422,

            // 408 Request Timeout - deadline exceeded
            Error::TimedOut => 408,

            // 502 Bad Gateway - the external tool reported failure
            Error::ToolFailed { .. } => 502,

            // 503 Service Unavailable
            Error::Overloaded => 503,
            Error::Cancelled => 503,
            Error::ExternalTool(_) => 503,

            // 500 Internal Server Error - Server-side issues
            Error::Resource(_) => 500,
            Error::AmbiguousOutput { .. } => 500,
            Error::Io(_) => 500,
            Error::ApiServer(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::Overloaded => "overloaded",
            Error::Resource(_) => "resource_error",
            Error::TimedOut => "timed_out",
            Error::Cancelled => "cancelled",
            Error::ToolFailed { .. } => "tool_failed",
            Error::AmbiguousOutput { .. } => "ambiguous_output",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::ApiServer(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        // Add contextual details for specific error types
        let details = match &error {
            Error::ToolFailed { stderr } => Some(serde_json::json!({
                "stderr": stderr,
            })),
            Error::AmbiguousOutput { found } => Some(serde_json::json!({
                "found": found,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
