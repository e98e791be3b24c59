//! Error types module
//!
//! This module provides the core error types used throughout the Immersia
//! upload service. All errors are unified under the `AppError` enum, which
//! covers the upload lifecycle (session lookup, chunk validation, assembly)
//! as well as storage and internal failures.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UNKNOWN_SESSION")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unknown upload session: {0}")]
    UnknownSession(String),

    #[error("Invalid chunk index {index}: session declares {total_chunks} chunks")]
    InvalidChunkIndex { index: u32, total_chunks: u32 },

    #[error("Incomplete chunks: {received} of {total_chunks} received")]
    IncompleteChunks { received: usize, total_chunks: u32 },

    #[error("Assembly already in progress for session {0}")]
    AssemblyInProgress(String),

    #[error("Assembly failed: {message}")]
    AssemblyFailed {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Chunk storage error: {0}")]
    ChunkStorage(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Build an `AssemblyFailed` from a message and an underlying cause.
    pub fn assembly_failed(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::AssemblyFailed {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// Error conversion implementations following Rust best practices
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidParameters(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidParameters(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// Reduces duplication in ErrorMetadata impl; client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidParameters(_) => (
            400,
            "INVALID_PARAMETERS",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnknownSession(_) => (
            404,
            "UNKNOWN_SESSION",
            false,
            Some("Verify the upload identifier exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidChunkIndex { .. } => (
            400,
            "INVALID_CHUNK_INDEX",
            false,
            Some("Use a chunk index within the declared range"),
            false,
            LogLevel::Debug,
        ),
        AppError::IncompleteChunks { .. } => (
            400,
            "INCOMPLETE_CHUNKS",
            true,
            Some("Upload the missing chunks and retry completion"),
            false,
            LogLevel::Debug,
        ),
        AppError::AssemblyInProgress(_) => (
            409,
            "ASSEMBLY_IN_PROGRESS",
            true,
            Some("Wait for the in-flight completion to finish"),
            false,
            LogLevel::Debug,
        ),
        AppError::AssemblyFailed { .. } => (
            500,
            "ASSEMBLY_FAILED",
            true,
            Some("Chunks are retained; retry completion"),
            true,
            LogLevel::Error,
        ),
        AppError::ChunkStorage(_) => (
            500,
            "CHUNK_STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce chunk size or file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidParameters(_) => "InvalidParameters",
            AppError::UnknownSession(_) => "UnknownSession",
            AppError::InvalidChunkIndex { .. } => "InvalidChunkIndex",
            AppError::IncompleteChunks { .. } => "IncompleteChunks",
            AppError::AssemblyInProgress(_) => "AssemblyInProgress",
            AppError::AssemblyFailed { .. } => "AssemblyFailed",
            AppError::ChunkStorage(_) => "ChunkStorage",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        // Add source error chain
        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidParameters(ref msg) => msg.clone(),
            AppError::UnknownSession(ref id) => format!("Unknown upload session: {}", id),
            AppError::InvalidChunkIndex {
                index,
                total_chunks,
            } => {
                format!(
                    "Chunk index {} is out of range for {} chunks",
                    index, total_chunks
                )
            }
            AppError::IncompleteChunks {
                received,
                total_chunks,
            } => {
                format!(
                    "Upload is incomplete: {} of {} chunks received",
                    received, total_chunks
                )
            }
            AppError::AssemblyInProgress(ref id) => {
                format!("A completion is already running for session {}", id)
            }
            AppError::AssemblyFailed { .. } => "Failed to assemble uploaded file".to_string(),
            AppError::ChunkStorage(_) => "Failed to access chunk storage".to_string(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_unknown_session() {
        let err = AppError::UnknownSession("a1b2".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "UNKNOWN_SESSION");
        assert!(!err.is_recoverable());
        assert!(err.client_message().contains("a1b2"));
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_incomplete_chunks() {
        let err = AppError::IncompleteChunks {
            received: 2,
            total_chunks: 3,
        };
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "INCOMPLETE_CHUNKS");
        assert!(err.is_recoverable());
        assert!(err.client_message().contains("2 of 3"));
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_assembly_failed_hides_details() {
        let err = AppError::assembly_failed(
            "digest mismatch",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "ASSEMBLY_FAILED");
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to assemble uploaded file");
        assert!(err.detailed_message().contains("boom"));
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_assembly_in_progress() {
        let err = AppError::AssemblyInProgress("sess".to_string());
        assert_eq!(err.http_status_code(), 409);
        assert!(err.is_recoverable());
        assert_eq!(
            err.suggested_action(),
            Some("Wait for the in-flight completion to finish")
        );
    }
}
