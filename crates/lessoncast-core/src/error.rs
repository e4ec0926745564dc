//! Error types module
//!
//! Server-side failures are unified under [`AppError`], which describes its own
//! HTTP presentation through [`ErrorMetadata`]. Client-side code (upload
//! coordination, status polling, playback) speaks [`VideoError`], the taxonomy
//! the user ultimately sees.

use std::io;

use crate::models::TransitionError;

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
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "STORAGE_ERROR")
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
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The lesson cannot take a new video right now (wrong kind, or a
    /// transcode is in flight).
    #[error("Lesson not uploadable: {0}")]
    NotUploadable(String),

    /// Finalize named an object that never reached storage.
    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    #[error("Streaming unavailable: {0}")]
    StreamingUnavailable(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

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
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

impl From<crate::hls::HlsError> for AppError {
    fn from(err: crate::hls::HlsError) -> Self {
        AppError::InvalidManifest(err.to_string())
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
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
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Request a new upload ticket and upload again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the lesson ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size below the upload limit"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the authentication token"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Only the lesson owner can manage its video"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotUploadable(_) => (
            409,
            "LESSON_NOT_UPLOADABLE",
            true,
            Some("Wait for processing to finish or check the lesson type"),
            false,
            LogLevel::Debug,
        ),
        AppError::UploadNotFound(_) => (
            400,
            "UPLOAD_NOT_FOUND",
            false,
            Some("Upload the file before finalizing"),
            false,
            LogLevel::Debug,
        ),
        AppError::StreamingUnavailable(_) => (
            409,
            "STREAMING_UNAVAILABLE",
            true,
            Some("Wait until the video status is READY"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidManifest(_) => (
            500,
            "INVALID_MANIFEST",
            false,
            Some("Upload the video again"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidTransition(_) => (
            409,
            "INVALID_TRANSITION",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::Unavailable(_) => (
            503,
            "SERVICE_UNAVAILABLE",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
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
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotUploadable(_) => "NotUploadable",
            AppError::UploadNotFound(_) => "UploadNotFound",
            AppError::StreamingUnavailable(_) => "StreamingUnavailable",
            AppError::InvalidManifest(_) => "InvalidManifest",
            AppError::InvalidTransition(_) => "InvalidTransition",
            AppError::Unavailable(_) => "Unavailable",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

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
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::InvalidManifest(_) => "Video manifest is unreadable".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::InvalidTransition(err) => err.to_string(),
            AppError::InvalidInput(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotUploadable(msg)
            | AppError::UploadNotFound(msg)
            | AppError::StreamingUnavailable(msg)
            | AppError::Unavailable(msg) => msg.clone(),
        }
    }
}

/// Client-side failure taxonomy of the upload and playback flows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoError {
    /// No upload ticket could be obtained.
    #[error("Could not start upload: {0}")]
    Ticket(String),

    /// The raw transfer to storage failed.
    #[error("Upload transfer failed: {0}")]
    Transport(String),

    /// Finalize payload did not match the issuing ticket, or the file was rejected.
    #[error("Upload rejected: {0}")]
    Validation(String),

    /// The server-side transcode terminally failed.
    #[error("Video processing failed: {reason}")]
    ProcessingFailure { reason: String },

    #[error("Video is not available for streaming: {0}")]
    StreamingUnavailable(String),

    #[error("Playback failed: {0}")]
    PlaybackFatal(String),

    #[error("Operation cancelled")]
    Cancelled,

    /// Status polling gave up before the asset reached a terminal state.
    #[error("Timed out waiting for video processing after {attempts} checks")]
    PollTimeout { attempts: u32 },

    /// Any other non-success API response.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

/// Which contract call produced a failure; decides how it maps onto [`VideoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    RequestTicket,
    Finalize,
    Status,
    StreamingReference,
    Delete,
}

impl VideoError {
    /// Maps a failed call, as `(status, code, message)`, onto the client taxonomy.
    pub fn from_api_failure(
        operation: ApiOperation,
        status: u16,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        match (operation, code) {
            (ApiOperation::RequestTicket, _) => VideoError::Ticket(message),
            (ApiOperation::Finalize, "VALIDATION_ERROR" | "UPLOAD_NOT_FOUND" | "PAYLOAD_TOO_LARGE") => {
                VideoError::Validation(message)
            }
            (ApiOperation::StreamingReference, "STREAMING_UNAVAILABLE") => {
                VideoError::StreamingUnavailable(message)
            }
            _ => VideoError::Api {
                status,
                code: code.to_string(),
                message,
            },
        }
    }

    /// Errors whose remedy is restarting the whole upload from the ticket request.
    pub fn restarts_upload(&self) -> bool {
        matches!(
            self,
            VideoError::Ticket(_)
                | VideoError::Transport(_)
                | VideoError::Validation(_)
                | VideoError::ProcessingFailure { .. }
        )
    }

    /// Whether repeating the same call may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        match self {
            VideoError::Transport(_) | VideoError::StreamingUnavailable(_) => true,
            VideoError::Api { status, .. } => *status >= 500 || *status == 429,
            VideoError::PollTimeout { .. } => true,
            _ => false,
        }
    }

    /// Short text for a status line or fallback panel.
    pub fn user_message(&self) -> String {
        match self {
            VideoError::Ticket(_) => "Could not start the upload. Try again.".to_string(),
            VideoError::Transport(_) => "Upload interrupted. Try again.".to_string(),
            VideoError::Validation(_) => "The upload was rejected. Start a new upload.".to_string(),
            VideoError::ProcessingFailure { reason } => {
                format!("Processing failed ({}). Upload the video again.", reason)
            }
            VideoError::StreamingUnavailable(_) => "This video is still processing.".to_string(),
            VideoError::PlaybackFatal(_) => "This video cannot be played right now.".to_string(),
            VideoError::Cancelled => "Upload cancelled.".to_string(),
            VideoError::PollTimeout { .. } => {
                "Processing is taking longer than expected. Check back later.".to_string()
            }
            VideoError::Api { message, .. } => message.clone(),
        }
    }
}
