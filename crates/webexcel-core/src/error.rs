//! Error types module
//!
//! This module provides the core error types used throughout webexcel.
//! Every failure of the upload adapter, the re-encoding step and the
//! spreadsheet layer is unified under the `AppError` enum.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like malformed uploads
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

    /// Machine-readable error code (e.g., "MISSING_PARAMETER")
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
    /// An upload slot is present but its file type or content is missing.
    #[error("Invalid parameters: {0}")]
    MissingParameter(String),

    #[error("Upload is not valid {encoding} text")]
    Decoding { encoding: &'static str },

    #[error("Upload contains characters that cannot be encoded as {encoding}")]
    Encoding { encoding: &'static str },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Failed to parse {file_type} content")]
    Parse {
        file_type: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to render {file_type} content: {message}")]
    Render { file_type: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

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
        AppError::InvalidInput(format!("JSON conversion error: {}", err))
    }
}

impl AppError {
    /// Wrap a downstream parser failure, keeping it as the error source.
    pub fn parse(file_type: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::Parse {
            file_type: file_type.into(),
            source: source.into(),
        }
    }

    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::MissingParameter(_) => "MissingParameter",
            AppError::Decoding { .. } => "Decoding",
            AppError::Encoding { .. } => "Encoding",
            AppError::UnsupportedFileType(_) => "UnsupportedFileType",
            AppError::SheetNotFound(_) => "SheetNotFound",
            AppError::Parse { .. } => "Parse",
            AppError::Render { .. } => "Render",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Multipart(_) => "Multipart",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
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
        AppError::MissingParameter(_) => (
            400,
            "MISSING_PARAMETER",
            false,
            Some("Upload a file with a name and an extension"),
            false,
            LogLevel::Debug,
        ),
        AppError::Decoding { .. } => (
            400,
            "DECODING_ERROR",
            false,
            Some("Check the text encoding of the uploaded file"),
            false,
            LogLevel::Debug,
        ),
        AppError::Encoding { .. } => (
            400,
            "ENCODING_ERROR",
            false,
            Some("Check the text encoding of the uploaded file"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedFileType(_) => (
            400,
            "UNSUPPORTED_FILE_TYPE",
            false,
            Some("Use one of csv, tsv, xlsx, xlsm, xlsb, xls or ods"),
            false,
            LogLevel::Debug,
        ),
        AppError::SheetNotFound(_) => (
            400,
            "SHEET_NOT_FOUND",
            false,
            Some("Check the sheet_name or sheet_index option"),
            false,
            LogLevel::Debug,
        ),
        AppError::Parse { .. } => (
            400,
            "PARSE_ERROR",
            false,
            Some("Check that the file content matches its extension"),
            false,
            LogLevel::Debug,
        ),
        AppError::Render { .. } => (
            500,
            "RENDER_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Multipart(_) => (
            400,
            "MULTIPART_ERROR",
            false,
            Some("Send the request as multipart/form-data"),
            false,
            LogLevel::Debug,
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
            AppError::MissingParameter(_) => "Invalid parameters".to_string(),
            AppError::Render { .. } => "Failed to generate the spreadsheet".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}
