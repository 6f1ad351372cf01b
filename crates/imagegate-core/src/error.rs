//! Error types module
//!
//! Every pipeline stage fails with an [`ImageHandlerError`]. The enum is closed over
//! the failure kinds a client can observe; each variant self-describes how it is
//! presented through the [`ErrorMetadata`] trait so the response mapper never has
//! to inspect messages to pick a status code.

use serde::Serialize;

/// Message the codec produces when an overlay is larger than its base image.
pub const COMPOSITE_CODEC_MESSAGE: &str = "Image to composite must have same dimensions or smaller";

/// Client-facing replacement for [`COMPOSITE_CODEC_MESSAGE`].
pub const COMPOSITE_CLIENT_MESSAGE: &str = "Image to overlay must have same dimensions or smaller";

/// Generic body for every masked failure.
pub const INTERNAL_CLIENT_MESSAGE: &str = "Internal error. Please contact the system administrator.";

// Request-level error codes
pub const CODE_REQUEST_TYPE: &str = "RequestTypeError";
pub const CODE_CANNOT_DECODE_REQUEST: &str = "DecodeRequest::CannotDecodeRequest";
pub const CODE_CANNOT_READ_PATH: &str = "DecodeRequest::CannotReadPath";
pub const CODE_REQUEST_EXPIRED: &str = "ImageRequestExpired";
pub const CODE_REQUEST_EXPIRY_FORMAT: &str = "ImageRequestExpiryFormat";
pub const CODE_INVALID_HEADER: &str = "CustomHeaders::InvalidHeader";

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected client errors like malformed requests
    Debug,
    /// Recoverable or external issues like missing objects
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "NoSuchKey")
    fn error_code(&self) -> &'static str;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether the error must be masked behind a generic 500
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Why a source object could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFetchFailure {
    NotFound,
    AccessDenied,
    TooLarge,
    Timeout,
    Unavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageHandlerError {
    #[error("Invalid request ({code}): {message}")]
    InvalidRequest { code: &'static str, message: String },

    #[error("Access to bucket '{bucket}' is not allowed")]
    InvalidBucket { bucket: String },

    #[error("Invalid edits: {0}")]
    InvalidEdits(String),

    #[error("Failed to fetch {bucket}/{key} ({failure:?}): {detail}")]
    SourceFetch {
        failure: SourceFetchFailure,
        bucket: String,
        key: String,
        detail: String,
    },

    #[error("Detection failed: {0}")]
    DetectionFailure(String),

    #[error(
        "Overlay {overlay_width}x{overlay_height} does not fit base image {base_width}x{base_height}"
    )]
    CompositeDimension {
        base_width: u32,
        base_height: u32,
        overlay_width: u32,
        overlay_height: u32,
    },

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ImageHandlerError {
    pub fn invalid_request(code: &'static str, message: impl Into<String>) -> Self {
        ImageHandlerError::InvalidRequest {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_edits(message: impl Into<String>) -> Self {
        ImageHandlerError::InvalidEdits(message.into())
    }

    /// Get the error type name for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            ImageHandlerError::InvalidRequest { .. } => "InvalidRequest",
            ImageHandlerError::InvalidBucket { .. } => "InvalidBucket",
            ImageHandlerError::InvalidEdits(_) => "InvalidEdits",
            ImageHandlerError::SourceFetch { .. } => "SourceFetch",
            ImageHandlerError::DetectionFailure(_) => "DetectionFailure",
            ImageHandlerError::CompositeDimension { .. } => "CompositeDimension",
            ImageHandlerError::UnsupportedFormat(_) => "UnsupportedFormat",
            ImageHandlerError::Internal(_) | ImageHandlerError::InternalWithSource { .. } => {
                "Internal"
            }
        }
    }

    /// Status/code/message triple for surfaced errors; `None` when the error is masked.
    pub fn error_info(&self) -> Option<ErrorInfo> {
        if self.is_sensitive() {
            return None;
        }
        Some(ErrorInfo {
            status: self.http_status_code(),
            code: self.error_code().to_string(),
            message: self.client_message(),
        })
    }
}

impl From<anyhow::Error> for ImageHandlerError {
    fn from(err: anyhow::Error) -> Self {
        ImageHandlerError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Static metadata for each variant: (http_status, error_code, sensitive, log_level).
fn static_metadata(err: &ImageHandlerError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        ImageHandlerError::InvalidRequest { code, .. } => (400, code, false, LogLevel::Debug),
        ImageHandlerError::InvalidBucket { .. } => (
            403,
            "ImageBucket::CannotAccessBucket",
            false,
            LogLevel::Warn,
        ),
        ImageHandlerError::InvalidEdits(_) => {
            (400, "ImageEdits::InvalidEdits", false, LogLevel::Debug)
        }
        ImageHandlerError::SourceFetch { failure, .. } => match failure {
            SourceFetchFailure::NotFound => (404, "NoSuchKey", false, LogLevel::Debug),
            SourceFetchFailure::AccessDenied => (403, "AccessDenied", false, LogLevel::Warn),
            SourceFetchFailure::TooLarge => {
                (413, "ImageRequest::SourceTooLarge", false, LogLevel::Warn)
            }
            SourceFetchFailure::Timeout => {
                (504, "ImageRequest::SourceTimeout", false, LogLevel::Error)
            }
            SourceFetchFailure::Unavailable => {
                (500, "ImageRequest::CannotFetchImage", false, LogLevel::Error)
            }
        },
        ImageHandlerError::CompositeDimension { .. } => (400, "BadRequest", false, LogLevel::Debug),
        ImageHandlerError::DetectionFailure(_)
        | ImageHandlerError::UnsupportedFormat(_)
        | ImageHandlerError::Internal(_)
        | ImageHandlerError::InternalWithSource { .. } => {
            (500, "InternalError", true, LogLevel::Error)
        }
    }
}

impl ErrorMetadata for ImageHandlerError {
    fn http_status_code(&self) -> u16 {
        static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        static_metadata(self).1
    }

    fn is_sensitive(&self) -> bool {
        static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            ImageHandlerError::InvalidRequest { message, .. } => message.clone(),
            ImageHandlerError::InvalidBucket { .. } => {
                "The bucket you specified could not be accessed. Please check that the bucket is specified in your SOURCE_BUCKETS.".to_string()
            }
            ImageHandlerError::InvalidEdits(msg) => msg.clone(),
            ImageHandlerError::SourceFetch { failure, .. } => match failure {
                SourceFetchFailure::NotFound => "The specified key does not exist.".to_string(),
                SourceFetchFailure::AccessDenied => {
                    "Access to the requested image was denied.".to_string()
                }
                SourceFetchFailure::TooLarge => {
                    "The requested image exceeds the maximum supported size.".to_string()
                }
                SourceFetchFailure::Timeout => {
                    "Timed out while fetching the requested image.".to_string()
                }
                SourceFetchFailure::Unavailable => {
                    "The requested image could not be retrieved.".to_string()
                }
            },
            ImageHandlerError::CompositeDimension { .. } => COMPOSITE_CLIENT_MESSAGE.to_string(),
            ImageHandlerError::DetectionFailure(_)
            | ImageHandlerError::UnsupportedFormat(_)
            | ImageHandlerError::Internal(_)
            | ImageHandlerError::InternalWithSource { .. } => INTERNAL_CLIENT_MESSAGE.to_string(),
        }
    }
}

/// Serializable error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn internal() -> Self {
        Self {
            status: 500,
            code: "InternalError".to_string(),
            message: INTERNAL_CLIENT_MESSAGE.to_string(),
        }
    }

    pub fn composite_dimension() -> Self {
        Self {
            status: 400,
            code: "BadRequest".to_string(),
            message: COMPOSITE_CLIENT_MESSAGE.to_string(),
        }
    }
}
