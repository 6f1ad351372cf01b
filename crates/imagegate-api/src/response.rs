//! Response/error mapping
//!
//! Builds the [`ResponseEnvelope`] for both outcomes of the pipeline. Success
//! bodies are base64 image bytes; error bodies are `{status, code, message}` JSON.
//! CORS headers are identical on both paths.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use imagegate_core::error::COMPOSITE_CODEC_MESSAGE;
use imagegate_core::{
    ErrorInfo, ErrorMetadata, FrontDoor, HandlerConfig, ImageHandlerError, LogLevel,
    ResponseEnvelope,
};
use std::collections::BTreeMap;

const ALLOW_METHODS: &str = "GET";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Caching metadata attached to successful responses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMeta {
    pub cache_control: String,
    pub expires: Option<String>,
    pub last_modified: Option<String>,
}

/// Format a timestamp as an HTTP date (`Tue, 15 Nov 1994 08:12:31 GMT`)
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// CORS headers shared by success and error responses
pub fn cors_headers(config: &HandlerConfig, front_door: FrontDoor) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("Access-Control-Allow-Methods", ALLOW_METHODS.to_string()),
        ("Access-Control-Allow-Headers", ALLOW_HEADERS.to_string()),
    ];
    if front_door != FrontDoor::LoadBalancer {
        headers.push(("Access-Control-Allow-Credentials", "true".to_string()));
    }
    if config.cors_enabled {
        headers.push(("Access-Control-Allow-Origin", config.cors_origin.clone()));
    }
    headers
}

pub fn build_success(
    body: &[u8],
    content_type: &str,
    cache: &CacheMeta,
    custom_headers: &BTreeMap<String, String>,
    config: &HandlerConfig,
    front_door: FrontDoor,
) -> ResponseEnvelope {
    let mut envelope = ResponseEnvelope::new(200, STANDARD.encode(body), true);
    for (name, value) in cors_headers(config, front_door) {
        envelope.set_header(name, value);
    }
    envelope.set_header("Content-Type", content_type);
    envelope.set_header("Cache-Control", cache.cache_control.clone());
    if let Some(expires) = &cache.expires {
        envelope.set_header("Expires", expires.clone());
    }
    if let Some(last_modified) = &cache.last_modified {
        envelope.set_header("Last-Modified", last_modified.clone());
    }

    // Client-requested headers win
    for (name, value) in custom_headers {
        envelope.set_header(name, value.clone());
    }
    envelope
}

pub fn build_error(
    err: &ImageHandlerError,
    config: &HandlerConfig,
    front_door: FrontDoor,
) -> ResponseEnvelope {
    let info = error_info(err);
    let body = serde_json::to_string(&info).unwrap_or_else(|_| {
        format!(
            r#"{{"status":{},"code":"{}","message":"{}"}}"#,
            info.status, info.code, info.message
        )
    });

    let mut envelope = ResponseEnvelope::new(info.status, body, false);
    for (name, value) in cors_headers(config, front_door) {
        envelope.set_header(name, value);
    }
    envelope.set_header("Content-Type", "application/json");
    envelope
}

/// Client-facing error body.
///
/// Codec failures carrying the composite message are reported as the overlay
/// error they really are; everything else that is sensitive is masked.
pub fn error_info(err: &ImageHandlerError) -> ErrorInfo {
    if let Some(info) = err.error_info() {
        return info;
    }
    if err.to_string().contains(COMPOSITE_CODEC_MESSAGE) {
        return ErrorInfo::composite_dimension();
    }
    ErrorInfo::internal()
}

/// Log an error at the level its metadata asks for
pub fn log_error(err: &ImageHandlerError, config: &HandlerConfig) {
    let error_type = err.error_type();
    let status = err.http_status_code();
    // Production logs keep the error type and drop the detail
    let detail = if config.is_production() && err.is_sensitive() {
        err.error_code().to_string()
    } else {
        err.to_string()
    };

    match err.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %detail, error_type = error_type, status = status, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %detail, error_type = error_type, status = status, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %detail, error_type = error_type, status = status, "Request failed");
        }
    }
}
