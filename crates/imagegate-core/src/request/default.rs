//! Base64-encoded JSON requests.

use std::collections::BTreeMap;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{ImageHandlerError, CODE_CANNOT_DECODE_REQUEST, CODE_INVALID_HEADER};

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Headers a client may not set through the request body.
const RESTRICTED_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub(crate) struct DefaultRequestBody {
    pub bucket: Option<String>,
    pub key: String,
    pub edits: Option<Map<String, Value>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub output_format: Option<String>,
}

/// Decode `path` as a default-dialect request.
///
/// Returns `None` when the path is not base64 of a JSON object, so that the
/// next dialect can be tried; a JSON object that fails to parse is an error.
pub(crate) fn decode(path: &str) -> Option<Result<DefaultRequestBody, ImageHandlerError>> {
    let candidate = percent_decode_str(path).decode_utf8().ok()?;
    if candidate.is_empty()
        || !candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_' | b'='))
    {
        return None;
    }

    let bytes = STANDARD_LENIENT
        .decode(candidate.as_bytes())
        .or_else(|_| URL_SAFE_LENIENT.decode(candidate.as_bytes()))
        .ok()?;

    let text = std::str::from_utf8(&bytes).ok()?;
    let trimmed = text.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }

    Some(serde_json::from_str(trimmed).map_err(|e| {
        ImageHandlerError::invalid_request(
            CODE_CANNOT_DECODE_REQUEST,
            format!(
                "The image request you provided could not be decoded. Please check that your request is base64 encoded properly and refer to the documentation for additional guidance. ({})",
                e
            ),
        )
    }))
}

/// Validate client-supplied response headers.
pub(crate) fn validate_headers(
    headers: BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, ImageHandlerError> {
    for (name, value) in &headers {
        let parsed = http::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ImageHandlerError::invalid_request(
                CODE_INVALID_HEADER,
                format!("Header name '{}' is not valid", name),
            )
        })?;
        if RESTRICTED_HEADERS.contains(&parsed.as_str()) {
            return Err(ImageHandlerError::invalid_request(
                CODE_INVALID_HEADER,
                format!("Header '{}' cannot be overridden", name),
            ));
        }
        http::HeaderValue::from_str(value).map_err(|_| {
            ImageHandlerError::invalid_request(
                CODE_INVALID_HEADER,
                format!("Value of header '{}' is not valid", name),
            )
        })?;
    }
    Ok(headers)
}
