//! Source descriptor resolution
//!
//! Turns an [`InboundEvent`] into a [`RequestDescriptor`]. Dialects are tried in
//! priority order: base64 JSON, Thumbor tokens, the configured rewrite rule, and
//! finally a bare object key served without edits.

mod custom;
mod default;
mod expiry;
mod thumbor;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;

use crate::config::HandlerConfig;
use crate::error::{ImageHandlerError, CODE_CANNOT_READ_PATH, CODE_REQUEST_TYPE};
use crate::models::{Dialect, InboundEvent, RawEditSpec, RequestDescriptor};

pub use expiry::check_expiry;

/// Query parameter carrying the request expiry.
pub const EXPIRES_PARAM: &str = "expires";

pub struct RequestResolver {
    config: Arc<HandlerConfig>,
}

impl RequestResolver {
    pub fn new(config: Arc<HandlerConfig>) -> Self {
        Self { config }
    }

    pub fn resolve(&self, event: &InboundEvent) -> Result<RequestDescriptor, ImageHandlerError> {
        self.resolve_at(event, Utc::now())
    }

    /// Resolve against an explicit clock, used for expiry checks.
    pub fn resolve_at(
        &self,
        event: &InboundEvent,
        now: DateTime<Utc>,
    ) -> Result<RequestDescriptor, ImageHandlerError> {
        let path = event.path.trim_start_matches('/');
        if path.is_empty() {
            return Err(ImageHandlerError::invalid_request(
                CODE_REQUEST_TYPE,
                "The type of request you are making could not be processed. Please ensure that your original image is of a supported file type (jpg, png, tiff, webp, svg, gif, avif) and refer to the documentation for additional guidance on forming image requests.",
            ));
        }

        let expires = event
            .query
            .get(EXPIRES_PARAM)
            .map(|value| check_expiry(value, now))
            .transpose()?;

        let mut descriptor = match default::decode(path) {
            Some(body) => self.from_default_body(body?)?,
            None => self.from_path(event, path)?,
        };

        descriptor.expires = expires;
        descriptor.accepts_webp = event.accepts_webp();

        tracing::debug!(
            bucket = %descriptor.bucket,
            key = %descriptor.key,
            dialect = %descriptor.dialect,
            "Resolved image request"
        );

        Ok(descriptor)
    }

    fn from_default_body(
        &self,
        body: default::DefaultRequestBody,
    ) -> Result<RequestDescriptor, ImageHandlerError> {
        let bucket = match body.bucket {
            Some(bucket) => self.check_bucket(bucket)?,
            None => self.default_bucket()?,
        };

        if body.key.trim().is_empty() {
            return Err(ImageHandlerError::invalid_request(
                CODE_CANNOT_READ_PATH,
                "The request must name an image key.",
            ));
        }

        let mut descriptor = RequestDescriptor::new(bucket, body.key, Dialect::Default);
        descriptor.raw_edits = body.edits.map(RawEditSpec::Json).unwrap_or_default();
        descriptor.output_format = body.output_format;
        if let Some(headers) = body.headers {
            descriptor.headers = default::validate_headers(headers)?;
        }
        Ok(descriptor)
    }

    fn from_path(
        &self,
        event: &InboundEvent,
        path: &str,
    ) -> Result<RequestDescriptor, ImageHandlerError> {
        let parsed = thumbor::parse(path)?;
        if parsed.has_tokens {
            let mut descriptor = self.locate(Dialect::Thumbor, parsed.bucket, &parsed.key)?;
            descriptor.raw_edits = RawEditSpec::Thumbor(parsed.segments);
            return Ok(descriptor);
        }

        if let Some(rewritten) = self
            .config
            .rewrite
            .as_ref()
            .and_then(|rule| custom::rewrite(rule, &event.path))
        {
            return self.locate(Dialect::Custom, None, &rewritten);
        }

        // Bare keys are served as Thumbor requests without edits
        let mut descriptor = self.locate(Dialect::Thumbor, None, &parsed.key)?;
        descriptor.raw_edits = RawEditSpec::Thumbor(Vec::new());
        Ok(descriptor)
    }

    /// Work out bucket and key for a path-based request.
    fn locate(
        &self,
        dialect: Dialect,
        explicit_bucket: Option<String>,
        raw_key: &str,
    ) -> Result<RequestDescriptor, ImageHandlerError> {
        let raw_key = raw_key.trim_start_matches('/');
        let (bucket, raw_key) = match explicit_bucket {
            Some(bucket) => (self.check_bucket(bucket)?, raw_key),
            None => match raw_key.split_once('/') {
                Some((first, rest)) if !rest.is_empty() && self.config.is_bucket_allowed(first) => {
                    (first.to_string(), rest)
                }
                _ => (self.default_bucket()?, raw_key),
            },
        };

        let key = percent_decode_str(raw_key)
            .decode_utf8()
            .map_err(|_| {
                ImageHandlerError::invalid_request(
                    CODE_CANNOT_READ_PATH,
                    "The image key is not valid UTF-8 after decoding.",
                )
            })?
            .into_owned();

        if key.is_empty() {
            return Err(ImageHandlerError::invalid_request(
                CODE_CANNOT_READ_PATH,
                "The request must name an image key.",
            ));
        }

        Ok(RequestDescriptor::new(bucket, key, dialect))
    }

    fn check_bucket(&self, bucket: String) -> Result<String, ImageHandlerError> {
        if self.config.is_bucket_allowed(&bucket) {
            Ok(bucket)
        } else {
            Err(ImageHandlerError::InvalidBucket { bucket })
        }
    }

    fn default_bucket(&self) -> Result<String, ImageHandlerError> {
        self.config
            .default_bucket()
            .map(str::to_string)
            .ok_or_else(|| ImageHandlerError::Internal("No source buckets configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteRule;
    use crate::error::{CODE_REQUEST_EXPIRED, CODE_INVALID_HEADER};
    use crate::models::ThumborSegment;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use chrono::TimeZone;

    fn config() -> HandlerConfig {
        HandlerConfig {
            source_buckets: vec!["images".to_string(), "assets".to_string()],
            ..Default::default()
        }
    }

    fn resolver(config: HandlerConfig) -> RequestResolver {
        RequestResolver::new(Arc::new(config))
    }

    fn encode(json: &str) -> String {
        format!("/{}", STANDARD.encode(json))
    }

    #[test]
    fn test_default_dialect() {
        let event = InboundEvent::new(encode(
            r#"{"bucket":"assets","key":"cat.png","edits":{"resize":{"width":100}},"outputFormat":"webp"}"#,
        ));
        let descriptor = resolver(config()).resolve(&event).unwrap();
        assert_eq!(descriptor.dialect, Dialect::Default);
        assert_eq!(descriptor.bucket, "assets");
        assert_eq!(descriptor.key, "cat.png");
        assert_eq!(descriptor.output_format.as_deref(), Some("webp"));
        assert!(matches!(descriptor.raw_edits, RawEditSpec::Json(ref edits) if edits.contains_key("resize")));
    }

    #[test]
    fn test_default_dialect_uses_first_bucket() {
        let event = InboundEvent::new(encode(r#"{"key":"cat.png"}"#));
        let descriptor = resolver(config()).resolve(&event).unwrap();
        assert_eq!(descriptor.bucket, "images");
        assert_eq!(descriptor.raw_edits, RawEditSpec::None);
    }

    #[test]
    fn test_default_dialect_rejects_unknown_bucket() {
        let event = InboundEvent::new(encode(r#"{"bucket":"private","key":"cat.png"}"#));
        let err = resolver(config()).resolve(&event).unwrap_err();
        assert!(matches!(err, ImageHandlerError::InvalidBucket { ref bucket } if bucket == "private"));
    }

    #[test]
    fn test_default_dialect_rejects_restricted_header() {
        let event = InboundEvent::new(encode(
            r#"{"key":"cat.png","headers":{"Connection":"close"}}"#,
        ));
        let err = resolver(config()).resolve(&event).unwrap_err();
        assert!(matches!(
            err,
            ImageHandlerError::InvalidRequest { code: CODE_INVALID_HEADER, .. }
        ));
    }

    #[test]
    fn test_thumbor_dialect_with_bucket_prefix() {
        let event = InboundEvent::new("/fit-in/200x200/filters:grayscale()/images/cat.png");
        let descriptor = resolver(config()).resolve(&event).unwrap();
        assert_eq!(descriptor.dialect, Dialect::Thumbor);
        assert_eq!(descriptor.bucket, "images");
        assert_eq!(descriptor.key, "cat.png");
        match descriptor.raw_edits {
            RawEditSpec::Thumbor(segments) => assert_eq!(segments.len(), 3),
            other => panic!("unexpected edits {:?}", other),
        }
    }

    #[test]
    fn test_thumbor_unknown_prefix_stays_in_key() {
        let event = InboundEvent::new("/100x100/photos/cat%20one.png");
        let descriptor = resolver(config()).resolve(&event).unwrap();
        assert_eq!(descriptor.bucket, "images");
        assert_eq!(descriptor.key, "photos/cat one.png");
    }

    #[test]
    fn test_thumbor_s3_selector_must_be_allowed() {
        let event = InboundEvent::new("/s3:private/cat.png");
        let err = resolver(config()).resolve(&event).unwrap_err();
        assert!(matches!(err, ImageHandlerError::InvalidBucket { .. }));

        let event = InboundEvent::new("/s3:assets/cat.png");
        let descriptor = resolver(config()).resolve(&event).unwrap();
        assert_eq!(descriptor.bucket, "assets");
        assert_eq!(descriptor.raw_edits, RawEditSpec::Thumbor(vec![]));
    }

    #[test]
    fn test_custom_dialect() {
        let mut config = config();
        config.rewrite = Some(RewriteRule::parse(r"^/legacy/(.+)$", "/assets/$1").unwrap());
        let descriptor = resolver(config)
            .resolve(&InboundEvent::new("/legacy/cat.png"))
            .unwrap();
        assert_eq!(descriptor.dialect, Dialect::Custom);
        assert_eq!(descriptor.bucket, "assets");
        assert_eq!(descriptor.key, "cat.png");
        assert_eq!(descriptor.raw_edits, RawEditSpec::None);
    }

    #[test]
    fn test_thumbor_takes_priority_over_custom() {
        let mut config = config();
        config.rewrite = Some(RewriteRule::parse(r"^/(.+)$", "/$1").unwrap());
        let descriptor = resolver(config)
            .resolve(&InboundEvent::new("/fit-in/10x10/cat.png"))
            .unwrap();
        assert_eq!(descriptor.dialect, Dialect::Thumbor);
        assert_eq!(
            descriptor.raw_edits,
            RawEditSpec::Thumbor(vec![
                ThumborSegment::FitIn,
                ThumborSegment::Size {
                    width: "10".to_string(),
                    height: "10".to_string()
                }
            ])
        );
    }

    #[test]
    fn test_plain_key_fallback() {
        let descriptor = resolver(config())
            .resolve(&InboundEvent::new("/cat.png"))
            .unwrap();
        assert_eq!(descriptor.dialect, Dialect::Thumbor);
        assert_eq!(descriptor.bucket, "images");
        assert_eq!(descriptor.key, "cat.png");
        assert_eq!(descriptor.raw_edits, RawEditSpec::Thumbor(vec![]));
    }

    #[test]
    fn test_empty_path_is_invalid() {
        for path in ["", "/", "///"] {
            let err = resolver(config())
                .resolve(&InboundEvent::new(path))
                .unwrap_err();
            assert!(matches!(
                err,
                ImageHandlerError::InvalidRequest { code: CODE_REQUEST_TYPE, .. }
            ));
        }
    }

    #[test]
    fn test_expiry_checked_before_dialect() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let expired = InboundEvent::new("/cat.png").with_query("expires", "20231231T000000Z");
        let err = resolver(config()).resolve_at(&expired, now).unwrap_err();
        assert!(matches!(
            err,
            ImageHandlerError::InvalidRequest { code: CODE_REQUEST_EXPIRED, .. }
        ));

        let valid = InboundEvent::new("/cat.png").with_query("expires", "20250101T000000Z");
        let descriptor = resolver(config()).resolve_at(&valid, now).unwrap();
        assert_eq!(
            descriptor.expires,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_accept_header_is_recorded() {
        let event = InboundEvent::new("/cat.png").with_header("Accept", "image/avif,image/webp");
        assert!(resolver(config()).resolve(&event).unwrap().accepts_webp);
    }
}
