//! Configuration module
//!
//! The handler reads its configuration once at process start. Every component
//! receives the same immutable [`HandlerConfig`] behind an `Arc`.

use std::env;

use regex::{Regex, RegexBuilder};

use crate::models::FrontDoor;
use crate::storage_types::StorageBackend;

// Common constants
const DEFAULT_CACHE_CONTROL: &str = "max-age=31536000,public";
const DEFAULT_QUALITY: u8 = 80;
const MODERATION_MIN_CONFIDENCE: f32 = 75.0;
const MODERATION_BLUR: f32 = 50.0;
const FETCH_TIMEOUT_MS: u64 = 10_000;
const DETECTION_TIMEOUT_MS: u64 = 10_000;
const MAX_SOURCE_BYTES: usize = 6 * 1024 * 1024;
const SERVER_PORT: u16 = 8080;

/// Path rewrite used by the custom request dialect.
#[derive(Clone, Debug)]
pub struct RewriteRule {
    pub pattern: Regex,
    pub substitution: String,
    /// Replace every match instead of only the first one.
    pub global: bool,
}

impl RewriteRule {
    /// Build a rule from a pattern that may be written as a literal (`/body/flags`)
    /// or as a bare regular expression.
    pub fn parse(pattern: &str, substitution: &str) -> Result<Self, anyhow::Error> {
        let (body, flags) = match split_literal(pattern) {
            Some((body, flags)) => (body.replace("\\/", "/"), flags),
            None => (pattern.to_string(), ""),
        };

        let mut builder = RegexBuilder::new(&body);
        builder
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'));
        let regex = builder
            .build()
            .map_err(|e| anyhow::anyhow!("REWRITE_MATCH_PATTERN is not a valid regex: {}", e))?;

        Ok(Self {
            pattern: regex,
            substitution: normalize_substitution(substitution),
            global: flags.contains('g'),
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Apply the rewrite; `None` when the pattern does not match.
    pub fn apply(&self, path: &str) -> Option<String> {
        if !self.is_match(path) {
            return None;
        }
        let rewritten = if self.global {
            self.pattern.replace_all(path, self.substitution.as_str())
        } else {
            self.pattern.replace(path, self.substitution.as_str())
        };
        Some(rewritten.into_owned())
    }
}

/// Split `/body/flags` into its parts when the flags are all valid literal flags.
fn split_literal(pattern: &str) -> Option<(&str, &str)> {
    let rest = pattern.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (body, flags) = (&rest[..end], &rest[end + 1..]);
    if flags.chars().all(|c| "gimsuy".contains(c)) {
        Some((body, flags))
    } else {
        None
    }
}

/// Rewrite `$1` group references as `${1}` so a following letter or digit
/// cannot be read as part of a group name.
fn normalize_substitution(substitution: &str) -> String {
    let mut out = String::with_capacity(substitution.len());
    let mut chars = substitution.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().is_some_and(|n| n.is_ascii_digit()) {
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            out.push_str("${");
            out.push_str(&digits);
            out.push('}');
        } else {
            out.push(c);
        }
    }
    out
}

/// Process-wide handler configuration
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// Allow-listed source buckets; the first one is the default bucket.
    pub source_buckets: Vec<String>,
    pub cors_enabled: bool,
    pub cors_origin: String,
    pub rewrite: Option<RewriteRule>,
    pub auto_webp: bool,
    pub default_cache_control: String,
    pub default_quality: u8,
    pub moderation_min_confidence: f32,
    pub moderation_blur: f32,
    pub smart_crop_padding_percent: f32,
    pub fetch_timeout_ms: u64,
    pub detection_timeout_ms: u64,
    pub max_source_bytes: usize,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub aws_region: Option<String>,
    pub s3_endpoint: Option<String>,
    // Detection configuration
    pub detection_enabled: bool,
    // Transport configuration
    pub front_door: FrontDoor,
    pub server_port: u16,
    pub environment: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            source_buckets: Vec::new(),
            cors_enabled: false,
            cors_origin: "*".to_string(),
            rewrite: None,
            auto_webp: false,
            default_cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            default_quality: DEFAULT_QUALITY,
            moderation_min_confidence: MODERATION_MIN_CONFIDENCE,
            moderation_blur: MODERATION_BLUR,
            smart_crop_padding_percent: 0.0,
            fetch_timeout_ms: FETCH_TIMEOUT_MS,
            detection_timeout_ms: DETECTION_TIMEOUT_MS,
            max_source_bytes: MAX_SOURCE_BYTES,
            storage_backend: StorageBackend::S3,
            local_storage_path: None,
            aws_region: None,
            s3_endpoint: None,
            detection_enabled: true,
            front_door: FrontDoor::ApiGateway,
            server_port: SERVER_PORT,
            environment: "development".to_string(),
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let source_buckets: Vec<String> = lookup("SOURCE_BUCKETS")
            .ok_or_else(|| anyhow::anyhow!("SOURCE_BUCKETS must be set"))?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let rewrite = match (
            lookup("REWRITE_MATCH_PATTERN").filter(|s| !s.is_empty()),
            lookup("REWRITE_SUBSTITUTION"),
        ) {
            (Some(pattern), substitution) => Some(RewriteRule::parse(
                &pattern,
                substitution.as_deref().unwrap_or(""),
            )?),
            (None, _) => None,
        };

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.storage_backend,
        };

        let front_door = match lookup("FRONT_DOOR") {
            Some(value) => value.parse()?,
            None => defaults.front_door,
        };

        let config = Self {
            source_buckets,
            cors_enabled: lookup("CORS_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.cors_enabled),
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            rewrite,
            auto_webp: lookup("AUTO_WEBP")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.auto_webp),
            default_cache_control: lookup("DEFAULT_CACHE_CONTROL")
                .unwrap_or(defaults.default_cache_control),
            default_quality: lookup("DEFAULT_QUALITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_QUALITY),
            moderation_min_confidence: lookup("MODERATION_MIN_CONFIDENCE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MODERATION_MIN_CONFIDENCE),
            moderation_blur: lookup("MODERATION_BLUR")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MODERATION_BLUR),
            smart_crop_padding_percent: lookup("SMART_CROP_PADDING_PERCENT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.0),
            fetch_timeout_ms: lookup("FETCH_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(FETCH_TIMEOUT_MS),
            detection_timeout_ms: lookup("DETECTION_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DETECTION_TIMEOUT_MS),
            max_source_bytes: lookup("MAX_SOURCE_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_SOURCE_BYTES),
            storage_backend,
            local_storage_path: lookup("LOCAL_STORAGE_PATH"),
            aws_region: lookup("AWS_REGION"),
            s3_endpoint: lookup("S3_ENDPOINT"),
            detection_enabled: lookup("DETECTION_ENABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.detection_enabled),
            front_door,
            server_port: match lookup("PORT") {
                Some(port) => port
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
                None => SERVER_PORT,
            },
            environment: lookup("ENVIRONMENT")
                .or_else(|| lookup("APP_ENV"))
                .unwrap_or(defaults.environment),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.source_buckets.is_empty() {
            return Err(anyhow::anyhow!(
                "SOURCE_BUCKETS must name at least one bucket"
            ));
        }

        if self.storage_backend == StorageBackend::Local && self.local_storage_path.is_none() {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH to be set"
            ));
        }

        if !(1..=100).contains(&self.default_quality) {
            return Err(anyhow::anyhow!("DEFAULT_QUALITY must be between 1 and 100"));
        }

        if !(0.0..=100.0).contains(&self.moderation_min_confidence) {
            return Err(anyhow::anyhow!(
                "MODERATION_MIN_CONFIDENCE must be between 0 and 100"
            ));
        }

        if self.fetch_timeout_ms == 0 || self.detection_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Timeouts must be greater than zero"));
        }

        Ok(())
    }

    /// Bucket used when a request does not name one.
    pub fn default_bucket(&self) -> Option<&str> {
        self.source_buckets.first().map(String::as_str)
    }

    pub fn is_bucket_allowed(&self, bucket: &str) -> bool {
        self.source_buckets.iter().any(|b| b == bucket)
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

/// Accepts the `Yes`/`No` convention as well as booleans.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "true" | "1" | "on"
    )
}
