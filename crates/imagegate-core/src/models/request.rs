use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Request dialect the inbound path was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Base64-encoded JSON request
    Default,
    /// Path-based Thumbor-style request
    Thumbor,
    /// Path rewritten by the configured rewrite rule
    Custom,
}

impl Display for Dialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Dialect::Default => write!(f, "default"),
            Dialect::Thumbor => write!(f, "thumbor"),
            Dialect::Custom => write!(f, "custom"),
        }
    }
}

/// One edit token recognised in a Thumbor-style path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumborSegment {
    FitIn,
    Smart,
    /// `WxH`, kept as written so that `-0` still signals a flip.
    Size { width: String, height: String },
    /// `AxB:CxD`, top-left and bottom-right corners.
    Crop {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
    Filter { name: String, args: Vec<String> },
}

/// Edit intent as extracted from the request, before validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawEditSpec {
    #[default]
    None,
    Json(Map<String, Value>),
    Thumbor(Vec<ThumborSegment>),
}

/// Normalized description of what the client asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub bucket: String,
    pub key: String,
    pub dialect: Dialect,
    pub raw_edits: RawEditSpec,
    pub output_format: Option<String>,
    /// Validated custom response headers.
    pub headers: BTreeMap<String, String>,
    pub expires: Option<DateTime<Utc>>,
    pub accepts_webp: bool,
}

impl RequestDescriptor {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            dialect,
            raw_edits: RawEditSpec::None,
            output_format: None,
            headers: BTreeMap::new(),
            expires: None,
            accepts_webp: false,
        }
    }
}
