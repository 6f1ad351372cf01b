//! Detection abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detection errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Detection is disabled")]
    Disabled,

    #[error("Detection request failed: {0}")]
    RequestFailed(String),

    #[error("Detection timed out after {0} ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type DetectionResult<T> = Result<T, DetectionError>;

/// Box in coordinates normalized to the image size (0.0 - 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationLabel {
    pub name: String,
    pub parent_name: Option<String>,
    /// Confidence in percent (0-100).
    pub confidence: f32,
}

/// Face and moderation-label detection capability
#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Detect faces, in the order the backend reports them.
    async fn detect_faces(&self, image: Bytes) -> DetectionResult<Vec<FaceDetection>>;

    /// Detect moderation labels.
    async fn detect_moderation_labels(&self, image: Bytes) -> DetectionResult<Vec<ModerationLabel>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
