use crate::traits::{DetectionError, DetectionResult, DetectionService, FaceDetection, ModerationLabel};
use async_trait::async_trait;
use bytes::Bytes;

/// Backend used when detection is switched off; every call fails.
#[derive(Debug, Clone, Default)]
pub struct DisabledDetectionService;

#[async_trait]
impl DetectionService for DisabledDetectionService {
    async fn detect_faces(&self, _image: Bytes) -> DetectionResult<Vec<FaceDetection>> {
        Err(DetectionError::Disabled)
    }

    async fn detect_moderation_labels(&self, _image: Bytes) -> DetectionResult<Vec<ModerationLabel>> {
        Err(DetectionError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
