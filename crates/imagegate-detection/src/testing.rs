//! In-memory detection service with call counters.

use crate::traits::{
    BoundingBox, DetectionError, DetectionResult, DetectionService, FaceDetection,
    ModerationLabel,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns fixed detection results and counts how often it was called.
#[derive(Debug, Default)]
pub struct StaticDetectionService {
    faces: Vec<FaceDetection>,
    labels: Vec<ModerationLabel>,
    delay: Option<Duration>,
    fail: bool,
    face_calls: AtomicUsize,
    label_calls: AtomicUsize,
}

impl StaticDetectionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_face(mut self, left: f32, top: f32, width: f32, height: f32) -> Self {
        self.faces.push(FaceDetection {
            bounding_box: BoundingBox {
                left,
                top,
                width,
                height,
            },
            confidence: 99.0,
        });
        self
    }

    pub fn with_label(mut self, name: &str, confidence: f32) -> Self {
        self.labels.push(ModerationLabel {
            name: name.to_string(),
            parent_name: None,
            confidence,
        });
        self
    }

    /// Delay every call, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn face_calls(&self) -> usize {
        self.face_calls.load(Ordering::SeqCst)
    }

    pub fn label_calls(&self) -> usize {
        self.label_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) -> DetectionResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(DetectionError::RequestFailed("static failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DetectionService for StaticDetectionService {
    async fn detect_faces(&self, _image: Bytes) -> DetectionResult<Vec<FaceDetection>> {
        self.face_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        Ok(self.faces.clone())
    }

    async fn detect_moderation_labels(&self, _image: Bytes) -> DetectionResult<Vec<ModerationLabel>> {
        self.label_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await?;
        Ok(self.labels.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_calls() {
        let service = StaticDetectionService::new().with_face(0.1, 0.1, 0.2, 0.2);
        let faces = service.detect_faces(Bytes::new()).await.unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(service.face_calls(), 1);
        assert_eq!(service.label_calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_service() {
        let service = StaticDetectionService::new().failing();
        assert!(service.detect_moderation_labels(Bytes::new()).await.is_err());
        assert_eq!(service.label_calls(), 1);
    }
}
