use crate::traits::{
    BoundingBox, DetectionError, DetectionResult, DetectionService, FaceDetection,
    ModerationLabel,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::Image;
use aws_sdk_rekognition::Client as RekognitionClient;
use bytes::Bytes;
use std::fmt::{Debug, Formatter, Result as FmtResult};

/// AWS Rekognition detection backend
#[derive(Clone)]
pub struct RekognitionDetectionService {
    client: RekognitionClient,
}

impl Debug for RekognitionDetectionService {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RekognitionDetectionService").finish()
    }
}

impl RekognitionDetectionService {
    /// Create a Rekognition client, using the default region chain when `region` is `None`.
    pub async fn new(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let config = loader.load().await;

        Self {
            client: RekognitionClient::new(&config),
        }
    }

    fn image(image: Bytes) -> Image {
        Image::builder().bytes(Blob::new(image.to_vec())).build()
    }
}

#[async_trait]
impl DetectionService for RekognitionDetectionService {
    async fn detect_faces(&self, image: Bytes) -> DetectionResult<Vec<FaceDetection>> {
        let response = self
            .client
            .detect_faces()
            .image(Self::image(image))
            .send()
            .await
            .map_err(|e| DetectionError::RequestFailed(DisplayErrorContext(&e).to_string()))?;

        let faces = response
            .face_details()
            .iter()
            .filter_map(|face| {
                let bbox = face.bounding_box()?;
                Some(FaceDetection {
                    bounding_box: BoundingBox {
                        left: bbox.left().unwrap_or(0.0),
                        top: bbox.top().unwrap_or(0.0),
                        width: bbox.width().unwrap_or(0.0),
                        height: bbox.height().unwrap_or(0.0),
                    },
                    confidence: face.confidence().unwrap_or(0.0),
                })
            })
            .collect::<Vec<_>>();

        tracing::debug!(faces = faces.len(), "Rekognition face detection complete");
        Ok(faces)
    }

    async fn detect_moderation_labels(&self, image: Bytes) -> DetectionResult<Vec<ModerationLabel>> {
        let response = self
            .client
            .detect_moderation_labels()
            .image(Self::image(image))
            .send()
            .await
            .map_err(|e| DetectionError::RequestFailed(DisplayErrorContext(&e).to_string()))?;

        let labels = response
            .moderation_labels()
            .iter()
            .map(|label| ModerationLabel {
                name: label.name().unwrap_or("Unknown").to_string(),
                parent_name: label
                    .parent_name()
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
                confidence: label.confidence().unwrap_or(0.0),
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            labels = labels.len(),
            "Rekognition moderation detection complete"
        );
        Ok(labels)
    }

    fn name(&self) -> &'static str {
        "rekognition"
    }
}
