//! Detection-backed resolution of pending edit operations
//!
//! `SmartCrop` and `ContentModeration` cannot run on pixels directly: they need
//! face boxes or moderation labels. The [`Enricher`] fetches each kind of result at
//! most once, concurrently when both are needed, and rewrites the pending
//! operations in place into plain `Crop` and `Blur` steps.

use bytes::Bytes;
use imagegate_core::{CropRect, EditOperation, EditPlan, HandlerConfig, ImageHandlerError};
use imagegate_detection::{DetectionResult, DetectionService, FaceDetection, ModerationLabel};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct Enricher {
    detection: Arc<dyn DetectionService>,
    timeout: Duration,
    default_padding_percent: f32,
    default_min_confidence: f32,
    default_blur: f32,
}

impl Enricher {
    pub fn new(config: &HandlerConfig, detection: Arc<dyn DetectionService>) -> Self {
        Self {
            detection,
            timeout: Duration::from_millis(config.detection_timeout_ms),
            default_padding_percent: config.smart_crop_padding_percent,
            default_min_confidence: config.moderation_min_confidence,
            default_blur: config.moderation_blur,
        }
    }

    /// Resolve every pending operation of `plan`.
    ///
    /// `dimensions` are the upright source dimensions that face boxes are scaled to.
    pub async fn enrich(
        &self,
        plan: EditPlan,
        source: &Bytes,
        dimensions: (u32, u32),
    ) -> Result<EditPlan, ImageHandlerError> {
        let needs_faces = plan.needs_faces();
        let needs_labels = plan.needs_labels();
        if !needs_faces && !needs_labels {
            return Ok(plan);
        }

        tracing::debug!(
            backend = self.detection.name(),
            faces = needs_faces,
            labels = needs_labels,
            "Running detection"
        );

        let faces = async {
            if !needs_faces {
                return Ok(Vec::new());
            }
            self.with_timeout("face", self.detection.detect_faces(source.clone()))
                .await
        };
        let labels = async {
            if !needs_labels {
                return Ok(Vec::new());
            }
            self.with_timeout(
                "moderation label",
                self.detection.detect_moderation_labels(source.clone()),
            )
            .await
        };
        let (faces, labels) = tokio::try_join!(faces, labels)?;

        let EditPlan {
            operations,
            headers,
        } = plan;
        let operations = operations
            .into_iter()
            .filter_map(|op| match op {
                EditOperation::SmartCrop {
                    face_index,
                    padding_percent,
                } => Some(self.resolve_smart_crop(
                    &faces,
                    face_index.unwrap_or(0),
                    padding_percent.unwrap_or(self.default_padding_percent),
                    dimensions,
                )),
                EditOperation::ContentModeration {
                    min_confidence,
                    blur,
                    labels: wanted,
                } => self.resolve_moderation(&labels, min_confidence, blur, &wanted),
                other => Some(other),
            })
            .collect();

        Ok(EditPlan {
            operations,
            headers,
        })
    }

    async fn with_timeout<T, F>(&self, what: &str, call: F) -> Result<T, ImageHandlerError>
    where
        F: Future<Output = DetectionResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(ImageHandlerError::DetectionFailure(format!(
                "{} detection failed: {}",
                what, e
            ))),
            Err(_) => Err(ImageHandlerError::DetectionFailure(format!(
                "{} detection timed out after {} ms",
                what,
                self.timeout.as_millis()
            ))),
        }
    }

    fn resolve_smart_crop(
        &self,
        faces: &[FaceDetection],
        face_index: usize,
        padding_percent: f32,
        (width, height): (u32, u32),
    ) -> EditOperation {
        let Some(face) = faces.get(face_index) else {
            tracing::warn!(
                face_index = face_index,
                faces_found = faces.len(),
                "Face index out of range, smart crop keeps the full image"
            );
            return EditOperation::Crop(
                CropRect::new(0, 0, width, height).with_reference(width, height),
            );
        };

        let bbox = face.bounding_box;
        let box_width = bbox.width * width as f32;
        let box_height = bbox.height * height as f32;
        let pad_x = box_width * padding_percent / 100.0;
        let pad_y = box_height * padding_percent / 100.0;

        let left = (bbox.left * width as f32 - pad_x).round().max(0.0);
        let top = (bbox.top * height as f32 - pad_y).round().max(0.0);
        let right = (bbox.left * width as f32 + box_width + pad_x)
            .round()
            .min(width as f32);
        let bottom = (bbox.top * height as f32 + box_height + pad_y)
            .round()
            .min(height as f32);

        let left = (left as u32).min(width.saturating_sub(1));
        let top = (top as u32).min(height.saturating_sub(1));
        let crop_width = (right as u32).saturating_sub(left).max(1);
        let crop_height = (bottom as u32).saturating_sub(top).max(1);

        EditOperation::Crop(
            CropRect::new(left, top, crop_width, crop_height).with_reference(width, height),
        )
    }

    fn resolve_moderation(
        &self,
        labels: &[ModerationLabel],
        min_confidence: Option<f32>,
        blur: Option<f32>,
        wanted: &[String],
    ) -> Option<EditOperation> {
        let threshold = min_confidence.unwrap_or(self.default_min_confidence);
        let flagged = labels.iter().find(|label| {
            label.confidence >= threshold
                && (wanted.is_empty()
                    || wanted.iter().any(|name| {
                        name.eq_ignore_ascii_case(&label.name)
                            || label
                                .parent_name
                                .as_deref()
                                .is_some_and(|parent| name.eq_ignore_ascii_case(parent))
                    }))
        });

        match flagged {
            Some(label) => {
                tracing::info!(
                    label = %label.name,
                    confidence = label.confidence,
                    "Content moderation label found, blurring image"
                );
                Some(EditOperation::Blur {
                    sigma: blur.unwrap_or(self.default_blur),
                })
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagegate_detection::testing::StaticDetectionService;

    fn config() -> HandlerConfig {
        HandlerConfig {
            source_buckets: vec!["images".to_string()],
            detection_timeout_ms: 200,
            ..HandlerConfig::default()
        }
    }

    fn smart_crop(face_index: Option<usize>, padding: Option<f32>) -> EditOperation {
        EditOperation::SmartCrop {
            face_index,
            padding_percent: padding,
        }
    }

    fn moderation(min_confidence: Option<f32>, labels: &[&str]) -> EditOperation {
        EditOperation::ContentModeration {
            min_confidence,
            blur: Some(30.0),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_plan_without_pending_ops_skips_detection() {
        let service = Arc::new(StaticDetectionService::new());
        let enricher = Enricher::new(&config(), service.clone());
        let plan = EditPlan::new(vec![EditOperation::Grayscale]);

        let result = enricher
            .enrich(plan.clone(), &Bytes::new(), (10, 10))
            .await
            .unwrap();
        assert_eq!(result, plan);
        assert_eq!(service.face_calls(), 0);
        assert_eq!(service.label_calls(), 0);
    }

    #[tokio::test]
    async fn test_smart_crop_maps_face_box() {
        let service = Arc::new(StaticDetectionService::new().with_face(0.25, 0.5, 0.5, 0.25));
        let enricher = Enricher::new(&config(), service.clone());
        let plan = EditPlan::new(vec![smart_crop(None, None), EditOperation::Grayscale]);

        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (200, 100))
            .await
            .unwrap();
        assert_eq!(
            result.operations,
            vec![
                EditOperation::Crop(CropRect::new(50, 50, 100, 25).with_reference(200, 100)),
                EditOperation::Grayscale,
            ]
        );
    }

    #[tokio::test]
    async fn test_smart_crop_padding_is_clamped() {
        let service = Arc::new(StaticDetectionService::new().with_face(0.0, 0.0, 0.5, 0.5));
        let enricher = Enricher::new(&config(), service);
        let plan = EditPlan::new(vec![smart_crop(Some(0), Some(20.0))]);

        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (100, 100))
            .await
            .unwrap();
        // 50px box, 10px padding each side, left/top edge clamped at 0
        assert_eq!(
            result.operations,
            vec![EditOperation::Crop(
                CropRect::new(0, 0, 60, 60).with_reference(100, 100)
            )]
        );
    }

    #[tokio::test]
    async fn test_zero_faces_keeps_full_image() {
        let service = Arc::new(StaticDetectionService::new());
        let enricher = Enricher::new(&config(), service.clone());
        let plan = EditPlan::new(vec![smart_crop(Some(2), None)]);

        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (64, 48))
            .await
            .unwrap();
        assert_eq!(
            result.operations,
            vec![EditOperation::Crop(
                CropRect::new(0, 0, 64, 48).with_reference(64, 48)
            )]
        );
        assert_eq!(service.face_calls(), 1);
    }

    #[tokio::test]
    async fn test_faces_detected_once_for_many_crops() {
        let service = Arc::new(
            StaticDetectionService::new()
                .with_face(0.0, 0.0, 0.5, 0.5)
                .with_face(0.5, 0.5, 0.5, 0.5),
        );
        let enricher = Enricher::new(&config(), service.clone());
        let plan = EditPlan::new(vec![smart_crop(Some(0), None), smart_crop(Some(1), None)]);

        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (100, 100))
            .await
            .unwrap();
        assert_eq!(result.operations.len(), 2);
        assert_eq!(
            result.operations[1],
            EditOperation::Crop(CropRect::new(50, 50, 50, 50).with_reference(100, 100))
        );
        assert_eq!(service.face_calls(), 1);
    }

    #[tokio::test]
    async fn test_moderation_blurs_flagged_image() {
        let service = Arc::new(StaticDetectionService::new().with_label("Violence", 90.0));
        let enricher = Enricher::new(&config(), service.clone());
        let plan = EditPlan::new(vec![moderation(Some(80.0), &[]), EditOperation::Negate]);

        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (10, 10))
            .await
            .unwrap();
        assert_eq!(
            result.operations,
            vec![EditOperation::Blur { sigma: 30.0 }, EditOperation::Negate]
        );
    }

    #[tokio::test]
    async fn test_moderation_below_threshold_is_removed() {
        let service = Arc::new(StaticDetectionService::new().with_label("Violence", 60.0));
        let enricher = Enricher::new(&config(), service);
        let plan = EditPlan::new(vec![moderation(None, &[]), EditOperation::Negate]);

        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (10, 10))
            .await
            .unwrap();
        assert_eq!(result.operations, vec![EditOperation::Negate]);
    }

    #[tokio::test]
    async fn test_moderation_restricted_to_requested_labels() {
        let service = Arc::new(StaticDetectionService::new().with_label("Smoking", 99.0));
        let enricher = Enricher::new(&config(), service);

        let plan = EditPlan::new(vec![moderation(None, &["Violence"])]);
        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (10, 10))
            .await
            .unwrap();
        assert!(result.is_empty());

        let plan = EditPlan::new(vec![moderation(None, &["smoking"])]);
        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (10, 10))
            .await
            .unwrap();
        assert_eq!(result.operations, vec![EditOperation::Blur { sigma: 30.0 }]);
    }

    #[tokio::test]
    async fn test_both_detections_run_once() {
        let service = Arc::new(
            StaticDetectionService::new()
                .with_face(0.0, 0.0, 1.0, 1.0)
                .with_label("Violence", 99.0),
        );
        let enricher = Enricher::new(&config(), service.clone());
        let plan = EditPlan::new(vec![
            moderation(None, &[]),
            smart_crop(None, None),
            moderation(None, &[]),
        ]);

        let result = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (10, 10))
            .await
            .unwrap();
        assert_eq!(result.operations.len(), 3);
        assert!(matches!(result.operations[1], EditOperation::Crop(_)));
        assert_eq!(service.face_calls(), 1);
        assert_eq!(service.label_calls(), 1);
    }

    #[tokio::test]
    async fn test_detection_error_maps_to_failure() {
        let service = Arc::new(StaticDetectionService::new().failing());
        let enricher = Enricher::new(&config(), service);
        let plan = EditPlan::new(vec![smart_crop(None, None)]);

        let err = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (10, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ImageHandlerError::DetectionFailure(_)));
    }

    #[tokio::test]
    async fn test_detection_timeout_maps_to_failure() {
        let service =
            Arc::new(StaticDetectionService::new().with_delay(Duration::from_millis(1_000)));
        let enricher = Enricher::new(&config(), service);
        let plan = EditPlan::new(vec![moderation(None, &[])]);

        let err = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (10, 10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_enrichment_is_idempotent() {
        let service = Arc::new(StaticDetectionService::new().with_face(0.1, 0.1, 0.2, 0.2));
        let enricher = Enricher::new(&config(), service);
        let plan = EditPlan::new(vec![smart_crop(None, Some(10.0))]);

        let first = enricher
            .enrich(plan.clone(), &Bytes::from_static(b"img"), (300, 200))
            .await
            .unwrap();
        let second = enricher
            .enrich(plan, &Bytes::from_static(b"img"), (300, 200))
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
