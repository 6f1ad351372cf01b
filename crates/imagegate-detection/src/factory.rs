use crate::{DetectionService, DisabledDetectionService};
use imagegate_core::HandlerConfig;
use std::sync::Arc;

/// Create the detection backend selected by configuration
pub async fn create_detection_service(config: &HandlerConfig) -> Arc<dyn DetectionService> {
    if !config.detection_enabled {
        tracing::info!("Detection disabled; smart crop and content moderation will fail");
        return Arc::new(DisabledDetectionService);
    }

    #[cfg(feature = "rekognition")]
    let service: Arc<dyn DetectionService> =
        Arc::new(crate::RekognitionDetectionService::new(config.aws_region.clone()).await);

    #[cfg(not(feature = "rekognition"))]
    let service: Arc<dyn DetectionService> = {
        tracing::warn!("Detection enabled but no backend compiled in (rekognition feature)");
        Arc::new(DisabledDetectionService)
    };

    service
}
