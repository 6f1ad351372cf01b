//! Imagegate Detection Library
//!
//! Face and moderation-label detection used by smart crop and content
//! moderation. The pipeline depends only on the [`DetectionService`] trait;
//! AWS Rekognition is the production backend.

pub mod disabled;
pub mod factory;
#[cfg(feature = "rekognition")]
pub mod rekognition;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;

// Re-export commonly used types
pub use disabled::DisabledDetectionService;
pub use factory::create_detection_service;
#[cfg(feature = "rekognition")]
pub use rekognition::RekognitionDetectionService;
pub use traits::{
    BoundingBox, DetectionError, DetectionResult, DetectionService, FaceDetection,
    ModerationLabel,
};
