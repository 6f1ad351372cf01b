//! Imagegate processing
//!
//! The two back stages of the pipeline: resolving detection-dependent operations
//! ([`Enricher`]) and running an edit plan against decoded pixels
//! ([`TransformExecutor`]).

pub mod encode;
pub mod enrichment;
pub mod executor;
pub mod image;
pub mod metadata;

pub use encode::ImageEncoder;
pub use enrichment::Enricher;
pub use executor::{ExecutionOutput, OverlayAssets, SourceImage, TransformExecutor};
pub use metadata::{ImageProbe, SourceInfo};
