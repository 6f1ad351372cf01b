//! Imagegate Core Library
//!
//! This crate provides the request model, error taxonomy, configuration, and the
//! two pure front stages of the image pipeline: resolving an inbound event into a
//! [`RequestDescriptor`] and compiling its edit intent into an [`EditPlan`].

pub mod config;
pub mod edit_plan;
pub mod error;
pub mod models;
pub mod request;
pub mod storage_types;

// Re-export commonly used types
pub use config::{HandlerConfig, RewriteRule};
pub use edit_plan::{EditPlanCompiler, MAX_DIMENSION, MAX_PIXELS};
pub use error::{ErrorInfo, ErrorMetadata, ImageHandlerError, LogLevel, SourceFetchFailure};
pub use models::{
    CropRect, Dialect, EditOperation, EditPlan, FrontDoor, InboundEvent, OutputFormat,
    OverlayOffset, OverlaySpec, RawEditSpec, RequestDescriptor, ResizeFit, ResizeSpec,
    ResponseEnvelope, RgbaColor, ThumborSegment,
};
pub use request::RequestResolver;
pub use storage_types::StorageBackend;
