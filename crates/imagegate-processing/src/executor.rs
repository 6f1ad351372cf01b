//! Runs a resolved edit plan against the source pixels

use crate::encode::ImageEncoder;
use crate::image::{ImageCrop, ImageFilters, ImageOrientation, ImageResize, Overlay};
use crate::metadata::ImageProbe;
use bytes::Bytes;
use imagegate_core::{EditOperation, EditPlan, HandlerConfig, ImageHandlerError, OutputFormat};
use std::collections::HashMap;
use std::time::Instant;

/// Overlay image bytes keyed by `(bucket, key)`
pub type OverlayAssets = HashMap<(String, String), Bytes>;

/// Fallback content type for passthrough bytes nobody could identify
const OCTET_STREAM: &str = "application/octet-stream";

/// Source object as fetched from storage
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub bytes: Bytes,
    /// Content type recorded by the object store
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub bytes: Bytes,
    pub content_type: String,
}

pub struct TransformExecutor {
    default_quality: u8,
}

impl TransformExecutor {
    pub fn new(config: &HandlerConfig) -> Self {
        Self {
            default_quality: config.default_quality,
        }
    }

    /// Apply `plan` to `source`.
    ///
    /// Blocking: decoding, pixel work and encoding all happen on the calling thread.
    pub fn execute(
        &self,
        plan: &EditPlan,
        source: &SourceImage,
        overlays: &OverlayAssets,
    ) -> Result<ExecutionOutput, ImageHandlerError> {
        if plan.is_empty() {
            return Ok(Self::passthrough(source));
        }

        let start = Instant::now();
        let source_format = ImageProbe::sniff_format(&source.bytes);
        let mut img = ImageOrientation::decode_upright(&source.bytes)?;
        let mut target = None;
        let mut quality = None;

        for op in &plan.operations {
            img = match op {
                EditOperation::Resize(spec) => ImageResize::apply(img, spec)?,
                EditOperation::Rotate { degrees } => ImageOrientation::rotate(img, *degrees)?,
                EditOperation::Flip => ImageOrientation::flip(img),
                EditOperation::Flop => ImageOrientation::flop(img),
                EditOperation::Grayscale => ImageFilters::apply_grayscale(img),
                EditOperation::Negate => ImageFilters::apply_negate(img),
                EditOperation::Blur { sigma } => ImageFilters::apply_blur(img, *sigma),
                EditOperation::Sharpen { sigma } => ImageFilters::apply_sharpen(img, *sigma),
                EditOperation::Crop(rect) => ImageCrop::apply(img, rect)?,
                EditOperation::Format {
                    target: op_target,
                    quality: op_quality,
                } => {
                    target = op_target.or(target);
                    quality = op_quality.or(quality);
                    img
                }
                EditOperation::Overlay(spec) => {
                    let data = overlays
                        .get(&(spec.bucket.clone(), spec.key.clone()))
                        .ok_or_else(|| {
                            ImageHandlerError::Internal(format!(
                                "Overlay {}/{} was not fetched",
                                spec.bucket, spec.key
                            ))
                        })?;
                    Overlay::apply(img, data, spec)?
                }
                EditOperation::SmartCrop { .. } | EditOperation::ContentModeration { .. } => {
                    return Err(ImageHandlerError::Internal(format!(
                        "Operation '{}' reached the executor unresolved",
                        op.name()
                    )));
                }
            };
        }

        let format = match target {
            Some(format) => format,
            None => Self::native_format(source_format)?,
        };
        let bytes = ImageEncoder::encode(&img, format, quality.unwrap_or(self.default_quality))?;

        tracing::debug!(
            operations = ?plan.operation_names(),
            format = %format,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Executed edit plan"
        );

        Ok(ExecutionOutput {
            bytes,
            content_type: format.content_type().to_string(),
        })
    }

    fn passthrough(source: &SourceImage) -> ExecutionOutput {
        let content_type = ImageProbe::content_type(&source.bytes)
            .map(str::to_string)
            .or_else(|| source.content_type.clone())
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        ExecutionOutput {
            bytes: source.bytes.clone(),
            content_type,
        }
    }

    fn native_format(
        source_format: Option<image::ImageFormat>,
    ) -> Result<OutputFormat, ImageHandlerError> {
        source_format
            .and_then(ImageProbe::output_format)
            .ok_or_else(|| {
                ImageHandlerError::UnsupportedFormat(match source_format {
                    Some(format) => format!("{:?}", format),
                    None => "unknown".to_string(),
                })
            })
    }
}
