//! Edit plan compilation
//!
//! Validates the edit intent carried by a [`RequestDescriptor`] and produces an
//! ordered [`EditPlan`]. Validation is fail-closed: unknown operations and
//! malformed parameters are rejected as `InvalidEdits`.

mod default;
mod thumbor;

use std::sync::Arc;

use crate::config::HandlerConfig;
use crate::error::ImageHandlerError;
use crate::models::{
    Dialect, EditOperation, EditPlan, OutputFormat, RawEditSpec, RequestDescriptor,
};

/// Largest width or height a resize may request.
pub const MAX_DIMENSION: u32 = 16_384;

/// Largest pixel count any intermediate or output buffer may reach.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Accepted sigma range for blur and sharpen, in both dialects.
pub(crate) const MIN_BLUR_SIGMA: f64 = 0.3;
pub(crate) const MAX_BLUR_SIGMA: f64 = 1000.0;

pub struct EditPlanCompiler {
    config: Arc<HandlerConfig>,
}

impl EditPlanCompiler {
    pub fn new(config: Arc<HandlerConfig>) -> Self {
        Self { config }
    }

    pub fn compile(&self, descriptor: &RequestDescriptor) -> Result<EditPlan, ImageHandlerError> {
        let mut operations = match (&descriptor.dialect, &descriptor.raw_edits) {
            (Dialect::Custom, _) | (_, RawEditSpec::None) => Vec::new(),
            (_, RawEditSpec::Json(edits)) => {
                default::compile_edits(edits, &descriptor.bucket, &self.config)?
            }
            (_, RawEditSpec::Thumbor(segments)) => {
                thumbor::compile_segments(segments, &descriptor.bucket, &self.config)?
            }
        };

        if let Some(format) = &descriptor.output_format {
            let target = format
                .parse::<OutputFormat>()
                .map_err(ImageHandlerError::InvalidEdits)?;
            operations.push(EditOperation::Format {
                target: Some(target),
                quality: None,
            });
        }

        let mut plan = EditPlan::new(operations);
        plan.headers = descriptor.headers.clone();

        if self.config.auto_webp
            && descriptor.accepts_webp
            && descriptor.dialect != Dialect::Custom
            && plan.target_format().is_none()
        {
            plan.operations.push(EditOperation::Format {
                target: Some(OutputFormat::WebP),
                quality: None,
            });
        }

        tracing::debug!(
            dialect = %descriptor.dialect,
            operations = ?plan.operation_names(),
            "Compiled edit plan"
        );

        Ok(plan)
    }
}

/// Check a resize dimension.
pub(crate) fn check_dimension(name: &str, value: u32) -> Result<u32, ImageHandlerError> {
    if value == 0 || value > MAX_DIMENSION {
        return Err(ImageHandlerError::invalid_edits(format!(
            "{} must be between 1 and {}",
            name, MAX_DIMENSION
        )));
    }
    Ok(value)
}

/// Check a blur or sharpen sigma.
pub(crate) fn check_sigma(name: &str, sigma: f64) -> Result<f32, ImageHandlerError> {
    if !(MIN_BLUR_SIGMA..=MAX_BLUR_SIGMA).contains(&sigma) {
        return Err(ImageHandlerError::invalid_edits(format!(
            "{} must be between {} and {}",
            name, MIN_BLUR_SIGMA, MAX_BLUR_SIGMA
        )));
    }
    Ok(sigma as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResizeFit, ResizeSpec, ThumborSegment};
    use serde_json::json;

    fn compiler(auto_webp: bool) -> EditPlanCompiler {
        EditPlanCompiler::new(Arc::new(HandlerConfig {
            source_buckets: vec!["images".to_string()],
            auto_webp,
            ..Default::default()
        }))
    }

    fn json_descriptor(edits: serde_json::Value) -> RequestDescriptor {
        let mut descriptor = RequestDescriptor::new("images", "cat.png", Dialect::Default);
        if let serde_json::Value::Object(map) = edits {
            descriptor.raw_edits = RawEditSpec::Json(map);
        }
        descriptor
    }

    #[test]
    fn test_output_format_appends_trailing_format() {
        let mut descriptor = json_descriptor(json!({"grayscale": true}));
        descriptor.output_format = Some("png".to_string());
        let plan = compiler(false).compile(&descriptor).unwrap();
        assert_eq!(
            plan.operations,
            vec![
                EditOperation::Grayscale,
                EditOperation::Format {
                    target: Some(OutputFormat::Png),
                    quality: None
                }
            ]
        );
    }

    #[test]
    fn test_unknown_output_format_is_invalid_edits() {
        let mut descriptor = json_descriptor(json!({}));
        descriptor.output_format = Some("bmp".to_string());
        assert!(matches!(
            compiler(false).compile(&descriptor),
            Err(ImageHandlerError::InvalidEdits(_))
        ));
    }

    #[test]
    fn test_custom_dialect_compiles_to_empty_plan() {
        let descriptor = RequestDescriptor::new("images", "cat.png", Dialect::Custom);
        let plan = compiler(true).compile(&descriptor).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_scenario_b_thumbor_plan() {
        let mut descriptor = RequestDescriptor::new("images", "cat.png", Dialect::Thumbor);
        descriptor.raw_edits = RawEditSpec::Thumbor(vec![
            ThumborSegment::FitIn,
            ThumborSegment::Size {
                width: "200".to_string(),
                height: "200".to_string(),
            },
            ThumborSegment::Filter {
                name: "grayscale".to_string(),
                args: vec![],
            },
        ]);
        let plan = compiler(false).compile(&descriptor).unwrap();
        assert_eq!(
            plan.operations,
            vec![
                EditOperation::Resize(ResizeSpec::new(Some(200), Some(200), ResizeFit::Inside)),
                EditOperation::Grayscale,
            ]
        );
    }

    #[test]
    fn test_auto_webp_only_without_explicit_format() {
        let mut descriptor = json_descriptor(json!({"flip": true}));
        descriptor.accepts_webp = true;
        let plan = compiler(true).compile(&descriptor).unwrap();
        assert_eq!(plan.target_format(), Some(OutputFormat::WebP));

        descriptor.output_format = Some("png".to_string());
        let plan = compiler(true).compile(&descriptor).unwrap();
        assert_eq!(plan.target_format(), Some(OutputFormat::Png));
        assert_eq!(plan.operations.len(), 2);

        descriptor.output_format = None;
        descriptor.accepts_webp = false;
        let plan = compiler(true).compile(&descriptor).unwrap();
        assert_eq!(plan.target_format(), None);
    }

    #[test]
    fn test_headers_carried_into_plan() {
        let mut descriptor = json_descriptor(json!({}));
        descriptor
            .headers
            .insert("Cache-Control".to_string(), "no-cache".to_string());
        let plan = compiler(false).compile(&descriptor).unwrap();
        assert_eq!(plan.headers.get("Cache-Control").map(String::as_str), Some("no-cache"));
    }
}
