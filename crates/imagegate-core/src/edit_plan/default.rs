//! Compilation of JSON edit objects.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{check_dimension, check_sigma, MAX_BLUR_SIGMA, MIN_BLUR_SIGMA};
use crate::config::HandlerConfig;
use crate::error::ImageHandlerError;
use crate::models::{
    CropRect, EditOperation, OutputFormat, OverlayOffset, OverlaySpec, ResizeFit, ResizeSpec,
    RgbaColor,
};

const DEFAULT_BLUR_SIGMA: f32 = 1.0;
const DEFAULT_SHARPEN_SIGMA: f32 = 1.0;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ResizeEdit {
    width: Option<Value>,
    height: Option<Value>,
    fit: Option<String>,
    background: Option<Value>,
    without_enlargement: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExtractEdit {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FormatEdit {
    format: Option<String>,
    quality: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OverlayPosition {
    left: Option<Value>,
    top: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct OverlayEdit {
    bucket: Option<String>,
    key: String,
    alpha: Option<f32>,
    w_ratio: Option<f32>,
    h_ratio: Option<f32>,
    #[serde(default)]
    options: OverlayPosition,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct SmartCropEdit {
    face_index: Option<usize>,
    padding: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ModerationEdit {
    min_confidence: Option<f32>,
    blur: Option<f32>,
    #[serde(default)]
    moderation_labels: Vec<String>,
}

/// Compile a JSON edits object. Key order is application order.
pub(crate) fn compile_edits(
    edits: &Map<String, Value>,
    source_bucket: &str,
    config: &HandlerConfig,
) -> Result<Vec<EditOperation>, ImageHandlerError> {
    let mut operations = Vec::with_capacity(edits.len());

    for (name, value) in edits {
        let operation = match name.as_str() {
            "resize" => Some(compile_resize(value)?),
            "rotate" => compile_rotate(value)?,
            "flip" => flag(name, value)?.then_some(EditOperation::Flip),
            "flop" => flag(name, value)?.then_some(EditOperation::Flop),
            "grayscale" | "greyscale" => flag(name, value)?.then_some(EditOperation::Grayscale),
            "negate" => flag(name, value)?.then_some(EditOperation::Negate),
            "blur" => compile_blur(value)?,
            "sharpen" => compile_sharpen(value)?,
            "extract" | "crop" => Some(compile_extract(name, value)?),
            "toFormat" => Some(compile_format(value)?),
            "overlayWith" => Some(compile_overlay(value, source_bucket, config)?),
            "smartCrop" => compile_smart_crop(value)?,
            "contentModeration" => compile_moderation(value)?,
            other => {
                return Err(ImageHandlerError::invalid_edits(format!(
                    "Unknown edit operation '{}'",
                    other
                )))
            }
        };
        operations.extend(operation);
    }

    Ok(operations)
}

fn parse<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, ImageHandlerError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ImageHandlerError::invalid_edits(format!("Invalid '{}' edit: {}", name, e)))
}

fn flag(name: &str, value: &Value) -> Result<bool, ImageHandlerError> {
    value.as_bool().ok_or_else(|| {
        ImageHandlerError::invalid_edits(format!("'{}' must be true or false", name))
    })
}

/// Accepts numbers and numeric strings; fractional values are rounded.
fn number(name: &str, value: &Value) -> Result<f64, ImageHandlerError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| ImageHandlerError::invalid_edits(format!("'{}' must be a number", name)))
}

fn dimension(name: &str, value: Option<&Value>) -> Result<Option<u32>, ImageHandlerError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let n = number(name, value)?.round();
            if n < 1.0 || n > f64::from(u32::MAX) {
                return Err(ImageHandlerError::invalid_edits(format!(
                    "{} must be a positive integer",
                    name
                )));
            }
            check_dimension(name, n as u32).map(Some)
        }
    }
}

fn color(value: &Value) -> Result<RgbaColor, ImageHandlerError> {
    let invalid = || ImageHandlerError::invalid_edits("Invalid resize background color");
    match value {
        Value::String(s) => RgbaColor::parse(s).ok_or_else(invalid),
        Value::Object(map) => {
            let channel = |key: &str| -> Result<u8, ImageHandlerError> {
                match map.get(key) {
                    None => Ok(0),
                    Some(v) => v
                        .as_u64()
                        .filter(|c| *c <= 255)
                        .map(|c| c as u8)
                        .ok_or_else(invalid),
                }
            };
            let alpha = match map.get("alpha") {
                None => 255,
                Some(v) => v
                    .as_f64()
                    .filter(|a| (0.0..=1.0).contains(a))
                    .map(|a| (a * 255.0).round() as u8)
                    .ok_or_else(invalid)?,
            };
            Ok(RgbaColor([channel("r")?, channel("g")?, channel("b")?, alpha]))
        }
        _ => Err(invalid()),
    }
}

fn compile_resize(value: &Value) -> Result<EditOperation, ImageHandlerError> {
    let edit: ResizeEdit = parse("resize", value)?;
    let width = dimension("width", edit.width.as_ref())?;
    let height = dimension("height", edit.height.as_ref())?;
    if width.is_none() && height.is_none() {
        return Err(ImageHandlerError::invalid_edits(
            "Resize requires a width or a height",
        ));
    }

    let fit = match edit.fit {
        Some(fit) => fit.parse::<ResizeFit>().map_err(ImageHandlerError::InvalidEdits)?,
        None => ResizeFit::default(),
    };

    let mut spec = ResizeSpec::new(width, height, fit);
    spec.background = edit.background.as_ref().map(color).transpose()?;
    spec.without_enlargement = edit.without_enlargement.unwrap_or(false);
    Ok(EditOperation::Resize(spec))
}

fn compile_rotate(value: &Value) -> Result<Option<EditOperation>, ImageHandlerError> {
    if value.is_null() {
        return Ok(None);
    }
    let degrees = number("rotate", value)?;
    Ok(Some(EditOperation::Rotate {
        degrees: degrees as f32,
    }))
}

fn compile_blur(value: &Value) -> Result<Option<EditOperation>, ImageHandlerError> {
    match value {
        Value::Bool(false) => Ok(None),
        Value::Bool(true) => Ok(Some(EditOperation::Blur {
            sigma: DEFAULT_BLUR_SIGMA,
        })),
        other => {
            let sigma = check_sigma("blur", number("blur", other)?)?;
            Ok(Some(EditOperation::Blur { sigma }))
        }
    }
}

fn compile_sharpen(value: &Value) -> Result<Option<EditOperation>, ImageHandlerError> {
    let sigma = match value {
        Value::Bool(false) => return Ok(None),
        Value::Bool(true) => f64::from(DEFAULT_SHARPEN_SIGMA),
        Value::Object(map) => match map.get("sigma") {
            Some(sigma) if map.len() == 1 => number("sharpen.sigma", sigma)?,
            _ => {
                return Err(ImageHandlerError::invalid_edits(
                    "sharpen accepts only a 'sigma' option",
                ))
            }
        },
        other => number("sharpen", other)?,
    };
    let sigma = check_sigma("sharpen sigma", sigma)?;
    Ok(Some(EditOperation::Sharpen { sigma }))
}

fn compile_extract(name: &str, value: &Value) -> Result<EditOperation, ImageHandlerError> {
    let edit: ExtractEdit = parse(name, value)?;
    if edit.width == 0 || edit.height == 0 {
        return Err(ImageHandlerError::invalid_edits(format!(
            "'{}' width and height must be positive",
            name
        )));
    }
    Ok(EditOperation::Crop(CropRect::new(
        edit.left,
        edit.top,
        edit.width,
        edit.height,
    )))
}

fn compile_format(value: &Value) -> Result<EditOperation, ImageHandlerError> {
    let edit = match value {
        Value::String(format) => FormatEdit {
            format: Some(format.clone()),
            quality: None,
        },
        other => parse::<FormatEdit>("toFormat", other)?,
    };

    let target = edit
        .format
        .map(|f| f.parse::<OutputFormat>())
        .transpose()
        .map_err(ImageHandlerError::InvalidEdits)?;

    if let Some(quality) = edit.quality {
        if !(1..=100).contains(&quality) {
            return Err(ImageHandlerError::invalid_edits(
                "quality must be between 1 and 100",
            ));
        }
    }

    Ok(EditOperation::Format {
        target,
        quality: edit.quality,
    })
}

fn offset(name: &str, value: Option<&Value>) -> Result<Option<OverlayOffset>, ImageHandlerError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|px| Some(OverlayOffset::Pixels(px)))
            .ok_or_else(|| ImageHandlerError::invalid_edits(format!("Invalid overlay {}", name))),
        Some(Value::String(s)) => OverlayOffset::parse(s).map_err(ImageHandlerError::InvalidEdits),
        Some(_) => Err(ImageHandlerError::invalid_edits(format!(
            "Invalid overlay {}",
            name
        ))),
    }
}

fn ratio(name: &str, value: Option<f32>) -> Result<Option<f32>, ImageHandlerError> {
    match value {
        Some(r) if !(r > 0.0 && r <= 100.0) => Err(ImageHandlerError::invalid_edits(format!(
            "{} must be greater than 0 and at most 100",
            name
        ))),
        other => Ok(other),
    }
}

fn compile_overlay(
    value: &Value,
    source_bucket: &str,
    config: &HandlerConfig,
) -> Result<EditOperation, ImageHandlerError> {
    let edit: OverlayEdit = parse("overlayWith", value)?;
    let bucket = edit.bucket.unwrap_or_else(|| source_bucket.to_string());
    if !config.is_bucket_allowed(&bucket) {
        return Err(ImageHandlerError::InvalidBucket { bucket });
    }
    if edit.key.trim().is_empty() {
        return Err(ImageHandlerError::invalid_edits("overlayWith requires a key"));
    }

    let alpha = edit.alpha.unwrap_or(0.0);
    if !(0.0..=100.0).contains(&alpha) {
        return Err(ImageHandlerError::invalid_edits(
            "overlay alpha must be between 0 and 100",
        ));
    }

    Ok(EditOperation::Overlay(OverlaySpec {
        bucket,
        key: edit.key,
        left: offset("left", edit.options.left.as_ref())?,
        top: offset("top", edit.options.top.as_ref())?,
        alpha,
        width_ratio: ratio("wRatio", edit.w_ratio)?,
        height_ratio: ratio("hRatio", edit.h_ratio)?,
    }))
}

fn compile_smart_crop(value: &Value) -> Result<Option<EditOperation>, ImageHandlerError> {
    let edit = match value {
        Value::Bool(false) => return Ok(None),
        Value::Bool(true) => SmartCropEdit::default(),
        other => parse::<SmartCropEdit>("smartCrop", other)?,
    };
    if edit.padding.is_some_and(|p| !(0.0..=100.0).contains(&p)) {
        return Err(ImageHandlerError::invalid_edits(
            "smartCrop padding must be between 0 and 100",
        ));
    }
    Ok(Some(EditOperation::SmartCrop {
        face_index: edit.face_index,
        padding_percent: edit.padding,
    }))
}

fn compile_moderation(value: &Value) -> Result<Option<EditOperation>, ImageHandlerError> {
    let edit = match value {
        Value::Bool(false) => return Ok(None),
        Value::Bool(true) => ModerationEdit::default(),
        other => parse::<ModerationEdit>("contentModeration", other)?,
    };
    if edit
        .min_confidence
        .is_some_and(|c| !(0.0..=100.0).contains(&c))
    {
        return Err(ImageHandlerError::invalid_edits(
            "contentModeration minConfidence must be between 0 and 100",
        ));
    }
    if edit
        .blur
        .is_some_and(|b| !(MIN_BLUR_SIGMA as f32..=MAX_BLUR_SIGMA as f32).contains(&b))
    {
        return Err(ImageHandlerError::invalid_edits(format!(
            "contentModeration blur must be between {} and {}",
            MIN_BLUR_SIGMA, MAX_BLUR_SIGMA
        )));
    }
    Ok(Some(EditOperation::ContentModeration {
        min_confidence: edit.min_confidence,
        blur: edit.blur,
        labels: edit.moderation_labels,
    }))
}
