//! Compilation of Thumbor path tokens.
//!
//! Operations come out in a fixed order regardless of token order: crop,
//! smart crop, resize, flips, then filters in the order they appear.

use super::{check_dimension, check_sigma, MIN_BLUR_SIGMA};
use crate::config::HandlerConfig;
use crate::error::ImageHandlerError;
use crate::models::{
    CropRect, EditOperation, OutputFormat, OverlayOffset, OverlaySpec, ResizeFit, ResizeSpec,
    RgbaColor, ThumborSegment,
};

/// One axis of a `WxH` token.
struct Axis {
    size: Option<u32>,
    mirrored: bool,
}

fn parse_axis(name: &str, raw: &str) -> Result<Axis, ImageHandlerError> {
    let mirrored = raw.starts_with('-');
    let digits = raw.trim_start_matches('-');
    let size = if digits.is_empty() {
        None
    } else {
        let value = digits.parse::<u32>().map_err(|_| {
            ImageHandlerError::invalid_edits(format!("{} '{}' is out of range", name, raw))
        })?;
        if value == 0 {
            None
        } else {
            Some(check_dimension(name, value)?)
        }
    };
    Ok(Axis { size, mirrored })
}

fn arg<'a>(name: &str, args: &'a [String], index: usize) -> Result<&'a str, ImageHandlerError> {
    args.get(index).map(String::as_str).ok_or_else(|| {
        ImageHandlerError::invalid_edits(format!("Filter '{}' is missing an argument", name))
    })
}

fn number_arg(name: &str, args: &[String], index: usize) -> Result<f32, ImageHandlerError> {
    let raw = arg(name, args, index)?;
    raw.parse::<f32>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| {
            ImageHandlerError::invalid_edits(format!(
                "Filter '{}' expects a number, got '{}'",
                name, raw
            ))
        })
}

fn optional_ratio(name: &str, args: &[String], index: usize) -> Result<Option<f32>, ImageHandlerError> {
    match args.get(index).map(String::as_str) {
        None | Some("none") | Some("") => Ok(None),
        Some(_) => {
            let r = number_arg(name, args, index)?;
            if r > 0.0 && r <= 100.0 {
                Ok(Some(r))
            } else {
                Err(ImageHandlerError::invalid_edits(
                    "watermark ratios must be greater than 0 and at most 100",
                ))
            }
        }
    }
}

fn expect_no_args(name: &str, args: &[String]) -> Result<(), ImageHandlerError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ImageHandlerError::invalid_edits(format!(
            "Filter '{}' takes no arguments",
            name
        )))
    }
}

fn watermark(
    args: &[String],
    source_bucket: &str,
    config: &HandlerConfig,
) -> Result<EditOperation, ImageHandlerError> {
    let name = "watermark";
    let bucket = match arg(name, args, 0)? {
        "" => source_bucket.to_string(),
        bucket => bucket.to_string(),
    };
    if !config.is_bucket_allowed(&bucket) {
        return Err(ImageHandlerError::InvalidBucket { bucket });
    }
    let key = arg(name, args, 1)?.to_string();
    let left = OverlayOffset::parse(arg(name, args, 2)?).map_err(ImageHandlerError::InvalidEdits)?;
    let top = OverlayOffset::parse(arg(name, args, 3)?).map_err(ImageHandlerError::InvalidEdits)?;
    let alpha = number_arg(name, args, 4)?;
    if !(0.0..=100.0).contains(&alpha) {
        return Err(ImageHandlerError::invalid_edits(
            "watermark alpha must be between 0 and 100",
        ));
    }

    Ok(EditOperation::Overlay(OverlaySpec {
        bucket,
        key,
        left,
        top,
        alpha,
        width_ratio: optional_ratio(name, args, 5)?,
        height_ratio: optional_ratio(name, args, 6)?,
    }))
}

pub(crate) fn compile_segments(
    segments: &[ThumborSegment],
    source_bucket: &str,
    config: &HandlerConfig,
) -> Result<Vec<EditOperation>, ImageHandlerError> {
    let mut crop = None;
    let mut smart = false;
    let mut fit_in = false;
    let mut size = None;
    let mut filters = Vec::new();
    let mut fill = None;
    let mut no_upscale = false;

    for segment in segments {
        match segment {
            ThumborSegment::FitIn => fit_in = true,
            ThumborSegment::Smart => smart = true,
            ThumborSegment::Crop {
                left,
                top,
                right,
                bottom,
            } => {
                if right <= left || bottom <= top {
                    return Err(ImageHandlerError::invalid_edits(format!(
                        "Crop {}x{}:{}x{} has no area",
                        left, top, right, bottom
                    )));
                }
                crop = Some(CropRect::new(*left, *top, right - left, bottom - top));
            }
            ThumborSegment::Size { width, height } => {
                size = Some((parse_axis("width", width)?, parse_axis("height", height)?));
            }
            ThumborSegment::Filter { name, args } => match name.as_str() {
                "grayscale" => {
                    expect_no_args(name, args)?;
                    filters.push(EditOperation::Grayscale);
                }
                "negate" => {
                    expect_no_args(name, args)?;
                    filters.push(EditOperation::Negate);
                }
                "no_upscale" => {
                    expect_no_args(name, args)?;
                    no_upscale = true;
                }
                "rotate" => filters.push(EditOperation::Rotate {
                    degrees: number_arg(name, args, 0)?,
                }),
                "format" => {
                    let target = arg(name, args, 0)?
                        .parse::<OutputFormat>()
                        .map_err(ImageHandlerError::InvalidEdits)?;
                    filters.push(EditOperation::Format {
                        target: Some(target),
                        quality: None,
                    });
                }
                "quality" => {
                    let quality = number_arg(name, args, 0)?;
                    if !(1.0..=100.0).contains(&quality) {
                        return Err(ImageHandlerError::invalid_edits(
                            "quality must be between 1 and 100",
                        ));
                    }
                    filters.push(EditOperation::Format {
                        target: None,
                        quality: Some(quality.round() as u8),
                    });
                }
                "blur" => {
                    let radius = number_arg(name, args, 0)?;
                    let sigma = match args.get(1) {
                        Some(_) => number_arg(name, args, 1)?,
                        None => radius / 2.0,
                    };
                    if sigma > 0.0 {
                        let sigma = check_sigma("blur", f64::from(sigma).max(MIN_BLUR_SIGMA))?;
                        filters.push(EditOperation::Blur { sigma });
                    }
                }
                "sharpen" => {
                    let sigma = match args.first() {
                        Some(_) => number_arg(name, args, 0)?,
                        None => 1.0,
                    };
                    let sigma = check_sigma("sharpen", f64::from(sigma))?;
                    filters.push(EditOperation::Sharpen { sigma });
                }
                "fill" => {
                    let raw = arg(name, args, 0)?;
                    fill = Some(RgbaColor::parse(raw).ok_or_else(|| {
                        ImageHandlerError::invalid_edits(format!("Invalid fill color '{}'", raw))
                    })?);
                }
                "watermark" => filters.push(watermark(args, source_bucket, config)?),
                other => {
                    return Err(ImageHandlerError::invalid_edits(format!(
                        "Unsupported filter '{}'",
                        other
                    )))
                }
            },
        }
    }

    let mut operations = Vec::new();
    if let Some(rect) = crop {
        operations.push(EditOperation::Crop(rect));
    }
    if smart {
        operations.push(EditOperation::SmartCrop {
            face_index: None,
            padding_percent: None,
        });
    }
    if let Some((width, height)) = &size {
        if width.size.is_some() || height.size.is_some() {
            let fit = match (fit_in, fill.is_some()) {
                (true, true) => ResizeFit::Contain,
                (true, false) => ResizeFit::Inside,
                (false, _) => ResizeFit::Cover,
            };
            let mut spec = ResizeSpec::new(width.size, height.size, fit);
            spec.background = fill;
            spec.without_enlargement = no_upscale;
            operations.push(EditOperation::Resize(spec));
        }
        if width.mirrored {
            operations.push(EditOperation::Flop);
        }
        if height.mirrored {
            operations.push(EditOperation::Flip);
        }
    }
    operations.extend(filters);

    Ok(operations)
}
