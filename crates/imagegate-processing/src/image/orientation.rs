use crate::image::check_canvas;
use anyhow::Context;
use image::metadata::Orientation;
use image::{imageops, DynamicImage, GenericImageView, ImageDecoder, ImageReader, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imagegate_core::ImageHandlerError;
use std::io::Cursor;

/// Image orientation operations (rotation and flipping)
pub struct ImageOrientation;

impl ImageOrientation {
    /// Decode an image and apply its EXIF orientation
    pub fn decode_upright(data: &[u8]) -> Result<DynamicImage, ImageHandlerError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .context("Failed to read image header")?;
        let mut decoder = reader
            .into_decoder()
            .context("Failed to create image decoder")?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut img = DynamicImage::from_decoder(decoder).context("Failed to decode image")?;

        if orientation != Orientation::NoTransforms {
            tracing::debug!(orientation = ?orientation, "Applying EXIF orientation");
            img.apply_orientation(orientation);
        }

        Ok(img)
    }

    /// Rotate clockwise by an arbitrary angle.
    ///
    /// Right angles are exact. Anything else grows the canvas to the rotated
    /// bounding box and fills the uncovered corners with transparency.
    pub fn rotate(img: DynamicImage, degrees: f32) -> Result<DynamicImage, ImageHandlerError> {
        let normalized = degrees.rem_euclid(360.0);
        if normalized == 0.0 {
            return Ok(img);
        }
        if normalized.fract() == 0.0 && (normalized as u16) % 90 == 0 {
            return Ok(Self::rotate_by_angle(img, normalized as u16));
        }

        let (width, height) = img.dimensions();
        let (new_width, new_height) = Self::rotated_bounds(width, height, normalized);
        // The working canvas must hold both the source and its rotated bounds
        let (canvas_width, canvas_height) = (new_width.max(width), new_height.max(height));
        check_canvas("rotate", canvas_width, canvas_height)?;

        let mut canvas = RgbaImage::new(canvas_width, canvas_height);
        imageops::overlay(
            &mut canvas,
            &img.to_rgba8(),
            i64::from((canvas_width - width) / 2),
            i64::from((canvas_height - height) / 2),
        );
        let rotated = DynamicImage::ImageRgba8(rotate_about_center(
            &canvas,
            normalized.to_radians(),
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        ));

        if (canvas_width, canvas_height) == (new_width, new_height) {
            return Ok(rotated);
        }
        Ok(rotated.crop_imm(
            (canvas_width - new_width) / 2,
            (canvas_height - new_height) / 2,
            new_width,
            new_height,
        ))
    }

    /// Size of the box that holds a `width` x `height` image turned by `degrees`.
    pub fn rotated_bounds(width: u32, height: u32, degrees: f32) -> (u32, u32) {
        let radians = f64::from(degrees).to_radians();
        let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
        let (w, h) = (f64::from(width), f64::from(height));
        // Slack keeps float noise from adding a pixel at exact angles
        let bound = |value: f64| ((value - 1e-6).ceil() as u32).max(1);
        (bound(w * cos + h * sin), bound(w * sin + h * cos))
    }

    /// Rotate image by specified angle (90, 180, or 270 degrees clockwise)
    pub fn rotate_by_angle(img: DynamicImage, angle: u16) -> DynamicImage {
        match angle {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        }
    }

    /// Mirror around the vertical axis
    pub fn flop(img: DynamicImage) -> DynamicImage {
        DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()))
    }

    /// Mirror around the horizontal axis
    pub fn flip(img: DynamicImage) -> DynamicImage {
        DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()))
    }
}
