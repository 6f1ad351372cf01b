use super::resize::ImageResize;
use anyhow::Context;
use image::{imageops, DynamicImage, GenericImageView, ImageReader};
use imagegate_core::{ImageHandlerError, OverlayOffset, OverlaySpec};
use std::io::Cursor;

/// Resolved geometry of an overlay on its base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPlacement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

pub struct Overlay;

impl Overlay {
    /// Composite `overlay_data` onto `img` as described by `spec`.
    pub fn apply(
        img: DynamicImage,
        overlay_data: &[u8],
        spec: &OverlaySpec,
    ) -> Result<DynamicImage, ImageHandlerError> {
        let overlay_img = ImageReader::new(Cursor::new(overlay_data))
            .with_guessed_format()
            .context("Failed to read overlay header")?
            .decode()
            .context("Failed to decode overlay image")?;

        let (img_width, img_height) = img.dimensions();
        let (ov_width, ov_height) = overlay_img.dimensions();
        let (target_width, target_height) =
            Self::scaled_size(img_width, img_height, ov_width, ov_height, spec);

        if target_width > img_width || target_height > img_height {
            return Err(ImageHandlerError::CompositeDimension {
                base_width: img_width,
                base_height: img_height,
                overlay_width: target_width,
                overlay_height: target_height,
            });
        }

        let mut overlay_rgba = if (target_width, target_height) != (ov_width, ov_height) {
            ImageResize::resize_image(&overlay_img, target_width, target_height).to_rgba8()
        } else {
            overlay_img.to_rgba8()
        };

        // alpha is transparency: 0 keeps the overlay opaque
        let opacity = (100.0 - spec.alpha.clamp(0.0, 100.0)) / 100.0;
        if opacity < 1.0 {
            for pixel in overlay_rgba.pixels_mut() {
                pixel[3] = (pixel[3] as f32 * opacity).round() as u8;
            }
        }

        let placement = Self::placement(img_width, img_height, target_width, target_height, spec);
        tracing::debug!(
            bucket = %spec.bucket,
            key = %spec.key,
            x = placement.x,
            y = placement.y,
            width = placement.width,
            height = placement.height,
            "Compositing overlay"
        );

        let mut img_rgba = img.to_rgba8();
        imageops::overlay(&mut img_rgba, &overlay_rgba, placement.x, placement.y);
        Ok(DynamicImage::ImageRgba8(img_rgba))
    }

    /// Overlay size after applying the width/height ratios (percent of the base).
    /// A single ratio keeps the overlay's aspect ratio.
    pub fn scaled_size(
        base_width: u32,
        base_height: u32,
        overlay_width: u32,
        overlay_height: u32,
        spec: &OverlaySpec,
    ) -> (u32, u32) {
        let ratio_width = spec
            .width_ratio
            .map(|r| ((base_width as f32 * r / 100.0).round() as u32).max(1));
        let ratio_height = spec
            .height_ratio
            .map(|r| ((base_height as f32 * r / 100.0).round() as u32).max(1));

        match (ratio_width, ratio_height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => {
                let h = (w as f32 * overlay_height as f32 / overlay_width as f32).round() as u32;
                (w, h.max(1))
            }
            (None, Some(h)) => {
                let w = (h as f32 * overlay_width as f32 / overlay_height as f32).round() as u32;
                (w.max(1), h)
            }
            (None, None) => (overlay_width, overlay_height),
        }
    }

    pub fn placement(
        base_width: u32,
        base_height: u32,
        overlay_width: u32,
        overlay_height: u32,
        spec: &OverlaySpec,
    ) -> OverlayPlacement {
        OverlayPlacement {
            x: Self::axis_offset(spec.left, base_width, overlay_width),
            y: Self::axis_offset(spec.top, base_height, overlay_height),
            width: overlay_width,
            height: overlay_height,
        }
    }

    /// Negative offsets count from the far edge; no offset centres the overlay.
    fn axis_offset(offset: Option<OverlayOffset>, base: u32, overlay: u32) -> i64 {
        let raw = match offset {
            None => return (base as i64 - overlay as i64) / 2,
            Some(OverlayOffset::Pixels(px)) => px,
            Some(OverlayOffset::Percent(p)) => (base as f32 * p / 100.0).round() as i64,
        };
        if raw < 0 {
            base as i64 + raw - overlay as i64
        } else {
            raw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }

    fn create_overlay(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn spec() -> OverlaySpec {
        OverlaySpec {
            bucket: "images".to_string(),
            key: "logo.png".to_string(),
            left: Some(OverlayOffset::Pixels(0)),
            top: Some(OverlayOffset::Pixels(0)),
            alpha: 0.0,
            width_ratio: None,
            height_ratio: None,
        }
    }

    #[test]
    fn test_overlay_top_left() {
        let result = Overlay::apply(create_test_image(100, 100), &create_overlay(10, 10), &spec())
            .unwrap();
        let rgba = result.to_rgba8();
        assert_eq!(result.dimensions(), (100, 100));
        assert_eq!(rgba.get_pixel(5, 5), &Rgba([0, 0, 0, 255]));
        assert_eq!(rgba.get_pixel(50, 50), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_negative_offsets_count_from_far_edge() {
        let mut spec = spec();
        spec.left = Some(OverlayOffset::Pixels(-5));
        spec.top = None;
        let placement = Overlay::placement(100, 80, 10, 20, &spec);
        assert_eq!((placement.x, placement.y), (85, 30));
    }

    #[test]
    fn test_percent_offset() {
        let mut spec = spec();
        spec.left = Some(OverlayOffset::Percent(25.0));
        let placement = Overlay::placement(200, 100, 10, 10, &spec);
        assert_eq!(placement.x, 50);
    }

    #[test]
    fn test_ratio_scaling() {
        let mut spec = spec();
        spec.width_ratio = Some(50.0);
        assert_eq!(Overlay::scaled_size(200, 100, 40, 20, &spec), (100, 50));
        spec.height_ratio = Some(10.0);
        assert_eq!(Overlay::scaled_size(200, 100, 40, 20, &spec), (100, 10));
    }

    #[test]
    fn test_alpha_is_transparency() {
        let mut spec = spec();
        spec.alpha = 100.0;
        let result = Overlay::apply(create_test_image(20, 20), &create_overlay(10, 10), &spec)
            .unwrap();
        assert_eq!(result.to_rgba8().get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_oversized_overlay_is_rejected() {
        let err = Overlay::apply(create_test_image(20, 20), &create_overlay(30, 10), &spec())
            .unwrap_err();
        assert!(matches!(
            err,
            ImageHandlerError::CompositeDimension {
                overlay_width: 30,
                ..
            }
        ));
    }
}
