use image::{DynamicImage, GenericImageView};
use imagegate_core::{CropRect, ImageHandlerError};

pub struct ImageCrop;

impl ImageCrop {
    /// Map a rectangle onto a `width` x `height` buffer.
    ///
    /// Rectangles carrying reference dimensions are rescaled from those dimensions
    /// first. The result is clamped to the buffer and is `None` when nothing of it
    /// is left.
    pub fn resolve_rect(rect: &CropRect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let (mut left, mut top, mut crop_width, mut crop_height) = (
            rect.left as f64,
            rect.top as f64,
            rect.width as f64,
            rect.height as f64,
        );

        if let Some((ref_width, ref_height)) = rect.reference {
            if ref_width > 0 && ref_height > 0 && (ref_width, ref_height) != (width, height) {
                let scale_x = width as f64 / ref_width as f64;
                let scale_y = height as f64 / ref_height as f64;
                left *= scale_x;
                crop_width *= scale_x;
                top *= scale_y;
                crop_height *= scale_y;
            }
        }

        let left = (left.round() as u32).min(width);
        let top = (top.round() as u32).min(height);
        let crop_width = (crop_width.round() as u32).min(width - left);
        let crop_height = (crop_height.round() as u32).min(height - top);

        if crop_width == 0 || crop_height == 0 {
            return None;
        }
        Some((left, top, crop_width, crop_height))
    }

    pub fn apply(img: DynamicImage, rect: &CropRect) -> Result<DynamicImage, ImageHandlerError> {
        let (width, height) = img.dimensions();
        let (left, top, crop_width, crop_height) = Self::resolve_rect(rect, width, height)
            .ok_or_else(|| {
                ImageHandlerError::invalid_edits(format!(
                    "Crop area {}x{}+{}+{} lies outside the {}x{} image",
                    rect.width, rect.height, rect.left, rect.top, width, height
                ))
            })?;

        if (left, top, crop_width, crop_height) == (0, 0, width, height) {
            return Ok(img);
        }
        Ok(img.crop_imm(left, top, crop_width, crop_height))
    }
}
