use crate::image::check_canvas;
use image::imageops::FilterType;
use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};
use imagegate_core::{ImageHandlerError, ResizeFit, ResizeSpec, RgbaColor};

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Size the image is scaled to before any cropping (`Cover`) or letterboxing (`Contain`).
    ///
    /// A missing side follows the source aspect ratio.
    pub fn calculate_dimensions(
        orig_width: u32,
        orig_height: u32,
        width: Option<u32>,
        height: Option<u32>,
        fit: ResizeFit,
    ) -> (u32, u32) {
        let (target_width, target_height) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => {
                let aspect_ratio = orig_height as f32 / orig_width as f32;
                let h = (w as f32 * aspect_ratio).round() as u32;
                return (w.max(1), h.max(1));
            }
            (None, Some(h)) => {
                let aspect_ratio = orig_width as f32 / orig_height as f32;
                let w = (h as f32 * aspect_ratio).round() as u32;
                return (w.max(1), h.max(1));
            }
            (None, None) => return (orig_width, orig_height),
        };

        let scale_width = target_width as f32 / orig_width as f32;
        let scale_height = target_height as f32 / orig_height as f32;
        let scale = match fit {
            ResizeFit::Fill => return (target_width.max(1), target_height.max(1)),
            ResizeFit::Inside | ResizeFit::Contain => scale_width.min(scale_height),
            ResizeFit::Cover | ResizeFit::Outside => scale_width.max(scale_height),
        };

        let scaled_width = ((orig_width as f32 * scale).round() as u32).max(1);
        let scaled_height = ((orig_height as f32 * scale).round() as u32).max(1);
        (scaled_width, scaled_height)
    }

    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width.max(1) as f32;
        let height_ratio = orig_height as f32 / new_height.max(1) as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Resize image to exact dimensions
    pub fn resize_image(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        let filter = Self::select_filter(orig_width, orig_height, width, height);
        img.resize_exact(width, height, filter)
    }

    /// Scale to fit inside the box and centre on a canvas of the box size
    pub fn resize_with_fill(
        img: &DynamicImage,
        target_width: u32,
        target_height: u32,
        background: RgbaColor,
    ) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        let (scaled_width, scaled_height) = Self::calculate_dimensions(
            orig_width,
            orig_height,
            Some(target_width),
            Some(target_height),
            ResizeFit::Inside,
        );

        let canvas_img = RgbaImage::from_pixel(target_width, target_height, Rgba(background.0));
        let mut canvas = DynamicImage::ImageRgba8(canvas_img);

        let x_offset = target_width.saturating_sub(scaled_width) / 2;
        let y_offset = target_height.saturating_sub(scaled_height) / 2;

        let resized = Self::resize_image(img, scaled_width, scaled_height);
        imageops::overlay(&mut canvas, &resized, x_offset as i64, y_offset as i64);

        canvas
    }

    /// Apply a resize operation.
    ///
    /// Fails with `InvalidEdits` when the scaled image, or the letterbox canvas,
    /// would exceed the pixel limits.
    pub fn apply(img: DynamicImage, spec: &ResizeSpec) -> Result<DynamicImage, ImageHandlerError> {
        if spec.width.is_none() && spec.height.is_none() {
            return Ok(img);
        }

        let (orig_width, orig_height) = img.dimensions();
        if spec.without_enlargement
            && spec.width.map_or(true, |w| w >= orig_width)
            && spec.height.map_or(true, |h| h >= orig_height)
        {
            return Ok(img);
        }

        let (scaled_width, scaled_height) =
            Self::calculate_dimensions(orig_width, orig_height, spec.width, spec.height, spec.fit);
        check_canvas("resize", scaled_width, scaled_height)?;

        let resized = match (spec.fit, spec.width, spec.height) {
            (ResizeFit::Cover, Some(w), Some(h)) => {
                let filter = Self::select_filter(orig_width, orig_height, w, h);
                img.resize_to_fill(w, h, filter)
            }
            (ResizeFit::Contain, Some(w), Some(h)) => {
                check_canvas("resize", w, h)?;
                Self::resize_with_fill(&img, w, h, spec.background.unwrap_or(RgbaColor::BLACK))
            }
            _ => Self::resize_image(&img, scaled_width, scaled_height),
        };
        Ok(resized)
    }
}
