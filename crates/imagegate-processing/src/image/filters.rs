use image::DynamicImage;

/// Unsharp-mask threshold; differences below it are left alone
const SHARPEN_THRESHOLD: i32 = 1;

pub struct ImageFilters;

impl ImageFilters {
    /// Gaussian blur
    pub fn apply_blur(img: DynamicImage, sigma: f32) -> DynamicImage {
        if sigma <= 0.0 {
            return img;
        }
        img.blur(sigma)
    }

    /// Unsharp mask
    pub fn apply_sharpen(img: DynamicImage, sigma: f32) -> DynamicImage {
        if sigma <= 0.0 {
            return img;
        }
        img.unsharpen(sigma, SHARPEN_THRESHOLD)
    }

    pub fn apply_grayscale(img: DynamicImage) -> DynamicImage {
        // Keep alpha so later composites and PNG output stay transparent
        if img.color().has_alpha() {
            DynamicImage::ImageLumaA8(img.to_luma_alpha8())
        } else {
            DynamicImage::ImageLuma8(img.to_luma8())
        }
    }

    /// Invert colour channels, alpha untouched
    pub fn apply_negate(mut img: DynamicImage) -> DynamicImage {
        img.invert();
        img
    }
}
