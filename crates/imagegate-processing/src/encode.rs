use anyhow::{anyhow, Context};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use imagegate_core::{ImageHandlerError, OutputFormat};
use std::io::Cursor;

/// AVIF encoder speed, 1 (slow, small) to 10 (fast, large)
const AVIF_SPEED: u8 = 6;

/// Largest width or height libwebp can encode
pub const WEBP_MAX_DIMENSION: u32 = 16_383;

/// Writes a pixel buffer in the requested output format
pub struct ImageEncoder;

impl ImageEncoder {
    /// Encode `img` as `format`.
    ///
    /// `quality` (1-100) is honoured by the lossy encoders and ignored by the rest.
    pub fn encode(
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Bytes, ImageHandlerError> {
        let quality = quality.clamp(1, 100);
        let encoded = match format {
            OutputFormat::Jpeg => Self::encode_jpeg(img, quality)?,
            OutputFormat::WebP => Self::encode_webp(img, quality)?,
            OutputFormat::Avif => Self::encode_avif(img, quality)?,
            OutputFormat::Png => Self::write_with(img, ImageFormat::Png)?,
            OutputFormat::Gif => {
                Self::write_with(&DynamicImage::ImageRgba8(img.to_rgba8()), ImageFormat::Gif)?
            }
            OutputFormat::Tiff => Self::write_with(img, ImageFormat::Tiff)?,
            OutputFormat::Heif => {
                return Err(ImageHandlerError::UnsupportedFormat(format.to_string()))
            }
        };

        tracing::debug!(
            format = %format,
            quality = quality,
            size_bytes = encoded.len(),
            "Encoded image"
        );

        Ok(encoded)
    }

    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, ImageHandlerError> {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .context("Failed to encode JPEG")?;
        Ok(Bytes::from(buffer))
    }

    fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Bytes, ImageHandlerError> {
        let (width, height) = img.dimensions();
        if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
            return Err(ImageHandlerError::invalid_edits(format!(
                "WebP output is limited to {} pixels per side, got {}x{}",
                WEBP_MAX_DIMENSION, width, height
            )));
        }

        let rgba = img.to_rgba8();
        let encoder = webp::Encoder::from_rgba(&rgba, width, height);
        let webp_data = encoder.encode_simple(false, quality as f32).map_err(|e| {
            ImageHandlerError::UnsupportedFormat(format!("WebP encoding failed: {:?}", e))
        })?;
        Ok(Bytes::copy_from_slice(&webp_data))
    }

    fn encode_avif(img: &DynamicImage, quality: u8) -> Result<Bytes, ImageHandlerError> {
        let (width, height) = img.dimensions();
        let rgba = img.to_rgba8();

        let pixels: Vec<rgb::RGBA8> = rgba
            .as_raw()
            .chunks_exact(4)
            .map(|chunk| rgb::RGBA8::new(chunk[0], chunk[1], chunk[2], chunk[3]))
            .collect();
        let img_buf = ravif::Img::new(pixels.as_slice(), width as usize, height as usize);

        let encoder = ravif::Encoder::new()
            .with_quality(quality as f32)
            .with_speed(AVIF_SPEED);
        let avif_data = encoder
            .encode_rgba(img_buf)
            .map_err(|e| anyhow!("Failed to encode AVIF: {}", e))?;

        Ok(Bytes::from(avif_data.avif_file))
    }

    fn write_with(img: &DynamicImage, format: ImageFormat) -> Result<Bytes, ImageHandlerError> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format)
            .with_context(|| format!("Failed to encode {:?}", format))?;
        Ok(Bytes::from(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ImageProbe;
    use image::{Rgba, RgbaImage};

    fn create_test_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 12, Rgba([10, 120, 200, 180])))
    }

    #[test]
    fn test_encode_png_round_trips_dimensions() {
        let encoded = ImageEncoder::encode(&create_test_image(), OutputFormat::Png, 80).unwrap();
        let info = ImageProbe::probe(&encoded).unwrap();
        assert_eq!(info.format, Some(ImageFormat::Png));
        assert_eq!((info.width, info.height), (16, 12));
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let encoded = ImageEncoder::encode(&create_test_image(), OutputFormat::Jpeg, 70).unwrap();
        assert_eq!(ImageProbe::sniff_format(&encoded), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn test_jpeg_quality_changes_size() {
        let noisy = DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) * 5 % 256) as u8])
        }));
        let low = ImageEncoder::encode(&noisy, OutputFormat::Jpeg, 10).unwrap();
        let high = ImageEncoder::encode(&noisy, OutputFormat::Jpeg, 95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_encode_webp() {
        let encoded = ImageEncoder::encode(&create_test_image(), OutputFormat::WebP, 80).unwrap();
        assert_eq!(ImageProbe::sniff_format(&encoded), Some(ImageFormat::WebP));
    }

    #[test]
    fn test_encode_gif_and_tiff() {
        let gif = ImageEncoder::encode(&create_test_image(), OutputFormat::Gif, 80).unwrap();
        assert_eq!(ImageProbe::sniff_format(&gif), Some(ImageFormat::Gif));
        let tiff = ImageEncoder::encode(&create_test_image(), OutputFormat::Tiff, 80).unwrap();
        assert_eq!(ImageProbe::sniff_format(&tiff), Some(ImageFormat::Tiff));
    }

    #[test]
    fn test_heif_is_unsupported() {
        let err = ImageEncoder::encode(&create_test_image(), OutputFormat::Heif, 80).unwrap_err();
        assert!(matches!(err, ImageHandlerError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_webp_rejects_sides_over_encoder_limit() {
        let wide = DynamicImage::ImageRgba8(RgbaImage::new(WEBP_MAX_DIMENSION + 1, 1));
        let err = ImageEncoder::encode(&wide, OutputFormat::WebP, 80).unwrap_err();
        assert!(matches!(err, ImageHandlerError::InvalidEdits(_)));

        let widest = DynamicImage::ImageRgba8(RgbaImage::new(WEBP_MAX_DIMENSION, 1));
        let encoded = ImageEncoder::encode(&widest, OutputFormat::WebP, 80).unwrap();
        assert_eq!(ImageProbe::sniff_format(&encoded), Some(ImageFormat::WebP));
    }
}
