//! Source image inspection
//!
//! Header-only probing: format sniffing and upright dimensions, without decoding pixels.

use anyhow::Context;
use image::metadata::Orientation;
use image::{ImageDecoder, ImageFormat, ImageReader};
use imagegate_core::{ImageHandlerError, OutputFormat};
use std::io::Cursor;

/// Format and upright dimensions of a source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub format: Option<ImageFormat>,
    pub width: u32,
    pub height: u32,
}

pub struct ImageProbe;

impl ImageProbe {
    /// Guess the format from magic bytes
    pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
        image::guess_format(data).ok()
    }

    /// MIME type of the sniffed format
    pub fn content_type(data: &[u8]) -> Option<&'static str> {
        Self::sniff_format(data).map(|format| format.to_mime_type())
    }

    /// Encoder target matching a decoded format, if we can write it back out.
    pub fn output_format(format: ImageFormat) -> Option<OutputFormat> {
        match format {
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::Png => Some(OutputFormat::Png),
            ImageFormat::WebP => Some(OutputFormat::WebP),
            ImageFormat::Avif => Some(OutputFormat::Avif),
            ImageFormat::Gif => Some(OutputFormat::Gif),
            ImageFormat::Tiff => Some(OutputFormat::Tiff),
            _ => None,
        }
    }

    /// Read format and dimensions from the header.
    ///
    /// Dimensions are reported after EXIF orientation, matching what the decoder hands
    /// to the executor.
    pub fn probe(data: &[u8]) -> Result<SourceInfo, ImageHandlerError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .context("Failed to read image header")?;
        let format = reader.format();
        let mut decoder = reader
            .into_decoder()
            .context("Failed to create image decoder")?;

        let (width, height) = decoder.dimensions();
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let (width, height) = if swaps_axes(orientation) {
            (height, width)
        } else {
            (width, height)
        };

        Ok(SourceInfo {
            format,
            width,
            height,
        })
    }
}

pub(crate) fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}
