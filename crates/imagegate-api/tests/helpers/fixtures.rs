//! Test fixtures: encoded images and request paths.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .expect("Failed to encode fixture");
    buffer
}

/// Opaque PNG with a red left half and a blue right half.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([220, 30, 30, 255])
        } else {
            Rgba([30, 30, 220, 255])
        }
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([90, 160, 40]),
    ));
    encode(img, ImageFormat::Jpeg)
}

/// Path for a default-dialect request carrying `body`.
pub fn default_request_path(body: &serde_json::Value) -> String {
    format!("/{}", STANDARD.encode(body.to_string()))
}

/// Decode an envelope or response body into an image.
pub fn decode_image(data: &[u8]) -> DynamicImage {
    image::load_from_memory(data).expect("Response is not a decodable image")
}
