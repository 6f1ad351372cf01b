//! Pixel operations applied by the executor

pub mod crop;
pub mod filters;
pub mod orientation;
pub mod overlay;
pub mod resize;

pub use crop::ImageCrop;
pub use filters::ImageFilters;
pub use orientation::ImageOrientation;
pub use overlay::{Overlay, OverlayPlacement};
pub use resize::ImageResize;

use imagegate_core::{ImageHandlerError, MAX_DIMENSION, MAX_PIXELS};

/// Reject a buffer size before it is allocated.
pub(crate) fn check_canvas(op: &str, width: u32, height: u32) -> Result<(), ImageHandlerError> {
    if width > MAX_DIMENSION
        || height > MAX_DIMENSION
        || u64::from(width) * u64::from(height) > MAX_PIXELS
    {
        return Err(ImageHandlerError::invalid_edits(format!(
            "{} would produce a {}x{} image; the limit is {} pixels per side and {} pixels in total",
            op, width, height, MAX_DIMENSION, MAX_PIXELS
        )));
    }
    Ok(())
}
