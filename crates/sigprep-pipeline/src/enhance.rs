//! The enhancement chain: grayscale, contrast/brightness, blur.

use crate::adjust::contrast_brightness;
use crate::blur::box_blur;
use crate::grayscale::to_grayscale;
use crate::types::{PipelineConfig, PixelBuffer};

/// Run grayscale, contrast/brightness and blur over `buffer`.
///
/// Returns a new buffer of the same dimensions; the input is not
/// modified.
#[must_use = "returns the enhanced frame"]
pub fn enhance(buffer: &PixelBuffer, config: &PipelineConfig) -> PixelBuffer {
    let gray = to_grayscale(buffer);
    let adjusted = contrast_brightness(&gray, config.contrast, config.brightness);
    let blurred = box_blur(&adjusted, config.blur_radius);
    log::debug!(
        "enhanced {}x{} frame (contrast {}, brightness {}, blur radius {})",
        buffer.width(),
        buffer.height(),
        config.contrast,
        config.brightness,
        config.blur_radius,
    );
    blurred
}
