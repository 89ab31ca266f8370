//! Linear contrast/brightness adjustment.

use image::Rgba;

use crate::types::{PixelBuffer, RgbaImage};

/// Apply `clamp(contrast * v + brightness, 0, 255)` to R, G and B.
///
/// Alpha is left as is. Results are rounded to the nearest integer.
#[must_use = "returns the adjusted frame"]
pub fn contrast_brightness(buffer: &PixelBuffer, contrast: f32, brightness: f32) -> PixelBuffer {
    let src = buffer.as_image();
    let out = RgbaImage::from_fn(src.width(), src.height(), |x, y| {
        let [r, g, b, a] = src.get_pixel(x, y).0;
        Rgba([
            adjust_channel(r, contrast, brightness),
            adjust_channel(g, contrast, brightness),
            adjust_channel(b, contrast, brightness),
            a,
        ])
    });
    PixelBuffer::from_stage(out)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn adjust_channel(value: u8, contrast: f32, brightness: f32) -> u8 {
    let scaled = contrast.mul_add(f32::from(value), brightness);
    // NaN saturates to 0 through the cast.
    scaled.clamp(0.0, 255.0).round() as u8
}
