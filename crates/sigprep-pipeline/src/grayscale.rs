//! Frame decoding and grayscale conversion.
//!
//! Frames arrive either as raw RGBA from the capture surface or as
//! encoded bytes from a file upload; [`decode_frame`] covers the latter.
//! Grayscale here is the unweighted channel mean `(R + G + B) / 3`, not
//! a perceptual luminance, so that the enhanced output matches what the
//! capture UI has always produced.

use image::{GrayImage, Rgba};

use crate::types::{PipelineError, PixelBuffer, RgbaImage};

/// Decode raw image bytes into an RGBA frame.
///
/// Supports PNG, JPEG, BMP, and WebP formats (whatever the `image` crate
/// can decode with the enabled features).
///
/// # Errors
///
/// Returns [`PipelineError::EmptyBuffer`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_frame(bytes: &[u8]) -> Result<PixelBuffer, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyBuffer);
    }

    let img = image::load_from_memory(bytes)?;
    log::debug!(
        "decoded {} bytes into {}x{} frame",
        bytes.len(),
        img.width(),
        img.height()
    );
    PixelBuffer::from_image(img.to_rgba8())
}

/// Unweighted mean of three channels, rounded to nearest.
#[must_use]
pub fn channel_mean(r: u8, g: u8, b: u8) -> u8 {
    let sum = u16::from(r) + u16::from(g) + u16::from(b);
    // (765 + 1) / 3 == 255, so this never saturates.
    u8::try_from((sum + 1) / 3).unwrap_or(u8::MAX)
}

/// Replace R, G and B of every pixel with their mean; alpha is kept.
///
/// Idempotent: a pixel with `R == G == B` maps to itself.
#[must_use = "returns the grayscale frame"]
pub fn to_grayscale(buffer: &PixelBuffer) -> PixelBuffer {
    let src = buffer.as_image();
    let out = RgbaImage::from_fn(src.width(), src.height(), |x, y| {
        let [r, g, b, a] = src.get_pixel(x, y).0;
        let v = channel_mean(r, g, b);
        Rgba([v, v, v, a])
    });
    PixelBuffer::from_stage(out)
}

/// Single-channel luminance plane (the same channel mean).
///
/// This is what edge detection operates on.
#[must_use = "returns the luminance plane"]
pub fn luminance(buffer: &PixelBuffer) -> GrayImage {
    let src = buffer.as_image();
    GrayImage::from_fn(src.width(), src.height(), |x, y| {
        let [r, g, b, _] = src.get_pixel(x, y).0;
        image::Luma([channel_mean(r, g, b)])
    })
}
