//! Box blur for sensor and compression noise.
//!
//! Wraps [`imageproc::filter::box_filter`], which only accepts
//! `GrayImage`, by splitting the RGBA frame into four channels,
//! filtering each, and reassembling. A box filter is linear and
//! per-channel, so this equals blurring in colour space.
//!
//! At the default radius of 1 (a 3x3 window) single-pixel speckle is
//! averaged away while strokes a few pixels wide keep their outline.

use image::GrayImage;

use crate::types::{PixelBuffer, RgbaImage};

/// Blur every channel of `buffer` with a `(2r + 1) x (2r + 1)` box.
///
/// Pixels beyond the frame edge are treated as copies of the nearest
/// edge pixel. A radius of zero returns the frame unchanged. Radii wider
/// than the frame behave like the frame's largest side.
#[must_use = "returns the blurred frame"]
pub fn box_blur(buffer: &PixelBuffer, radius: u32) -> PixelBuffer {
    if radius == 0 {
        return buffer.clone();
    }

    let image = buffer.as_image();
    let (w, h) = (image.width(), image.height());
    // A window past every edge already covers the whole frame.
    let radius = radius.min(w.max(h));

    // Split into four grayscale channels.
    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::box_filter(&channels[c], radius, radius));

    // Reassemble into RGBA.
    let out = RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
            blurred[3].get_pixel(x, y).0[0],
        ])
    });
    PixelBuffer::from_stage(out)
}
