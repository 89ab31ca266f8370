//! Sobel edge detection.
//!
//! Computes the horizontal and vertical Sobel gradients of the
//! luminance plane with [`imageproc::filter::filter_clamped`], then
//! thresholds the gradient magnitude into a binary [`EdgeMask`]. There is
//! no non-maximum suppression or hysteresis: strokes come out a few
//! pixels wide, which is what the flood-fill contour tracer expects.
//!
//! The outermost ring of pixels has no full 3x3 neighbourhood and is
//! always background.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::grayscale::luminance;
use crate::types::{EdgeMask, PipelineError, PixelBuffer};

/// Default gradient magnitude threshold.
pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// Detect edges in `buffer`.
///
/// The buffer is reduced to its channel-mean luminance first, so a
/// grayscale or a colour frame can be passed.
#[must_use = "returns the binary edge mask"]
pub fn detect_edges(buffer: &PixelBuffer, threshold: f64) -> EdgeMask {
    sobel_mask(&luminance(buffer), threshold)
}

/// Detect edges in an already single-channel luminance plane.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyBuffer`] if the plane has zero area.
pub fn detect_edges_luma(plane: &GrayImage, threshold: f64) -> Result<EdgeMask, PipelineError> {
    if plane.width() == 0 || plane.height() == 0 {
        return Err(PipelineError::EmptyBuffer);
    }
    Ok(sobel_mask(plane, threshold))
}

fn sobel_mask(plane: &GrayImage, threshold: f64) -> EdgeMask {
    let (w, h) = plane.dimensions();
    let gx: Image<Luma<i16>> = filter_clamped(plane, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(plane, kernel::SOBEL_VERTICAL_3X3);

    let mask = GrayImage::from_fn(w, h, |x, y| {
        let interior = x > 0 && y > 0 && x + 1 < w && y + 1 < h;
        if !interior {
            return Luma([EdgeMask::BACKGROUND]);
        }
        let dx = f64::from(gx.get_pixel(x, y).0[0]);
        let dy = f64::from(gy.get_pixel(x, y).0[0]);
        let magnitude = dx.hypot(dy);
        if magnitude > threshold {
            Luma([EdgeMask::EDGE])
        } else {
            Luma([EdgeMask::BACKGROUND])
        }
    });

    let edges = EdgeMask::from_stage(mask);
    log::debug!(
        "sobel {w}x{h} threshold {threshold}: {} edge pixels",
        edges.edge_pixel_count()
    );
    edges
}
