//! Point and rectangle primitives shared by every stage.
//!
//! Coordinates are `f64` and carry no tag for the space they live in.
//! Pointer events arrive in *display space* (the rendered viewport);
//! everything downstream of [`crate::mapper`] works in *source space*
//! (the pixel grid of the captured frame). Call sites must not mix the
//! two without going through the mapper.

use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp into `[0, width] x [0, height]`.
    ///
    /// NaN coordinates collapse to `0.0`.
    #[must_use]
    pub fn clamp_to(self, width: f64, height: f64) -> Self {
        Self::new(clamp_axis(self.x, width), clamp_axis(self.y, height))
    }

    /// Clamp into the pixel extent of `dimensions`.
    #[must_use]
    pub fn clamp_to_dimensions(self, dimensions: Dimensions) -> Self {
        self.clamp_to(
            f64::from(dimensions.width),
            f64::from(dimensions.height),
        )
    }
}

/// Clamp `value` into `[0, max]` without panicking on NaN or a negative
/// `max` (unlike [`f64::clamp`]).
#[must_use]
pub fn clamp_axis(value: f64, max: f64) -> f64 {
    value.max(0.0).min(max.max(0.0))
}

/// An axis-aligned rectangle in source space.
///
/// The normalized form (produced by [`Rectangle::from_corners`]) always
/// has its origin at the top-left and non-negative `width`/`height`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rectangle {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Horizontal span.
    pub width: f64,
    /// Vertical span.
    pub height: f64,
}

impl Rectangle {
    /// The zero-size rectangle at the origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a rectangle from its origin and size.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized rectangle spanning two opposite corners, in either order.
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (b.x - a.x).abs(),
            (b.y - a.y).abs(),
        )
    }

    /// Right edge (`x + width`).
    #[must_use]
    pub fn right(self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (`y + height`).
    #[must_use]
    pub fn bottom(self) -> f64 {
        self.y + self.height
    }

    /// Whether `point` lies inside the rectangle, edges included.
    #[must_use]
    pub fn contains(self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Whether both spans are strictly larger than `epsilon`.
    #[must_use]
    pub fn exceeds(self, epsilon: f64) -> bool {
        self.width > epsilon && self.height > epsilon
    }

    /// Whether the rectangle covers no area.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Snap to whole pixels inside `dimensions`.
    ///
    /// Edges are clamped to the image and rounded to the nearest pixel
    /// boundary, so coordinates carrying float noise from the display
    /// mapping (`9.999...`) land where the user meant. Returns `None` when
    /// nothing of the rectangle remains inside the image.
    #[must_use]
    pub fn to_pixel_bounds(self, dimensions: Dimensions) -> Option<PixelBounds> {
        let max_x = f64::from(dimensions.width);
        let max_y = f64::from(dimensions.height);
        let left = clamp_axis(self.x, max_x).round();
        let top = clamp_axis(self.y, max_y).round();
        let right = clamp_axis(self.right(), max_x).round();
        let bottom = clamp_axis(self.bottom(), max_y).round();

        if right <= left || bottom <= top {
            return None;
        }

        // All four values are whole numbers within `0..=u32::MAX`.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(PixelBounds {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Integer pixel region, guaranteed non-empty and inside its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clamp_to_keeps_inside_points() {
        let p = Point::new(12.5, 3.0).clamp_to(20.0, 10.0);
        assert_eq!(p, Point::new(12.5, 3.0));
    }

    #[test]
    fn clamp_to_pulls_outside_points_to_edges() {
        assert_eq!(
            Point::new(-4.0, 99.0).clamp_to(20.0, 10.0),
            Point::new(0.0, 10.0)
        );
        assert_eq!(
            Point::new(f64::NAN, -1.0).clamp_to(20.0, 10.0),
            Point::ORIGIN
        );
    }

    #[test]
    fn from_corners_normalizes_any_drag_direction() {
        let a = Point::new(30.0, 5.0);
        let b = Point::new(10.0, 25.0);
        let expected = Rectangle::new(10.0, 5.0, 20.0, 20.0);
        assert_eq!(Rectangle::from_corners(a, b), expected);
        assert_eq!(Rectangle::from_corners(b, a), expected);
    }

    #[test]
    fn contains_includes_edges() {
        let r = Rectangle::new(10.0, 10.0, 20.0, 20.0);
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(30.0, 30.0)));
        assert!(r.contains(Point::new(15.0, 29.0)));
        assert!(!r.contains(Point::new(9.9, 15.0)));
        assert!(!r.contains(Point::new(15.0, 30.1)));
    }

    #[test]
    fn exceeds_requires_both_spans() {
        assert!(Rectangle::new(0.0, 0.0, 6.0, 6.0).exceeds(5.0));
        assert!(!Rectangle::new(0.0, 0.0, 6.0, 5.0).exceeds(5.0));
        assert!(!Rectangle::ZERO.exceeds(5.0));
    }

    #[test]
    fn pixel_bounds_round_and_clamp() {
        let dims = Dimensions::new(50, 40);
        let bounds = Rectangle::new(2.7, 3.2, 10.0, 10.0)
            .to_pixel_bounds(dims)
            .unwrap();
        assert_eq!(
            bounds,
            PixelBounds {
                x: 3,
                y: 3,
                width: 10,
                height: 10
            }
        );

        let clipped = Rectangle::new(45.0, -5.0, 20.0, 20.0)
            .to_pixel_bounds(dims)
            .unwrap();
        assert_eq!(
            clipped,
            PixelBounds {
                x: 45,
                y: 0,
                width: 5,
                height: 15
            }
        );
    }

    #[test]
    fn pixel_bounds_outside_image_is_none() {
        let dims = Dimensions::new(50, 40);
        assert!(
            Rectangle::new(60.0, 0.0, 10.0, 10.0)
                .to_pixel_bounds(dims)
                .is_none()
        );
        assert!(Rectangle::ZERO.to_pixel_bounds(dims).is_none());
    }
}
