//! Display-space to source-space coordinate mapping.
//!
//! The capture UI renders a frame inside a viewport with "contain"
//! semantics: the whole image is visible, its aspect ratio is preserved,
//! and the leftover space is split evenly on both sides. A relatively
//! wider image fills the viewport width and is letterboxed top and
//! bottom; a relatively taller one fills the height and is pillarboxed
//! left and right.
//!
//! Nothing here is cached. [`DisplayLayout`] is derived from the four
//! numbers in [`DisplayMetrics`] on every call, so a resize between two
//! pointer events is always picked up.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::types::{Dimensions, PipelineError};

/// How a source image of `source_width x source_height` is fit inside a
/// viewport of `viewport_width x viewport_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub source_width: f64,
    pub source_height: f64,
}

impl DisplayMetrics {
    #[must_use]
    pub const fn new(
        viewport_width: f64,
        viewport_height: f64,
        source_width: f64,
        source_height: f64,
    ) -> Self {
        Self {
            viewport_width,
            viewport_height,
            source_width,
            source_height,
        }
    }

    /// Metrics for a frame of known pixel dimensions.
    #[must_use]
    pub fn for_source(viewport_width: f64, viewport_height: f64, source: Dimensions) -> Self {
        Self::new(
            viewport_width,
            viewport_height,
            f64::from(source.width),
            f64::from(source.height),
        )
    }

    /// Whether all four sizes are finite and positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [
            self.viewport_width,
            self.viewport_height,
            self.source_width,
            self.source_height,
        ]
        .iter()
        .all(|v| v.is_finite() && *v > 0.0)
    }

    /// Derive the displayed image rectangle, or `None` for degenerate
    /// metrics.
    #[must_use]
    pub fn layout(&self) -> Option<DisplayLayout> {
        DisplayLayout::fit(self)
    }
}

/// Where the image actually lands inside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayLayout {
    /// Rendered image width in display units.
    pub display_width: f64,
    /// Rendered image height in display units.
    pub display_height: f64,
    /// Pillarbox bar width (zero when letterboxed).
    pub offset_x: f64,
    /// Letterbox bar height (zero when pillarboxed).
    pub offset_y: f64,
}

impl DisplayLayout {
    /// Fit the source inside the viewport.
    ///
    /// At most one offset is non-zero; both are zero when the aspect
    /// ratios match exactly.
    #[must_use]
    pub fn fit(metrics: &DisplayMetrics) -> Option<Self> {
        if !metrics.is_valid() {
            return None;
        }

        let source_aspect = metrics.source_width / metrics.source_height;
        let viewport_aspect = metrics.viewport_width / metrics.viewport_height;

        let layout = if source_aspect > viewport_aspect {
            let display_height = metrics.viewport_width / source_aspect;
            Self {
                display_width: metrics.viewport_width,
                display_height,
                offset_x: 0.0,
                offset_y: (metrics.viewport_height - display_height) / 2.0,
            }
        } else {
            let display_width = metrics.viewport_height * source_aspect;
            Self {
                display_width,
                display_height: metrics.viewport_height,
                offset_x: (metrics.viewport_width - display_width) / 2.0,
                offset_y: 0.0,
            }
        };
        Some(layout)
    }

    /// Image is full-width with bars above and below.
    #[must_use]
    pub fn is_letterboxed(&self) -> bool {
        self.offset_y > 0.0
    }

    /// Image is full-height with bars left and right.
    #[must_use]
    pub fn is_pillarboxed(&self) -> bool {
        self.offset_x > 0.0
    }
}

/// Map a display-space point to source-space pixel coordinates.
///
/// Returns `None` when the point lands on a letterbox/pillarbox bar or
/// outside the viewport, or when `metrics` is degenerate. The displayed
/// image edges are inclusive.
#[must_use]
pub fn map_to_source(point: Point, metrics: &DisplayMetrics) -> Option<Point> {
    let layout = metrics.layout()?;

    let x = point.x - layout.offset_x;
    let y = point.y - layout.offset_y;
    if !(0.0..=layout.display_width).contains(&x) || !(0.0..=layout.display_height).contains(&y) {
        return None;
    }

    Some(Point::new(
        x * (metrics.source_width / layout.display_width),
        y * (metrics.source_height / layout.display_height),
    ))
}

/// [`map_to_source`] for callers that prefer a `Result`.
///
/// # Errors
///
/// Returns [`PipelineError::OutOfBounds`] carrying the display-space
/// point when it does not land on the image.
pub fn map_to_source_checked(
    point: Point,
    metrics: &DisplayMetrics,
) -> Result<Point, PipelineError> {
    map_to_source(point, metrics).ok_or(PipelineError::OutOfBounds {
        x: point.x,
        y: point.y,
    })
}

/// Map a display-space point to source space, pulling points on the
/// bars or outside the viewport onto the nearest image edge.
///
/// Returns `None` only for degenerate metrics.
#[must_use]
pub fn map_to_source_clamped(point: Point, metrics: &DisplayMetrics) -> Option<Point> {
    let layout = metrics.layout()?;
    let x = (point.x - layout.offset_x) * (metrics.source_width / layout.display_width);
    let y = (point.y - layout.offset_y) * (metrics.source_height / layout.display_height);
    Some(Point::new(x, y).clamp_to(metrics.source_width, metrics.source_height))
}

/// Map a source-space point to where it is drawn in display space.
///
/// Inverse of [`map_to_source`] for points inside the image. Returns
/// `None` only for degenerate metrics.
#[must_use]
pub fn map_to_display(point: Point, metrics: &DisplayMetrics) -> Option<Point> {
    let layout = metrics.layout()?;
    Some(Point::new(
        point.x.mul_add(
            layout.display_width / metrics.source_width,
            layout.offset_x,
        ),
        point.y.mul_add(
            layout.display_height / metrics.source_height,
            layout.offset_y,
        ),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn assert_close(actual: Point, expected: Point) {
        assert!(
            (actual.x - expected.x).abs() < TOLERANCE && (actual.y - expected.y).abs() < TOLERANCE,
            "expected ({}, {}), got ({}, {})",
            expected.x,
            expected.y,
            actual.x,
            actual.y,
        );
    }

    #[test]
    fn wide_source_in_tall_viewport_is_letterboxed() {
        // Viewport aspect 0.5, source aspect 1.667: source is wider.
        let metrics = DisplayMetrics::new(100.0, 200.0, 100.0, 60.0);
        let layout = metrics.layout().unwrap();
        assert!((layout.display_width - 100.0).abs() < TOLERANCE);
        assert!((layout.display_height - 60.0).abs() < TOLERANCE);
        assert!((layout.offset_x).abs() < TOLERANCE);
        assert!((layout.offset_y - 70.0).abs() < TOLERANCE);
        assert!(layout.is_letterboxed());
        assert!(!layout.is_pillarboxed());
    }

    #[test]
    fn click_in_letterboxed_image_maps_to_source() {
        let metrics = DisplayMetrics::new(100.0, 200.0, 100.0, 60.0);
        let mapped = map_to_source(Point::new(50.0, 100.0), &metrics).unwrap();
        assert_close(mapped, Point::new(50.0, 30.0));
    }

    #[test]
    fn tall_source_in_wide_viewport_is_pillarboxed() {
        let metrics = DisplayMetrics::new(400.0, 100.0, 50.0, 100.0);
        let layout = metrics.layout().unwrap();
        assert!((layout.display_width - 50.0).abs() < TOLERANCE);
        assert!((layout.display_height - 100.0).abs() < TOLERANCE);
        assert!((layout.offset_x - 175.0).abs() < TOLERANCE);
        assert!(layout.offset_y.abs() < TOLERANCE);
        assert!(layout.is_pillarboxed());

        // Left bar edge of the image maps to source x = 0.
        let mapped = map_to_source(Point::new(175.0, 50.0), &metrics).unwrap();
        assert_close(mapped, Point::new(0.0, 50.0));
    }

    #[test]
    fn scaled_image_maps_with_scale_factor() {
        // 1000x500 frame shown at 200x100: each display unit is 5 pixels.
        let metrics = DisplayMetrics::new(200.0, 100.0, 1000.0, 500.0);
        let mapped = map_to_source(Point::new(20.0, 10.0), &metrics).unwrap();
        assert_close(mapped, Point::new(100.0, 50.0));
    }

    #[test]
    fn point_on_bar_is_out_of_bounds() {
        let metrics = DisplayMetrics::new(100.0, 200.0, 100.0, 60.0);
        assert!(map_to_source(Point::new(50.0, 10.0), &metrics).is_none());
        assert!(map_to_source(Point::new(50.0, 190.0), &metrics).is_none());
        assert!(map_to_source(Point::new(-1.0, 100.0), &metrics).is_none());
        assert!(matches!(
            map_to_source_checked(Point::new(50.0, 10.0), &metrics),
            Err(PipelineError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn clamped_mapping_pulls_bar_points_to_image_edge() {
        let metrics = DisplayMetrics::new(100.0, 200.0, 100.0, 60.0);
        let above = map_to_source_clamped(Point::new(50.0, 10.0), &metrics).unwrap();
        assert_close(above, Point::new(50.0, 0.0));
        let below = map_to_source_clamped(Point::new(120.0, 190.0), &metrics).unwrap();
        assert_close(below, Point::new(100.0, 60.0));

        // On the image it agrees with the strict mapping.
        let inside = Point::new(37.0, 88.0);
        assert_close(
            map_to_source_clamped(inside, &metrics).unwrap(),
            map_to_source(inside, &metrics).unwrap(),
        );
        let degenerate = DisplayMetrics::new(0.0, 100.0, 10.0, 10.0);
        assert!(map_to_source_clamped(inside, &degenerate).is_none());
    }

    #[test]
    fn image_edges_are_inclusive() {
        // 100x50 frame in a 200x200 viewport: shown at 200x100, 50px bars.
        let metrics = DisplayMetrics::new(200.0, 200.0, 100.0, 50.0);
        let top_left = map_to_source(Point::new(0.0, 50.0), &metrics).unwrap();
        assert_close(top_left, Point::new(0.0, 0.0));
        let bottom_right = map_to_source(Point::new(200.0, 150.0), &metrics).unwrap();
        assert_close(bottom_right, Point::new(100.0, 50.0));
        assert!(map_to_source(Point::new(200.0, 150.5), &metrics).is_none());
    }

    #[test]
    fn degenerate_metrics_map_nothing() {
        let bad = [
            DisplayMetrics::new(0.0, 100.0, 10.0, 10.0),
            DisplayMetrics::new(100.0, 100.0, 10.0, -10.0),
            DisplayMetrics::new(f64::NAN, 100.0, 10.0, 10.0),
            DisplayMetrics::new(100.0, f64::INFINITY, 10.0, 10.0),
        ];
        for metrics in &bad {
            assert!(!metrics.is_valid());
            assert!(metrics.layout().is_none());
            assert!(map_to_source(Point::new(1.0, 1.0), metrics).is_none());
            assert!(map_to_display(Point::new(1.0, 1.0), metrics).is_none());
        }
    }

    #[test]
    fn offsets_are_mutually_exclusive() {
        let cases = [
            (100.0, 200.0, 100.0, 60.0),
            (400.0, 100.0, 50.0, 100.0),
            (640.0, 480.0, 1920.0, 1080.0),
            (375.0, 812.0, 1280.0, 720.0),
            (300.0, 300.0, 37.0, 91.0),
            (800.0, 600.0, 4.0, 3.0),
        ];
        for (vw, vh, sw, sh) in cases {
            let layout = DisplayMetrics::new(vw, vh, sw, sh).layout().unwrap();
            let both = layout.offset_x.abs() > TOLERANCE && layout.offset_y.abs() > TOLERANCE;
            assert!(!both, "both offsets non-zero for {vw}x{vh} / {sw}x{sh}");
        }

        // Equal aspect ratios: neither bar.
        let layout = DisplayMetrics::new(800.0, 600.0, 4.0, 3.0).layout().unwrap();
        assert!(layout.offset_x.abs() < TOLERANCE);
        assert!(layout.offset_y.abs() < TOLERANCE);
    }

    #[test]
    fn display_round_trip_returns_original_point() {
        let metrics_cases = [
            DisplayMetrics::new(100.0, 200.0, 100.0, 60.0),
            DisplayMetrics::new(400.0, 100.0, 50.0, 100.0),
            DisplayMetrics::new(1280.0, 720.0, 3024.0, 4032.0),
            DisplayMetrics::new(333.0, 777.0, 640.0, 480.0),
        ];
        for metrics in &metrics_cases {
            for fx in [0.01, 0.25, 0.5, 0.77, 0.99] {
                for fy in [0.01, 0.33, 0.5, 0.9, 0.99] {
                    let source = Point::new(metrics.source_width * fx, metrics.source_height * fy);
                    let display = map_to_display(source, metrics).unwrap();
                    let back = map_to_source(display, metrics).unwrap();
                    assert!(
                        (back.x - source.x).abs() < 1e-6 && (back.y - source.y).abs() < 1e-6,
                        "round trip drifted: {source:?} -> {display:?} -> {back:?}",
                    );
                }
            }
        }
    }
}
