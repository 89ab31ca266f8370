//! Contour extraction: group edge pixels of a binary mask into contours.
//!
//! This module defines the [`ContourTracer`] trait for pluggable contour
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! which algorithm to use at runtime.
//!
//! # Strategy pattern
//!
//! The default [`FloodFill`](ContourTracerKind::FloodFill) tracer is a
//! connected-component extraction: every 8-connected group of edge
//! pixels becomes one contour, its points in flood order. That is what
//! the capture UI has always produced. [`BorderFollowing`] instead walks
//! component borders and yields ordered outlines, which suits callers
//! that want polygons. Both apply the same minimum-size filter.
//!
//! [`BorderFollowing`]: ContourTracerKind::BorderFollowing

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rectangle};
use crate::types::{Contour, EdgeMask};

/// Contours with this many points or fewer are treated as noise.
pub const DEFAULT_MIN_POINTS: usize = 10;

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// 8-connected flood fill with an explicit stack. Points are in
    /// discovery order and do not form a polygon.
    #[default]
    FloodFill,

    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    ///
    /// Every component yields its outer border (and inner borders for
    /// holes), so a thick stroke can produce more than one contour.
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary edge mask (255 = edge, 0 = background).
/// Output: the contours with more than `min_points` points, in the
/// order they were found.
pub trait ContourTracer {
    /// Trace contours in the given edge mask.
    fn trace(&self, mask: &EdgeMask, min_points: usize) -> Vec<Contour>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &EdgeMask, min_points: usize) -> Vec<Contour> {
        let contours = match *self {
            Self::FloodFill => trace_flood_fill(mask, min_points),
            Self::BorderFollowing => trace_border_following(mask, min_points),
        };
        log::debug!(
            "{self:?} traced {} contours (min points {min_points}) in {}x{} mask",
            contours.len(),
            mask.width(),
            mask.height(),
        );
        contours
    }
}

/// Trace contours with the default flood-fill tracer.
#[must_use = "returns the traced contours"]
pub fn trace_contours(mask: &EdgeMask, min_points: usize) -> Vec<Contour> {
    ContourTracerKind::FloodFill.trace(mask, min_points)
}

/// Neighbour offsets in the order they are pushed onto the stack.
///
/// The last one pushed is explored first, so this order fixes the point
/// order within each contour.
const NEIGHBOURS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
];

fn trace_flood_fill(mask: &EdgeMask, min_points: usize) -> Vec<Contour> {
    let (width, height) = (mask.width(), mask.height());
    let image = mask.as_image();
    let index = |x: u32, y: u32| y as usize * width as usize + x as usize;
    let mut visited = vec![false; image.as_raw().len()];
    let mut stack: Vec<(u32, u32)> = Vec::new();
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if visited[index(x, y)] || !mask.is_edge(x, y) {
                continue;
            }

            let mut points = Vec::new();
            stack.push((x, y));
            while let Some((px, py)) = stack.pop() {
                let i = index(px, py);
                if visited[i] || !mask.is_edge(px, py) {
                    continue;
                }
                visited[i] = true;
                points.push(Point::new(f64::from(px), f64::from(py)));

                for (dx, dy) in NEIGHBOURS {
                    let nx = px.checked_add_signed(dx);
                    let ny = py.checked_add_signed(dy);
                    let (Some(nx), Some(ny)) = (nx, ny) else {
                        continue;
                    };
                    if nx < width && ny < height {
                        stack.push((nx, ny));
                    }
                }
            }

            if points.len() > min_points {
                contours.push(Contour::new(points));
            }
        }
    }

    contours
}

/// Suzuki-Abe border following via `imageproc::contours::find_contours`.
///
/// Converts `imageproc` contour points (integer grid coordinates) into
/// floating-point [`Point`]s.
fn trace_border_following(mask: &EdgeMask, min_points: usize) -> Vec<Contour> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(mask.as_image());

    contours
        .into_iter()
        .filter(|c| c.points.len() > min_points)
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Contour::new(points)
        })
        .collect()
}

/// Tight bounds of every pixel in `contours`, or `None` if there are no
/// points at all.
///
/// This is the "crop to ink" rectangle: feeding it back through
/// [`crate::crop::extract`] trims the margin around a signature.
#[must_use]
pub fn contours_bounding_box(contours: &[Contour]) -> Option<Rectangle> {
    contours
        .iter()
        .filter_map(Contour::bounding_box)
        .reduce(|a, b| {
            let left = a.x.min(b.x);
            let top = a.y.min(b.y);
            let right = a.right().max(b.right());
            let bottom = a.bottom().max(b.bottom());
            Rectangle::new(left, top, right - left, bottom - top)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::GrayImage;

    fn mask_from(width: u32, height: u32, edges: &[(u32, u32)]) -> EdgeMask {
        let mut img = GrayImage::new(width, height);
        for &(x, y) in edges {
            img.put_pixel(x, y, image::Luma([EdgeMask::EDGE]));
        }
        EdgeMask::from_raw(width, height, img.into_raw()).unwrap()
    }

    fn horizontal_line(y: u32, xs: std::ops::Range<u32>) -> Vec<(u32, u32)> {
        xs.map(|x| (x, y)).collect()
    }

    #[test]
    fn default_is_flood_fill() {
        assert_eq!(ContourTracerKind::default(), ContourTracerKind::FloodFill);
    }

    #[test]
    fn empty_mask_produces_no_contours() {
        let mask = mask_from(10, 10, &[]);
        assert!(trace_contours(&mask, DEFAULT_MIN_POINTS).is_empty());
        assert!(
            ContourTracerKind::BorderFollowing
                .trace(&mask, DEFAULT_MIN_POINTS)
                .is_empty()
        );
    }

    #[test]
    fn single_pixel_is_noise() {
        let mask = mask_from(10, 10, &[(5, 5)]);
        assert!(trace_contours(&mask, DEFAULT_MIN_POINTS).is_empty());
        // Even with no minimum it is a one-point contour.
        let all = trace_contours(&mask, 0);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].points(), &[Point::new(5.0, 5.0)]);
    }

    #[test]
    fn ten_points_dropped_eleven_kept() {
        let ten = mask_from(20, 5, &horizontal_line(2, 0..10));
        assert!(trace_contours(&ten, DEFAULT_MIN_POINTS).is_empty());

        let eleven = mask_from(20, 5, &horizontal_line(2, 0..11));
        let contours = trace_contours(&eleven, DEFAULT_MIN_POINTS);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 11);
    }

    #[test]
    fn line_points_follow_flood_order() {
        let mask = mask_from(20, 10, &horizontal_line(5, 2..14));
        let contours = trace_contours(&mask, DEFAULT_MIN_POINTS);
        assert_eq!(contours.len(), 1);
        let expected: Vec<Point> = (2..14).map(|x| Point::new(f64::from(x), 5.0)).collect();
        assert_eq!(contours[0].points(), expected.as_slice());
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let diagonal: Vec<(u32, u32)> = (0..12).map(|i| (i, i)).collect();
        let mask = mask_from(12, 12, &diagonal);
        let contours = trace_contours(&mask, DEFAULT_MIN_POINTS);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 12);
    }

    #[test]
    fn components_come_out_in_discovery_order() {
        // Lower line starts further left but is found second in row-major
        // order.
        let mut edges = horizontal_line(2, 8..20);
        edges.extend(horizontal_line(7, 0..15));
        let mask = mask_from(24, 10, &edges);
        let contours = trace_contours(&mask, DEFAULT_MIN_POINTS);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].first(), Some(&Point::new(8.0, 2.0)));
        assert_eq!(contours[1].first(), Some(&Point::new(0.0, 7.0)));
    }

    #[test]
    fn every_edge_pixel_lands_in_exactly_one_contour() {
        let mut edges = horizontal_line(1, 0..30);
        edges.extend((1..20).map(|y| (29, y)));
        edges.extend(horizontal_line(15, 3..18));
        let mask = mask_from(30, 20, &edges);
        let contours = trace_contours(&mask, 0);
        let total: usize = contours.iter().map(Contour::len).sum();
        assert_eq!(total as u64, mask.edge_pixel_count());
    }

    #[test]
    fn large_component_does_not_overflow() {
        let mask = EdgeMask::from_raw(400, 300, vec![EdgeMask::EDGE; 400 * 300]).unwrap();
        let contours = trace_contours(&mask, DEFAULT_MIN_POINTS);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 400 * 300);
    }

    #[test]
    fn border_following_outlines_filled_square() {
        let square: Vec<(u32, u32)> = (5..15)
            .flat_map(|y| (5..15).map(move |x| (x, y)))
            .collect();
        let mask = mask_from(20, 20, &square);
        let contours = ContourTracerKind::BorderFollowing.trace(&mask, DEFAULT_MIN_POINTS);
        assert!(!contours.is_empty());
        // The outline of a 10x10 square has 36 pixels, fewer than the 100
        // the flood fill returns.
        assert!(contours.iter().all(|c| c.len() < 100));
        let flood = trace_contours(&mask, DEFAULT_MIN_POINTS);
        assert_eq!(flood[0].len(), 100);
    }

    #[test]
    fn tracer_kind_serde_round_trip() {
        for kind in [ContourTracerKind::FloodFill, ContourTracerKind::BorderFollowing] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: ContourTracerKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn bounding_box_spans_all_contours() {
        let mut edges = horizontal_line(2, 8..20);
        edges.extend(horizontal_line(7, 0..15));
        let mask = mask_from(24, 10, &edges);
        let contours = trace_contours(&mask, DEFAULT_MIN_POINTS);
        let bounds = contours_bounding_box(&contours).unwrap();
        assert_eq!(bounds, Rectangle::new(0.0, 2.0, 20.0, 6.0));
    }

    #[test]
    fn no_contours_have_no_bounding_box() {
        assert_eq!(contours_bounding_box(&[]), None);
    }
}
