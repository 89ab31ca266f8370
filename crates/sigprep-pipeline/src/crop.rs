//! Drag-to-select crop rectangle and region extraction.
//!
//! [`CropSelector`] is a two-state machine (`Idle`, `Dragging`) driven by
//! pointer gestures that have already been mapped into source space.
//! Committing is a read of the current rectangle, not a transition, so a
//! rejected commit leaves the selection exactly as it was.
//!
//! ```rust
//! # use sigprep_pipeline::{CropSelector, Dimensions, Point, Rectangle};
//! let mut selector = CropSelector::new(Dimensions::new(100, 60));
//! selector.begin(Point::new(0.0, 0.0));
//! selector.update(Some(Point::new(20.0, 20.0)));
//! selector.end();
//! assert_eq!(
//!     selector.commit(10.0).ok(),
//!     Some(Rectangle::new(0.0, 0.0, 20.0, 20.0)),
//! );
//! ```

use serde::{Deserialize, Serialize};

use crate::geometry::{PixelBounds, Point, Rectangle};
use crate::types::{Dimensions, PipelineError, PixelBuffer};

/// Both spans of a selection must exceed this many pixels for it to
/// count as an existing selection (for click-inside and click-to-clear).
pub const SELECTION_EPSILON: f64 = 5.0;

/// Smallest crop side accepted by [`CropSelector::commit`] by default.
pub const DEFAULT_MIN_CROP_SIZE: f64 = 10.0;

/// Raw selection state, in source space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CropSelectionState {
    /// Where the current drag started.
    pub anchor: Point,
    /// Latest pointer position of the drag.
    pub current: Point,
    /// A drag is in progress.
    pub dragging: bool,
    /// The pointer moved since the drag started.
    pub moved: bool,
}

impl CropSelectionState {
    /// The zero-size, idle state.
    pub const IDLE: Self = Self {
        anchor: Point::ORIGIN,
        current: Point::ORIGIN,
        dragging: false,
        moved: false,
    };

    /// The normalized rectangle spanned by `anchor` and `current`.
    #[must_use]
    pub fn rectangle(&self) -> Rectangle {
        Rectangle::from_corners(self.anchor, self.current)
    }
}

/// Crop selection driven by pointer/touch gestures.
///
/// Each capture session owns its own selector; there is no shared state.
#[derive(Debug, Clone, PartialEq)]
pub struct CropSelector {
    bounds: Dimensions,
    state: CropSelectionState,
    /// A non-trivial selection existed when the current gesture began.
    had_selection: bool,
}

impl CropSelector {
    /// Start a session over a frame of `bounds` pixels with an empty
    /// selection.
    #[must_use]
    pub const fn new(bounds: Dimensions) -> Self {
        Self {
            bounds,
            state: CropSelectionState::IDLE,
            had_selection: false,
        }
    }

    /// Dimensions of the frame being cropped.
    #[must_use]
    pub const fn bounds(&self) -> Dimensions {
        self.bounds
    }

    /// Snapshot of the raw state.
    #[must_use]
    pub const fn state(&self) -> CropSelectionState {
        self.state
    }

    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        self.state.dragging
    }

    /// Whether the current rectangle is larger than
    /// [`SELECTION_EPSILON`] on both axes.
    #[must_use]
    pub fn has_selection(&self) -> bool {
        self.current_rectangle().exceeds(SELECTION_EPSILON)
    }

    /// Pointer down at `point`.
    ///
    /// Pressing inside an existing selection leaves it alone. Anywhere
    /// else the old selection is discarded and a new drag starts at
    /// `point`.
    pub fn begin(&mut self, point: Point) {
        let had_selection = !self.state.dragging && self.has_selection();
        if had_selection && self.current_rectangle().contains(point) {
            log::debug!(
                "pointer down inside selection at ({}, {}), keeping it",
                point.x,
                point.y
            );
            return;
        }

        let point = point.clamp_to_dimensions(self.bounds);
        self.had_selection = had_selection;
        self.state = CropSelectionState {
            anchor: point,
            current: point,
            dragging: true,
            moved: false,
        };
    }

    /// Pointer moved.
    ///
    /// `Some` points are clamped to the frame, so the selection never
    /// hangs off the image. `None` means the pointer left the displayed
    /// image; the last known corner stays where it was. Ignored unless a
    /// drag is in progress.
    pub fn update(&mut self, point: Option<Point>) {
        if !self.state.dragging {
            return;
        }

        self.state.current = point
            .unwrap_or(self.state.current)
            .clamp_to_dimensions(self.bounds);
        self.state.moved = true;
    }

    /// Pointer up.
    ///
    /// A press-and-release without movement over a previous selection
    /// clears it. Ignored unless a drag is in progress.
    pub fn end(&mut self) {
        if !self.state.dragging {
            return;
        }

        if !self.state.moved && self.had_selection {
            log::debug!("click outside selection, clearing it");
            self.reset();
            return;
        }

        self.state.dragging = false;
        self.had_selection = false;
    }

    /// Drop the selection and any drag in progress.
    pub fn reset(&mut self) {
        self.state = CropSelectionState::IDLE;
        self.had_selection = false;
    }

    /// The normalized selection rectangle.
    #[must_use]
    pub fn current_rectangle(&self) -> Rectangle {
        self.state.rectangle()
    }

    /// Read out the selection if both sides are at least `min_size`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SelectionTooSmall`] otherwise. The
    /// selector is not modified, so the user can keep adjusting.
    pub fn commit(&self, min_size: f64) -> Result<Rectangle, PipelineError> {
        let rect = self.current_rectangle();
        if rect.width < min_size || rect.height < min_size {
            log::warn!(
                "crop {}x{} rejected, minimum is {min_size}x{min_size}",
                rect.width,
                rect.height
            );
            return Err(PipelineError::SelectionTooSmall {
                width: rect.width,
                height: rect.height,
                min_size,
            });
        }
        Ok(rect)
    }
}

/// Copy the pixels under `rect` into a new buffer.
///
/// `rect` is snapped to whole pixels and clamped to the frame (see
/// [`Rectangle::to_pixel_bounds`]).
///
/// # Errors
///
/// Returns [`PipelineError::EmptyBuffer`] if nothing of `rect` lies
/// inside `buffer`.
pub fn extract(buffer: &PixelBuffer, rect: Rectangle) -> Result<PixelBuffer, PipelineError> {
    let bounds = rect
        .to_pixel_bounds(buffer.dimensions())
        .ok_or(PipelineError::EmptyBuffer)?;
    Ok(extract_bounds(buffer, bounds))
}

/// Copy an already snapped region out of `buffer`.
#[must_use = "returns the extracted region"]
pub(crate) fn extract_bounds(buffer: &PixelBuffer, bounds: PixelBounds) -> PixelBuffer {
    let region = image::imageops::crop_imm(
        buffer.as_image(),
        bounds.x,
        bounds.y,
        bounds.width,
        bounds.height,
    )
    .to_image();
    log::debug!(
        "extracted {}x{} at ({}, {}) from {}x{} frame",
        bounds.width,
        bounds.height,
        bounds.x,
        bounds.y,
        buffer.width(),
        buffer.height(),
    );
    PixelBuffer::from_stage(region)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn selector() -> CropSelector {
        CropSelector::new(Dimensions::new(100, 60))
    }

    fn drag(selector: &mut CropSelector, from: Point, to: Point) {
        selector.begin(from);
        selector.update(Some(to));
        selector.end();
    }

    #[test]
    fn new_selector_is_idle_and_empty() {
        let s = selector();
        assert!(!s.is_dragging());
        assert!(!s.has_selection());
        assert_eq!(s.current_rectangle(), Rectangle::ZERO);
        assert_eq!(s.state(), CropSelectionState::IDLE);
    }

    #[test]
    fn drag_produces_committable_rectangle() {
        let mut s = selector();
        drag(&mut s, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        assert!(!s.is_dragging());
        assert_eq!(
            s.commit(DEFAULT_MIN_CROP_SIZE).unwrap(),
            Rectangle::new(0.0, 0.0, 20.0, 20.0)
        );
    }

    #[test]
    fn small_drag_is_rejected_and_state_kept() {
        let mut s = selector();
        drag(&mut s, Point::new(10.0, 10.0), Point::new(5.0, 5.0));
        let before = s.clone();
        let result = s.commit(DEFAULT_MIN_CROP_SIZE);
        assert!(matches!(
            result,
            Err(PipelineError::SelectionTooSmall { width, height, .. })
                if (width - 5.0).abs() < f64::EPSILON && (height - 5.0).abs() < f64::EPSILON
        ));
        assert_eq!(s, before);
    }

    #[test]
    fn commit_accepts_exact_minimum() {
        let mut s = selector();
        drag(&mut s, Point::new(30.0, 30.0), Point::new(40.0, 40.0));
        assert!(s.commit(10.0).is_ok());
        assert!(s.commit(10.5).is_err());
    }

    #[test]
    fn rectangle_is_normalized_regardless_of_drag_direction() {
        let corners = [
            (Point::new(5.0, 5.0), Point::new(50.0, 40.0)),
            (Point::new(50.0, 40.0), Point::new(5.0, 5.0)),
            (Point::new(50.0, 5.0), Point::new(5.0, 40.0)),
            (Point::new(5.0, 40.0), Point::new(50.0, 5.0)),
        ];
        for (from, to) in corners {
            let mut s = selector();
            drag(&mut s, from, to);
            let rect = s.current_rectangle();
            assert!(rect.width >= 0.0 && rect.height >= 0.0);
            assert_eq!(rect, Rectangle::new(5.0, 5.0, 45.0, 35.0));
        }
    }

    #[test]
    fn click_outside_existing_selection_clears_it() {
        let mut s = selector();
        drag(&mut s, Point::new(10.0, 10.0), Point::new(40.0, 40.0));
        assert!(s.has_selection());

        s.begin(Point::new(80.0, 50.0));
        s.end();

        let rect = s.current_rectangle();
        assert!(rect.width.abs() < f64::EPSILON);
        assert!(rect.height.abs() < f64::EPSILON);
        assert!(!s.is_dragging());
        assert!(!s.has_selection());
    }

    #[test]
    fn press_inside_existing_selection_is_ignored() {
        let mut s = selector();
        drag(&mut s, Point::new(10.0, 10.0), Point::new(40.0, 40.0));
        let before = s.current_rectangle();

        s.begin(Point::new(20.0, 20.0));
        assert!(!s.is_dragging());
        s.update(Some(Point::new(90.0, 55.0)));
        s.end();

        assert_eq!(s.current_rectangle(), before);
    }

    #[test]
    fn trivial_selection_does_not_capture_presses() {
        // A 4x4 selection is below the epsilon, so pressing inside it
        // starts a new drag instead of being ignored.
        let mut s = selector();
        drag(&mut s, Point::new(10.0, 10.0), Point::new(14.0, 14.0));
        s.begin(Point::new(12.0, 12.0));
        assert!(s.is_dragging());
    }

    #[test]
    fn new_drag_outside_replaces_selection() {
        let mut s = selector();
        drag(&mut s, Point::new(10.0, 10.0), Point::new(40.0, 40.0));
        drag(&mut s, Point::new(50.0, 5.0), Point::new(90.0, 55.0));
        assert_eq!(
            s.current_rectangle(),
            Rectangle::new(50.0, 5.0, 40.0, 50.0)
        );
    }

    #[test]
    fn update_clamps_points_past_the_frame() {
        let mut s = selector();
        s.begin(Point::new(10.0, 10.0));
        // A raw point past the frame edge, as an unclamped caller might send.
        s.update(Some(Point::new(130.0, -20.0)));
        assert_eq!(s.state().current, Point::new(100.0, 0.0));
        s.update(None);
        assert_eq!(s.state().current, Point::new(100.0, 0.0));
        assert!(s.state().moved);
        s.end();
        assert_eq!(
            s.current_rectangle(),
            Rectangle::new(10.0, 0.0, 90.0, 10.0)
        );
    }

    #[test]
    fn selection_hanging_off_the_edge_is_trimmed_before_commit() {
        // 95..110 would be 15 wide, but only 5 columns exist.
        let mut s = selector();
        drag(&mut s, Point::new(95.0, 0.0), Point::new(110.0, 20.0));
        assert_eq!(
            s.current_rectangle(),
            Rectangle::new(95.0, 0.0, 5.0, 20.0)
        );
        assert!(matches!(
            s.commit(DEFAULT_MIN_CROP_SIZE),
            Err(PipelineError::SelectionTooSmall { width, .. })
                if (width - 5.0).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn begin_clamps_anchor_to_frame() {
        let mut s = selector();
        s.begin(Point::new(-5.0, 70.0));
        assert_eq!(s.state().anchor, Point::new(0.0, 60.0));
    }

    #[test]
    fn update_none_keeps_in_bounds_corner() {
        let mut s = selector();
        s.begin(Point::new(10.0, 10.0));
        s.update(Some(Point::new(60.0, 30.0)));
        s.update(None);
        assert_eq!(s.state().current, Point::new(60.0, 30.0));
    }

    #[test]
    fn update_and_end_are_ignored_when_idle() {
        let mut s = selector();
        s.update(Some(Point::new(50.0, 50.0)));
        s.end();
        assert_eq!(s.state(), CropSelectionState::IDLE);
    }

    #[test]
    fn reset_abandons_drag() {
        let mut s = selector();
        s.begin(Point::new(10.0, 10.0));
        s.update(Some(Point::new(60.0, 30.0)));
        s.reset();
        assert!(!s.is_dragging());
        assert_eq!(s.current_rectangle(), Rectangle::ZERO);
        // Further moves do nothing until a new drag begins.
        s.update(Some(Point::new(90.0, 50.0)));
        assert_eq!(s.current_rectangle(), Rectangle::ZERO);
    }

    #[test]
    fn click_without_previous_selection_leaves_zero_rectangle() {
        let mut s = selector();
        s.begin(Point::new(30.0, 30.0));
        s.end();
        assert!(!s.is_dragging());
        assert!(s.current_rectangle().is_empty());
        assert!(s.commit(DEFAULT_MIN_CROP_SIZE).is_err());
    }

    // ─────── extract tests ────────────────────────────────────────

    fn gradient_frame() -> PixelBuffer {
        #[allow(clippy::cast_possible_truncation)]
        PixelBuffer::from_fn(20, 10, |x, y| image::Rgba([x as u8, y as u8, 0, 255])).unwrap()
    }

    #[test]
    fn extract_copies_selected_region() {
        let frame = gradient_frame();
        let out = extract(&frame, Rectangle::new(5.0, 2.0, 10.0, 6.0)).unwrap();
        assert_eq!(out.dimensions(), Dimensions::new(10, 6));
        assert_eq!(out.as_image().get_pixel(0, 0).0, [5, 2, 0, 255]);
        assert_eq!(out.as_image().get_pixel(9, 5).0, [14, 7, 0, 255]);
    }

    #[test]
    fn extract_clamps_to_frame() {
        let frame = gradient_frame();
        let out = extract(&frame, Rectangle::new(15.0, 5.0, 30.0, 30.0)).unwrap();
        assert_eq!(out.dimensions(), Dimensions::new(5, 5));
    }

    #[test]
    fn extract_outside_frame_is_empty_buffer() {
        let frame = gradient_frame();
        let result = extract(&frame, Rectangle::new(25.0, 0.0, 10.0, 10.0));
        assert!(matches!(result, Err(PipelineError::EmptyBuffer)));
    }

    #[test]
    fn extract_leaves_input_untouched() {
        let frame = gradient_frame();
        let copy = frame.clone();
        let _ = extract(&frame, Rectangle::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert_eq!(frame, copy);
    }
}
