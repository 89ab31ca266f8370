//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::prepare`] which runs everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time, for
//! example to show the enhanced preview before tracing:
//!
//! ```rust
//! # use sigprep_pipeline::{Pipeline, PipelineConfig, PipelineError, PixelBuffer, Rectangle};
//! # fn run(frame: PixelBuffer) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let enhanced = Pipeline::new(frame, config)
//!     .crop(Some(Rectangle::new(0.0, 0.0, 40.0, 20.0)))?
//!     .enhance();
//! let preview = enhanced.output();
//!
//! let prepared = enhanced.detect_edges().trace_contours().into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for the one fallible stage), carrying all previously
//! computed intermediates. Stages that the config disables still run as
//! pass-throughs so the chain is the same shape for every config.

use crate::contour::ContourTracer;
use crate::geometry::Rectangle;
use crate::types::{
    Contour, EdgeMask, PipelineConfig, PipelineError, PixelBuffer, PreparedSignature,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The frame and config are stored but not yet touched. Call
/// [`crop`](Self::crop) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .crop() to continue"]
pub struct Pending {
    config: PipelineConfig,
    frame: PixelBuffer,
}

impl Pending {
    /// The full captured frame.
    #[must_use]
    pub const fn frame(&self) -> &PixelBuffer {
        &self.frame
    }

    /// The configuration this run will use.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate the config and copy out the selected region.
    ///
    /// `None` keeps the whole frame ("use without cropping").
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config fails
    /// [`PipelineConfig::validate`].
    /// Returns [`PipelineError::SelectionTooSmall`] if either side of
    /// `selection`, once clamped to the frame, is below
    /// `config.min_crop_size`.
    /// Returns [`PipelineError::EmptyBuffer`] if `selection` lies
    /// entirely outside the frame.
    pub fn crop(self, selection: Option<Rectangle>) -> Result<Cropped, PipelineError> {
        self.config.validate()?;
        let cropped = match selection {
            Some(rect) => {
                // Checked after snapping and clamping, so a rectangle
                // hanging off the frame cannot slip through undersized.
                let bounds = rect
                    .to_pixel_bounds(self.frame.dimensions())
                    .ok_or(PipelineError::EmptyBuffer)?;
                let (width, height) = (f64::from(bounds.width), f64::from(bounds.height));
                let min_size = self.config.min_crop_size;
                if width < min_size || height < min_size {
                    log::warn!("crop {width}x{height} rejected, minimum is {min_size}x{min_size}");
                    return Err(PipelineError::SelectionTooSmall {
                        width,
                        height,
                        min_size,
                    });
                }
                crate::crop::extract_bounds(&self.frame, bounds)
            }
            None => self.frame,
        };
        Ok(Cropped {
            config: self.config,
            selection,
            cropped,
        })
    }
}

// ───────────────────────── Stage 1: Cropped ──────────────────────────

/// Pipeline state after extracting the selected region.
///
/// Call [`enhance`](Self::enhance) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .enhance() to continue"]
pub struct Cropped {
    config: PipelineConfig,
    selection: Option<Rectangle>,
    cropped: PixelBuffer,
}

impl Cropped {
    /// The extracted region (or the whole frame).
    #[must_use]
    pub const fn cropped(&self) -> &PixelBuffer {
        &self.cropped
    }

    /// The selection that was applied, if any.
    #[must_use]
    pub const fn selection(&self) -> Option<Rectangle> {
        self.selection
    }

    /// Advance to the enhancement stage.
    ///
    /// Runs grayscale, contrast/brightness and blur when
    /// `config.enhance` is `true`; otherwise a pass-through.
    pub fn enhance(self) -> Enhanced {
        let enhanced = self
            .config
            .enhance
            .then(|| crate::enhance::enhance(&self.cropped, &self.config));
        Enhanced {
            config: self.config,
            cropped: self.cropped,
            enhanced,
        }
    }
}

// ───────────────────────── Stage 2: Enhanced ─────────────────────────

/// Pipeline state after the optional enhancement chain.
///
/// Call [`detect_edges`](Self::detect_edges) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .detect_edges() to continue"]
pub struct Enhanced {
    config: PipelineConfig,
    cropped: PixelBuffer,
    enhanced: Option<PixelBuffer>,
}

impl Enhanced {
    /// The enhanced region, or `None` if enhancement was disabled.
    #[must_use]
    pub const fn enhanced(&self) -> Option<&PixelBuffer> {
        self.enhanced.as_ref()
    }

    /// The buffer later stages work on: enhanced if available,
    /// otherwise the plain crop.
    #[must_use]
    pub fn output(&self) -> &PixelBuffer {
        self.enhanced.as_ref().unwrap_or(&self.cropped)
    }

    /// Advance to the edge detection stage.
    ///
    /// Runs Sobel edge detection on [`output`](Self::output) when
    /// `config.trace_contours` is `true`; otherwise a pass-through.
    pub fn detect_edges(self) -> EdgesDetected {
        let edges = self
            .config
            .trace_contours
            .then(|| crate::edge::detect_edges(self.output(), self.config.edge_threshold));
        EdgesDetected {
            config: self.config,
            cropped: self.cropped,
            enhanced: self.enhanced,
            edges,
        }
    }
}

// ───────────────────────── Stage 3: EdgesDetected ────────────────────

/// Pipeline state after optional edge detection.
///
/// Call [`trace_contours`](Self::trace_contours) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing; call .trace_contours() to continue"]
pub struct EdgesDetected {
    config: PipelineConfig,
    cropped: PixelBuffer,
    enhanced: Option<PixelBuffer>,
    edges: Option<EdgeMask>,
}

impl EdgesDetected {
    /// The binary edge mask, or `None` if tracing was disabled.
    #[must_use]
    pub const fn edges(&self) -> Option<&EdgeMask> {
        self.edges.as_ref()
    }

    /// Advance to the contour tracing stage.
    ///
    /// Uses `config.contour_tracer`. Finding no contours is not an
    /// error: a blank crop simply yields an empty list.
    pub fn trace_contours(self) -> Traced {
        let contours = self.edges.as_ref().map_or_else(Vec::new, |mask| {
            self.config
                .contour_tracer
                .trace(mask, self.config.min_contour_points)
        });
        Traced {
            cropped: self.cropped,
            enhanced: self.enhanced,
            edges: self.edges,
            contours,
        }
    }
}

// ───────────────────────── Stage 4: Traced ───────────────────────────

/// Final pipeline state.
///
/// Call [`into_result`](Self::into_result) to take the outputs.
#[must_use = "call .into_result() to take the prepared signature"]
pub struct Traced {
    cropped: PixelBuffer,
    enhanced: Option<PixelBuffer>,
    edges: Option<EdgeMask>,
    contours: Vec<Contour>,
}

impl Traced {
    /// The retained contours.
    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Consume the pipeline and return its outputs.
    #[must_use]
    pub fn into_result(self) -> PreparedSignature {
        let dimensions = self.cropped.dimensions();
        PreparedSignature {
            cropped: self.cropped,
            enhanced: self.enhanced,
            edges: self.edges,
            contours: self.contours,
            dimensions,
        }
    }
}

/// Entry point for the incremental pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a captured frame and config.
    ///
    /// No processing is performed; call [`.crop()`](Pending::crop) to
    /// begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(frame: PixelBuffer, config: PipelineConfig) -> Pending {
        Pending { config, frame }
    }
}
