//! sigprep-pipeline: Pure capture and pre-processing core for signature
//! images (sans-IO).
//!
//! Takes a captured frame to an upload-ready signature image through:
//! pointer mapping -> crop selection -> extract -> grayscale ->
//! contrast/brightness -> blur -> optional edge detection and contour
//! tracing.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! pixel buffers and returns structured data. Camera access, file
//! dialogs and uploads live with the caller (`sigprep-wasm` in the
//! browser, `sigprep-bench` on the command line).

pub mod adjust;
pub mod blur;
pub mod contour;
pub mod crop;
pub mod diagnostics;
pub mod edge;
pub mod enhance;
pub mod geometry;
pub mod grayscale;
pub mod mapper;
pub mod pipeline;
pub mod types;

pub use contour::{ContourTracer, ContourTracerKind, contours_bounding_box, trace_contours};
pub use crop::{CropSelectionState, CropSelector, extract};
pub use diagnostics::{PipelineDiagnostics, prepare_with_diagnostics};
pub use edge::detect_edges;
pub use enhance::enhance;
pub use geometry::{PixelBounds, Point, Rectangle};
pub use grayscale::decode_frame;
pub use mapper::{
    DisplayLayout, DisplayMetrics, map_to_display, map_to_source, map_to_source_clamped,
};
pub use pipeline::Pipeline;
pub use types::{
    Contour, Dimensions, EdgeMask, PipelineConfig, PipelineError, PixelBuffer, PreparedSignature,
};

/// Run the full preparation pipeline on a captured frame.
///
/// `selection` is a committed crop rectangle in frame pixels, or `None`
/// to keep the whole frame ("use without cropping").
///
/// # Pipeline steps
///
/// 1. Validate `config`
/// 2. Extract the selected region
/// 3. Grayscale, contrast/brightness and blur (if `config.enhance`)
/// 4. Sobel edge detection and contour tracing (if
///    `config.trace_contours`)
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is unusable.
/// Returns [`PipelineError::SelectionTooSmall`] if a side of
/// `selection` is below `config.min_crop_size`.
/// Returns [`PipelineError::EmptyBuffer`] if `selection` does not
/// overlap the frame.
pub fn prepare(
    frame: &PixelBuffer,
    selection: Option<Rectangle>,
    config: &PipelineConfig,
) -> Result<PreparedSignature, PipelineError> {
    Ok(Pipeline::new(frame.clone(), config.clone())
        .crop(selection)?
        .enhance()
        .detect_edges()
        .trace_contours()
        .into_result())
}
