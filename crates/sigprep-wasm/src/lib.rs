//! Browser bindings for the sigprep capture pipeline.
//!
//! The capture page drives everything from here: pointer events on the
//! preview go through [`map_to_source`] and a [`CropSession`], and the
//! committed rectangle plus the raw RGBA frame go to [`prepare`]. The
//! same entry points are reachable from a dedicated `Worker` via
//! [`start_worker`] so large frames do not block the main thread.
//!
//! Pixel data crosses the boundary as raw `Uint8Array` RGBA buffers.
//! Everything else (configs, selections, contours, errors) is JSON.

use serde::{Deserialize, Serialize};
use sigprep_pipeline::{
    Contour, CropSelector, Dimensions, DisplayMetrics, PipelineConfig, PipelineError, PixelBuffer,
    Point, PreparedSignature, Rectangle,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// The vector (non-raster) portion of a [`PreparedSignature`],
/// serialized as JSON. The output pixels are sent separately.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorResult {
    pub dimensions: Dimensions,
    pub contours: Vec<Contour>,
    pub ink_bounds: Option<Rectangle>,
    pub edge_pixel_count: Option<u64>,
}

impl VectorResult {
    fn from_prepared(prepared: &PreparedSignature) -> Self {
        Self {
            dimensions: prepared.dimensions,
            contours: prepared.contours.clone(),
            ink_bounds: prepared.ink_bounds(),
            edge_pixel_count: prepared
                .edges
                .as_ref()
                .map(sigprep_pipeline::EdgeMask::edge_pixel_count),
        }
    }
}

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    // Pipeline stages log at debug; the console only needs info and up.
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&JsValue::from_str("sigprep logger already installed"));
    }
}

// ───── Errors and config ─────────────────────────────────────────────

/// Serialize a pipeline error as JSON for the JS side.
fn error_json(error: &PipelineError) -> String {
    serde_json::to_string(error).unwrap_or_else(|e| format!("\"serialization error: {e}\""))
}

fn error_value(error: &PipelineError) -> JsValue {
    JsValue::from_str(&error_json(error))
}

/// Parse a `PipelineConfig` from JSON. Empty input means defaults.
fn parse_config(json: &str) -> Result<PipelineConfig, PipelineError> {
    if json.trim().is_empty() {
        return Ok(PipelineConfig::default());
    }
    serde_json::from_str(json)
        .map_err(|e| PipelineError::InvalidConfig(format!("failed to parse config: {e}")))
}

/// Parse an optional selection rectangle. `None`, empty and `null` all
/// mean "use without cropping".
fn parse_selection(json: Option<&str>) -> Result<Option<Rectangle>, PipelineError> {
    match json.map(str::trim) {
        None | Some("" | "null") => Ok(None),
        Some(json) => serde_json::from_str(json)
            .map(Some)
            .map_err(|e| PipelineError::InvalidConfig(format!("failed to parse selection: {e}"))),
    }
}

const fn rect_array(rect: Rectangle) -> [f64; 4] {
    [rect.x, rect.y, rect.width, rect.height]
}

// ───── Coordinate mapping ────────────────────────────────────────────

/// Map a viewport point to image pixels.
///
/// Returns `[x, y]`, or `undefined` when the point is on the bars or
/// the layout is degenerate.
#[wasm_bindgen(js_name = mapToSource)]
#[must_use]
pub fn map_to_source(
    x: f64,
    y: f64,
    viewport_width: f64,
    viewport_height: f64,
    source_width: f64,
    source_height: f64,
) -> Option<Box<[f64]>> {
    let metrics = DisplayMetrics::new(viewport_width, viewport_height, source_width, source_height);
    sigprep_pipeline::map_to_source(Point::new(x, y), &metrics).map(|p| Box::from([p.x, p.y]))
}

/// Map an image pixel to viewport coordinates (for drawing the
/// selection overlay).
#[wasm_bindgen(js_name = mapToDisplay)]
#[must_use]
pub fn map_to_display(
    x: f64,
    y: f64,
    viewport_width: f64,
    viewport_height: f64,
    source_width: f64,
    source_height: f64,
) -> Option<Box<[f64]>> {
    let metrics = DisplayMetrics::new(viewport_width, viewport_height, source_width, source_height);
    sigprep_pipeline::map_to_display(Point::new(x, y), &metrics).map(|p| Box::from([p.x, p.y]))
}

// ───── Crop session ──────────────────────────────────────────────────

/// A crop selection bound to one captured frame and its preview.
///
/// Pointer coordinates are viewport coordinates; the session maps them
/// to image pixels itself. Rectangles come back as `[x, y, w, h]`.
#[wasm_bindgen]
pub struct CropSession {
    selector: CropSelector,
    metrics: DisplayMetrics,
}

#[wasm_bindgen]
impl CropSession {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new(
        image_width: u32,
        image_height: u32,
        viewport_width: f64,
        viewport_height: f64,
    ) -> Self {
        let bounds = Dimensions::new(image_width, image_height);
        Self {
            selector: CropSelector::new(bounds),
            metrics: DisplayMetrics::for_source(viewport_width, viewport_height, bounds),
        }
    }

    /// The preview was resized. The selection is in image pixels and
    /// survives unchanged.
    #[wasm_bindgen(js_name = setViewport)]
    pub fn set_viewport(&mut self, viewport_width: f64, viewport_height: f64) {
        self.metrics =
            DisplayMetrics::for_source(viewport_width, viewport_height, self.selector.bounds());
    }

    /// Pointer down.
    ///
    /// A press on the bars around the image counts as a press on the
    /// nearest image edge, so it clears a selection like any other
    /// click outside it. Returns whether the press was on the image
    /// itself.
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        let point = Point::new(x, y);
        let Some(clamped) = sigprep_pipeline::map_to_source_clamped(point, &self.metrics) else {
            return false;
        };
        self.selector.begin(clamped);
        sigprep_pipeline::map_to_source(point, &self.metrics).is_some()
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.selector
            .update(sigprep_pipeline::map_to_source(Point::new(x, y), &self.metrics));
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self) {
        self.selector.end();
    }

    pub fn reset(&mut self) {
        self.selector.reset();
    }

    #[wasm_bindgen(getter, js_name = hasSelection)]
    #[must_use]
    pub fn has_selection(&self) -> bool {
        self.selector.has_selection()
    }

    #[wasm_bindgen(getter, js_name = isDragging)]
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.selector.is_dragging()
    }

    /// Current selection in image pixels.
    #[must_use]
    pub fn rectangle(&self) -> Box<[f64]> {
        Box::from(rect_array(self.selector.current_rectangle()))
    }

    /// Current selection in viewport coordinates, for the overlay.
    #[wasm_bindgen(js_name = displayRectangle)]
    #[must_use]
    pub fn display_rectangle(&self) -> Option<Box<[f64]>> {
        let rect = self.selector.current_rectangle();
        let top_left = sigprep_pipeline::map_to_display(Point::new(rect.x, rect.y), &self.metrics)?;
        let bottom_right = sigprep_pipeline::map_to_display(
            Point::new(rect.right(), rect.bottom()),
            &self.metrics,
        )?;
        Some(Box::from([
            top_left.x,
            top_left.y,
            bottom_right.x - top_left.x,
            bottom_right.y - top_left.y,
        ]))
    }

    /// Accept the selection.
    ///
    /// # Errors
    ///
    /// Throws a JSON-serialized `PipelineError` (`SelectionTooSmall`)
    /// when a side is below `min_size`. The selection is kept.
    pub fn commit(&self, min_size: f64) -> Result<Box<[f64]>, JsValue> {
        self.selector
            .commit(min_size)
            .map(|rect| Box::from(rect_array(rect)))
            .map_err(|e| error_value(&e))
    }
}

// ───── Pipeline ──────────────────────────────────────────────────────

fn run_prepare(
    rgba: Vec<u8>,
    width: u32,
    height: u32,
    selection_json: Option<&str>,
    config_json: &str,
) -> Result<PreparedSignature, PipelineError> {
    let config = parse_config(config_json)?;
    let selection = parse_selection(selection_json)?;
    let frame = PixelBuffer::from_raw(width, height, rgba)?;
    sigprep_pipeline::prepare(&frame, selection, &config)
}

/// Grayscale, contrast/brightness and blur over a raw RGBA frame.
///
/// # Errors
///
/// Throws a JSON-serialized `PipelineError` when the buffer does not
/// match `width`x`height` or the config is invalid.
#[wasm_bindgen]
pub fn enhance(
    rgba: &[u8],
    width: u32,
    height: u32,
    config_json: &str,
) -> Result<Vec<u8>, JsValue> {
    let config = parse_config(config_json).map_err(|e| error_value(&e))?;
    config.validate().map_err(|e| error_value(&e))?;
    let frame = PixelBuffer::from_raw(width, height, rgba.to_vec()).map_err(|e| error_value(&e))?;
    Ok(sigprep_pipeline::enhance(&frame, &config).into_raw())
}

/// Run the full pipeline over a raw RGBA frame.
///
/// Returns an object with `width`, `height`, `pixels` (`Uint8Array`,
/// RGBA) and `vectorJson` (a JSON [`VectorResult`]).
///
/// # Errors
///
/// Throws a JSON-serialized `PipelineError`.
#[wasm_bindgen]
pub fn prepare(
    rgba: &[u8],
    width: u32,
    height: u32,
    selection_json: Option<String>,
    config_json: &str,
) -> Result<JsValue, JsValue> {
    let prepared = run_prepare(rgba.to_vec(), width, height, selection_json.as_deref(), config_json)
        .map_err(|e| error_value(&e))?;
    let response = js_sys::Object::new();
    fill_prepared(&response, &prepared)?;
    Ok(response.into())
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) -> Result<(), JsValue> {
    js_sys::Reflect::set(target, &JsValue::from_str(key), value).map(|_| ())
}

/// Write the output pixels and vector JSON onto `target`.
fn fill_prepared(target: &js_sys::Object, prepared: &PreparedSignature) -> Result<(), JsValue> {
    let vector_json = serde_json::to_string(&VectorResult::from_prepared(prepared))
        .map_err(|e| JsValue::from_str(&format!("failed to serialize vector data: {e}")))?;
    let output = prepared.output();

    set(target, "width", &JsValue::from_f64(f64::from(output.width())))?;
    set(target, "height", &JsValue::from_f64(f64::from(output.height())))?;
    set(target, "pixels", &js_sys::Uint8Array::from(output.as_raw()))?;
    set(target, "vectorJson", &JsValue::from_str(&vector_json))
}

// ───── Worker ────────────────────────────────────────────────────────

/// Install the `onmessage` handler when running inside a dedicated
/// worker.
///
/// Message protocol: the main thread posts an object with
/// - `rgba`: `Uint8Array` of raw RGBA pixels
/// - `width`, `height`: frame size
/// - `selectionJson`: `String` JSON rectangle, or `null`
/// - `configJson`: `String` JSON `PipelineConfig`
/// - `generation`: `f64` counter, echoed back
///
/// On success the worker responds with `generation`, `ok: true` and the
/// fields of [`prepare`]. On error it responds with `generation`,
/// `ok: false` and `errorJson`.
///
/// # Errors
///
/// Fails when not called from a `DedicatedWorkerGlobalScope`.
#[wasm_bindgen(js_name = startWorker)]
pub fn start_worker() -> Result<(), JsValue> {
    let global: web_sys::DedicatedWorkerGlobalScope = js_sys::global().dyn_into()?;

    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(&event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // lives for the worker lifetime
    Ok(())
}

struct WorkerRequest {
    rgba: Vec<u8>,
    width: u32,
    height: u32,
    selection_json: Option<String>,
    config_json: String,
}

fn field(data: &JsValue, key: &str) -> Result<JsValue, PipelineError> {
    js_sys::Reflect::get(data, &JsValue::from_str(key))
        .map_err(|_| PipelineError::InvalidConfig(format!("missing {key} field")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn dimension(data: &JsValue, key: &str) -> Result<u32, PipelineError> {
    field(data, key)?
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u32::MAX))
        .map(|v| v as u32)
        .ok_or_else(|| PipelineError::InvalidDimensions(format!("{key} is not a valid size")))
}

fn read_request(data: &JsValue) -> Result<WorkerRequest, PipelineError> {
    let rgba: js_sys::Uint8Array = field(data, "rgba")?
        .dyn_into()
        .map_err(|_| PipelineError::InvalidConfig("rgba is not a Uint8Array".into()))?;
    let config_json = field(data, "configJson")?
        .as_string()
        .ok_or_else(|| PipelineError::InvalidConfig("configJson is not a string".into()))?;

    Ok(WorkerRequest {
        rgba: rgba.to_vec(),
        width: dimension(data, "width")?,
        height: dimension(data, "height")?,
        selection_json: field(data, "selectionJson")?.as_string(),
        config_json,
    })
}

fn fill_response(
    response: &js_sys::Object,
    generation: f64,
    outcome: &Result<PreparedSignature, PipelineError>,
) -> Result<(), JsValue> {
    set(response, "generation", &JsValue::from_f64(generation))?;
    match outcome {
        Ok(prepared) => {
            set(response, "ok", &JsValue::TRUE)?;
            fill_prepared(response, prepared)
        }
        Err(e) => {
            set(response, "ok", &JsValue::FALSE)?;
            set(response, "errorJson", &JsValue::from_str(&error_json(e)))
        }
    }
}

fn handle_message(event: &web_sys::MessageEvent) {
    let data = event.data();
    let generation = js_sys::Reflect::get(&data, &JsValue::from_str("generation"))
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    let outcome = read_request(&data).and_then(|request| {
        run_prepare(
            request.rgba,
            request.width,
            request.height,
            request.selection_json.as_deref(),
            &request.config_json,
        )
    });

    let response = js_sys::Object::new();
    let filled = fill_response(&response, generation, &outcome);

    if let Err(e) = filled {
        web_sys::console::error_2(&JsValue::from_str("failed to build worker response"), &e);
        return;
    }
    if let Err(e) = &outcome {
        log::warn!("worker request {generation} failed: {e}");
    }
    if let Ok(global) = js_sys::global().dyn_into::<web_sys::DedicatedWorkerGlobalScope>()
        && let Err(e) = global.post_message(&response)
    {
        web_sys::console::error_2(&JsValue::from_str("failed to postMessage"), &e);
    }
}
