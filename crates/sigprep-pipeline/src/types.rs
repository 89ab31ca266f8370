//! Shared types for the sigprep capture pipeline.

use serde::{Deserialize, Serialize};

use crate::contour::ContourTracerKind;
use crate::geometry::{Point, Rectangle};

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can build frames without
/// depending on `image` directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Byte length of a buffer with `channels` bytes per pixel, or
    /// `None` if it does not fit in memory.
    fn byte_len(self, channels: u64) -> Option<usize> {
        self.pixel_count()
            .checked_mul(channels)
            .and_then(|len| usize::try_from(len).ok())
    }
}

/// An owned RGBA8 frame with non-zero area.
///
/// Wraps [`RgbaImage`], adding the guarantee that `width >= 1`,
/// `height >= 1`, and the raw buffer holds exactly
/// `width * height * 4` bytes. Every stage takes a `&PixelBuffer` and
/// returns a freshly allocated one; inputs are never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer(RgbaImage);

impl PixelBuffer {
    /// Wrap raw interleaved RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyBuffer`] if either side is zero.
    /// Returns [`PipelineError::InvalidDimensions`] if `data.len()` is not
    /// `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        let dimensions = Dimensions::new(width, height);
        if dimensions.is_empty() {
            return Err(PipelineError::EmptyBuffer);
        }
        let expected = dimensions.byte_len(4);
        if expected != Some(data.len()) {
            return Err(PipelineError::InvalidDimensions(format!(
                "{width}x{height} RGBA frame needs {} bytes, got {}",
                dimensions.pixel_count().saturating_mul(4),
                data.len(),
            )));
        }
        RgbaImage::from_raw(width, height, data)
            .map(Self)
            .ok_or_else(|| {
                PipelineError::InvalidDimensions(format!("{width}x{height} RGBA frame"))
            })
    }

    /// Wrap an existing RGBA image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyBuffer`] if the image has zero area.
    pub fn from_image(image: RgbaImage) -> Result<Self, PipelineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PipelineError::EmptyBuffer);
        }
        Ok(Self(image))
    }

    /// Build a frame pixel by pixel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyBuffer`] if either side is zero.
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Result<Self, PipelineError>
    where
        F: FnMut(u32, u32) -> image::Rgba<u8>,
    {
        if width == 0 || height == 0 {
            return Err(PipelineError::EmptyBuffer);
        }
        Ok(Self(RgbaImage::from_fn(width, height, f)))
    }

    /// Wrap a stage output whose dimensions were derived from a valid
    /// buffer.
    pub(crate) fn from_stage(image: RgbaImage) -> Self {
        debug_assert!(image.width() > 0 && image.height() > 0);
        Self(image)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.0.width(), self.0.height())
    }

    /// Borrow the underlying image.
    #[must_use]
    pub const fn as_image(&self) -> &RgbaImage {
        &self.0
    }

    /// Raw interleaved RGBA bytes.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    /// Consume the buffer and return its raw RGBA bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.0.into_raw()
    }
}

/// A binary edge mask: one byte per pixel, every value is
/// [`EdgeMask::EDGE`] or [`EdgeMask::BACKGROUND`].
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeMask(GrayImage);

impl EdgeMask {
    /// Value of an edge pixel.
    pub const EDGE: u8 = 255;
    /// Value of a background pixel.
    pub const BACKGROUND: u8 = 0;

    /// Wrap a raw single-channel mask.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyBuffer`] if either side is zero.
    /// Returns [`PipelineError::InvalidDimensions`] if `data.len()` is not
    /// `width * height` or a value other than 0/255 is present.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        let dimensions = Dimensions::new(width, height);
        if dimensions.is_empty() {
            return Err(PipelineError::EmptyBuffer);
        }
        if dimensions.byte_len(1) != Some(data.len()) {
            return Err(PipelineError::InvalidDimensions(format!(
                "{width}x{height} edge mask needs {} bytes, got {}",
                dimensions.pixel_count(),
                data.len(),
            )));
        }
        if let Some(bad) = data
            .iter()
            .find(|&&v| v != Self::EDGE && v != Self::BACKGROUND)
        {
            return Err(PipelineError::InvalidDimensions(format!(
                "edge mask value {bad} is not 0 or 255"
            )));
        }
        GrayImage::from_raw(width, height, data)
            .map(Self)
            .ok_or_else(|| PipelineError::InvalidDimensions(format!("{width}x{height} edge mask")))
    }

    pub(crate) fn from_stage(image: GrayImage) -> Self {
        debug_assert!(
            image
                .pixels()
                .all(|p| p.0[0] == Self::EDGE || p.0[0] == Self::BACKGROUND)
        );
        Self(image)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.0.width(), self.0.height())
    }

    /// Whether the pixel at `(x, y)` is an edge. Out-of-range
    /// coordinates are background.
    #[must_use]
    pub fn is_edge(&self, x: u32, y: u32) -> bool {
        self.0
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] == Self::EDGE)
    }

    /// Number of edge pixels.
    #[must_use]
    pub fn edge_pixel_count(&self) -> u64 {
        self.0
            .pixels()
            .map(|p| u64::from(p.0[0] == Self::EDGE))
            .sum()
    }

    /// Borrow the underlying single-channel image.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Raw mask bytes, row-major.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }
}

/// Points of one connected edge component, in discovery order.
///
/// The order is whatever the tracer visited first; consumers must not
/// assume the points form a simple polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Smallest rectangle covering every pixel of the contour.
    ///
    /// Points are pixel coordinates, so a single point at `(x, y)` covers
    /// the unit square starting there.
    #[must_use]
    pub fn bounding_box(&self) -> Option<Rectangle> {
        let first = self.0.first()?;
        let (mut min, mut max) = (*first, *first);
        for p in &self.0[1..] {
            min = Point::new(min.x.min(p.x), min.y.min(p.y));
            max = Point::new(max.x.max(p.x), max.y.max(p.y));
        }
        Some(Rectangle::new(
            min.x,
            min.y,
            max.x - min.x + 1.0,
            max.y - min.y + 1.0,
        ))
    }
}

/// Configuration for the capture pipeline.
///
/// All parameters default to the values the capture UI has always
/// used; each is exposed so it can be tuned from the bench CLI or the
/// browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Linear contrast factor applied after grayscale conversion.
    pub contrast: f32,

    /// Brightness offset added after the contrast factor.
    pub brightness: f32,

    /// Box blur radius in pixels. `0` disables the blur.
    pub blur_radius: u32,

    /// Sobel gradient magnitude above which a pixel is an edge.
    pub edge_threshold: f64,

    /// Contours with this many points or fewer are dropped as noise.
    pub min_contour_points: usize,

    /// Smallest crop side accepted by a commit, in source pixels.
    pub min_crop_size: f64,

    /// Which contour tracing algorithm to use.
    pub contour_tracer: ContourTracerKind,

    /// Whether to run the grayscale/contrast/blur enhancement chain.
    pub enhance: bool,

    /// Whether to run edge detection and contour tracing.
    pub trace_contours: bool,
}

impl PipelineConfig {
    pub const DEFAULT_CONTRAST: f32 = 1.2;
    pub const DEFAULT_BRIGHTNESS: f32 = 30.0;
    pub const DEFAULT_BLUR_RADIUS: u32 = 1;
    pub const DEFAULT_EDGE_THRESHOLD: f64 = crate::edge::DEFAULT_THRESHOLD;
    pub const DEFAULT_MIN_CONTOUR_POINTS: usize = crate::contour::DEFAULT_MIN_POINTS;
    pub const DEFAULT_MIN_CROP_SIZE: f64 = crate::crop::DEFAULT_MIN_CROP_SIZE;

    /// Largest accepted `blur_radius`. Anything wider only flattens the
    /// signature to its mean colour.
    pub const MAX_BLUR_RADIUS: u32 = 256;

    /// Check that every numeric parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.contrast.is_finite() || self.contrast < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "contrast must be finite and non-negative, got {}",
                self.contrast
            )));
        }
        if !self.brightness.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "brightness must be finite, got {}",
                self.brightness
            )));
        }
        if self.blur_radius > Self::MAX_BLUR_RADIUS {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_radius must be at most {}, got {}",
                Self::MAX_BLUR_RADIUS,
                self.blur_radius
            )));
        }
        if !self.edge_threshold.is_finite() || self.edge_threshold < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "edge_threshold must be finite and non-negative, got {}",
                self.edge_threshold
            )));
        }
        if !self.min_crop_size.is_finite() || self.min_crop_size <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "min_crop_size must be finite and positive, got {}",
                self.min_crop_size
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            contrast: Self::DEFAULT_CONTRAST,
            brightness: Self::DEFAULT_BRIGHTNESS,
            blur_radius: Self::DEFAULT_BLUR_RADIUS,
            edge_threshold: Self::DEFAULT_EDGE_THRESHOLD,
            min_contour_points: Self::DEFAULT_MIN_CONTOUR_POINTS,
            min_crop_size: Self::DEFAULT_MIN_CROP_SIZE,
            contour_tracer: ContourTracerKind::default(),
            enhance: true,
            trace_contours: false,
        }
    }
}

/// Output of [`crate::prepare`]: the extracted region plus whatever
/// optional stages the config enabled.
#[derive(Debug, Clone)]
pub struct PreparedSignature {
    /// The committed region copied out of the frame (or the whole frame
    /// when no selection was given).
    pub cropped: PixelBuffer,
    /// Enhanced copy of `cropped` (`Some` only when `config.enhance`).
    pub enhanced: Option<PixelBuffer>,
    /// Binary edge mask (`Some` only when `config.trace_contours`).
    pub edges: Option<EdgeMask>,
    /// Retained contours, empty unless `config.trace_contours`.
    pub contours: Vec<Contour>,
    /// Dimensions of `cropped`.
    pub dimensions: Dimensions,
}

impl PreparedSignature {
    /// The buffer to hand to the upload step: enhanced when the
    /// enhancement chain ran, otherwise the plain crop.
    #[must_use]
    pub fn output(&self) -> &PixelBuffer {
        self.enhanced.as_ref().unwrap_or(&self.cropped)
    }

    /// Tight bounds of all retained contours, if any.
    #[must_use]
    pub fn ink_bounds(&self) -> Option<Rectangle> {
        crate::contour::contours_bounding_box(&self.contours)
    }
}

/// Errors raised by the capture core.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input had zero area (or zero bytes).
    #[error("pixel buffer is empty")]
    EmptyBuffer,

    /// Buffer length or contents do not match the stated dimensions.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// A pointer location fell outside the displayed image.
    #[error("point ({x}, {y}) is outside the displayed image")]
    OutOfBounds { x: f64, y: f64 },

    /// A crop was committed below the minimum size.
    #[error("selection {width}x{height} is smaller than the minimum {min_size}x{min_size}")]
    SelectionTooSmall {
        width: f64,
        height: f64,
        min_size: f64,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PipelineError`.
///
/// A deserialized `ImageDecode` cannot rebuild the typed
/// `image::ImageError`, so it comes back as `InvalidConfig` carrying
/// the original message.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyBuffer,
    InvalidDimensions(String),
    OutOfBounds {
        x: f64,
        y: f64,
    },
    SelectionTooSmall {
        width: f64,
        height: f64,
        min_size: f64,
    },
    InvalidConfig(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyBuffer => PipelineErrorProxy::EmptyBuffer,
            Self::InvalidDimensions(s) => PipelineErrorProxy::InvalidDimensions(s.clone()),
            Self::OutOfBounds { x, y } => PipelineErrorProxy::OutOfBounds { x: *x, y: *y },
            Self::SelectionTooSmall {
                width,
                height,
                min_size,
            } => PipelineErrorProxy::SelectionTooSmall {
                width: *width,
                height: *height,
                min_size: *min_size,
            },
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyBuffer => Self::EmptyBuffer,
            PipelineErrorProxy::InvalidDimensions(s) => Self::InvalidDimensions(s),
            PipelineErrorProxy::OutOfBounds { x, y } => Self::OutOfBounds { x, y },
            PipelineErrorProxy::SelectionTooSmall {
                width,
                height,
                min_size,
            } => Self::SelectionTooSmall {
                width,
                height,
                min_size,
            },
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}
