//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning (contrast, blur radius, edge threshold) against real
//! captures. [`prepare_with_diagnostics`] collects them alongside the
//! pipeline results.
//!
//! Duration measurements use [`std::time::Duration`] (platform-agnostic).
//! Timestamps are captured internally via the `web-time` crate, which
//! uses `performance.now()` on WASM and `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::geometry::Rectangle;
use crate::pipeline::Pipeline;
use crate::types::{Contour, PipelineConfig, PipelineError, PixelBuffer, PreparedSignature};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Stages that the config disables have `Option` fields that are `None`
/// when the stage was not executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: config validation and region extraction.
    pub crop: StageDiagnostics,
    /// Stage 1: grayscale, contrast/brightness, blur (only when
    /// `config.enhance == true`).
    pub enhance: Option<StageDiagnostics>,
    /// Stage 2: Sobel edge detection (only when
    /// `config.trace_contours == true`).
    pub edge_detection: Option<StageDiagnostics>,
    /// Stage 3: contour tracing (only when
    /// `config.trace_contours == true`).
    pub contour_tracing: Option<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Region extraction metrics.
    Crop {
        /// Frame width in pixels.
        frame_width: u32,
        /// Frame height in pixels.
        frame_height: u32,
        /// Extracted width in pixels.
        width: u32,
        /// Extracted height in pixels.
        height: u32,
        /// Whether a selection was applied (`false` means the whole
        /// frame was kept).
        selected: bool,
    },
    /// Enhancement chain metrics.
    Enhance {
        /// Contrast factor.
        contrast: f32,
        /// Brightness offset.
        brightness: f32,
        /// Box blur radius.
        blur_radius: u32,
    },
    /// Sobel edge detection metrics.
    EdgeDetection {
        /// Gradient magnitude threshold.
        threshold: f64,
        /// Number of edge pixels (value == 255) in the output.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Which tracer strategy was used.
        tracer: String,
        /// Number of contours kept.
        contour_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
        /// Minimum points in any single contour.
        min_contour_points: usize,
        /// Maximum points in any single contour.
        max_contour_points: usize,
        /// Mean points per contour.
        mean_contour_points: f64,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Input frame width in pixels.
    pub frame_width: u32,
    /// Input frame height in pixels.
    pub frame_height: u32,
    /// Output width in pixels.
    pub output_width: u32,
    /// Output height in pixels.
    pub output_height: u32,
    /// Number of contours kept.
    pub contour_count: usize,
    /// Tight bounds of all contours, in output pixels.
    pub ink_bounds: Option<Rectangle>,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{} -> output {}x{}",
            self.summary.frame_width,
            self.summary.frame_height,
            self.summary.output_width,
            self.summary.output_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        // Per-stage breakdown.
        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = vec![("Crop", &self.crop)];
        if let Some(ref e) = self.enhance {
            stages.push(("Enhance", e));
        }
        if let Some(ref e) = self.edge_detection {
            stages.push(("Edge Detection", e));
        }
        if let Some(ref c) = self.contour_tracing {
            stages.push(("Contour Tracing", c));
        }

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        let ink = self.summary.ink_bounds.map_or_else(
            || "none".to_string(),
            |r| format!("{}x{} at ({}, {})", r.width, r.height, r.x, r.y),
        );
        lines.push(format!(
            "Contours: {}  |  Ink bounds: {ink}",
            self.summary.contour_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Crop {
            frame_width,
            frame_height,
            width,
            height,
            selected,
        } => {
            if *selected {
                format!("{frame_width}x{frame_height} -> {width}x{height}")
            } else {
                format!("{width}x{height} (no selection)")
            }
        }
        StageMetrics::Enhance {
            contrast,
            brightness,
            blur_radius,
        } => format!("contrast={contrast:.2} brightness={brightness:.1} blur_r={blur_radius}"),
        StageMetrics::EdgeDetection {
            threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("threshold={threshold:.1} edges={edge_pixel_count} ({density:.1}%)")
        }
        StageMetrics::ContourTracing {
            tracer,
            contour_count,
            total_point_count,
            min_contour_points,
            max_contour_points,
            mean_contour_points,
        } => {
            format!(
                "{tracer} {contour_count} contours, {total_point_count} pts (min={min_contour_points} max={max_contour_points} mean={mean_contour_points:.1})",
            )
        }
    }
}

/// Statistics for a set of contours.
pub(crate) struct ContourStats {
    /// Total number of points across all contours.
    pub total: usize,
    /// Minimum number of points in any single contour.
    pub min: usize,
    /// Maximum number of points in any single contour.
    pub max: usize,
    /// Mean number of points per contour.
    pub mean: f64,
}

/// Compute contour statistics.
pub(crate) fn contour_stats(contours: &[Contour]) -> ContourStats {
    let total: usize = contours.iter().map(Contour::len).sum();
    let min = contours.iter().map(Contour::len).min().unwrap_or(0);
    let max = contours.iter().map(Contour::len).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if contours.is_empty() {
        0.0
    } else {
        total as f64 / contours.len() as f64
    };
    ContourStats {
        total,
        min,
        max,
        mean,
    }
}

/// Run [`crate::prepare`] while timing each stage.
///
/// # Errors
///
/// Same as [`crate::prepare`].
pub fn prepare_with_diagnostics(
    frame: &PixelBuffer,
    selection: Option<Rectangle>,
    config: &PipelineConfig,
) -> Result<(PreparedSignature, PipelineDiagnostics), PipelineError> {
    let start = Instant::now();

    let t = Instant::now();
    let cropped = Pipeline::new(frame.clone(), config.clone()).crop(selection)?;
    let crop = StageDiagnostics {
        duration: t.elapsed(),
        metrics: StageMetrics::Crop {
            frame_width: frame.width(),
            frame_height: frame.height(),
            width: cropped.cropped().width(),
            height: cropped.cropped().height(),
            selected: selection.is_some(),
        },
    };

    let t = Instant::now();
    let enhanced = cropped.enhance();
    let enhance = config.enhance.then(|| StageDiagnostics {
        duration: t.elapsed(),
        metrics: StageMetrics::Enhance {
            contrast: config.contrast,
            brightness: config.brightness,
            blur_radius: config.blur_radius,
        },
    });

    let t = Instant::now();
    let edges = enhanced.detect_edges();
    let edge_detection = edges.edges().map(|mask| StageDiagnostics {
        duration: t.elapsed(),
        metrics: StageMetrics::EdgeDetection {
            threshold: config.edge_threshold,
            edge_pixel_count: mask.edge_pixel_count(),
            total_pixel_count: mask.dimensions().pixel_count(),
        },
    });

    let t = Instant::now();
    let traced = edges.trace_contours();
    let contour_tracing = config.trace_contours.then(|| {
        let duration = t.elapsed();
        let stats = contour_stats(traced.contours());
        StageDiagnostics {
            duration,
            metrics: StageMetrics::ContourTracing {
                tracer: format!("{:?}", config.contour_tracer),
                contour_count: traced.contours().len(),
                total_point_count: stats.total,
                min_contour_points: stats.min,
                max_contour_points: stats.max,
                mean_contour_points: stats.mean,
            },
        }
    });

    let result = traced.into_result();
    let diagnostics = PipelineDiagnostics {
        crop,
        enhance,
        edge_detection,
        contour_tracing,
        total_duration: start.elapsed(),
        summary: PipelineSummary {
            frame_width: frame.width(),
            frame_height: frame.height(),
            output_width: result.dimensions.width,
            output_height: result.dimensions.height,
            contour_count: result.contours.len(),
            ink_bounds: result.ink_bounds(),
        },
    };
    log::debug!(
        "prepared {}x{} in {:.3}ms",
        result.dimensions.width,
        result.dimensions.height,
        duration_ms(diagnostics.total_duration),
    );

    Ok((result, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn ring_frame() -> PixelBuffer {
        // Dark square outline on white, 4 px thick.
        PixelBuffer::from_fn(40, 40, |x, y| {
            let outer = (8..32).contains(&x) && (8..32).contains(&y);
            let inner = (12..28).contains(&x) && (12..28).contains(&y);
            if outer && !inner {
                image::Rgba([10, 10, 10, 255])
            } else {
                image::Rgba([250, 250, 250, 255])
            }
        })
        .unwrap()
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn contour_stats_empty() {
        let stats = contour_stats(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.max, 0);
        assert!((stats.mean - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn contour_stats_computes() {
        let contours = vec![
            Contour::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]),
            Contour::new(vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(3.0, 0.0),
            ]),
        ];
        let stats = contour_stats(&contours);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.min, 2);
        assert_eq!(stats.max, 4);
        assert!((stats.mean - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_config_skips_tracing_stages() {
        let (result, diag) =
            prepare_with_diagnostics(&ring_frame(), None, &PipelineConfig::default()).unwrap();
        assert!(diag.enhance.is_some());
        assert!(diag.edge_detection.is_none());
        assert!(diag.contour_tracing.is_none());
        assert_eq!(diag.summary.contour_count, 0);
        assert!(result.edges.is_none());
    }

    #[test]
    fn tracing_config_records_every_stage() {
        let config = PipelineConfig {
            trace_contours: true,
            ..PipelineConfig::default()
        };
        let selection = Rectangle::new(4.0, 4.0, 32.0, 32.0);
        let (result, diag) =
            prepare_with_diagnostics(&ring_frame(), Some(selection), &config).unwrap();

        assert!(matches!(
            diag.crop.metrics,
            StageMetrics::Crop {
                width: 32,
                height: 32,
                selected: true,
                ..
            }
        ));
        let edge_pixel_count = diag
            .edge_detection
            .as_ref()
            .and_then(|d| match d.metrics {
                StageMetrics::EdgeDetection {
                    edge_pixel_count, ..
                } => Some(edge_pixel_count),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            edge_pixel_count,
            result.edges.as_ref().unwrap().edge_pixel_count()
        );
        assert_eq!(diag.summary.contour_count, result.contours.len());
        assert!(diag.summary.contour_count > 0);
        assert_eq!(diag.summary.ink_bounds, result.ink_bounds());
    }

    #[test]
    fn diagnostics_errors_match_prepare() {
        let result = prepare_with_diagnostics(
            &ring_frame(),
            Some(Rectangle::new(0.0, 0.0, 5.0, 5.0)),
            &PipelineConfig::default(),
        );
        assert!(matches!(
            result,
            Err(PipelineError::SelectionTooSmall { .. })
        ));
    }

    #[test]
    fn diagnostics_serde_round_trip() {
        let config = PipelineConfig {
            trace_contours: true,
            ..PipelineConfig::default()
        };
        let (_, diag) = prepare_with_diagnostics(&ring_frame(), None, &config).unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.contour_count, diag.summary.contour_count);
        assert!(back.contour_tracing.is_some());
    }

    #[test]
    fn report_lists_enabled_stages() {
        let diag = PipelineDiagnostics {
            crop: StageDiagnostics {
                duration: Duration::from_millis(1),
                metrics: StageMetrics::Crop {
                    frame_width: 640,
                    frame_height: 480,
                    width: 300,
                    height: 120,
                    selected: true,
                },
            },
            enhance: Some(StageDiagnostics {
                duration: Duration::from_millis(6),
                metrics: StageMetrics::Enhance {
                    contrast: 1.2,
                    brightness: 30.0,
                    blur_radius: 1,
                },
            }),
            edge_detection: None,
            contour_tracing: Some(StageDiagnostics {
                duration: Duration::from_millis(3),
                metrics: StageMetrics::ContourTracing {
                    tracer: "FloodFill".to_string(),
                    contour_count: 4,
                    total_point_count: 200,
                    min_contour_points: 11,
                    max_contour_points: 120,
                    mean_contour_points: 50.0,
                },
            }),
            total_duration: Duration::from_millis(10),
            summary: PipelineSummary {
                frame_width: 640,
                frame_height: 480,
                output_width: 300,
                output_height: 120,
                contour_count: 4,
                ink_bounds: Some(Rectangle::new(10.0, 12.0, 250.0, 90.0)),
            },
        };

        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("640x480 -> 300x120"));
        assert!(report.contains("Enhance"));
        assert!(!report.contains("Edge Detection"));
        assert!(report.contains("FloodFill 4 contours"));
        assert!(report.contains("Ink bounds: 250x90 at (10, 12)"));
    }
}
