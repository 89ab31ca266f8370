//! sigprep-bench: CLI tool for running the capture pipeline on image files.
//!
//! Loads an image as if it had just been captured, optionally replays a
//! crop drag made on a scaled preview, then runs the preparation
//! pipeline with configurable parameters and prints per-stage
//! diagnostics. Useful for:
//!
//! - Tuning contrast, brightness and blur radius on real captures
//! - Tuning the Sobel threshold and minimum contour size
//! - Checking how a preview-space drag maps onto the full-size frame
//! - Measuring per-stage durations
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin sigprep-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use sigprep_pipeline::diagnostics::PipelineDiagnostics;
use sigprep_pipeline::mapper::map_to_source_checked;
use sigprep_pipeline::{
    ContourTracerKind, CropSelector, Dimensions, DisplayMetrics, PipelineConfig, Point, Rectangle,
    map_to_source,
};

/// Capture pipeline experimentation and diagnostics for sigprep.
///
/// Runs the preparation pipeline on a given image with configurable
/// parameters and prints detailed per-stage timing and count
/// diagnostics.
#[derive(Parser)]
#[command(name = "sigprep-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Preview viewport size the drag was made in, as `WIDTHxHEIGHT`.
    ///
    /// Defaults to the image size (no scaling, no bars).
    #[arg(long, value_parser = parse_size)]
    viewport: Option<(f64, f64)>,

    /// Crop drag in viewport coordinates, as `X1,Y1,X2,Y2`.
    #[arg(long, value_parser = parse_quad, conflicts_with = "crop")]
    drag: Option<[f64; 4]>,

    /// Crop rectangle in image pixels, as `X,Y,WIDTH,HEIGHT`.
    #[arg(long, value_parser = parse_quad)]
    crop: Option<[f64; 4]>,

    /// Contrast factor.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CONTRAST)]
    contrast: f32,

    /// Brightness offset.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BRIGHTNESS, allow_hyphen_values = true)]
    brightness: f32,

    /// Box blur radius in pixels (0 disables).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_RADIUS)]
    blur_radius: u32,

    /// Sobel gradient magnitude threshold.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_EDGE_THRESHOLD)]
    edge_threshold: f64,

    /// Contours with this many points or fewer are dropped.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_CONTOUR_POINTS)]
    min_contour_points: usize,

    /// Smallest accepted crop side in image pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_CROP_SIZE)]
    min_crop_size: f64,

    /// Contour tracing strategy.
    #[arg(long, value_enum, default_value_t = Tracer::FloodFill)]
    tracer: Tracer,

    /// Skip the grayscale/contrast/blur chain.
    #[arg(long)]
    no_enhance: bool,

    /// Run edge detection and contour tracing.
    #[arg(long)]
    trace: bool,

    /// Write the upload buffer (enhanced crop) as PNG.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the edge mask as PNG (requires tracing).
    #[arg(long)]
    edges: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Log pipeline stages at debug level (overrides `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

/// Contour tracing strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Tracer {
    /// Connected-component flood fill (points in discovery order).
    FloodFill,
    /// Suzuki-Abe border following (ordered outlines).
    BorderFollowing,
}

/// Parse `WIDTHxHEIGHT`.
fn parse_size(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w: f64 = w.trim().parse().map_err(|e| format!("bad width {w:?}: {e}"))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("bad height {h:?}: {e}"))?;
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return Err(format!("viewport must be positive, got {w}x{h}"));
    }
    Ok((w, h))
}

/// Parse four comma-separated numbers.
fn parse_quad(s: &str) -> Result<[f64; 4], String> {
    let values = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("bad number {v:?}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    <[f64; 4]>::try_from(values)
        .map_err(|v| format!("expected 4 comma-separated numbers, got {}", v.len()))
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        contrast: cli.contrast,
        brightness: cli.brightness,
        blur_radius: cli.blur_radius,
        edge_threshold: cli.edge_threshold,
        min_contour_points: cli.min_contour_points,
        min_crop_size: cli.min_crop_size,
        contour_tracer: match cli.tracer {
            Tracer::FloodFill => ContourTracerKind::FloodFill,
            Tracer::BorderFollowing => ContourTracerKind::BorderFollowing,
        },
        enhance: !cli.no_enhance,
        trace_contours: cli.trace,
    })
}

/// Resolve the crop selection from `--crop` or a replayed `--drag`.
///
/// The drag goes through the same mapper and selector the browser UI
/// uses: the press must land on the image, and a release over the bars
/// clamps to the image edge.
fn selection_from_cli(
    cli: &Cli,
    frame: Dimensions,
    config: &PipelineConfig,
) -> Result<Option<Rectangle>, String> {
    if let Some([x, y, w, h]) = cli.crop {
        return Ok(Some(Rectangle::new(x, y, w, h)));
    }
    let Some([x1, y1, x2, y2]) = cli.drag else {
        return Ok(None);
    };

    let (vw, vh) = cli
        .viewport
        .unwrap_or((f64::from(frame.width), f64::from(frame.height)));
    let metrics = DisplayMetrics::for_source(vw, vh, frame);
    let mut selector = CropSelector::new(frame);

    let start = map_to_source_checked(Point::new(x1, y1), &metrics)
        .map_err(|e| format!("Drag start: {e}"))?;
    selector.begin(start);
    selector.update(map_to_source(Point::new(x2, y2), &metrics));
    selector.end();

    let rect = selector
        .commit(config.min_crop_size)
        .map_err(|e| format!("Drag: {e}"))?;
    eprintln!(
        "Drag ({x1}, {y1}) -> ({x2}, {y2}) in {vw}x{vh} maps to {:.1}x{:.1} at ({:.1}, {:.1})",
        rect.width, rect.height, rect.x, rect.y,
    );
    Ok(Some(rect))
}

fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or("warn");
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn write_png(path: &Path, image: &image::DynamicImage, what: &str) {
    match image.save_with_format(path, image::ImageFormat::Png) {
        Ok(()) => eprintln!(
            "{what} written to {} ({}x{})",
            path.display(),
            image.width(),
            image.height(),
        ),
        Err(e) => eprintln!("Error writing {what} to {}: {e}", path.display()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let frame = match sigprep_pipeline::decode_frame(&image_bytes) {
        Ok(frame) => frame,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.image_path.display(),
        image_bytes.len(),
        frame.width(),
        frame.height(),
    );

    let selection = match selection_from_cli(&cli, frame.dimensions(), &config) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match sigprep_pipeline::prepare_with_diagnostics(&frame, selection, &config) {
            Ok((prepared, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write images on the first run only.
                if run == 0 {
                    if let Some(ref path) = cli.output {
                        let image = image::DynamicImage::ImageRgba8(
                            prepared.output().as_image().clone(),
                        );
                        write_png(path, &image, "Output");
                    }
                    if let Some(ref path) = cli.edges {
                        match prepared.edges {
                            Some(ref mask) => {
                                let image =
                                    image::DynamicImage::ImageLuma8(mask.as_image().clone());
                                write_png(path, &image, "Edge mask");
                            }
                            None => eprintln!("No edge mask to write (pass --trace)"),
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Option<std::time::Duration>;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Crop", |d| Some(d.crop.duration)),
        ("Enhance", |d| d.enhance.as_ref().map(|s| s.duration)),
        ("Edge Detection", |d| {
            d.edge_detection.as_ref().map(|s| s.duration)
        }),
        ("Contour Tracing", |d| {
            d.contour_tracing.as_ref().map(|s| s.duration)
        }),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
