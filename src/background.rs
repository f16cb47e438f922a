//! # Background Removal Module
//!
//! Rimozione dello sfondo con un modello locale di segmentazione, seguita da
//! una passata fissa di pulizia del canale alpha.
//!
//! ## Responsabilità:
//! - `ExtractionConfig`: configurazione batch-wide (modello, qualità output, formato PNG)
//! - Trait `ForegroundExtractor`: punto di iniezione del modello
//! - `RembgExtractor`: implementazione che esegue il CLI `rembg` via `tokio::process`
//! - `refine_alpha()` / `finalize_png()`: post-processing dell'alpha e ri-codifica PNG
//!
//! ## Regola alpha:
//! - alpha < 10 → 0 (rumore di sfondo)
//! - 10 ≤ alpha ≤ 254 → min(255, round(alpha × 1.2)) (bordi più netti)
//! - alpha = 255 → invariato
//!
//! ## Tier:
//! | Modalità  | Modello (default)   | Qualità output |
//! |-----------|---------------------|----------------|
//! | `quality` | `isnet-general-use` | 0.9            |
//! | `fast`    | `u2netp`            | 0.8            |

use async_trait::async_trait;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, RgbaImage};
use std::path::PathBuf;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::args;
use crate::config::{Config, RemovalQuality};
use crate::error::{PipelineError, Result};
use crate::platform::PlatformCommands;

/// Below this alpha a pixel is treated as background
pub const ALPHA_FLOOR: u8 = 10;

/// Multiplier applied to partially transparent pixels
pub const ALPHA_BOOST: f32 = 1.2;

/// Output quality at or above which the best PNG compression is used
const BEST_COMPRESSION_THRESHOLD: f32 = 0.9;

/// Output format of the extraction step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
}

/// Batch-wide configuration of the foreground extraction model
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub model: String,
    pub output_quality: f32,
    pub output_format: OutputFormat,
}

impl ExtractionConfig {
    pub fn for_quality(quality: RemovalQuality, config: &Config) -> Self {
        match quality {
            RemovalQuality::Quality => Self {
                model: config.rembg_precise_model.clone(),
                output_quality: 0.9,
                output_format: OutputFormat::Png,
            },
            RemovalQuality::Fast => Self {
                model: config.rembg_fast_model.clone(),
                output_quality: 0.8,
                output_format: OutputFormat::Png,
            },
        }
    }

    fn compression(&self) -> CompressionType {
        if self.output_quality >= BEST_COMPRESSION_THRESHOLD {
            CompressionType::Best
        } else {
            CompressionType::Fast
        }
    }
}

/// Local foreground extraction model
#[async_trait]
pub trait ForegroundExtractor: Send + Sync {
    /// Return an image with the background made transparent
    async fn extract(&self, input: &[u8], config: &ExtractionConfig) -> Result<Vec<u8>>;
}

/// `ForegroundExtractor` running the `rembg` command-line tool
#[derive(Debug, Default, Clone)]
pub struct RembgExtractor {
    /// Program and leading arguments; `None` resolves `rembg` through `PlatformCommands`
    launcher: Option<(PathBuf, Vec<String>)>,
}

impl RembgExtractor {
    pub const TOOL: &'static str = "rembg";

    pub fn new() -> Self {
        Self::default()
    }

    /// Run an explicit program instead of the resolved tool,
    /// e.g. `python3` with `["-m", "rembg.cli"]`
    pub fn with_launcher(program: impl Into<PathBuf>, leading_args: Vec<String>) -> Self {
        Self {
            launcher: Some((program.into(), leading_args)),
        }
    }

    async fn command(&self) -> Result<(PathBuf, Vec<String>)> {
        if let Some((program, leading_args)) = &self.launcher {
            return Ok((program.clone(), leading_args.clone()));
        }

        let platform = PlatformCommands::instance();
        if !platform.is_command_available(Self::TOOL).await {
            return Err(PipelineError::ModelInferenceFailed(format!(
                "'{}' is not installed (pip install \"rembg[cli]\")",
                Self::TOOL
            )));
        }
        Ok((platform.command_for(Self::TOOL), Vec::new()))
    }
}

#[async_trait]
impl ForegroundExtractor for RembgExtractor {
    async fn extract(&self, input: &[u8], config: &ExtractionConfig) -> Result<Vec<u8>> {
        let (tool_path, mut args) = self.command().await?;

        let workdir = tempfile::TempDir::new()?;
        let input_path = workdir.path().join("input");
        let output_path = workdir.path().join("output.png");
        tokio::fs::write(&input_path, input).await?;

        args.extend(args![
            "i",
            "-m",
            config.model,
            input_path.display(),
            output_path.display()
        ]);
        debug!("Running {:?} {:?}", tool_path, args);

        let start_time = Instant::now();
        let output = Command::new(&tool_path)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError::ModelInferenceFailed(format!("failed to start {}: {}", Self::TOOL, e)))?;
        let elapsed = start_time.elapsed();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} failed after {:?}: {}", Self::TOOL, elapsed, stderr.trim());
            return Err(PipelineError::ModelInferenceFailed(format!(
                "{} exited with {}: {}",
                Self::TOOL,
                output.status,
                stderr.trim()
            )));
        }

        debug!("{} completed in {:?}", Self::TOOL, elapsed);
        tokio::fs::read(&output_path).await.map_err(|e| {
            PipelineError::ModelInferenceFailed(format!("{} produced no output: {}", Self::TOOL, e))
        })
    }
}

/// Apply the fixed alpha clean-up rule to every pixel
pub fn refine_alpha(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        pixel[3] = refine_alpha_value(pixel[3]);
    }
}

pub fn refine_alpha_value(alpha: u8) -> u8 {
    if alpha < ALPHA_FLOOR {
        0
    } else if alpha < u8::MAX {
        (alpha as f32 * ALPHA_BOOST).round().min(255.0) as u8
    } else {
        alpha
    }
}

/// Decode the model output, refine its alpha and re-encode it as PNG
pub fn finalize_png(model_output: &[u8], config: &ExtractionConfig) -> Result<Vec<u8>> {
    let mut image = image::load_from_memory(model_output)?.to_rgba8();
    refine_alpha(&mut image);
    encode_png(&image, config.compression())
}

pub(crate) fn encode_png(image: &RgbaImage, compression: CompressionType) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(out)
}
