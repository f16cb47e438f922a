//! # Touch-up Module
//!
//! Ritocco manuale del risultato della rimozione sfondo.
//!
//! ## Strumenti:
//! - **Erase**: rende trasparenti i pixel sotto il pennello (destination-out)
//! - **Restore**: ricopia i pixel dell'immagine originale sotto il pennello
//!
//! ## Regole:
//! - Il pennello è un disco di diametro `brush_size` (5..=50, default 20)
//! - Un tratto è una sequenza di punti; i punti consecutivi vengono interpolati
//! - I punti lontani dalla tela vengono riportati a un raggio dal bordo
//! - L'originale viene ridimensionato se le dimensioni non coincidono con l'output
//! - `reset()` riporta la tela all'output iniziale
//! - `export_png()` produce il PNG finale

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::background::encode_png;
use crate::error::Result;

pub const MIN_BRUSH_SIZE: u32 = 5;
pub const MAX_BRUSH_SIZE: u32 = 50;
pub const DEFAULT_BRUSH_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchupTool {
    Erase,
    Restore,
}

impl std::str::FromStr for TouchupTool {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "erase" => Ok(Self::Erase),
            "restore" => Ok(Self::Restore),
            other => Err(format!("unknown tool '{}' (expected erase or restore)", other)),
        }
    }
}

/// Raster canvas holding a processed output and its original
pub struct TouchupCanvas {
    original: RgbaImage,
    initial: RgbaImage,
    canvas: RgbaImage,
    brush_size: u32,
}

impl TouchupCanvas {
    /// Decode both images; the original is scaled to the output size when they differ
    pub fn new(original: &[u8], processed: &[u8]) -> Result<Self> {
        let processed = image::load_from_memory(processed)?.to_rgba8();
        let mut original = image::load_from_memory(original)?.to_rgba8();

        if original.dimensions() != processed.dimensions() {
            original = imageops::resize(&original, processed.width(), processed.height(), FilterType::Triangle);
        }

        Ok(Self {
            original,
            initial: processed.clone(),
            canvas: processed,
            brush_size: DEFAULT_BRUSH_SIZE,
        })
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Apply one stroke: a dab at every point, with gaps between points filled in
    pub fn apply_stroke(&mut self, tool: TouchupTool, points: &[(f32, f32)]) {
        let spacing = (self.brush_size as f32 / 4.0).max(1.0);
        let radius = self.brush_size as f32 / 2.0;
        let (width, height) = self.canvas.dimensions();

        let mut previous: Option<(f32, f32)> = None;
        for &(x, y) in points {
            // beyond one radius off the canvas a dab paints nothing
            let x = x.clamp(-radius, width as f32 + radius);
            let y = y.clamp(-radius, height as f32 + radius);
            if let Some((px, py)) = previous {
                let distance = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
                let steps = (distance / spacing).ceil() as u32;
                for step in 1..steps {
                    let t = step as f32 / steps as f32;
                    self.dab(tool, px + (x - px) * t, py + (y - py) * t);
                }
            }
            self.dab(tool, x, y);
            previous = Some((x, y));
        }
    }

    fn dab(&mut self, tool: TouchupTool, cx: f32, cy: f32) {
        let radius = self.brush_size as f32 / 2.0;
        let (width, height) = self.canvas.dimensions();

        let min_x = (cx - radius).floor().max(0.0) as u32;
        let min_y = (cy - radius).floor().max(0.0) as u32;
        let max_x = ((cx + radius).ceil().max(0.0) as u32).min(width);
        let max_y = ((cy + radius).ceil().max(0.0) as u32).min(height);

        for y in min_y..max_y {
            for x in min_x..max_x {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }

                match tool {
                    TouchupTool::Erase => self.canvas.get_pixel_mut(x, y)[3] = 0,
                    TouchupTool::Restore => {
                        let source = *self.original.get_pixel(x, y);
                        self.canvas.put_pixel(x, y, source);
                    }
                }
            }
        }
    }

    /// Discard every edit
    pub fn reset(&mut self) {
        self.canvas = self.initial.clone();
    }

    pub fn export_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.canvas, image::codecs::png::CompressionType::Default)
    }
}

/// Parse `x,y;x,y;...` into stroke points
pub fn parse_points(input: &str) -> std::result::Result<Vec<(f32, f32)>, String> {
    input
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("invalid point '{}' (expected x,y)", pair))?;
            let x = x.trim().parse::<f32>().map_err(|e| format!("invalid x in '{}': {}", pair, e))?;
            let y = y.trim().parse::<f32>().map_err(|e| format!("invalid y in '{}': {}", pair, e))?;
            Ok((x, y))
        })
        .collect()
}
