//! # WebP Encoder Module
//!
//! Codifica in WebP lossy usata dall'endpoint di conversione.
//!
//! ## Responsabilità:
//! - Decodifica qualsiasi formato supportato da `image` (JPEG, PNG, GIF, BMP, TIFF, WebP)
//! - Normalizza l'immagine in RGB8 / RGBA8 (unici layout accettati dall'encoder)
//! - Codifica in WebP con la qualità configurata (default 80)
//! - Rifiuta con `EncodeFailed` le immagini oltre il limite di libwebp (16383 px per lato),
//!   senza mai andare in panic dentro il worker
//!
//! Operazione CPU-bound: il server la esegue dentro `spawn_blocking`.

use image::DynamicImage;
use std::ops::Deref;

use crate::error::{PipelineError, Result};

/// Default lossy WebP quality
pub const DEFAULT_WEBP_QUALITY: u8 = 80;

/// Largest width or height libwebp accepts
pub const MAX_WEBP_DIMENSION: u32 = 16383;

/// Lossy WebP encoder with a fixed quality
#[derive(Debug, Clone, Copy)]
pub struct WebpEncoder {
    quality: f32,
}

impl Default for WebpEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_WEBP_QUALITY)
    }
}

impl WebpEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100) as f32,
        }
    }

    /// Decode `input` and re-encode it as WebP
    pub fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let img = image::load_from_memory(input)?;
        self.encode_image(&img)
    }

    pub fn encode_image(&self, img: &DynamicImage) -> Result<Vec<u8>> {
        let (width, height) = (img.width(), img.height());
        if width > MAX_WEBP_DIMENSION || height > MAX_WEBP_DIMENSION {
            return Err(PipelineError::EncodeFailed(format!(
                "{}x{} exceeds the WebP limit of {} px per side",
                width, height, MAX_WEBP_DIMENSION
            )));
        }

        let normalized = if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };

        let encoder = webp::Encoder::from_image(&normalized)
            .map_err(|reason| PipelineError::EncodeFailed(reason.to_string()))?;

        // `encode` unwraps the libwebp status, `encode_simple` hands it back
        let memory = encoder
            .encode_simple(false, self.quality)
            .map_err(|status| PipelineError::EncodeFailed(format!("libwebp error: {:?}", status)))?;

        // `WebPMemory` is !Send, copy it out before returning
        Ok(memory.deref().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 13) as u8, (y * 7) as u8, 128, if x % 2 == 0 { 255 } else { 90 }])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_encode_png_to_webp() {
        let webp = WebpEncoder::default().encode(&sample_png(16, 8)).unwrap();

        assert_eq!(&webp[0..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");

        let decoded = webp::Decoder::new(&webp).decode().unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_encode_rejects_garbage() {
        let result = WebpEncoder::default().encode(b"not an image at all");
        assert!(matches!(result, Err(PipelineError::Image(_))));
    }

    #[test]
    fn test_oversized_side_is_encode_failure() {
        let png = sample_png(MAX_WEBP_DIMENSION + 1, 1);
        let result = WebpEncoder::default().encode(&png);
        assert!(matches!(result, Err(PipelineError::EncodeFailed(ref m)) if m.contains("16384x1")));
    }

    #[test]
    fn test_largest_side_still_encodes() {
        let webp = WebpEncoder::default().encode(&sample_png(MAX_WEBP_DIMENSION, 1)).unwrap();
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn test_quality_clamped() {
        assert_eq!(WebpEncoder::new(0).quality, 1.0);
        assert_eq!(WebpEncoder::new(200).quality, 100.0);
    }
}
