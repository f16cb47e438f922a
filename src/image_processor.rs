//! # Image Processing Module
//!
//! Questo modulo trasforma una singola immagine secondo la modalità del batch.
//!
//! ## Modalità:
//!
//! | Modalità           | Backend                          | Output              |
//! |--------------------|----------------------------------|---------------------|
//! | `Encode`           | endpoint remoto (`EncodeService`) | `<nome>.webp`       |
//! | `RemoveBackground` | modello locale + pulizia alpha   | `<nome>_no_bg.png`  |
//!
//! ## Pipeline per singolo file:
//! 1. **Validazione** (solo Encode): dimensione ≤ limite, media type `image/*`.
//!    Nessuna chiamata remota se la validazione fallisce
//! 2. **Elaborazione**: chiamata remota oppure inferenza locale, con timeout per file
//! 3. **Post-processing** (solo RemoveBackground): `refine_alpha` + ri-codifica PNG
//!    su thread bloccante
//! 4. **Risultato**: `ResultItem` con i byte originali e quelli prodotti
//!
//! Il processore non modifica lo stato del chiamante: ogni errore riguarda
//! solo il file corrente.
//!
//! ## Esempio:
//! ```ignore
//! let processor = ImageProcessor::new(
//!     Arc::new(HttpEncodeClient::new(&config.endpoint_url)),
//!     Arc::new(RembgExtractor::new()),
//!     &config,
//! );
//! let item = processor.process(&file, ProcessingMode::Encode).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::background::{finalize_png, ExtractionConfig, ForegroundExtractor};
use crate::config::Config;
use crate::encode_client::EncodeService;
use crate::error::{PipelineError, Result};
use crate::file_manager::InputFile;
use crate::state::{ProcessingMode, ResultItem};

/// Single-item processor shared by every item of a batch
pub struct ImageProcessor {
    encode_service: Arc<dyn EncodeService>,
    extractor: Arc<dyn ForegroundExtractor>,
    extraction: ExtractionConfig,
    max_upload_bytes: u64,
    item_timeout: Duration,
}

impl ImageProcessor {
    pub fn new(
        encode_service: Arc<dyn EncodeService>,
        extractor: Arc<dyn ForegroundExtractor>,
        config: &Config,
    ) -> Self {
        Self {
            encode_service,
            extractor,
            extraction: ExtractionConfig::for_quality(config.removal_quality, config),
            max_upload_bytes: config.max_upload_bytes,
            item_timeout: config.item_timeout(),
        }
    }

    /// Process one image in the given mode
    pub async fn process(&self, file: &InputFile, mode: ProcessingMode) -> Result<ResultItem> {
        let output = match mode {
            ProcessingMode::Encode => self.encode(file).await?,
            ProcessingMode::RemoveBackground => self.remove_background(file).await?,
        };

        Ok(ResultItem::new(
            mode.derive_name(&file.name),
            file.bytes.clone(),
            output.into(),
        ))
    }

    /// Pre-checks performed before any remote call
    pub fn validate_for_encode(&self, file: &InputFile) -> Result<()> {
        if file.size() > self.max_upload_bytes {
            return Err(PipelineError::PayloadTooLarge {
                size: file.size(),
                max: self.max_upload_bytes,
            });
        }

        if !file.is_image() {
            return Err(PipelineError::UnsupportedMediaType(file.media_type.clone()));
        }

        Ok(())
    }

    async fn encode(&self, file: &InputFile) -> Result<Vec<u8>> {
        self.validate_for_encode(file)?;

        debug!("Encoding {} remotely", file.name);
        let encoded = tokio::time::timeout(self.item_timeout, self.encode_service.encode(file))
            .await
            .map_err(|_| {
                PipelineError::EncodeFailed(format!("timed out after {:?}", self.item_timeout))
            })??;

        Ok(encoded.to_vec())
    }

    async fn remove_background(&self, file: &InputFile) -> Result<Vec<u8>> {
        debug!("Removing background from {} with {}", file.name, self.extraction.model);

        let extracted = tokio::time::timeout(
            self.item_timeout,
            self.extractor.extract(&file.bytes, &self.extraction),
        )
        .await
        .map_err(|_| {
            PipelineError::ModelInferenceFailed(format!("timed out after {:?}", self.item_timeout))
        })??;

        let extraction = self.extraction.clone();
        tokio::task::spawn_blocking(move || finalize_png(&extracted, &extraction))
            .await
            .map_err(|e| PipelineError::ModelInferenceFailed(format!("post-processing task failed: {}", e)))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::background::encode_png;

    /// Encoder double counting its calls; fails on payloads starting with `FAIL`
    #[derive(Default)]
    pub(crate) struct CountingEncoder {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl EncodeService for CountingEncoder {
        async fn encode(&self, file: &InputFile) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if file.bytes.starts_with(b"FAIL") {
                return Err(PipelineError::EncodeFailed("Failed to convert image".to_string()));
            }
            Ok(Bytes::from_static(b"RIFF-webp"))
        }
    }

    /// Extractor double returning a fixed semi-transparent PNG
    pub(crate) struct FixedExtractor;

    #[async_trait]
    impl ForegroundExtractor for FixedExtractor {
        async fn extract(&self, input: &[u8], _config: &ExtractionConfig) -> Result<Vec<u8>> {
            if input.starts_with(b"FAIL") {
                return Err(PipelineError::ModelInferenceFailed("model crashed".to_string()));
            }
            let image = RgbaImage::from_pixel(2, 2, Rgba([0, 128, 255, 100]));
            encode_png(&image, image::codecs::png::CompressionType::Fast)
        }
    }

    struct SlowEncoder;

    #[async_trait]
    impl EncodeService for SlowEncoder {
        async fn encode(&self, _file: &InputFile) -> Result<Bytes> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Bytes::new())
        }
    }

    fn processor(encoder: Arc<dyn EncodeService>, config: &Config) -> ImageProcessor {
        ImageProcessor::new(encoder, Arc::new(FixedExtractor), config)
    }

    #[tokio::test]
    async fn test_encode_produces_webp_item() {
        let encoder = Arc::new(CountingEncoder::default());
        let processor = processor(encoder.clone(), &Config::default());
        let file = InputFile::new("photo.jpg", "image/jpeg", vec![1u8; 64]);

        let item = processor.process(&file, ProcessingMode::Encode).await.unwrap();

        assert_eq!(item.derived_name, "photo.webp");
        assert_eq!(item.original_size, 64);
        assert_eq!(item.output.as_ref(), b"RIFF-webp");
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversize_rejected_without_remote_call() {
        let encoder = Arc::new(CountingEncoder::default());
        let processor = processor(encoder.clone(), &Config::default());
        let size = crate::config::DEFAULT_MAX_UPLOAD_BYTES as usize + 1;
        let file = InputFile::new("huge.png", "image/png", vec![0u8; size]);

        let result = processor.process(&file, ProcessingMode::Encode).await;

        assert!(matches!(
            result,
            Err(PipelineError::PayloadTooLarge { size: 52_428_801, max: 52_428_800 })
        ));
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_image_rejected_without_remote_call() {
        let encoder = Arc::new(CountingEncoder::default());
        let processor = processor(encoder.clone(), &Config::default());
        let file = InputFile::new("notes.txt", "text/plain", b"hello".to_vec());

        let result = processor.process(&file, ProcessingMode::Encode).await;

        assert!(matches!(result, Err(PipelineError::UnsupportedMediaType(ref t)) if t == "text/plain"));
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_background_refines_alpha() {
        let processor = processor(Arc::new(CountingEncoder::default()), &Config::default());
        let file = InputFile::new("cat.jpeg", "image/jpeg", vec![7u8; 10]);

        let item = processor
            .process(&file, ProcessingMode::RemoveBackground)
            .await
            .unwrap();

        assert_eq!(item.derived_name, "cat_no_bg.png");
        let decoded = image::load_from_memory(&item.output).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([0, 128, 255, 120]));
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let processor = processor(Arc::new(CountingEncoder::default()), &Config::default());
        let file = InputFile::new("bad.png", "image/png", b"FAIL".to_vec());

        let result = processor.process(&file, ProcessingMode::RemoveBackground).await;
        assert!(matches!(result, Err(PipelineError::ModelInferenceFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_encode_timeout() {
        let config = Config {
            item_timeout_secs: 1,
            ..Default::default()
        };
        let processor = processor(Arc::new(SlowEncoder), &config);
        let file = InputFile::new("slow.png", "image/png", vec![1u8]);

        let result = processor.process(&file, ProcessingMode::Encode).await;
        assert!(matches!(result, Err(PipelineError::EncodeFailed(ref m)) if m.contains("timed out")));
    }
}
