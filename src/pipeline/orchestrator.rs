//! # Batch Orchestrator
//!
//! Orchestratore del batch: espande gli archivi, elabora i file in sequenza,
//! aggiorna la frazione di progresso e accoda i risultati.
//!
//! ## Flusso:
//! 1. Classificazione degli input (archivio / immagine / altro)
//! 2. Espansione degli archivi in linea, mantenendo l'ordine di inserimento
//! 3. Lista vuota → `NoValidImages`, nessuna elaborazione
//! 4. Un file alla volta; dopo ogni file `progress = completati / totale`
//! 5. Errori per file registrati in `BatchOutcome::failed`, il batch continua
//! 6. Risultati accodati in ordine; `in_flight` e `progress` azzerati a ogni uscita

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::archive;
use crate::error::{PipelineError, Result};
use crate::file_manager::{InputFile, InputKind};
use crate::image_processor::ImageProcessor;
use crate::pipeline::progress_tracker::ProgressTracker;
use crate::progress::ProgressOutput;
use crate::state::BatchState;

/// An input or item that produced no result
#[derive(Debug)]
pub struct FailedItem {
    pub name: String,
    pub error: PipelineError,
}

/// What a batch did
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Candidates after archive expansion
    pub total: usize,
    /// Items appended to the aggregator
    pub produced: usize,
    /// Per-item failures, in processing order
    pub failed: Vec<FailedItem>,
    /// Containers that could not be expanded
    pub skipped_inputs: Vec<FailedItem>,
    /// Completion fraction reached before the reset
    pub final_fraction: f64,
    pub duration_seconds: f64,
}

/// Drives one batch at a time against an explicit `BatchState`
pub struct BatchOrchestrator {
    processor: ImageProcessor,
    output: ProgressOutput,
    progress: Arc<watch::Sender<f64>>,
}

impl BatchOrchestrator {
    pub fn new(processor: ImageProcessor, output: ProgressOutput) -> Self {
        let (sender, _) = watch::channel(0.0);
        Self {
            processor,
            output,
            progress: Arc::new(sender),
        }
    }

    /// Observe the completion fraction of the running batch
    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    /// Run one batch. Per-item failures are reported in the outcome, not as errors.
    pub async fn run_batch(&self, state: &mut BatchState, inputs: Vec<InputFile>) -> Result<BatchOutcome> {
        state.in_flight = true;
        state.progress_fraction = 0.0;

        let result = self.run_inner(state, inputs).await;

        state.in_flight = false;
        state.progress_fraction = 0.0;
        self.progress.send_replace(0.0);

        result
    }

    async fn run_inner(&self, state: &mut BatchState, inputs: Vec<InputFile>) -> Result<BatchOutcome> {
        let start_time = Instant::now();
        let mode = state.mode;

        let mut outcome = BatchOutcome::default();
        let candidates = self.flatten(inputs, &mut outcome.skipped_inputs).await;

        if candidates.is_empty() {
            warn!("No valid image files found");
            return Err(PipelineError::NoValidImages);
        }

        outcome.total = candidates.len();
        info!("🚀 Processing {} images ({})", outcome.total, mode);

        let tracker = ProgressTracker::new(outcome.total, self.output, self.progress.clone());
        let mut produced = Vec::with_capacity(candidates.len());

        for (index, file) in candidates.iter().enumerate() {
            tracker.file_started(file, index);

            let result = self.processor.process(file, mode).await;
            state.progress_fraction = tracker.handle_file_completion(file, &result).await;

            match result {
                Ok(item) => {
                    debug!("{} → {} ({} bytes)", file.name, item.derived_name, item.output_size);
                    produced.push(item);
                }
                Err(error) => {
                    if error.is_validation() {
                        warn!("⏭️  Skipping {}: {}", file.name, error);
                    } else {
                        warn!("❌ Failed to process {}: {}", file.name, error);
                    }
                    outcome.failed.push(FailedItem {
                        name: file.name.clone(),
                        error,
                    });
                }
            }
        }

        outcome.produced = produced.len();
        outcome.final_fraction = state.progress_fraction;
        state.results.append(produced);

        tracker.finish(&state.results.summary().format_summary());
        outcome.duration_seconds = start_time.elapsed().as_secs_f64();

        info!(
            "✅ Batch done: {} produced, {} failed, {} inputs skipped",
            outcome.produced,
            outcome.failed.len(),
            outcome.skipped_inputs.len()
        );
        Ok(outcome)
    }

    /// Expand containers inline and drop non-image inputs, keeping drop order
    async fn flatten(&self, inputs: Vec<InputFile>, skipped: &mut Vec<FailedItem>) -> Vec<InputFile> {
        let mut candidates = Vec::new();

        for file in inputs {
            match file.kind() {
                InputKind::Container => {
                    let name = file.name.clone();
                    let expanded = tokio::task::spawn_blocking(move || archive::expand(&file))
                        .await
                        .unwrap_or_else(|e| Err(PipelineError::ArchiveCorrupt(e.to_string())));

                    match expanded {
                        Ok(entries) => {
                            info!("📦 {}: {} images", name, entries.len());
                            candidates.extend(entries);
                        }
                        Err(error) => {
                            warn!("⚠️  Skipping archive {}: {}", name, error);
                            skipped.push(FailedItem { name, error });
                        }
                    }
                }
                InputKind::Image => candidates.push(file),
                InputKind::Other => {
                    debug!("Ignoring {} ({})", file.name, file.media_type);
                }
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::build_zip;
    use crate::config::Config;
    use crate::image_processor::tests::{CountingEncoder, FixedExtractor};
    use crate::state::ProcessingMode;
    use std::sync::atomic::Ordering;
    use zip::CompressionMethod;

    fn orchestrator(encoder: Arc<CountingEncoder>) -> BatchOrchestrator {
        let processor = ImageProcessor::new(encoder, Arc::new(FixedExtractor), &Config::default());
        BatchOrchestrator::new(processor, ProgressOutput::Silent)
    }

    #[tokio::test]
    async fn test_image_and_archive_scenario() {
        let encoder = Arc::new(CountingEncoder::default());
        let orchestrator = orchestrator(encoder.clone());
        let mut state = BatchState::new(ProcessingMode::Encode);

        let archive = build_zip(
            &[("good.png", Some(b"png-data")), ("corrupt.png", Some(b"FAIL-data"))],
            CompressionMethod::Deflated,
        );
        let inputs = vec![
            InputFile::new("first.jpg", "image/jpeg", b"jpeg-data".to_vec()),
            InputFile::new("bundle.zip", "application/zip", archive),
        ];

        let outcome = orchestrator.run_batch(&mut state, inputs).await.unwrap();

        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.produced, 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].name, "corrupt.png");
        assert_eq!(outcome.final_fraction, 1.0);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 3);

        let names: Vec<&str> = state.results.items().iter().map(|i| i.derived_name.as_str()).collect();
        assert_eq!(names, vec!["first.webp", "good.webp"]);
        assert!(!state.in_flight);
        assert_eq!(state.progress_fraction, 0.0);
    }

    #[tokio::test]
    async fn test_non_image_alone_is_no_valid_images() {
        let encoder = Arc::new(CountingEncoder::default());
        let orchestrator = orchestrator(encoder.clone());
        let mut state = BatchState::new(ProcessingMode::Encode);

        let inputs = vec![InputFile::new("notes.txt", "text/plain", b"hello".to_vec())];
        let result = orchestrator.run_batch(&mut state, inputs).await;

        assert!(matches!(result, Err(PipelineError::NoValidImages)));
        assert!(state.results.is_empty());
        assert!(!state.in_flight);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_skipped_input() {
        let orchestrator = orchestrator(Arc::new(CountingEncoder::default()));
        let mut state = BatchState::new(ProcessingMode::Encode);

        let inputs = vec![
            InputFile::new("broken.zip", "application/zip", b"not a zip".to_vec()),
            InputFile::new("ok.png", "image/png", b"png".to_vec()),
        ];
        let outcome = orchestrator.run_batch(&mut state, inputs).await.unwrap();

        assert_eq!(outcome.skipped_inputs.len(), 1);
        assert!(matches!(outcome.skipped_inputs[0].error, PipelineError::ArchiveCorrupt(_)));
        assert_eq!(state.results.len(), 1);
    }

    #[tokio::test]
    async fn test_oversize_item_fails_without_remote_call() {
        let encoder = Arc::new(CountingEncoder::default());
        let orchestrator = orchestrator(encoder.clone());
        let mut state = BatchState::new(ProcessingMode::Encode);

        let size = crate::config::DEFAULT_MAX_UPLOAD_BYTES as usize + 1;
        let inputs = vec![InputFile::new("huge.png", "image/png", vec![0u8; size])];
        let outcome = orchestrator.run_batch(&mut state, inputs).await.unwrap();

        assert_eq!(outcome.produced, 0);
        assert!(matches!(outcome.failed[0].error, PipelineError::PayloadTooLarge { .. }));
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batches_append_and_remove_background_mode() {
        let orchestrator = orchestrator(Arc::new(CountingEncoder::default()));
        let mut state = BatchState::new(ProcessingMode::Encode);

        orchestrator
            .run_batch(&mut state, vec![InputFile::new("a.png", "image/png", b"a".to_vec())])
            .await
            .unwrap();

        state.mode = ProcessingMode::RemoveBackground;
        orchestrator
            .run_batch(&mut state, vec![InputFile::new("b.jpg", "image/jpeg", b"b".to_vec())])
            .await
            .unwrap();

        let names: Vec<&str> = state.results.items().iter().map(|i| i.derived_name.as_str()).collect();
        assert_eq!(names, vec!["a.webp", "b_no_bg.png"]);
        assert!(*orchestrator.subscribe_progress().borrow() == 0.0);
    }
}
