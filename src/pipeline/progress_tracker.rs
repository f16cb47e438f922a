//! # Progress Tracking Module
//!
//! Tracker unico per un batch: contatori, frazione di completamento osservabile,
//! progress bar ed eventi JSON.

use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::error::Result;
use crate::file_manager::InputFile;
use crate::json_output::JsonMessage;
use crate::progress::{ProgressManager, ProgressOutput};
use crate::state::ResultItem;

/// Per-batch progress tracker, cheap to clone
#[derive(Clone)]
pub struct ProgressTracker {
    pub total_files: usize,
    completed: Arc<Mutex<usize>>,
    produced: Arc<Mutex<usize>>,
    failed: Arc<Mutex<usize>>,
    fraction: Arc<watch::Sender<f64>>,
    output: ProgressOutput,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    pub fn new(total_files: usize, output: ProgressOutput, fraction: Arc<watch::Sender<f64>>) -> Self {
        fraction.send_replace(0.0);
        Self {
            total_files,
            completed: Arc::new(Mutex::new(0)),
            produced: Arc::new(Mutex::new(0)),
            failed: Arc::new(Mutex::new(0)),
            fraction,
            output,
            progress_manager: ProgressManager::new(total_files as u64, output),
        }
    }

    /// Current completion fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        *self.fraction.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.fraction.subscribe()
    }

    pub fn file_started(&self, file: &InputFile, index: usize) {
        match self.output {
            ProgressOutput::Json => {
                JsonMessage::file_start(&file.name, file.size(), index, self.total_files).emit()
            }
            ProgressOutput::Bar => self.progress_manager.set_message(&format!("⏳ {}", file.name)),
            ProgressOutput::Silent => {}
        }
    }

    /// Record the outcome of one item and publish the new fraction
    pub async fn handle_file_completion(&self, file: &InputFile, result: &Result<ResultItem>) -> f64 {
        let completed = {
            let mut completed = self.completed.lock().await;
            *completed += 1;
            *completed
        };

        let message = match result {
            Ok(item) => {
                *self.produced.lock().await += 1;
                if self.output == ProgressOutput::Json {
                    JsonMessage::file_complete(&file.name, item).emit();
                }
                format!(
                    "✅ {} → {} ({:+.1}%)",
                    file.name,
                    item.derived_name,
                    -item.reduction_percent()
                )
            }
            Err(e) => {
                *self.failed.lock().await += 1;
                if self.output == ProgressOutput::Json {
                    JsonMessage::file_failed(&file.name, file.size(), e.to_string()).emit();
                }
                format!("❌ {}: {}", file.name, e)
            }
        };

        let fraction = if self.total_files > 0 {
            (completed as f64 / self.total_files as f64).min(1.0)
        } else {
            0.0
        };
        self.fraction.send_replace(fraction);

        if self.output == ProgressOutput::Json {
            let (produced, failed) = self.counts().await;
            JsonMessage::progress(completed, self.total_files, produced, failed).emit();
        }
        self.progress_manager.update(&message);

        fraction
    }

    /// (produced, failed) so far
    pub async fn counts(&self) -> (usize, usize) {
        (*self.produced.lock().await, *self.failed.lock().await)
    }

    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use bytes::Bytes;

    fn tracker(total: usize) -> ProgressTracker {
        let (sender, _) = watch::channel(0.0);
        ProgressTracker::new(total, ProgressOutput::Silent, Arc::new(sender))
    }

    #[tokio::test]
    async fn test_fraction_advances_on_success_and_failure() {
        let tracker = tracker(2);
        let mut receiver = tracker.subscribe();
        let file = InputFile::new("a.png", "image/png", vec![1u8, 2]);

        let ok: Result<ResultItem> = Ok(ResultItem::new(
            "a.webp".to_string(),
            file.bytes.clone(),
            Bytes::from_static(b"x"),
        ));
        assert_eq!(tracker.handle_file_completion(&file, &ok).await, 0.5);
        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow_and_update(), 0.5);

        let err: Result<ResultItem> = Err(PipelineError::EncodeFailed("boom".to_string()));
        assert_eq!(tracker.handle_file_completion(&file, &err).await, 1.0);
        assert_eq!(tracker.fraction(), 1.0);
        assert_eq!(tracker.counts().await, (1, 1));
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let tracker = tracker(4);
        let clone = tracker.clone();
        let file = InputFile::new("a.png", "image/png", vec![1u8]);

        let err: Result<ResultItem> = Err(PipelineError::NoValidImages);
        clone.handle_file_completion(&file, &err).await;

        assert_eq!(tracker.fraction(), 0.25);
        assert_eq!(tracker.counts().await, (0, 1));
    }
}
