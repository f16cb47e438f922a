//! # Progress Reporting and Statistics Module
//!
//! Questo modulo gestisce la progress bar e il riepilogo dei risultati.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Modalità di output: barra, JSON (barra nascosta), silenziosa
//! - `Summary`: statistiche aggregate dei risultati (conteggio, byte, risparmio)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 6/10 (60%) ✅ photo.jpg → photo.webp (-45.2%)
//! ```
//!
//! ## Esempio:
//! ```ignore
//! let progress = ProgressManager::new(total_files, ProgressOutput::Bar);
//! progress.update("photo.jpg done");
//! progress.finish(&summary.format_summary());
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use crate::file_manager::FileManager;

/// Where batch progress is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutput {
    /// Terminal progress bar
    Bar,
    /// JSON line events on stdout, no bar
    Json,
    /// Nothing
    Silent,
}

impl ProgressOutput {
    pub fn from_flags(json_output: bool, quiet: bool) -> Self {
        if json_output {
            Self::Json
        } else if quiet {
            Self::Silent
        } else {
            Self::Bar
        }
    }
}

/// Manages the terminal progress bar of a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_files: u64, output: ProgressOutput) -> Self {
        if output != ProgressOutput::Bar {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_files);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Advance by one file with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Create a spinner for indeterminate work (archive expansion, export)
    pub fn spinner(message: &str, output: ProgressOutput) -> ProgressBar {
        if output != ProgressOutput::Bar {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

/// Aggregate statistics over a list of results
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub total_original_size: u64,
    pub total_output_size: u64,
    /// Negative when the outputs are larger than the originals
    pub bytes_saved: i64,
    pub reduction_percent: f64,
}

impl Summary {
    pub fn new(count: usize, total_original_size: u64, total_output_size: u64) -> Self {
        let bytes_saved = total_original_size as i64 - total_output_size as i64;
        Self {
            count,
            total_original_size,
            total_output_size,
            bytes_saved,
            reduction_percent: FileManager::calculate_reduction(total_original_size, total_output_size),
        }
    }

    pub fn format_summary(&self) -> String {
        let saved = if self.bytes_saved >= 0 {
            FileManager::format_size(self.bytes_saved as u64)
        } else {
            format!("-{}", FileManager::format_size(self.bytes_saved.unsigned_abs()))
        };

        format!(
            "Processed: {} files | Original: {} | Output: {} | Saved: {} ({:.2}%)",
            self.count,
            FileManager::format_size(self.total_original_size),
            FileManager::format_size(self.total_output_size),
            saved,
            self.reduction_percent
        )
    }
}
