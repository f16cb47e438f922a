//! # Session State Module
//!
//! Questo modulo definisce il modello dati della sessione di conversione.
//!
//! ## Responsabilità:
//! - `ProcessingMode`: modalità scelta una volta per batch (Encode / RemoveBackground)
//! - `ResultItem`: risultato di un singolo file, possiede i byte originali e quelli prodotti
//! - `BatchState`: stato esplicito della sessione passato all'orchestratore
//!
//! ## Naming dei risultati:
//! - L'estensione finale (`.` seguito da caratteri diversi da `.` e `/`) viene sostituita
//! - `Encode` → `<nome>.webp`
//! - `RemoveBackground` → `<nome>_no_bg.png`
//! - Un nome senza estensione riceve solo il suffisso
//!
//! ## Ciclo di vita:
//! - `BatchState::new()` crea una sessione vuota
//! - `in_flight` è true solo durante `run_batch`
//! - I risultati crescono solo per append, vengono svuotati solo da `clear`
//!
//! ## Esempio:
//! ```ignore
//! let mode = ProcessingMode::Encode;
//! assert_eq!(mode.derive_name("photo.jpg"), "photo.webp");
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::aggregator::ResultAggregator;

/// Processing mode chosen once per batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    #[default]
    Encode,
    RemoveBackground,
}

impl ProcessingMode {
    /// Derive the output name from the original file name
    pub fn derive_name(&self, original_name: &str) -> String {
        let stem = strip_extension(original_name);
        match self {
            Self::Encode => format!("{}.webp", stem),
            Self::RemoveBackground => format!("{}_no_bg.png", stem),
        }
    }

    /// File name used for the bulk export archive
    pub fn archive_name(&self) -> &'static str {
        match self {
            Self::Encode => "converted-images.zip",
            Self::RemoveBackground => "background-removed-images.zip",
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode => write!(f, "encode"),
            Self::RemoveBackground => write!(f, "remove-background"),
        }
    }
}

/// Strip a trailing extension: a dot followed by one or more characters that are neither `.` nor `/`
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => {
            let tail = &name[dot + 1..];
            if !tail.is_empty() && !tail.contains('/') {
                &name[..dot]
            } else {
                name
            }
        }
        None => name,
    }
}

/// Result of processing one image. Owns both byte handles.
#[derive(Debug)]
pub struct ResultItem {
    pub derived_name: String,
    pub original_size: u64,
    pub output_size: u64,
    pub original: Bytes,
    pub output: Bytes,
}

impl ResultItem {
    pub fn new(derived_name: String, original: Bytes, output: Bytes) -> Self {
        Self {
            derived_name,
            original_size: original.len() as u64,
            output_size: output.len() as u64,
            original,
            output,
        }
    }

    /// Percentage saved by the output compared to the original (negative when it grew)
    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            (1.0 - (self.output_size as f64 / self.original_size as f64)) * 100.0
        }
    }

    /// Swap the output handle, keeping `output_size` in sync
    pub(crate) fn set_output(&mut self, output: Bytes) {
        self.output_size = output.len() as u64;
        self.output = output;
    }
}

/// Explicit session state owned by the caller
#[derive(Debug, Default)]
pub struct BatchState {
    pub mode: ProcessingMode,
    pub in_flight: bool,
    pub progress_fraction: f64,
    pub results: ResultAggregator,
}

impl BatchState {
    pub fn new(mode: ProcessingMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_name_encode() {
        let mode = ProcessingMode::Encode;
        assert_eq!(mode.derive_name("photo.jpg"), "photo.webp");
        assert_eq!(mode.derive_name("archive.tar.gz"), "archive.tar.webp");
        assert_eq!(mode.derive_name("README"), "README.webp");
        assert_eq!(mode.derive_name("trailing."), "trailing..webp");
    }

    #[test]
    fn test_derive_name_remove_background() {
        let mode = ProcessingMode::RemoveBackground;
        assert_eq!(mode.derive_name("cat.PNG"), "cat_no_bg.png");
        assert_eq!(mode.derive_name("dir.v2/picture"), "dir.v2/picture_no_bg.png");
        assert_eq!(mode.derive_name(".hidden"), "_no_bg.png");
    }

    #[test]
    fn test_archive_names() {
        assert_eq!(ProcessingMode::Encode.archive_name(), "converted-images.zip");
        assert_eq!(
            ProcessingMode::RemoveBackground.archive_name(),
            "background-removed-images.zip"
        );
    }

    #[test]
    fn test_result_item_sizes() {
        let mut item = ResultItem::new(
            "a.webp".to_string(),
            Bytes::from(vec![0u8; 200]),
            Bytes::from(vec![0u8; 50]),
        );
        assert_eq!(item.original_size, 200);
        assert_eq!(item.output_size, 50);
        assert!((item.reduction_percent() - 75.0).abs() < f64::EPSILON);

        item.set_output(Bytes::from(vec![0u8; 300]));
        assert_eq!(item.output_size, 300);
        assert!(item.reduction_percent() < 0.0);
    }

    #[test]
    fn test_new_batch_state_is_idle() {
        let state = BatchState::new(ProcessingMode::RemoveBackground);
        assert!(!state.in_flight);
        assert_eq!(state.progress_fraction, 0.0);
        assert!(state.results.is_empty());
    }
}
