//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore della pipeline di conversione.
//!
//! ## Categorie di errori:
//! - **Validazione** (`PayloadTooLarge`, `UnsupportedMediaType`, `NoValidImages`):
//!   rilevati prima di qualsiasi chiamata costosa
//! - **Processing** (`EncodeFailed`, `ModelInferenceFailed`, `ArchiveCorrupt`):
//!   riguardano un singolo file, il batch continua
//! - **Aggregazione** (`ExportFailed`): export ZIP fallito, stato invariato
//! - `Io` / `Image`: conversione automatica dagli errori standard
//!
//! ## Esempio:
//! ```ignore
//! if file.size() > max {
//!     return Err(PipelineError::PayloadTooLarge { size: file.size(), max });
//! }
//! ```

/// Custom error types for the batch pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("File size too large: {size} bytes (maximum {max} bytes)")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Unsupported media type: '{0}' (expected image/*)")]
    UnsupportedMediaType(String),

    #[error("No valid image files found")]
    NoValidImages,

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Background removal failed: {0}")]
    ModelInferenceFailed(String),

    #[error("Archive is corrupt: {0}")]
    ArchiveCorrupt(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl PipelineError {
    /// Validation errors are raised before any remote call or model invocation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::PayloadTooLarge { .. } | Self::UnsupportedMediaType(_) | Self::NoValidImages
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(PipelineError::NoValidImages.is_validation());
        assert!(PipelineError::PayloadTooLarge { size: 2, max: 1 }.is_validation());
        assert!(!PipelineError::EncodeFailed("boom".to_string()).is_validation());
        assert!(!PipelineError::ArchiveCorrupt("bad".to_string()).is_validation());
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::PayloadTooLarge { size: 10, max: 5 };
        assert_eq!(err.to_string(), "File size too large: 10 bytes (maximum 5 bytes)");

        let err = PipelineError::UnsupportedMediaType("text/plain".to_string());
        assert!(err.to_string().contains("text/plain"));
    }
}
