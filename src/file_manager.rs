//! # File Management Module
//!
//! Questo modulo gestisce i file in ingresso e la loro classificazione.
//!
//! ## Responsabilità:
//! - Definisce `InputFile` (nome, media type dichiarato, byte in memoria)
//! - Classifica gli input: archivio ZIP, immagine, altro
//! - Carica file e directory dal disco (discovery ricorsiva con walkdir)
//! - Utilità per formattazione dimensioni e percentuali
//!
//! ## Classificazione:
//! - **Container**: nome che termina in `.zip` oppure media type `application/zip` /
//!   `application/x-zip-compressed`
//! - **Immagine**: media type che inizia con `image/`
//! - **Altro**: ignorato dall'orchestratore
//!
//! ## Esempio:
//! ```ignore
//! let files = FileManager::load_inputs(&paths).await?;
//! for file in &files {
//!     println!("{} ({})", file.name, FileManager::format_size(file.size()));
//! }
//! ```

use anyhow::Result;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Media types accepted as ZIP containers
const ZIP_MEDIA_TYPES: &[&str] = &["application/zip", "application/x-zip-compressed"];

/// A file submitted by the user, held in memory for the duration of a batch
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

/// How the orchestrator treats an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Container,
    Image,
    Other,
}

impl InputFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Build an input whose media type is inferred from the file extension
    pub fn from_name(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let media_type = FileManager::guess_media_type(&name);
        Self::new(name, media_type, bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn kind(&self) -> InputKind {
        if self.is_container() {
            InputKind::Container
        } else if self.is_image() {
            InputKind::Image
        } else {
            InputKind::Other
        }
    }

    /// Check if the input is a ZIP container
    pub fn is_container(&self) -> bool {
        self.name.to_lowercase().ends_with(".zip")
            || ZIP_MEDIA_TYPES.contains(&self.media_type.as_str())
    }

    /// Check if the input declares an image media type
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Media type inferred from the extension, empty when unknown
    pub fn guess_media_type(name: &str) -> String {
        mime_guess::from_path(name)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default()
    }

    /// Load every path as an `InputFile`. Directories are walked recursively, hidden files skipped.
    pub async fn load_inputs(paths: &[PathBuf]) -> Result<Vec<InputFile>> {
        let mut inputs = Vec::new();

        for path in paths {
            if path.is_dir() {
                for file in Self::find_files(path)? {
                    inputs.push(Self::load_file(&file).await?);
                }
            } else {
                inputs.push(Self::load_file(path).await?);
            }
        }

        Ok(inputs)
    }

    /// Read a single file from disk
    pub async fn load_file(path: &Path) -> Result<InputFile> {
        let bytes = fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("Invalid file path: {}", path.display()))?;

        debug!("Loaded {} ({} bytes)", name, bytes.len());
        Ok(InputFile::from_name(name, bytes))
    }

    /// Find all regular, non-hidden files in a directory, sorted for a stable drop order
    pub fn find_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !Self::is_hidden(e.path()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            files.push(entry.path().to_path_buf());
        }

        Ok(files)
    }

    fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(false)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
