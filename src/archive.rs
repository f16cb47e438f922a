//! # Archive Module
//!
//! Questo modulo gestisce l'import e l'export di archivi ZIP interamente in memoria.
//!
//! ## Responsabilità:
//! - `expand()`: estrae le immagini da un archivio ZIP caricato dall'utente
//! - `pack()`: costruisce l'archivio ZIP per l'export di tutti i risultati
//!
//! ## Regole di estrazione:
//! - Le directory vengono ignorate
//! - Vengono mantenute solo le entry con estensione `jpg|jpeg|png|gif|bmp|tiff|webp`
//! - Ogni entry diventa un `InputFile` con il solo nome base (senza cartelle)
//! - Il media type viene dedotto dall'estensione
//! - Un archivio illeggibile produce `ArchiveCorrupt`
//! - Una singola entry corrotta viene saltata con un warning
//!
//! ## Regole di export:
//! - Una entry per risultato, in ordine
//! - Nomi duplicati: vince l'ultima scrittura, la posizione resta quella della prima

use bytes::Bytes;
use std::io::{Cursor, Read, Write};
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{PipelineError, Result};
use crate::file_manager::{FileManager, InputFile};

/// Upper bound on the buffer reserved from an entry's declared size
const PREALLOCATION_LIMIT: u64 = 8 * 1024 * 1024;

/// Extensions of archive entries treated as images
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Expand a ZIP container into its image entries, in archive order
pub fn expand(container: &InputFile) -> Result<Vec<InputFile>> {
    let mut archive = ZipArchive::new(Cursor::new(container.bytes.clone()))
        .map_err(|e| PipelineError::ArchiveCorrupt(format!("{}: {}", container.name, e)))?;

    let mut files = Vec::new();

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("⚠️  Skipping unreadable entry #{} in {}: {}", index, container.name, e);
                continue;
            }
        };

        if entry.is_dir() {
            continue;
        }

        let entry_name = entry.name().to_string();
        if !has_image_extension(&entry_name) {
            debug!("Skipping non-image entry {} in {}", entry_name, container.name);
            continue;
        }

        let declared_size = entry.size();
        let data = match read_entry(&mut entry, declared_size) {
            Ok(data) => data,
            Err(e) => {
                warn!("⚠️  Skipping corrupt entry {} in {}: {}", entry_name, container.name, e);
                continue;
            }
        };

        let name = base_name(&entry_name).to_string();
        debug!("Extracted {} ({} bytes) from {}", name, data.len(), container.name);
        files.push(InputFile::new(
            name.clone(),
            FileManager::guess_media_type(&name),
            data,
        ));
    }

    Ok(files)
}

/// Read a whole entry. The size declared by the archive only sizes the first allocation, up to a cap.
fn read_entry<R: Read>(reader: &mut R, declared_size: u64) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(declared_size.min(PREALLOCATION_LIMIT) as usize);
    reader.read_to_end(&mut data)?;
    Ok(data)
}

/// Build a ZIP archive from `(name, bytes)` entries
pub fn pack<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a Bytes)>,
{
    // last write wins, position of the first occurrence
    let mut ordered: Vec<(&str, &Bytes)> = Vec::new();
    for (name, data) in entries {
        match ordered.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = data,
            None => ordered.push((name, data)),
        }
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in ordered {
        writer
            .start_file(name, options)
            .map_err(|e| PipelineError::ExportFailed(format!("{}: {}", name, e)))?;
        writer
            .write_all(data)
            .map_err(|e| PipelineError::ExportFailed(format!("{}: {}", name, e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| PipelineError::ExportFailed(e.to_string()))?;

    Ok(cursor.into_inner())
}

fn has_image_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

fn base_name(entry_name: &str) -> &str {
    entry_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(entry_name)
}
