//! # Result Aggregator Module
//!
//! Raccoglie i risultati della sessione e ne gestisce l'export.
//!
//! ## Responsabilità:
//! - `append()`: concatena i risultati di un batch, in ordine
//! - `clear()`: rilascia tutti i risultati (e i loro buffer)
//! - `export_single()`: salva l'output di un risultato su disco ("salva con nome")
//! - `export_all()`: costruisce un unico ZIP con tutti gli output
//! - `summary()`: statistiche ricalcolate dalla lista a ogni chiamata
//! - `replace_output()`: salva il risultato di un ritocco al posto dell'output
//!
//! ## Export ZIP:
//! - Vuoto → nessun archivio
//! - Una entry per risultato, chiamata `derived_name`, nello stesso ordine
//! - Nomi duplicati non deduplicati: vince l'ultima scrittura
//! - In caso di errore l'aggregatore resta invariato

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::archive;
use crate::error::{PipelineError, Result};
use crate::progress::Summary;
use crate::state::{ProcessingMode, ResultItem};

/// Ordered collection of the session's results
#[derive(Debug, Default)]
pub struct ResultAggregator {
    items: Vec<ResultItem>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append produced items, preserving their order
    pub fn append(&mut self, items: Vec<ResultItem>) {
        self.items.extend(items);
    }

    /// Drop every item and its byte handles; returns how many were released
    pub fn clear(&mut self) -> usize {
        let released = self.items.len();
        self.items.clear();
        debug!("Released {} results", released);
        released
    }

    pub fn items(&self) -> &[ResultItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Write one item's output to `dir/<derived_name>`
    pub async fn export_single(&self, index: usize, dir: &Path) -> Result<PathBuf> {
        let item = self.items.get(index).ok_or_else(|| {
            PipelineError::ExportFailed(format!("no result at index {} (have {})", index, self.items.len()))
        })?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&item.derived_name);
        tokio::fs::write(&path, &item.output).await?;

        debug!("Saved {}", path.display());
        Ok(path)
    }

    /// Build one ZIP containing every output; `None` when there is nothing to export
    pub fn export_all(&self) -> Result<Option<Vec<u8>>> {
        if self.items.is_empty() {
            return Ok(None);
        }

        let archive = archive::pack(
            self.items
                .iter()
                .map(|item| (item.derived_name.as_str(), &item.output)),
        )?;

        Ok(Some(archive))
    }

    /// Write the bulk archive to `dir` under the mode's archive name
    pub async fn export_all_to(&self, dir: &Path, mode: ProcessingMode) -> Result<Option<PathBuf>> {
        let Some(archive) = self.export_all()? else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(mode.archive_name());
        tokio::fs::write(&path, &archive).await?;

        info!("📦 Archive written: {} ({} entries)", path.display(), self.items.len());
        Ok(Some(path))
    }

    /// Count and byte totals, recomputed from the current items
    pub fn summary(&self) -> Summary {
        let total_original: u64 = self.items.iter().map(|item| item.original_size).sum();
        let total_output: u64 = self.items.iter().map(|item| item.output_size).sum();
        Summary::new(self.items.len(), total_original, total_output)
    }

    /// Replace an item's output with a touched-up version
    pub fn replace_output(&mut self, index: usize, output: Bytes) -> Result<()> {
        let len = self.items.len();
        let item = self.items.get_mut(index).ok_or_else(|| {
            PipelineError::ExportFailed(format!("no result at index {} (have {})", index, len))
        })?;

        item.set_output(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn item(name: &str, original: &'static [u8], output: &'static [u8]) -> ResultItem {
        ResultItem::new(
            name.to_string(),
            Bytes::from_static(original),
            Bytes::from_static(output),
        )
    }

    #[test]
    fn test_export_all_empty_is_noop() {
        let aggregator = ResultAggregator::new();
        assert!(aggregator.export_all().unwrap().is_none());
    }

    #[test]
    fn test_clear_then_append_empty() {
        let mut aggregator = ResultAggregator::new();
        aggregator.append(vec![item("a.webp", b"0123456789", b"01234")]);

        assert_eq!(aggregator.clear(), 1);
        aggregator.append(Vec::new());

        assert!(aggregator.is_empty());
        assert_eq!(aggregator.summary(), Summary::default());
    }

    #[test]
    fn test_summary_recomputed() {
        let mut aggregator = ResultAggregator::new();
        aggregator.append(vec![
            item("a.webp", b"0123456789", b"01234"),
            item("b.webp", b"0123456789", b"012"),
        ]);

        let summary = aggregator.summary();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_original_size, 20);
        assert_eq!(summary.total_output_size, 8);
        assert_eq!(summary.bytes_saved, 12);
        assert_eq!(summary.reduction_percent, 60.0);

        aggregator.replace_output(1, Bytes::from_static(b"0123456")).unwrap();
        assert_eq!(aggregator.summary().total_output_size, 12);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut aggregator = ResultAggregator::new();
        aggregator.append(vec![item("1.webp", b"x", b"y")]);
        aggregator.append(vec![item("2.webp", b"x", b"y"), item("3.webp", b"x", b"y")]);

        let names: Vec<&str> = aggregator.items().iter().map(|i| i.derived_name.as_str()).collect();
        assert_eq!(names, vec!["1.webp", "2.webp", "3.webp"]);
    }

    #[test]
    fn test_export_all_duplicate_names() {
        let mut aggregator = ResultAggregator::new();
        aggregator.append(vec![
            item("photo.webp", b"jpg", b"from-jpg"),
            item("photo.webp", b"png", b"from-png"),
        ]);

        let bytes = aggregator.export_all().unwrap().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);

        let mut content = String::new();
        archive.by_index(0).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "from-png");
        assert_eq!(aggregator.len(), 2);
    }

    #[tokio::test]
    async fn test_export_single_and_archive_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let mut aggregator = ResultAggregator::new();
        aggregator.append(vec![item("cat_no_bg.png", b"orig", b"png-output")]);

        let saved = aggregator.export_single(0, temp_dir.path()).await.unwrap();
        assert_eq!(saved, temp_dir.path().join("cat_no_bg.png"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"png-output");

        let archive = aggregator
            .export_all_to(temp_dir.path(), ProcessingMode::RemoveBackground)
            .await
            .unwrap()
            .unwrap();
        assert!(archive.ends_with("background-removed-images.zip"));

        assert!(matches!(
            aggregator.export_single(5, temp_dir.path()).await,
            Err(PipelineError::ExportFailed(_))
        ));
    }
}
