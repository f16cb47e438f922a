//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per la comunicazione con un front-end.
//!
//! ## Responsabilità:
//! - Emette un oggetto JSON per riga su stdout, taggato dal campo `type`
//! - Riflette lo stato del batch (frazione di progresso, esito per file, riepilogo)
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del batch (modalità, numero di input, configurazione)
//! - `file_start`: Inizio elaborazione di un file
//! - `file_complete`: Fine elaborazione di un file (con eventuale errore)
//! - `progress`: Frazione di completamento aggiornata
//! - `complete`: Fine del batch con il riepilogo dei risultati
//! - `error`: Errore a livello di batch

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{Config, RemovalQuality};
use crate::progress::Summary;
use crate::state::{ProcessingMode, ResultItem};

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del batch
    #[serde(rename = "start")]
    Start {
        mode: ProcessingMode,
        total_inputs: usize,
        config: JsonConfig,
    },

    /// Frazione di completamento aggiornata
    #[serde(rename = "progress")]
    Progress {
        completed: usize,
        total: usize,
        fraction: f64,
        produced: usize,
        failed: usize,
    },

    /// Inizio elaborazione di un file specifico
    #[serde(rename = "file_start")]
    FileStart {
        name: String,
        size: u64,
        index: usize,
        total: usize,
    },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_complete")]
    FileComplete {
        name: String,
        derived_name: Option<String>,
        original_size: u64,
        output_size: Option<u64>,
        reduction_percent: Option<f64>,
        error: Option<String>,
    },

    /// Batch completato
    #[serde(rename = "complete")]
    Complete {
        files_processed: usize,
        files_failed: usize,
        skipped_inputs: usize,
        total_original_size: u64,
        total_output_size: u64,
        bytes_saved: i64,
        reduction_percent: f64,
        duration_seconds: f64,
        outputs: Vec<PathBuf>,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub endpoint_url: String,
    pub webp_quality: u8,
    pub removal_quality: RemovalQuality,
    pub max_upload_bytes: u64,
    pub item_timeout_secs: u64,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(mode: ProcessingMode, total_inputs: usize, config: JsonConfig) -> Self {
        Self::Start {
            mode,
            total_inputs,
            config,
        }
    }

    pub fn progress(completed: usize, total: usize, produced: usize, failed: usize) -> Self {
        let fraction = if total > 0 {
            completed as f64 / total as f64
        } else {
            0.0
        };

        Self::Progress {
            completed,
            total,
            fraction,
            produced,
            failed,
        }
    }

    pub fn file_start(name: &str, size: u64, index: usize, total: usize) -> Self {
        Self::FileStart {
            name: name.to_string(),
            size,
            index,
            total,
        }
    }

    /// File processato con successo
    pub fn file_complete(name: &str, item: &ResultItem) -> Self {
        Self::FileComplete {
            name: name.to_string(),
            derived_name: Some(item.derived_name.clone()),
            original_size: item.original_size,
            output_size: Some(item.output_size),
            reduction_percent: Some(item.reduction_percent()),
            error: None,
        }
    }

    /// File fallito: nessun risultato prodotto
    pub fn file_failed(name: &str, original_size: u64, error: String) -> Self {
        Self::FileComplete {
            name: name.to_string(),
            derived_name: None,
            original_size,
            output_size: None,
            reduction_percent: None,
            error: Some(error),
        }
    }

    pub fn complete(
        summary: &Summary,
        files_failed: usize,
        skipped_inputs: usize,
        duration_seconds: f64,
        outputs: Vec<PathBuf>,
    ) -> Self {
        Self::Complete {
            files_processed: summary.count,
            files_failed,
            skipped_inputs,
            total_original_size: summary.total_original_size,
            total_output_size: summary.total_output_size,
            bytes_saved: summary.bytes_saved,
            reduction_percent: summary.reduction_percent,
            duration_seconds,
            outputs,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            endpoint_url: config.endpoint_url.clone(),
            webp_quality: config.webp_quality,
            removal_quality: config.removal_quality,
            max_upload_bytes: config.max_upload_bytes,
            item_timeout_secs: config.item_timeout_secs,
        }
    }
}
