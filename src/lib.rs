//! # Bulk Image Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore della pipeline
//! - `state`: Modalità, risultati e stato esplicito della sessione
//! - `file_manager`: File in ingresso, classificazione e discovery
//! - `archive`: Espansione ed export di archivi ZIP in memoria
//! - `image_processor`: Elaborazione di una singola immagine
//! - `encode_client` / `encoder` / `server`: Conversione WebP remota
//! - `background`: Rimozione sfondo e pulizia alpha
//! - `pipeline`: Orchestratore del batch e progress tracking
//! - `aggregator`: Raccolta, riepilogo ed export dei risultati
//! - `touchup`: Ritocco manuale (erase / restore)
//! - `progress` / `json_output`: Progress bar, riepilogo ed eventi JSON
//!
//! ## Utilizzo:
//! ```ignore
//! use bulk_image_converter::{BatchOrchestrator, BatchState, Config, ProcessingMode};
//!
//! let mut state = BatchState::new(ProcessingMode::Encode);
//! let outcome = orchestrator.run_batch(&mut state, inputs).await?;
//! let archive = state.results.export_all()?;
//! ```

pub mod aggregator;
pub mod archive;
pub mod background;
pub mod config;
pub mod encode_client;
pub mod encoder;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod server;
pub mod state;
pub mod tool_resolver;
pub mod touchup;
pub mod utils;

pub use aggregator::ResultAggregator;
pub use background::{ExtractionConfig, ForegroundExtractor, RembgExtractor};
pub use config::{Config, RemovalQuality};
pub use encode_client::{EncodeService, HttpEncodeClient};
pub use error::PipelineError;
pub use file_manager::InputFile;
pub use image_processor::ImageProcessor;
pub use pipeline::{BatchOrchestrator, BatchOutcome};
pub use state::{BatchState, ProcessingMode, ResultItem};
