//! # Pipeline Module
//!
//! Separa le responsabilità del batch in sottomoduli:
//! - `orchestrator`: Orchestratore sequenziale del batch
//! - `progress_tracker`: Gestione progress unificata (contatori, frazione, eventi)

pub mod orchestrator;
pub mod progress_tracker;

pub use orchestrator::{BatchOrchestrator, BatchOutcome, FailedItem};
pub use progress_tracker::ProgressTracker;
