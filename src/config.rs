//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della pipeline
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `endpoint_url`: URL base dell'endpoint di conversione (default: `http://127.0.0.1:3000`)
//! - `bind_address`: Indirizzo di ascolto del server (default: `0.0.0.0:3000`)
//! - `max_upload_bytes`: Dimensione massima per immagine (default: 50 MiB)
//! - `webp_quality`: Qualità WebP lato server (1-100, default: 80)
//! - `removal_quality`: Modalità rimozione sfondo (`fast` | `quality`, default: `quality`)
//! - `item_timeout_secs`: Timeout per singolo file (default: 120)
//! - `rembg_precise_model` / `rembg_fast_model`: Modelli usati da `rembg`
//! - `output_path`: Directory di output per i risultati (default: None = directory corrente)
//! - `json_output`: Eventi JSON su stdout invece della progress bar
//! - `quiet`: Nessuna progress bar
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     webp_quality: 75,
//!     removal_quality: RemovalQuality::Fast,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 50 MiB, the per-image upload limit of the encode endpoint
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Speed/precision trade-off for background removal, chosen once per batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemovalQuality {
    Fast,
    #[default]
    Quality,
}

impl std::str::FromStr for RemovalQuality {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "quality" => Ok(Self::Quality),
            other => Err(anyhow::anyhow!("Unknown removal mode '{}' (expected fast or quality)", other)),
        }
    }
}

impl std::fmt::Display for RemovalQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Quality => write!(f, "quality"),
        }
    }
}

/// Configuration for the converter pipeline and the encode endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote encode endpoint
    pub endpoint_url: String,
    /// Address the encode endpoint listens on
    pub bind_address: String,
    /// Maximum accepted image size in bytes
    pub max_upload_bytes: u64,
    /// WebP quality used by the endpoint (1-100)
    pub webp_quality: u8,
    /// Background removal mode for the whole batch
    pub removal_quality: RemovalQuality,
    /// Per-item timeout for remote encode and model inference
    pub item_timeout_secs: u64,
    /// rembg model used in quality mode
    pub rembg_precise_model: String,
    /// rembg model used in fast mode
    pub rembg_fast_model: String,
    /// Output directory for exported results (None = current directory)
    pub output_path: Option<PathBuf>,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    /// Hide the progress bar
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_url: "http://127.0.0.1:3000".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            webp_quality: 80,
            removal_quality: RemovalQuality::Quality,
            item_timeout_secs: 120,
            rembg_precise_model: "isnet-general-use".to_string(),
            rembg_fast_model: "u2netp".to_string(),
            output_path: None,
            json_output: false,
            quiet: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.webp_quality == 0 || self.webp_quality > 100 {
            return Err(anyhow::anyhow!("WebP quality must be between 1 and 100"));
        }

        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Maximum upload size must be greater than 0"));
        }

        if self.item_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Item timeout must be greater than 0 seconds"));
        }

        if !(self.endpoint_url.starts_with("http://") || self.endpoint_url.starts_with("https://")) {
            return Err(anyhow::anyhow!("Endpoint URL must start with http:// or https://: {}", self.endpoint_url));
        }

        if self.rembg_precise_model.is_empty() || self.rembg_fast_model.is_empty() {
            return Err(anyhow::anyhow!("rembg model names must not be empty"));
        }

        if let Some(ref output_path) = self.output_path {
            if output_path.exists() && !output_path.is_dir() {
                return Err(anyhow::anyhow!("Output path is not a directory: {}", output_path.display()));
            }
        }

        Ok(())
    }

    /// Per-item timeout as a `Duration`
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.webp_quality = 0;
        assert!(config.validate().is_err());

        config.webp_quality = 80;
        config.item_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.item_timeout_secs = 30;
        config.endpoint_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.webp_quality, 80);
        assert_eq!(config.removal_quality, RemovalQuality::Quality);
        assert_eq!(config.item_timeout(), Duration::from_secs(120));
        assert!(!config.json_output);
    }

    #[test]
    fn test_removal_quality_parse() {
        assert_eq!("fast".parse::<RemovalQuality>().unwrap(), RemovalQuality::Fast);
        assert_eq!("Quality".parse::<RemovalQuality>().unwrap(), RemovalQuality::Quality);
        assert!("turbo".parse::<RemovalQuality>().is_err());
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            endpoint_url: "https://convert.example.com".to_string(),
            webp_quality: 70,
            removal_quality: RemovalQuality::Fast,
            item_timeout_secs: 45,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.endpoint_url, "https://convert.example.com");
        assert_eq!(loaded_config.webp_quality, 70);
        assert_eq!(loaded_config.removal_quality, RemovalQuality::Fast);
        assert_eq!(loaded_config.item_timeout_secs, 45);
    }

    #[tokio::test]
    async fn test_partial_config_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{ "webp_quality": 90 }"#).await.unwrap();

        let loaded = Config::from_file(&config_path).await.unwrap();
        assert_eq!(loaded.webp_quality, 90);
        assert_eq!(loaded.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }
}
