//! # Encode Client Module
//!
//! Client per l'endpoint remoto di conversione WebP.
//!
//! ## Responsabilità:
//! - Definisce il trait `EncodeService` (punto di iniezione per i test)
//! - `HttpEncodeClient`: POST multipart su `<endpoint>/api/convert`
//! - Traduce le risposte non-200 in `EncodeFailed` con il messaggio del server
//!
//! Nessun retry automatico: un fallimento riguarda solo il singolo file.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::file_manager::InputFile;
use crate::server::IMAGE_FIELD;

/// Remote single-image encoder
#[async_trait]
pub trait EncodeService: Send + Sync {
    /// Encode one image, returning the produced bytes
    async fn encode(&self, file: &InputFile) -> Result<Bytes>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `EncodeService` backed by the HTTP encode endpoint
#[derive(Debug, Clone)]
pub struct HttpEncodeClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEncodeClient {
    pub fn new(endpoint_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: endpoint_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn convert_url(&self) -> String {
        format!("{}/api/convert", self.base_url)
    }

    /// Query the liveness probe
    pub async fn health(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .map_err(|e| PipelineError::EncodeFailed(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl EncodeService for HttpEncodeClient {
    async fn encode(&self, file: &InputFile) -> Result<Bytes> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| PipelineError::EncodeFailed(format!("invalid media type: {}", e)))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        debug!("POST {} ({} bytes)", file.name, file.size());

        let response = self
            .client
            .post(self.convert_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::EncodeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => format!("HTTP {}", status),
            };
            return Err(PipelineError::EncodeFailed(message));
        }

        response
            .bytes()
            .await
            .map_err(|e| PipelineError::EncodeFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_url_normalization() {
        let client = HttpEncodeClient::new("http://localhost:3000/");
        assert_eq!(client.convert_url(), "http://localhost:3000/api/convert");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_encode_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = HttpEncodeClient::new(&format!("http://127.0.0.1:{}", port));
        let file = InputFile::new("a.png", "image/png", vec![1u8, 2, 3]);

        let result = client.encode(&file).await;
        assert!(matches!(result, Err(PipelineError::EncodeFailed(_))));
    }
}
