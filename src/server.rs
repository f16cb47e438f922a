//! # Encode Endpoint Module
//!
//! Server HTTP stateless che converte una singola immagine in WebP.
//!
//! ## Route:
//! - `POST /api/convert`: campo multipart `image`, risponde con i byte WebP
//! - `GET /api/health`: liveness probe (codifica un'immagine 1×1)
//!
//! ## Errori:
//! - 400 `{"error": ...}`: file mancante, troppo grande, non immagine, multipart malformato
//! - 500 `{"error": "Failed to convert image"}`: codifica fallita
//!
//! Il limite del body è più alto del limite per file, così un upload troppo grande
//! riceve il messaggio 400 esplicito invece di un 413 generico.
//! Nessuna persistenza: ogni richiesta vive solo in memoria.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use image::{DynamicImage, RgbImage};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::encoder::WebpEncoder;
use crate::state::ProcessingMode;

const SERVICE_NAME: &str = "image-to-webp-converter";

/// Multipart field carrying the upload
pub const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
struct AppState {
    encoder: WebpEncoder,
    max_upload_bytes: u64,
}

/// Build the endpoint router
pub fn router(config: &Config) -> Router {
    let state = AppState {
        encoder: WebpEncoder::new(config.webp_quality),
        max_upload_bytes: config.max_upload_bytes,
    };
    let body_limit = (config.max_upload_bytes as usize).saturating_add(1024 * 1024);

    Router::new()
        .route("/api/convert", post(convert))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind_address` and serve until Ctrl-C
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("🚀 Image converter listening on {}", listener.local_addr()?);
    serve_on(listener, config).await?;
    Ok(())
}

/// Serve on an already bound listener
pub async fn serve_on(listener: TcpListener, config: &Config) -> std::io::Result<()> {
    axum::serve(listener, router(config))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("🛑 Shutting down");
        })
        .await
}

/// `attachment` disposition; anything outside printable ASCII, quotes and backslashes become `_`
fn content_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            ' ' => ' ',
            c if c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn convert(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let mut upload: Option<(String, String, Bytes)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("image").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(data) => {
                upload = Some((file_name, content_type, data));
                break;
            }
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        }
    }

    let Some((file_name, content_type, data)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No image file provided");
    };

    if data.len() as u64 > state.max_upload_bytes {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!(
                "File size too large. Maximum size is {}MB.",
                state.max_upload_bytes / (1024 * 1024)
            ),
        );
    }

    if !content_type.starts_with("image/") {
        return error_response(StatusCode::BAD_REQUEST, "File must be an image");
    }

    debug!("Converting {} ({} bytes, {})", file_name, data.len(), content_type);

    let encoder = state.encoder;
    let encoded = tokio::task::spawn_blocking(move || encoder.encode(&data)).await;

    match encoded {
        Ok(Ok(webp)) => {
            let output_name = ProcessingMode::Encode.derive_name(&file_name);
            info!("✅ Converted {} → {} ({} bytes)", file_name, output_name, webp.len());
            (
                [
                    (header::CONTENT_TYPE, "image/webp".to_string()),
                    (header::CONTENT_DISPOSITION, content_disposition(&output_name)),
                ],
                webp,
            )
                .into_response()
        }
        Ok(Err(e)) => {
            error!("❌ Conversion error for {}: {}", file_name, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to convert image")
        }
        Err(e) => {
            error!("❌ Conversion task failed for {}: {}", file_name, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to convert image")
        }
    }
}

async fn health(State(state): State<AppState>) -> Response {
    let encoder = state.encoder;
    let probe = tokio::task::spawn_blocking(move || {
        encoder.encode_image(&DynamicImage::ImageRgb8(RgbImage::new(1, 1)))
    })
    .await;

    let timestamp = chrono::Utc::now().to_rfc3339();
    match probe {
        Ok(Ok(_)) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": timestamp,
                "service": SERVICE_NAME,
            })),
        )
            .into_response(),
        _ => {
            error!("❌ Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                    "error": "Health check failed",
                })),
            )
                .into_response()
        }
    }
}
