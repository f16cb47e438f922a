//! # Bulk Image Converter - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Caricamento della configurazione (file JSON + override da CLI)
//! - Avvio del server di conversione oppure di un batch
//!
//! ## Comandi:
//! - `serve`: endpoint HTTP di conversione WebP
//! - `convert`: batch di conversione WebP tramite l'endpoint
//! - `remove-bg`: batch di rimozione sfondo con il modello locale
//! - `touchup`: ritocco manuale di un risultato
//! - `tools`: disponibilità dei tool esterni
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-converter serve --bind 0.0.0.0:3000
//! image-converter convert photos/ archive.zip -o out/ --zip
//! image-converter --json remove-bg portrait.jpg -o out/ --mode fast
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bulk_image_converter::file_manager::FileManager;
use bulk_image_converter::json_output::{JsonConfig, JsonMessage};
use bulk_image_converter::platform::PlatformCommands;
use bulk_image_converter::progress::{ProgressManager, ProgressOutput};
use bulk_image_converter::touchup::{parse_points, TouchupCanvas, TouchupTool, DEFAULT_BRUSH_SIZE};
use bulk_image_converter::{
    server, BatchOrchestrator, BatchState, Config, HttpEncodeClient, ImageProcessor, PipelineError,
    ProcessingMode, RembgExtractor, RemovalQuality,
};

#[derive(Parser)]
#[command(name = "image-converter")]
#[command(about = "Bulk convert images to WebP or remove their background, with ZIP import/export")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output progress and results as JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the WebP encode endpoint
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,

        /// WebP quality (1-100)
        #[arg(long)]
        webp_quality: Option<u8>,
    },

    /// Convert images (and ZIP archives of images) to WebP
    Convert {
        /// Image files, ZIP archives or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Encode endpoint base URL
        #[arg(long)]
        endpoint: Option<String>,

        /// Write a single ZIP instead of individual files
        #[arg(long)]
        zip: bool,
    },

    /// Remove the background of images (and ZIP archives of images)
    RemoveBg {
        /// Image files, ZIP archives or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Model tier: fast or quality
        #[arg(long)]
        mode: Option<RemovalQuality>,

        /// Write a single ZIP instead of individual files
        #[arg(long)]
        zip: bool,
    },

    /// Erase or restore parts of a background-removed image
    Touchup {
        /// Original image
        original: PathBuf,

        /// Processed (background-removed) image
        processed: PathBuf,

        /// Where to write the edited PNG
        #[arg(short, long)]
        output: PathBuf,

        /// erase or restore
        #[arg(long)]
        tool: TouchupTool,

        /// Brush diameter in pixels (5-50)
        #[arg(long, default_value_t = DEFAULT_BRUSH_SIZE)]
        brush: u32,

        /// Stroke points as "x,y;x,y;..." (repeat for several strokes)
        #[arg(long = "stroke", required = true)]
        strokes: Vec<String>,
    },

    /// Report availability of external tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so that stdout stays free for JSON events
    let default_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match cli.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    config.json_output |= cli.json;
    config.quiet |= cli.quiet;

    match cli.command {
        Commands::Serve { bind, webp_quality } => {
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            if let Some(quality) = webp_quality {
                config.webp_quality = quality;
            }
            config.validate()?;
            server::serve(&config).await
        }
        Commands::Convert {
            inputs,
            output,
            endpoint,
            zip,
        } => {
            if let Some(endpoint) = endpoint {
                config.endpoint_url = endpoint;
            }
            run_batch(&config, ProcessingMode::Encode, &inputs, output, zip).await
        }
        Commands::RemoveBg {
            inputs,
            output,
            mode,
            zip,
        } => {
            if let Some(mode) = mode {
                config.removal_quality = mode;
            }
            run_batch(&config, ProcessingMode::RemoveBackground, &inputs, output, zip).await
        }
        Commands::Touchup {
            original,
            processed,
            output,
            tool,
            brush,
            strokes,
        } => run_touchup(&original, &processed, &output, tool, brush, &strokes).await,
        Commands::Tools => {
            let platform = PlatformCommands::instance();
            println!("System: {}", PlatformCommands::system_info());
            println!("{}", platform.get_tools_report());
            match platform.tool_version(RembgExtractor::TOOL).await {
                Some(version) => println!("{} version: {}", RembgExtractor::TOOL, version),
                None => println!("{} version: unknown", RembgExtractor::TOOL),
            }
            Ok(())
        }
    }
}

async fn run_batch(
    config: &Config,
    mode: ProcessingMode,
    inputs: &[PathBuf],
    output: Option<PathBuf>,
    zip: bool,
) -> Result<()> {
    config.validate()?;
    let output_dir = output
        .or_else(|| config.output_path.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    for input in inputs {
        if !input.exists() {
            return Err(anyhow::anyhow!("Input does not exist: {}", input.display()));
        }
    }

    let files = FileManager::load_inputs(inputs).await?;
    let progress_output = ProgressOutput::from_flags(config.json_output, config.quiet);

    if config.json_output {
        JsonMessage::start(mode, files.len(), JsonConfig::from(config)).emit();
    } else {
        info!("Starting {} batch with {} inputs", mode, files.len());
    }

    let encode_client = HttpEncodeClient::new(&config.endpoint_url);
    match mode {
        ProcessingMode::Encode => {
            if !encode_client.health().await.unwrap_or(false) {
                warn!("⚠️  Encode endpoint {} is not responding", config.endpoint_url);
            }
        }
        ProcessingMode::RemoveBackground => {
            if !PlatformCommands::instance()
                .is_command_available(RembgExtractor::TOOL)
                .await
            {
                warn!("⚠️  '{}' not found, every item will fail (run `image-converter tools`)", RembgExtractor::TOOL);
            }
        }
    }

    let processor = ImageProcessor::new(Arc::new(encode_client), Arc::new(RembgExtractor::new()), config);
    let orchestrator = BatchOrchestrator::new(processor, progress_output);
    let mut state = BatchState::new(mode);

    let outcome = match orchestrator.run_batch(&mut state, files).await {
        Ok(outcome) => outcome,
        Err(e @ PipelineError::NoValidImages) => {
            if config.json_output {
                JsonMessage::error(e.to_string(), None).emit();
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let mut written = Vec::new();
    if zip {
        let spinner = ProgressManager::spinner("📦 Building archive...", progress_output);
        let archive = state.results.export_all_to(&output_dir, mode).await;
        spinner.finish_and_clear();
        if let Some(path) = archive? {
            written.push(path);
        }
    } else {
        for index in 0..state.results.len() {
            written.push(state.results.export_single(index, &output_dir).await?);
        }
    }

    let summary = state.results.summary();
    if config.json_output {
        JsonMessage::complete(
            &summary,
            outcome.failed.len(),
            outcome.skipped_inputs.len(),
            outcome.duration_seconds,
            written,
        )
        .emit();
    } else {
        for failed in outcome.failed.iter().chain(outcome.skipped_inputs.iter()) {
            warn!("❌ {}: {}", failed.name, failed.error);
        }
        info!("📊 {}", summary.format_summary());
        info!("📁 Output: {} ({} files written)", output_dir.display(), written.len());
    }

    Ok(())
}

async fn run_touchup(
    original: &Path,
    processed: &Path,
    output: &Path,
    tool: TouchupTool,
    brush: u32,
    strokes: &[String],
) -> Result<()> {
    let original_bytes = tokio::fs::read(original).await?;
    let processed_bytes = tokio::fs::read(processed).await?;

    let mut canvas = TouchupCanvas::new(&original_bytes, &processed_bytes)?;
    canvas.set_brush_size(brush);

    for stroke in strokes {
        let points = parse_points(stroke).map_err(|e| anyhow::anyhow!(e))?;
        canvas.apply_stroke(tool, &points);
    }

    tokio::fs::write(output, canvas.export_png()?).await?;
    info!("✅ Touch-up saved to {}", output.display());
    Ok(())
}
