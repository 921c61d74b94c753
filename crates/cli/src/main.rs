#![allow(missing_docs, reason = "Binary crate")]
#![allow(clippy::missing_docs_in_private_items, reason = "Binary crate")]
#![allow(clippy::print_stdout, reason = "CLI prints results to stdout")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use notescan_service::{
    EventBus, IngestionService, ReconcileService, RegistryService, WipeGate,
    EVENT_CHANNEL_CAPACITY,
};
use notescan_storage::{RegistryStore, SerialRegistry, StorageBackend};
use notescan_vision::{ImagePreprocessor, RecognitionRequest, TesseractRecognizer};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "notescan")]
#[command(version, about = "Banknote serial-number registry with OCR ingestion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short = 'H', long)]
        host: Option<String>,
    },
    /// Recognize serials in local image files.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upsert rows from a CSV file.
    Import { file: PathBuf },
    /// Write the registry as csv, sql or db.
    Export {
        #[arg(short, long, default_value = "csv")]
        format: String,
        /// Defaults to a timestamped file in the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print every serial number.
    List,
    Stats,
    /// Delete every record.
    Wipe {
        #[arg(long)]
        confirm: Option<String>,
    },
}

/// The three services over one backend and one wipe gate.
pub(crate) struct Services {
    pub ingestion: Arc<IngestionService>,
    pub reconcile: Arc<ReconcileService>,
    pub registry: Arc<RegistryService>,
}

impl Services {
    async fn build(config: &Config) -> Result<Self> {
        let backend = StorageBackend::open(&config.storage).await?;
        tracing::debug!(kind = ?backend.kind(), "storage backend opened");
        let registry = SerialRegistry::new(Arc::new(backend));
        let gate = WipeGate::new();

        let recognizer = Arc::new(TesseractRecognizer::new(config.tesseract_bin.clone()));
        let request =
            RecognitionRequest { language: config.ocr_language.clone(), ..RecognitionRequest::default() };
        let ingestion = IngestionService::new(registry.clone(), recognizer)
            .with_preprocessor(ImagePreprocessor::new(config.preprocess_width))
            .with_request(request)
            .with_recognition_timeout(config.ocr_timeout)
            .with_concurrency(config.ingest_concurrency)
            .with_gate(gate.clone())
            .with_events(EventBus::new(EVENT_CHANNEL_CAPACITY));

        Ok(Self {
            ingestion: Arc::new(ingestion),
            reconcile: Arc::new(ReconcileService::new(registry.clone(), gate.clone())),
            registry: Arc::new(RegistryService::new(registry, gate)),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    // Reject a missing confirmation before the store is opened.
    if let Commands::Wipe { confirm } = &cli.command {
        commands::registry::check_confirmation(confirm.as_deref())?;
    }

    let services = Services::build(&config).await?;

    match cli.command {
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| config.host.clone());
            let port = port.unwrap_or(config.port);
            commands::serve::run(services, &host, port, config.max_upload_bytes).await?;
        },
        Commands::Ingest { files } => commands::ingest::run(&services, &files).await?,
        Commands::Import { file } => commands::transfer::run_import(&services, &file).await?,
        Commands::Export { format, output } => {
            commands::transfer::run_export(&services, &format, output).await?;
        },
        Commands::List => commands::registry::run_list(&services).await?,
        Commands::Stats => commands::registry::run_stats(&services).await?,
        Commands::Wipe { confirm } => {
            commands::registry::run_wipe(&services, confirm.as_deref()).await?;
        },
    }

    Ok(())
}
