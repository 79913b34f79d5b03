//! # Media Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Merge della configurazione: default → file JSON → flag CLI
//! - Avvio del compressore e exit code non-zero sui fallimenti di setup
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (`RUST_LOG`, altrimenti INFO o DEBUG con `--verbose`)
//! 3. Carica il file di configurazione, se indicato, e applica gli override
//!    (`--save-config` scrive la configurazione risultante su file)
//! 4. Valida che la directory del sito esista
//! 5. Istanzia `MediaCompressor` e avvia la run
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-compressor site --max-width 1600 --crf 28 --workers 8 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use media_compressor::json_output::JsonMessage;
use media_compressor::{Config, MediaCompressor};

#[derive(Parser)]
#[command(name = "media-compressor")]
#[command(about = "Compress site images and videos in place with a content-addressed cache")]
struct Args {
    /// Directory containing the built site to compress
    site_directory: PathBuf,

    /// Root the cache directory is resolved against
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// JSON configuration file (flags below override its values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache directory, relative to the project root
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Lossy image quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Maximum image width in pixels
    #[arg(long)]
    max_width: Option<u32>,

    /// Maximum image height in pixels
    #[arg(long)]
    max_height: Option<u32>,

    /// Video CRF value (0-51, lower = better quality)
    #[arg(short, long)]
    crf: Option<u8>,

    /// x264 speed preset
    #[arg(long)]
    preset: Option<String>,

    /// Maximum video width in pixels
    #[arg(long)]
    video_max_width: Option<u32>,

    /// Leave images untouched
    #[arg(long)]
    skip_images: bool,

    /// Leave videos untouched
    #[arg(long)]
    skip_videos: bool,

    /// Write the merged configuration (file + flags) to this JSON file before running
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output progress and status as JSON for programmatic use
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Apply the command line overrides on top of `config`
    fn apply(&self, mut config: Config) -> Config {
        if let Some(ref cache_dir) = self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        if let Some(quality) = self.quality {
            config.image_quality = quality;
        }
        if self.max_width.is_some() {
            config.image_max_width = self.max_width;
        }
        if self.max_height.is_some() {
            config.image_max_height = self.max_height;
        }
        if let Some(crf) = self.crf {
            config.video_crf = crf;
        }
        if let Some(ref preset) = self.preset {
            config.video_preset = preset.clone();
        }
        if self.video_max_width.is_some() {
            config.video_max_width = self.video_max_width;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.skip_images |= self.skip_images;
        config.skip_videos |= self.skip_videos;
        config.json_output |= self.json;
        if self.no_progress {
            config.show_progress = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout stays reserved for JSON messages
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let json = args.json;
    let result = run(args).await;
    if let Err(ref e) = result {
        if json {
            JsonMessage::error(format!("{:#}", e)).emit();
        }
    }
    result
}

async fn run(args: Args) -> Result<()> {
    let config = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    let config = args.apply(config);
    config.validate()?;

    if let Some(ref path) = args.save_config {
        config.save_to_file(path).await?;
        info!("Configuration saved to {}", path.display());
    }

    // Validate arguments
    if !args.site_directory.is_dir() {
        return Err(anyhow::anyhow!(
            "Site directory does not exist: {}",
            args.site_directory.display()
        ));
    }

    let compressor = MediaCompressor::new(config, &args.project_root)?;
    compressor.run(&args.site_directory).await?;

    Ok(())
}
