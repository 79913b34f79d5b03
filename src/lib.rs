//! # Media Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `hasher`: Digest SHA-256 del contenuto, letto a blocchi
//! - `fingerprint`: Snapshot dei parametri che influenzano l'output
//! - `cache`: Cache persistente digest → artefatto, con invalidazione
//! - `backend`: Capability di compressione comune a immagini e video
//! - `image_processor`: Compressione immagini (JPEG/PNG/WebP/GIF/BMP)
//! - `video_processor`: Compressione video con transcoder esterno
//! - `file_manager`: Discovery dei file e sostituzione atomica
//! - `optimizer`: Orchestratore principale della run
//! - `config`, `error`, `progress`, `json_output`, `tool_resolver`, `utils`
//!
//! ## Utilizzo:
//! ```no_run
//! use media_compressor::{Config, MediaCompressor};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let compressor = MediaCompressor::new(Config::default(), Path::new("."))?;
//! let summary = compressor.run(Path::new("site")).await?;
//! println!("{}", summary.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod fingerprint;
pub mod hasher;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod progress;
pub mod tool_resolver;
pub mod utils;
pub mod video_processor;

pub use cache::{Cache, CacheEntry, CacheStore, SharedCache};
pub use config::Config;
pub use error::CompressError;
pub use fingerprint::ConfigSnapshot;
pub use hasher::ContentDigest;
pub use optimizer::MediaCompressor;
pub use progress::RunSummary;
