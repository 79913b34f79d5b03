//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore della pipeline di compressione.
//!
//! ## Categorie di errori:
//! - `Io`: file sorgente illeggibile, destinazione non copiabile/sostituibile
//! - `Decode`: dati immagine malformati
//! - `Encode`: combinazione formato/modalità colore non supportata
//! - `Subprocess`: transcoder terminato con exit code != 0 o output mancante
//! - `CacheCorruption`: record di cache illeggibile o malformato
//! - `Setup`: errori non recuperabili prima di iniziare (root inesistente, cache dir)
//! - `Validation`: parametri di configurazione fuori range
//!
//! ## Propagazione:
//! - Gli errori per-file vengono convertiti in conteggi al confine del task,
//!   non interrompono mai il batch
//! - `CacheCorruption` viene declassato a "cache vuota" in fase di load
//! - Solo `Setup` arriva fino al chiamante come fallimento dell'intera run

use std::path::PathBuf;

/// Errors produced while compressing media or managing the cache.
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("Transcoder failed for {path}: {reason}")]
    Subprocess { path: PathBuf, reason: String },

    #[error("Cache record {path} is corrupt: {reason}")]
    CacheCorruption { path: PathBuf, reason: String },

    #[error("Unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Task for {path} panicked: {reason}")]
    TaskPanicked { path: PathBuf, reason: String },

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl CompressError {
    /// Wrap an I/O error together with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;
