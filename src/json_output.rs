//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON (`--json`), una riga per
//! messaggio su stdout, per chi orchestra il compressore da un altro processo.
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio run con directory, cache e snapshot della configurazione
//! - `file_complete`: Esito di un singolo file (processed / skipped / error)
//! - `complete`: Fine run con i conteggi finali
//! - `error`: Errore che interrompe la run

use crate::fingerprint::ConfigSnapshot;
use crate::progress::RunSummary;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome label of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Processed,
    Skipped,
    Error,
}

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio della run
    #[serde(rename = "start")]
    Start {
        input_dir: PathBuf,
        cache_dir: PathBuf,
        total_files: usize,
        config: ConfigSnapshot,
    },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        status: FileStatus,
        /// Skip reason or error message
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        original_size: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        compressed_size: Option<u64>,
    },

    /// Run completata
    #[serde(rename = "complete")]
    Complete {
        processed: usize,
        skipped: usize,
        errors: usize,
        bytes_saved: u64,
        duration_seconds: f64,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error { message: String },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(
        input_dir: PathBuf,
        cache_dir: PathBuf,
        total_files: usize,
        config: ConfigSnapshot,
    ) -> Self {
        Self::Start {
            input_dir,
            cache_dir,
            total_files,
            config,
        }
    }

    pub fn processed(path: PathBuf, original_size: u64, compressed_size: u64) -> Self {
        Self::FileComplete {
            path,
            status: FileStatus::Processed,
            reason: None,
            original_size: Some(original_size),
            compressed_size: Some(compressed_size),
        }
    }

    pub fn skipped(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::FileComplete {
            path,
            status: FileStatus::Skipped,
            reason: Some(reason.into()),
            original_size: None,
            compressed_size: None,
        }
    }

    pub fn failed(path: PathBuf, error: impl Into<String>) -> Self {
        Self::FileComplete {
            path,
            status: FileStatus::Error,
            reason: Some(error.into()),
            original_size: None,
            compressed_size: None,
        }
    }

    pub fn complete(summary: &RunSummary, duration_seconds: f64) -> Self {
        Self::Complete {
            processed: summary.processed,
            skipped: summary.skipped,
            errors: summary.errors,
            bytes_saved: summary.bytes_saved(),
            duration_seconds,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
