//! # Progress Tracking Module
//!
//! Tracker thread-safe condiviso dai task: aggiorna i conteggi della run,
//! la progress bar e, in modalità `--json`, emette un `file_complete` per file.

use crate::{
    error::CompressError,
    json_output::JsonMessage,
    optimizer::task_compressor::FileOutcome,
    progress::{ProgressManager, RunSummary},
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Tracker progress unificato
#[derive(Clone)]
pub struct ProgressTracker {
    pub total_files: usize,
    summary: Arc<Mutex<RunSummary>>,
    progress_manager: ProgressManager,
    json_output: bool,
}

impl ProgressTracker {
    pub fn new(total_files: usize, show_progress: bool, json_output: bool) -> Self {
        Self {
            total_files,
            summary: Arc::new(Mutex::new(RunSummary::new())),
            progress_manager: ProgressManager::new(total_files as u64, show_progress && !json_output),
            json_output,
        }
    }

    /// Converte l'esito di un file in conteggi, log e messaggi JSON
    pub async fn record(&self, file_path: &Path, result: &Result<FileOutcome, CompressError>) {
        let name = file_path.file_name().unwrap_or_default().to_string_lossy();

        let message = match result {
            Ok(FileOutcome::Processed {
                original_size,
                compressed_size,
            }) => {
                self.summary
                    .lock()
                    .await
                    .add_processed(*original_size, *compressed_size);
                if self.json_output {
                    JsonMessage::processed(file_path.to_path_buf(), *original_size, *compressed_size)
                        .emit();
                }
                format!("[OK] {}", name)
            }
            Ok(FileOutcome::Skipped(reason)) => {
                self.summary.lock().await.add_skipped();
                debug!("Skipped {}: {}", file_path.display(), reason);
                if self.json_output {
                    JsonMessage::skipped(file_path.to_path_buf(), reason.to_string()).emit();
                }
                format!("[SKIP] {}: {}", name, reason)
            }
            Err(e) => {
                self.summary.lock().await.add_error();
                error!("Error processing {}: {}", file_path.display(), e);
                if self.json_output {
                    JsonMessage::failed(file_path.to_path_buf(), e.to_string()).emit();
                }
                format!("[ERROR] {}", name)
            }
        };

        self.progress_manager.update(&message);
    }

    /// Finalizza progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    /// Statistiche correnti per il report finale
    pub async fn summary(&self) -> RunSummary {
        *self.summary.lock().await
    }
}
