//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce la progress bar e il riepilogo della run.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif`, un tick per file completato
//! - `RunSummary`: conteggi processed / skipped / errors e byte prima/dopo
//!
//! ## Invariante:
//! `processed + skipped + errors` è uguale al numero di file scoperti a fine run.
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) [OK] photo.jpg
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Manages the progress bar for a run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager; a hidden one draws nothing.
    pub fn new(total_files: u64, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_files);
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Advance by one finished file
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Aggregate outcome counts of one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Size of compressed files before replacement
    pub bytes_before: u64,
    /// Size of the same files after replacement
    pub bytes_after: u64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_processed(&mut self, original_size: u64, compressed_size: u64) {
        self.processed += 1;
        self.bytes_before += original_size;
        self.bytes_after += compressed_size;
    }

    pub fn add_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.errors
    }

    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }

    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_before, self.bytes_after)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Complete: {} processed, {} skipped (cached), {} errors | Saved: {} ({:.2}%)",
            self.processed,
            self.skipped,
            self.errors,
            FileManager::format_size(self.bytes_saved()),
            self.reduction_percent()
        )
    }
}
