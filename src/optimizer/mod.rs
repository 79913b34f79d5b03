//! # Optimizer Module
//!
//! Orchestrazione della run divisa in sottomoduli:
//! - `media_compressor`: Orchestratore principale
//! - `task_compressor`: Worker per singoli file
//! - `progress_tracker`: Conteggi, progress bar e messaggi JSON

pub mod media_compressor;
pub mod progress_tracker;
pub mod task_compressor;

pub use media_compressor::MediaCompressor;
pub use progress_tracker::ProgressTracker;
pub use task_compressor::{FileOutcome, SkipReason, TaskCompressor};
