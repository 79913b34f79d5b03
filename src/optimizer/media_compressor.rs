//! # Media Compressor Main Orchestrator
//!
//! Orchestratore principale che delega ai moduli specializzati.
//!
//! ## Fasi di una run:
//! 1. Setup: directory sorgente esistente, directory di cache creata
//! 2. Discovery dei file media (la directory di cache è esclusa)
//! 3. Load della cache e pulizia delle entry orfane
//! 4. Un task per file, al massimo `workers` in parallelo (semaforo)
//! 5. Salvataggio del record di cache una sola volta a fine run
//! 6. Riepilogo processed / skipped / errors
//!
//! Solo gli errori di setup interrompono la run; gli errori dei singoli file
//! diventano conteggi.

use crate::{
    cache::{CacheStore, SharedCache},
    config::Config,
    error::CompressError,
    file_manager::{FileManager, MediaFile, MediaKind},
    image_processor::ImageProcessor,
    json_output::JsonMessage,
    optimizer::{progress_tracker::ProgressTracker, task_compressor::TaskCompressor},
    progress::RunSummary,
    tool_resolver::ToolPathResolver,
    video_processor::{VideoProcessor, TRANSCODER},
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Orchestratore principale
pub struct MediaCompressor {
    config: Config,
    cache_dir: PathBuf,
    tool_resolver: ToolPathResolver,
}

impl MediaCompressor {
    /// Validates `config` and resolves the cache directory against `project_root`.
    pub fn new(config: Config, project_root: &Path) -> Result<Self> {
        config.validate()?;
        let cache_dir = config.cache_root(project_root);

        Ok(Self {
            config,
            cache_dir,
            tool_resolver: ToolPathResolver::new(),
        })
    }

    /// Use a specific resolver for external tools
    pub fn with_tool_resolver(mut self, tool_resolver: ToolPathResolver) -> Self {
        self.tool_resolver = tool_resolver;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Compress every media file under `site_dir` in place.
    pub async fn run(&self, site_dir: &Path) -> Result<RunSummary> {
        let start_time = Instant::now();

        if !site_dir.is_dir() {
            return Err(CompressError::Setup(format!(
                "site directory does not exist: {}",
                site_dir.display()
            ))
            .into());
        }

        let store = CacheStore::open(&self.cache_dir, self.config.snapshot()).await?;
        let files = FileManager::find_media_files(site_dir, Some(store.cache_dir()));
        self.emit_start_message(site_dir, files.len());

        if files.is_empty() {
            return Ok(self.handle_empty_directory(start_time));
        }

        let mut cache = store.load().await;
        store.prune_orphans(&mut cache);
        let shared_cache = Arc::new(SharedCache::new(cache));

        let video_processor =
            VideoProcessor::new(&self.config, &self.cache_dir, &self.tool_resolver);
        self.check_dependencies(&files, &video_processor);

        let task = TaskCompressor::new(
            shared_cache.clone(),
            self.cache_dir.clone(),
            ImageProcessor::new(&self.config, &self.cache_dir),
            video_processor,
            self.config.skip_images,
            self.config.skip_videos,
        );
        let progress_tracker = ProgressTracker::new(
            files.len(),
            self.config.show_progress,
            self.config.json_output,
        );

        self.process_files_concurrently(files, task, progress_tracker.clone())
            .await?;

        // Best effort: the replaced files are already on disk
        let final_cache = shared_cache.cloned().await;
        match store.save(&final_cache).await {
            Ok(()) => debug!("Cache record saved with {} entries", final_cache.len()),
            Err(e) => warn!("Failed to save cache record: {}", e),
        }

        let summary = progress_tracker.summary().await;
        progress_tracker.finish(&summary.format_summary());
        self.print_final_stats(&summary, start_time.elapsed().as_secs_f64());

        Ok(summary)
    }

    /// Un task per file; il semaforo limita quanti sono attivi insieme
    async fn process_files_concurrently(
        &self,
        files: Vec<MediaFile>,
        task: TaskCompressor,
        progress_tracker: ProgressTracker,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut paths = Vec::with_capacity(files.len());
        let mut tasks = Vec::with_capacity(files.len());

        for file in files {
            let permit = semaphore.clone().acquire_owned().await?;
            let task = task.clone();
            let tracker = progress_tracker.clone();
            paths.push(file.path.clone());

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let result = task.process(&file).await;
                tracker.record(&file.path, &result).await;
            }));
        }

        let results = futures::future::join_all(tasks).await;
        for (path, result) in paths.into_iter().zip(results) {
            if let Err(e) = result {
                let error = CompressError::TaskPanicked {
                    path: path.clone(),
                    reason: e.to_string(),
                };
                progress_tracker.record(&path, &Err(error)).await;
            }
        }

        Ok(())
    }

    /// Warns once when videos would need a transcoder that is not installed
    fn check_dependencies(&self, files: &[MediaFile], video_processor: &VideoProcessor) {
        if self.config.skip_videos || video_processor.is_available() {
            return;
        }
        if files.iter().any(|file| file.kind == MediaKind::Video) {
            warn!("{} not found, video files will be left uncompressed", TRANSCODER);
        }
    }

    fn emit_start_message(&self, site_dir: &Path, total_files: usize) {
        if self.config.json_output {
            JsonMessage::start(
                site_dir.to_path_buf(),
                self.cache_dir.clone(),
                total_files,
                self.config.snapshot(),
            )
            .emit();
        } else {
            info!("Starting media compression in: {}", site_dir.display());
            info!("Found {} media files", total_files);
        }
    }

    fn handle_empty_directory(&self, start_time: Instant) -> RunSummary {
        let summary = RunSummary::new();
        if self.config.json_output {
            JsonMessage::complete(&summary, start_time.elapsed().as_secs_f64()).emit();
        } else {
            info!("No media files found to process");
        }
        summary
    }

    fn print_final_stats(&self, summary: &RunSummary, duration_seconds: f64) {
        if self.config.json_output {
            JsonMessage::complete(summary, duration_seconds).emit();
            return;
        }

        info!(
            "Complete: {} processed, {} skipped (cached), {} errors",
            summary.processed, summary.skipped, summary.errors
        );
        if summary.processed > 0 {
            info!(
                "Saved {} ({:.1}%) in {:.1}s",
                FileManager::format_size(summary.bytes_saved()),
                summary.reduction_percent(),
                duration_seconds
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = Config {
            workers: 0,
            ..Config::default()
        };
        assert!(MediaCompressor::new(config, Path::new(".")).is_err());
    }

    #[test]
    fn test_cache_dir_is_relative_to_project_root() {
        let compressor = MediaCompressor::new(Config::default(), Path::new("/project")).unwrap();
        assert_eq!(
            compressor.cache_dir(),
            Path::new("/project/.mediacompressor_cache")
        );
    }

    #[tokio::test]
    async fn test_missing_site_dir_is_setup_error() {
        let temp_dir = TempDir::new().unwrap();
        let compressor = MediaCompressor::new(Config::default(), temp_dir.path()).unwrap();
        let err = compressor
            .run(&temp_dir.path().join("does-not-exist"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompressError>(),
            Some(CompressError::Setup(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_site_reports_zero() {
        let temp_dir = TempDir::new().unwrap();
        let site = temp_dir.path().join("site");
        std::fs::create_dir_all(&site).unwrap();
        std::fs::write(site.join("index.html"), b"<html></html>").unwrap();

        let config = Config {
            show_progress: false,
            ..Config::default()
        };
        let compressor = MediaCompressor::new(config, temp_dir.path()).unwrap();
        let summary = compressor.run(&site).await.unwrap();
        assert_eq!(summary, RunSummary::default());
    }
}
