//! # Task Compressor Module
//!
//! Worker per la compressione di un singolo file.
//!
//! ## Flusso per file:
//! 1. Tipo disabilitato (`skip_images` / `skip_videos`) → skipped
//! 2. Digest del contenuto
//! 3. Lookup sincronizzato: hit con artefatto presente → copia sull'originale, skipped
//! 4. Miss → backend fuori dal lock; `None` (transcoder assente) → skipped
//! 5. Insert sincronizzato (digest sorgente + alias sul digest dell'artefatto),
//!    poi copia sull'originale → processed
//!
//! Qualsiasi errore arriva al chiamante come `CompressError`; l'originale resta intatto.

use crate::{
    backend::CompressionBackend,
    cache::{CacheEntry, SharedCache},
    error::{CompressError, Result},
    file_manager::{FileManager, MediaFile, MediaKind},
    hasher::{self, ContentDigest},
    image_processor::ImageProcessor,
    video_processor::VideoProcessor,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Why a file was left without fresh compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Its kind is disabled in the configuration
    Disabled,
    /// A cached artifact was copied over it
    CacheHit,
    /// No transcoder is installed
    TranscoderUnavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Disabled => "disabled",
            Self::CacheHit => "cache hit",
            Self::TranscoderUnavailable => "transcoder unavailable",
        };
        f.write_str(text)
    }
}

/// Successful outcome of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Processed {
        original_size: u64,
        compressed_size: u64,
    },
    Skipped(SkipReason),
}

/// Per-file worker, cloned into every spawned task
#[derive(Clone)]
pub struct TaskCompressor {
    cache: Arc<SharedCache>,
    cache_dir: PathBuf,
    image_processor: Arc<ImageProcessor>,
    video_processor: Arc<VideoProcessor>,
    skip_images: bool,
    skip_videos: bool,
}

impl TaskCompressor {
    pub fn new(
        cache: Arc<SharedCache>,
        cache_dir: PathBuf,
        image_processor: ImageProcessor,
        video_processor: VideoProcessor,
        skip_images: bool,
        skip_videos: bool,
    ) -> Self {
        Self {
            cache,
            cache_dir,
            image_processor: Arc::new(image_processor),
            video_processor: Arc::new(video_processor),
            skip_images,
            skip_videos,
        }
    }

    /// Processa un singolo file
    pub async fn process(&self, file: &MediaFile) -> Result<FileOutcome> {
        let path = file.path.as_path();

        if self.is_disabled(file.kind) {
            debug!("Skipping disabled {}: {}", file.kind.as_str(), path.display());
            return Ok(FileOutcome::Skipped(SkipReason::Disabled));
        }

        let digest = hasher::digest(path).await?;

        if let Some(artifact) = self.cached_artifact(&digest).await {
            debug!("Cache hit for {}: {}", path.display(), artifact.display());
            FileManager::replace_file(path, &artifact).await?;
            return Ok(FileOutcome::Skipped(SkipReason::CacheHit));
        }

        let compressed = match file.kind {
            MediaKind::Image => self.compress_with(self.image_processor.as_ref(), path, &digest).await?,
            MediaKind::Video => self.compress_with(self.video_processor.as_ref(), path, &digest).await?,
        };
        let Some(artifact) = compressed else {
            return Ok(FileOutcome::Skipped(SkipReason::TranscoderUnavailable));
        };

        let original_size = file_size(path).await?;
        let compressed_size = file_size(&artifact).await?;
        self.record(&digest, &artifact).await?;
        FileManager::replace_file(path, &artifact).await?;

        Ok(FileOutcome::Processed {
            original_size,
            compressed_size,
        })
    }

    fn is_disabled(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Image => self.skip_images,
            MediaKind::Video => self.skip_videos,
        }
    }

    /// Artifact for `digest` if the cache has it and it still exists on disk.
    async fn cached_artifact(&self, digest: &ContentDigest) -> Option<PathBuf> {
        let entry = self.cache.lookup(digest).await?;
        if let Some(path) = entry.artifact_path(&self.cache_dir) {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Some(path);
            }
        }
        debug!("Dropping stale cache entry {} ({})", digest, entry.artifact_filename);
        self.cache.remove_if(digest, &entry).await;
        None
    }

    async fn compress_with<B: CompressionBackend>(
        &self,
        backend: &B,
        path: &Path,
        digest: &ContentDigest,
    ) -> Result<Option<PathBuf>> {
        debug!("Compressing {} with {} backend", path.display(), backend.name());
        backend.compress(path, digest).await
    }

    /// Insert the entry for the source digest, plus an alias keyed by the
    /// artifact's own digest so replaced files hit on the next run.
    async fn record(&self, digest: &ContentDigest, artifact: &Path) -> Result<()> {
        let artifact_filename = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| CompressError::UnsupportedFormat(artifact.to_path_buf()))?;
        let artifact_digest = hasher::digest(artifact).await?;

        self.cache
            .insert(*digest, CacheEntry::new(artifact_filename.clone(), *digest))
            .await;
        if artifact_digest != *digest {
            self.cache
                .insert(artifact_digest, CacheEntry::new(artifact_filename, *digest))
                .await;
        }
        Ok(())
    }
}

async fn file_size(path: &Path) -> Result<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .map_err(|e| CompressError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::config::Config;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        site: PathBuf,
        cache_dir: PathBuf,
        cache: Arc<SharedCache>,
        task: TaskCompressor,
    }

    fn fixture(config: Config) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let site = temp_dir.path().join("site");
        let cache_dir = temp_dir.path().join("cache");
        std::fs::create_dir_all(&site).unwrap();
        std::fs::create_dir_all(&cache_dir).unwrap();

        let cache = Arc::new(SharedCache::new(Cache::empty(config.snapshot())));
        let task = TaskCompressor::new(
            cache.clone(),
            cache_dir.clone(),
            ImageProcessor::new(&config, &cache_dir),
            VideoProcessor::with_transcoder(&config, &cache_dir, None),
            config.skip_images,
            config.skip_videos,
        );
        Fixture {
            _temp_dir: temp_dir,
            site,
            cache_dir,
            cache,
            task,
        }
    }

    fn write_png(path: &Path) -> MediaFile {
        RgbImage::from_fn(64, 48, |x, y| Rgb([x as u8 * 3, y as u8 * 5, 90]))
            .save(path)
            .unwrap();
        MediaFile {
            path: path.to_path_buf(),
            kind: MediaKind::Image,
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let fx = fixture(Config::default());
        let file = write_png(&fx.site.join("a.png"));
        let source_digest = hasher::digest(&file.path).await.unwrap();

        let outcome = fx.task.process(&file).await.unwrap();
        assert!(matches!(outcome, FileOutcome::Processed { .. }));

        let entry = fx.cache.lookup(&source_digest).await.unwrap();
        let artifact = fx.cache_dir.join(&entry.artifact_filename);
        assert_eq!(std::fs::read(&file.path).unwrap(), std::fs::read(&artifact).unwrap());

        // The replaced file now hashes to the alias entry
        let outcome = fx.task.process(&file).await.unwrap();
        assert_eq!(outcome, FileOutcome::Skipped(SkipReason::CacheHit));
    }

    #[tokio::test]
    async fn test_disabled_kind_is_untouched() {
        let fx = fixture(Config {
            skip_images: true,
            ..Config::default()
        });
        let file = write_png(&fx.site.join("a.png"));
        let before = std::fs::read(&file.path).unwrap();

        let outcome = fx.task.process(&file).await.unwrap();
        assert_eq!(outcome, FileOutcome::Skipped(SkipReason::Disabled));
        assert_eq!(std::fs::read(&file.path).unwrap(), before);
        assert_eq!(fx.cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_a_miss() {
        let fx = fixture(Config::default());
        let file = write_png(&fx.site.join("a.png"));
        let digest = hasher::digest(&file.path).await.unwrap();
        fx.cache
            .insert(digest, CacheEntry::new("gone.png", digest))
            .await;

        let outcome = fx.task.process(&file).await.unwrap();
        assert!(matches!(outcome, FileOutcome::Processed { .. }));
        let entry = fx.cache.lookup(&digest).await.unwrap();
        assert_ne!(entry.artifact_filename, "gone.png");
    }

    #[tokio::test]
    async fn test_video_without_transcoder_is_skipped() {
        let fx = fixture(Config::default());
        let path = fx.site.join("clip.mp4");
        std::fs::write(&path, b"frames").unwrap();
        let file = MediaFile {
            path: path.clone(),
            kind: MediaKind::Video,
        };

        let outcome = fx.task.process(&file).await.unwrap();
        assert_eq!(outcome, FileOutcome::Skipped(SkipReason::TranscoderUnavailable));
        assert_eq!(std::fs::read(&path).unwrap(), b"frames");
    }

    #[tokio::test]
    async fn test_decode_failure_leaves_original() {
        let fx = fixture(Config::default());
        let path = fx.site.join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        let file = MediaFile {
            path: path.clone(),
            kind: MediaKind::Image,
        };

        assert!(fx.task.process(&file).await.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"definitely not a jpeg");
        assert_eq!(fx.cache.len().await, 0);
    }
}
