//! # Compression Backend
//!
//! Capability shared by the image and video compressors: given a source file
//! and its digest, produce an artifact inside the cache directory.
//!
//! Artifacts are staged in a temp file inside the cache directory and renamed
//! to `<digest><ext>` once complete, so two workers compressing the same
//! digest never expose a half-written artifact.

use crate::error::{CompressError, Result};
use crate::hasher::ContentDigest;
use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A compressor for one kind of media.
pub trait CompressionBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Compress `source` into the cache.
    ///
    /// `Ok(Some(path))` is the finished artifact, `Ok(None)` means the backend
    /// is unavailable on this machine and the file should be left as is.
    fn compress(
        &self,
        source: &Path,
        digest: &ContentDigest,
    ) -> impl Future<Output = Result<Option<PathBuf>>> + Send;
}

/// Final location of the artifact for `digest`.
pub fn artifact_path(cache_dir: &Path, source: &Path, digest: &ContentDigest) -> PathBuf {
    cache_dir.join(digest.artifact_filename(source))
}

/// Temp file in `cache_dir` carrying the source extension (the transcoder
/// picks its container from it).
pub fn staging_file(cache_dir: &Path, source: &Path) -> Result<NamedTempFile> {
    let suffix = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(".mc-staging-")
        .suffix(&suffix)
        .tempfile_in(cache_dir)
        .map_err(|e| CompressError::io(cache_dir, e))
}

/// Size reduction log line shared by both backends.
pub(crate) fn log_reduction(source: &Path, original_size: u64, compressed_size: u64) {
    let savings = crate::file_manager::FileManager::calculate_reduction(original_size, compressed_size);
    tracing::info!(
        "{}: {} → {} ({:.1}% reduction)",
        source.file_name().unwrap_or_default().to_string_lossy(),
        crate::file_manager::FileManager::format_size(original_size),
        crate::file_manager::FileManager::format_size(compressed_size),
        savings
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_path_is_named_by_digest() {
        let digest = ContentDigest::of(b"frame");
        let path = artifact_path(Path::new("/cache"), Path::new("/site/v/clip.webm"), &digest);
        assert_eq!(path, PathBuf::from(format!("/cache/{}.webm", digest)));
    }

    #[test]
    fn test_staging_file_lives_in_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let staged = staging_file(temp_dir.path(), Path::new("clip.mp4")).unwrap();
        assert_eq!(staged.path().parent(), Some(temp_dir.path()));
        assert_eq!(staged.path().extension().unwrap(), "mp4");
    }
}
