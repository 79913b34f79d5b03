//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery di media.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di file media in directory
//! - Determinazione del tipo di file (immagine vs video) dall'estensione
//! - Sostituzione atomica dell'originale con l'artefatto compresso
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati supportati:
//! - **Immagini**: PNG, JPG, JPEG, GIF, WebP, BMP
//! - **Video**: MP4, WebM, OGG, MOV, AVI, MKV
//!
//! ## Sicurezza operazioni:
//! - La copia avviene su un file temporaneo nella stessa directory
//!   dell'originale, poi un rename lo sostituisce: l'originale non resta mai
//!   troncato a metà
//! - Permessi e timestamp dell'artefatto vengono applicati alla destinazione

use crate::error::{CompressError, Result};
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "webm", "ogg", "mov", "avi", "mkv"];

/// Kind of media inferred from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// A discovered candidate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find all supported media files under `root`, skipping anything inside `exclude`
    pub fn find_media_files(root: &Path, exclude: Option<&Path>) -> Vec<MediaFile> {
        let exclude = exclude.map(|dir| dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));

        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match &exclude {
                Some(dir) if entry.file_type().is_dir() => {
                    let path = entry
                        .path()
                        .canonicalize()
                        .unwrap_or_else(|_| entry.path().to_path_buf());
                    path != *dir
                }
                _ => true,
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|entry| {
                let path = entry.into_path();
                MediaKind::from_path(&path).map(|kind| MediaFile { path, kind })
            })
            .collect()
    }

    /// Replace `original` with the bytes of `artifact`, keeping the artifact's
    /// permissions and timestamps.
    pub async fn replace_file(original: &Path, artifact: &Path) -> Result<()> {
        let original = original.to_path_buf();
        let artifact = artifact.to_path_buf();
        let task_path = original.clone();

        tokio::task::spawn_blocking(move || Self::replace_file_blocking(&original, &artifact))
            .await
            .map_err(|e| CompressError::TaskPanicked {
                path: task_path,
                reason: e.to_string(),
            })?
    }

    fn replace_file_blocking(original: &Path, artifact: &Path) -> Result<()> {
        let dir = original.parent().unwrap_or(Path::new("."));

        let mut source = std::fs::File::open(artifact).map_err(|e| CompressError::io(artifact, e))?;
        let metadata = source.metadata().map_err(|e| CompressError::io(artifact, e))?;

        let mut staged = tempfile::Builder::new()
            .prefix(".mc-replace-")
            .tempfile_in(dir)
            .map_err(|e| CompressError::io(dir, e))?;
        std::io::copy(&mut source, staged.as_file_mut()).map_err(|e| CompressError::io(original, e))?;

        let file = staged.as_file();
        file.set_permissions(metadata.permissions())
            .map_err(|e| CompressError::io(original, e))?;
        let mut times = FileTimes::new();
        if let Ok(modified) = metadata.modified() {
            times = times.set_modified(modified);
        }
        if let Ok(accessed) = metadata.accessed() {
            times = times.set_accessed(accessed);
        }
        file.set_times(times).map_err(|e| CompressError::io(original, e))?;
        file.sync_all().map_err(|e| CompressError::io(original, e))?;

        staged
            .persist(original)
            .map_err(|e| CompressError::io(original, e.error))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
