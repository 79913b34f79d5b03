//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di compressione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//! - Espone lo snapshot dei parametri che influenzano l'output (`snapshot()`)
//!
//! ## Parametri di configurazione:
//! - `cache_dir`: Directory della cache, relativa alla project root (default: ".mediacompressor_cache")
//! - `image_quality`: Qualità immagini lossy (1-100, default: 85)
//! - `image_max_width` / `image_max_height`: Limiti di resize (default: nessun limite)
//! - `video_crf`: CRF video (0-51, default: 23)
//! - `video_preset`: Preset x264 (default: "medium")
//! - `video_max_width`: Larghezza massima video (default: nessun limite)
//! - `skip_images` / `skip_videos`: Disabilita un tipo di media (default: false)
//! - `workers`: Numero di worker paralleli (default: 4)
//!
//! ## Esempio:
//! ```rust
//! use media_compressor::Config;
//!
//! let config = Config {
//!     image_quality: 80,
//!     image_max_width: Some(1600),
//!     workers: 8,
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//! ```

use crate::fingerprint::ConfigSnapshot;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Speed/quality presets accepted by libx264.
pub const VIDEO_PRESETS: [&str; 10] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Configuration for media compression
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache directory, relative to the project root unless absolute
    pub cache_dir: PathBuf,
    /// Lossy image quality (1-100)
    pub image_quality: u8,
    /// Maximum image width in pixels
    pub image_max_width: Option<u32>,
    /// Maximum image height in pixels
    pub image_max_height: Option<u32>,
    /// Video CRF value (0-51, lower = better quality)
    pub video_crf: u8,
    /// x264 speed preset
    pub video_preset: String,
    /// Maximum video width in pixels
    pub video_max_width: Option<u32>,
    /// Leave images untouched
    pub skip_images: bool,
    /// Leave videos untouched
    pub skip_videos: bool,
    /// Number of parallel workers
    #[serde(alias = "max_workers")]
    pub workers: usize,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    /// Draw the progress bar
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".mediacompressor_cache"),
            image_quality: 85,
            image_max_width: None,
            image_max_height: None,
            video_crf: 23,
            video_preset: "medium".to_string(),
            video_max_width: None,
            skip_images: false,
            skip_videos: false,
            workers: 4,
            json_output: false,
            show_progress: true,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.image_quality == 0 || self.image_quality > 100 {
            return Err(anyhow::anyhow!("Image quality must be between 1 and 100"));
        }

        if self.video_crf > 51 {
            return Err(anyhow::anyhow!("Video CRF must be between 0 and 51"));
        }

        if !VIDEO_PRESETS.contains(&self.video_preset.as_str()) {
            return Err(anyhow::anyhow!(
                "Unknown video preset '{}', expected one of: {}",
                self.video_preset,
                VIDEO_PRESETS.join(", ")
            ));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        for (name, bound) in [
            ("image_max_width", self.image_max_width),
            ("image_max_height", self.image_max_height),
            ("video_max_width", self.video_max_width),
        ] {
            if bound == Some(0) {
                return Err(anyhow::anyhow!("{} must be greater than 0 when set", name));
            }
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Cache directory must not be empty"));
        }

        Ok(())
    }

    /// Snapshot of the settings that affect compressed output
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::from_settings(self)
    }

    /// Resolve the cache directory against the project root
    pub fn cache_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.cache_dir)
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.image_quality = 0;
        assert!(config.validate().is_err());

        config.image_quality = 85;
        config.video_crf = 52;
        assert!(config.validate().is_err());

        config.video_crf = 23;
        config.video_preset = "warp-speed".to_string();
        assert!(config.validate().is_err());

        config.video_preset = "veryslow".to_string();
        config.image_max_height = Some(0);
        assert!(config.validate().is_err());

        config.image_max_height = Some(1080);
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache_dir, PathBuf::from(".mediacompressor_cache"));
        assert_eq!(config.image_quality, 85);
        assert_eq!(config.video_crf, 23);
        assert_eq!(config.video_preset, "medium");
        assert!(config.image_max_width.is_none());
        assert!(!config.skip_images);
        assert!(!config.skip_videos);
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn test_cache_root_is_relative_to_project_root() {
        let config = Config::default();
        assert_eq!(
            config.cache_root(Path::new("/project")),
            PathBuf::from("/project/.mediacompressor_cache")
        );

        let absolute = Config {
            cache_dir: PathBuf::from("/var/cache/media"),
            ..Config::default()
        };
        assert_eq!(
            absolute.cache_root(Path::new("/project")),
            PathBuf::from("/var/cache/media")
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"image_quality": 70, "max_workers": 2}"#).unwrap();
        assert_eq!(config.image_quality, 70);
        assert_eq!(config.workers, 2);
        assert_eq!(config.video_preset, "medium");
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            image_quality: 72,
            image_max_width: Some(1920),
            video_crf: 28,
            video_preset: "slow".to_string(),
            skip_videos: true,
            workers: 8,
            ..Config::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.image_quality, 72);
        assert_eq!(loaded_config.image_max_width, Some(1920));
        assert_eq!(loaded_config.video_crf, 28);
        assert_eq!(loaded_config.video_preset, "slow");
        assert!(loaded_config.skip_videos);
        assert_eq!(loaded_config.workers, 8);
        assert_eq!(loaded_config.snapshot(), original_config.snapshot());
    }

    #[tokio::test]
    async fn test_missing_config_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("nope.json"))
            .await
            .unwrap();
        assert_eq!(config.image_quality, 85);
    }
}
