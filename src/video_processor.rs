//! # Video Processing Module
//!
//! Questo modulo comprime i video delegando a un transcoder esterno (`ffmpeg`).
//!
//! ## Responsabilità:
//! - Risoluzione del binario del transcoder una sola volta per run
//! - Costruzione degli argomenti (codec, CRF, preset, scala opzionale, audio)
//! - Esecuzione del subprocess e verifica dell'output
//! - Spostamento atomico dell'artifact nella directory di cache
//!
//! ## Argomenti del transcoder:
//! ```text
//! -nostdin -loglevel error -i <src> -y
//! -c:v libx264 -crf <crf> -preset <preset>
//! [-vf scale='min(<w>,iw)':-2]
//! -c:a aac -b:a 128k <tmp-out>
//! ```
//!
//! L'altezza `-2` lascia al transcoder il calcolo proporzionale, arrotondato a
//! un valore pari (vincolo di libx264).
//!
//! ## Controllo qualità (CRF):
//! - 0-17: Visualmente lossless (file grandi)
//! - 18-23: Alta qualità (default 23)
//! - 24-28: Buona qualità, file più piccoli
//! - 29+: Qualità progressivamente più bassa
//!
//! Se il transcoder non è installato `compress` ritorna `Ok(None)`: il file
//! resta invariato e l'orchestratore lo conta come saltato.

use crate::args;
use crate::backend::{self, CompressionBackend};
use crate::config::Config;
use crate::error::{CompressError, Result};
use crate::hasher::ContentDigest;
use crate::tool_resolver::ToolPathResolver;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Name of the transcoder binary looked up on the system
pub const TRANSCODER: &str = "ffmpeg";

const AUDIO_BITRATE: &str = "128k";

/// Bytes of transcoder stderr kept in error messages
const STDERR_TAIL: usize = 2048;

/// Settings that shape video output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    pub crf: u8,
    pub preset: String,
    pub max_width: Option<u32>,
}

impl From<&Config> for VideoSettings {
    fn from(config: &Config) -> Self {
        Self {
            crf: config.video_crf,
            preset: config.video_preset.clone(),
            max_width: config.video_max_width,
        }
    }
}

/// Handles video compression
#[derive(Debug, Clone)]
pub struct VideoProcessor {
    cache_dir: PathBuf,
    settings: VideoSettings,
    transcoder: Option<PathBuf>,
}

impl VideoProcessor {
    pub fn new(config: &Config, cache_dir: &Path, resolver: &ToolPathResolver) -> Self {
        Self::with_transcoder(config, cache_dir, resolver.resolve_tool(TRANSCODER))
    }

    /// Processor using an explicit transcoder binary (`None` disables video)
    pub fn with_transcoder(config: &Config, cache_dir: &Path, transcoder: Option<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            settings: VideoSettings::from(config),
            transcoder,
        }
    }

    pub fn is_available(&self) -> bool {
        self.transcoder.is_some()
    }

    /// Full transcoder argument list for one file.
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = args![
            "-nostdin",
            "-loglevel",
            "error",
            "-i",
            input.display(),
            "-y",
            "-c:v",
            "libx264",
            "-crf",
            self.settings.crf,
            "-preset",
            self.settings.preset,
        ];
        if let Some(width) = self.settings.max_width {
            args.extend(args!["-vf", format!("scale='min({},iw)':-2", width)]);
        }
        args.extend(args!["-c:a", "aac", "-b:a", AUDIO_BITRATE, output.display()]);
        args
    }

    async fn transcode(&self, transcoder: &Path, source: &Path, output: &Path) -> Result<()> {
        let args = self.build_args(source, output);
        debug!(
            "🎬 Transcoding {} (CRF: {}, preset: {})",
            source.display(),
            self.settings.crf,
            self.settings.preset
        );

        let start_time = std::time::Instant::now();
        let result = Command::new(transcoder)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CompressError::Subprocess {
                path: source.to_path_buf(),
                reason: format!("failed to execute {}: {}", transcoder.display(), e),
            })?;

        if !result.status.success() {
            return Err(CompressError::Subprocess {
                path: source.to_path_buf(),
                reason: format!("{}: {}", result.status, stderr_tail(&result.stderr)),
            });
        }

        let produced = tokio::fs::metadata(output)
            .await
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        if !produced {
            return Err(CompressError::Subprocess {
                path: source.to_path_buf(),
                reason: "transcoder produced no output".to_string(),
            });
        }

        debug!(
            "Transcoded {} in {:.1}s",
            source.display(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text.len().saturating_sub(STDERR_TAIL);
    let start = (start..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len());
    text[start..].to_string()
}

impl CompressionBackend for VideoProcessor {
    fn name(&self) -> &'static str {
        "video"
    }

    async fn compress(&self, source: &Path, digest: &ContentDigest) -> Result<Option<PathBuf>> {
        let Some(transcoder) = self.transcoder.as_deref() else {
            debug!("Transcoder unavailable, leaving {} as is", source.display());
            return Ok(None);
        };

        let artifact = backend::artifact_path(&self.cache_dir, source, digest);
        let original_size = tokio::fs::metadata(source)
            .await
            .map_err(|e| CompressError::io(source, e))?
            .len();

        // Removed on drop if anything below fails
        let staged = backend::staging_file(&self.cache_dir, source)?.into_temp_path();
        self.transcode(transcoder, source, &staged).await?;

        staged
            .persist(&artifact)
            .map_err(|e| CompressError::io(&artifact, e.error))?;

        let compressed_size = tokio::fs::metadata(&artifact)
            .await
            .map_err(|e| CompressError::io(&artifact, e))?
            .len();
        backend::log_reduction(source, original_size, compressed_size);

        Ok(Some(artifact))
    }
}
