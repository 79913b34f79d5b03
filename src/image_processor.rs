//! # Image Processing Module
//!
//! Questo modulo comprime le immagini in-process con il crate `image`.
//!
//! ## Pipeline di compressione
//!
//! 1. **Decode**: formato rilevato dal contenuto, orientamento EXIF letto dal decoder
//! 2. **Orientamento**: rotazione 180°/90°/270° per i codici EXIF 3/6/8; il
//!    re-encode non scrive EXIF, quindi il tag viene rimosso
//! 3. **Alpha**: per JPEG (niente canale alpha) composizione su sfondo bianco
//! 4. **Resize**: un unico fattore uniforme ≤ 1 che rispetta entrambi i limiti,
//!    filtro Lanczos3, mai upscaling
//! 5. **Encode**: stesso formato dell'originale, nella directory di cache
//!
//! ## Parametri per formato
//!
//! | Formato | Encoder | Parametri |
//! |---------|---------|-----------|
//! | JPEG    | `JpegEncoder` | `image_quality` |
//! | PNG     | `PngEncoder`  | compressione massima, filtro adattivo |
//! | WebP    | `webp::Encoder` (libwebp) | `image_quality`, lossy |
//! | GIF     | `GifEncoder`  | speed 1 (massimo sforzo), primo frame |
//! | BMP     | `BmpEncoder`  | nessuno |
//!
//! Decode ed encode sono CPU-bound e girano in `spawn_blocking`.

use crate::backend::{self, CompressionBackend};
use crate::config::Config;
use crate::error::{CompressError, Result};
use crate::hasher::ContentDigest;
use image::codecs::bmp::BmpEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{ColorType, DynamicImage, Frame, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings that shape image output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSettings {
    pub quality: u8,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl From<&Config> for ImageSettings {
    fn from(config: &Config) -> Self {
        Self {
            quality: config.image_quality,
            max_width: config.image_max_width,
            max_height: config.image_max_height,
        }
    }
}

/// Clockwise rotation needed to display decoded pixels upright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Only the pure rotations (EXIF 3, 6, 8) are corrected; mirrored
    /// orientations are left as decoded.
    pub fn for_orientation(orientation: Orientation) -> Option<Self> {
        match orientation {
            Orientation::Rotate180 => Some(Self::Deg180),
            Orientation::Rotate90 => Some(Self::Deg90),
            Orientation::Rotate270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Deg90 => img.rotate90(),
            Self::Deg180 => img.rotate180(),
            Self::Deg270 => img.rotate270(),
        }
    }
}

/// Uniform downscale target that fits both bounds, or `None` when the image
/// already fits.
///
/// The limiting bound is kept exact and the other side is floored, so the
/// result never exceeds either bound and never grows.
pub fn target_dimensions(
    width: u32,
    height: u32,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let (w, h) = (u64::from(width), u64::from(height));

    // (bound, side) pairs; the scale factor is bound / side
    let by_width = max_width.filter(|&mw| width > mw).map(|mw| (u64::from(mw), w));
    let by_height = max_height.filter(|&mh| height > mh).map(|mh| (u64::from(mh), h));

    let (bound, side) = match (by_width, by_height) {
        (Some(a), Some(b)) => {
            if a.0 * b.1 <= b.0 * a.1 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };

    let new_w = (w * bound / side).clamp(1, w) as u32;
    let new_h = (h * bound / side).clamp(1, h) as u32;
    Some((new_w, new_h))
}

/// Composite onto an opaque white background.
pub fn flatten_on_white(img: &DynamicImage) -> DynamicImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let alpha = u16::from(src[3]);
        for c in 0..3 {
            let blended = (u16::from(src[c]) * alpha + 255 * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
    DynamicImage::ImageRgb8(out)
}

/// Handles image compression
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    cache_dir: PathBuf,
    settings: ImageSettings,
}

impl ImageProcessor {
    pub fn new(config: &Config, cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            settings: ImageSettings::from(config),
        }
    }

    fn compress_blocking(
        source: &Path,
        artifact: &Path,
        cache_dir: &Path,
        settings: ImageSettings,
    ) -> Result<()> {
        let format = ImageFormat::from_path(source)
            .map_err(|_| CompressError::UnsupportedFormat(source.to_path_buf()))?;

        let mut img = Self::decode_upright(source)?;

        if format == ImageFormat::Jpeg && img.color().has_alpha() {
            debug!("Flattening alpha onto white for {}", source.display());
            img = flatten_on_white(&img);
        }

        if let Some((w, h)) =
            target_dimensions(img.width(), img.height(), settings.max_width, settings.max_height)
        {
            debug!(
                "Resizing {}: {}x{} → {}x{}",
                source.display(),
                img.width(),
                img.height(),
                w,
                h
            );
            img = img.resize_exact(w, h, FilterType::Lanczos3);
        }

        let mut staged = backend::staging_file(cache_dir, source)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            Self::encode(&img, format, settings, &mut writer).map_err(|e| CompressError::Encode {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;
            writer.flush().map_err(|e| CompressError::io(artifact, e))?;
        }
        staged
            .persist(artifact)
            .map_err(|e| CompressError::io(artifact, e.error))?;
        Ok(())
    }

    /// Decode and undo the EXIF rotation.
    fn decode_upright(source: &Path) -> Result<DynamicImage> {
        let decode_err = |e| CompressError::Decode {
            path: source.to_path_buf(),
            source: e,
        };

        let reader = ImageReader::open(source)
            .map_err(|e| CompressError::io(source, e))?
            .with_guessed_format()
            .map_err(|e| CompressError::io(source, e))?;
        let mut decoder = reader.into_decoder().map_err(decode_err)?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let img = DynamicImage::from_decoder(decoder).map_err(decode_err)?;

        Ok(match Rotation::for_orientation(orientation) {
            Some(rotation) => {
                debug!("Applying {:?} rotation to {}", rotation, source.display());
                rotation.apply(img)
            }
            None => img,
        })
    }

    fn encode<W: Write>(
        img: &DynamicImage,
        format: ImageFormat,
        settings: ImageSettings,
        writer: &mut W,
    ) -> image::ImageResult<()> {
        match format {
            ImageFormat::Jpeg => {
                let img = match img.color() {
                    ColorType::L8 | ColorType::Rgb8 => img.clone(),
                    ColorType::L16 => DynamicImage::ImageLuma8(img.to_luma8()),
                    _ => DynamicImage::ImageRgb8(img.to_rgb8()),
                };
                img.write_with_encoder(JpegEncoder::new_with_quality(writer, settings.quality))
            }
            ImageFormat::Png => {
                let img = match img.color() {
                    ColorType::Rgb32F => DynamicImage::ImageRgb16(img.to_rgb16()),
                    ColorType::Rgba32F => DynamicImage::ImageRgba16(img.to_rgba16()),
                    _ => img.clone(),
                };
                img.write_with_encoder(PngEncoder::new_with_quality(
                    writer,
                    CompressionType::Best,
                    PngFilter::Adaptive,
                ))
            }
            ImageFormat::WebP => {
                let img = Self::to_eight_bit(img);
                let encoder = webp::Encoder::from_image(&img).map_err(|e| {
                    image::ImageError::Encoding(image::error::EncodingError::new(
                        ImageFormat::WebP.into(),
                        e.to_string(),
                    ))
                })?;
                let encoded = encoder.encode(f32::from(settings.quality));
                writer.write_all(&encoded).map_err(image::ImageError::IoError)
            }
            ImageFormat::Bmp => {
                let img = Self::to_eight_bit(img);
                img.write_with_encoder(BmpEncoder::new(writer))
            }
            ImageFormat::Gif => {
                let mut encoder = GifEncoder::new_with_speed(writer, 1);
                encoder.encode_frame(Frame::new(img.to_rgba8()))
            }
            other => Err(image::ImageError::Unsupported(
                image::error::UnsupportedError::from_format_and_kind(
                    other.into(),
                    image::error::UnsupportedErrorKind::Format(other.into()),
                ),
            )),
        }
    }

    fn to_eight_bit(img: &DynamicImage) -> DynamicImage {
        if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        }
    }
}

impl CompressionBackend for ImageProcessor {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn compress(&self, source: &Path, digest: &ContentDigest) -> Result<Option<PathBuf>> {
        let artifact = backend::artifact_path(&self.cache_dir, source, digest);
        let original_size = tokio::fs::metadata(source)
            .await
            .map_err(|e| CompressError::io(source, e))?
            .len();

        let settings = self.settings;
        let cache_dir = self.cache_dir.clone();
        let source_owned = source.to_path_buf();
        let artifact_owned = artifact.clone();
        tokio::task::spawn_blocking(move || {
            Self::compress_blocking(&source_owned, &artifact_owned, &cache_dir, settings)
        })
        .await
        .map_err(|e| CompressError::TaskPanicked {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })??;

        let compressed_size = tokio::fs::metadata(&artifact)
            .await
            .map_err(|e| CompressError::io(&artifact, e))?
            .len();
        backend::log_reduction(source, original_size, compressed_size);

        Ok(Some(artifact))
    }
}
