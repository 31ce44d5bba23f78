//! Image normalization before upload
//!
//! Bluesky rejects blobs above roughly 1MB. Images over the configured size
//! threshold are re-encoded as JPEG next to the original; smaller images are
//! uploaded as-is.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};

use crate::config::ImageConfig;
use crate::error::{ImageError, Result, SkypostError};

/// Path of the image to upload for `path`
///
/// Returns `path` unchanged when the file is at or below
/// `config.max_size` bytes, otherwise the path of a freshly converted JPEG.
///
/// # Errors
///
/// - `SkypostError::NotFound` if `path` does not exist
/// - `ImageError::InvalidImage` if an oversized file cannot be decoded
pub fn normalize(path: &Path, config: &ImageConfig) -> Result<PathBuf> {
    let size = file_size(path)?;

    if size <= config.max_size {
        tracing::debug!("{} is {} bytes, no conversion needed", path.display(), size);
        return Ok(path.to_path_buf());
    }

    tracing::info!(
        "{} is {} bytes (limit {}), converting to JPEG",
        path.display(),
        size,
        config.max_size
    );
    convert_to_jpeg(path, config.jpeg_quality)
}

/// Re-encode `path` as a JPEG and return the new file's path
///
/// Transparent pixels are composited onto white. The output is written
/// beside the source as `{stem}.jpeg`, replacing any earlier output. When
/// the source's extension is already `jpeg` in any letter case the output
/// becomes `{stem}-normalized.jpeg` so the source is never overwritten.
pub fn convert_to_jpeg(path: &Path, quality: u8) -> Result<PathBuf> {
    file_size(path)?;

    let decoded = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|e| {
            tracing::debug!("Failed to decode {}: {}", path.display(), e);
            ImageError::InvalidImage(path.to_path_buf())
        })?;

    let rgb = flatten_onto_white(&decoded);
    let output = jpeg_path(path);

    let io_error = |source| ImageError::Io {
        path: output.clone(),
        source,
    };
    let mut writer = BufWriter::new(File::create(&output).map_err(io_error)?);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|source| ImageError::Conversion {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(io_error)?;

    tracing::debug!("Wrote {}", output.display());
    Ok(output)
}

/// MIME type to declare when uploading `data` read from `path`
pub fn mime_type(path: &Path, data: &[u8]) -> &'static str {
    ImageFormat::from_path(path)
        .or_else(|_| image::guess_format(data))
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

fn file_size(path: &Path) -> Result<u64> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
        Ok(_) => Err(SkypostError::NotFound(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SkypostError::NotFound(path.to_path_buf()))
        }
        Err(source) => Err(ImageError::Io {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}

fn jpeg_path(path: &Path) -> PathBuf {
    let is_jpeg = path
        .extension()
        .map_or(false, |ext| ext.to_string_lossy().eq_ignore_ascii_case("jpeg"));
    if !is_jpeg {
        return path.with_extension("jpeg");
    }

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}-normalized.jpeg", stem))
}

/// 3-channel RGB with any alpha composited onto opaque white
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |channel: u8| -> u8 {
            ((u32::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    flattened
}
