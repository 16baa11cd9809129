use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageError, ImageReader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unrecognized image format: {path}")]
    UnsupportedFormat { path: String },
    #[error("I/O error for {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("re-encode failed for {path}: {source}")]
    Encode { path: String, source: ImageError },
}

/// What a normalization did to a file, for the progress log.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeReport {
    pub original_dims: (u32, u32),
    pub new_dims: (u32, u32),
    pub original_size: u64,
    pub new_size: u64,
}

/// Re-encodes downloaded images in place as RGB JPEG, downscaling to fit
/// within the configured bounds. Aspect ratio is preserved; images already
/// inside the bounds keep their dimensions. Decoding is CPU-bound, so
/// callers run this off the async runtime via `spawn_blocking`.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_width: u32,
    max_height: u32,
    jpeg_quality: u8,
}

impl ImageNormalizer {
    pub fn new(max_width: u32, max_height: u32, jpeg_quality: u8) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn normalize(&self, path: &Path) -> Result<NormalizeReport, NormalizeError> {
        let display = path.display().to_string();
        let io_err = |source| NormalizeError::Io {
            path: display.clone(),
            source,
        };

        let original_size = std::fs::metadata(path).map_err(io_err)?.len();
        let reader = ImageReader::open(path)
            .map_err(io_err)?
            .with_guessed_format()
            .map_err(io_err)?;
        let img = reader.decode().map_err(|err| match err {
            ImageError::IoError(source) => NormalizeError::Io {
                path: display.clone(),
                source,
            },
            _ => NormalizeError::UnsupportedFormat {
                path: display.clone(),
            },
        })?;

        let original_dims = (img.width(), img.height());
        let resized = if img.width() > self.max_width || img.height() > self.max_height {
            img.resize(self.max_width, self.max_height, FilterType::Lanczos3)
        } else {
            img
        };
        let new_dims = (resized.width(), resized.height());
        let rgb = resized.into_rgb8();

        let file = std::fs::File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(|source| NormalizeError::Encode {
                path: display.clone(),
                source,
            })?;
        writer.flush().map_err(io_err)?;

        let new_size = std::fs::metadata(path).map_err(io_err)?.len();
        Ok(NormalizeReport {
            original_dims,
            new_dims,
            original_size,
            new_size,
        })
    }
}

/// Formats a byte count the way the progress log reports sizes.
pub fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}
