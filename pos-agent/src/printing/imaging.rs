//! Logo preprocessing
//!
//! Thermal heads print black dots on white paper and nothing else, so an
//! arbitrary logo is flattened onto white, reduced to two levels and capped in
//! width before it reaches the driver.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, imageops::FilterType};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, instrument};

/// Widest logo sent to the printer, in pixels
pub const MAX_LOGO_WIDTH: u32 = 280;

/// Accepts payloads with or without `=` padding
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("invalid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("unreadable image: {0}")]
    Image(#[from] image::ImageError),

    #[error("temp file: {0}")]
    Io(#[from] std::io::Error),

    #[error("preprocessing task failed: {0}")]
    Task(String),
}

/// A processed logo on disk
///
/// The file is removed when this value is dropped, whether or not printing
/// succeeded.
#[derive(Debug)]
pub struct ProcessedImage {
    file: NamedTempFile,
    /// `data:image/png;base64,...` of the processed raster
    pub data_uri: String,
}

impl ProcessedImage {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Normalises embedded images into printer-safe rasters
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    work_dir: PathBuf,
    max_width: u32,
    /// Contrast on a -1..1 scale
    contrast: f64,
    levels: u8,
}

impl ImagePreprocessor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            max_width: MAX_LOGO_WIDTH,
            contrast: 0.8,
            levels: 2,
        }
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width.max(1);
        self
    }

    /// Decode, normalise and persist a base64 image
    ///
    /// Image work runs on the blocking pool.
    #[instrument(skip_all, fields(payload_len = data.len()))]
    pub async fn process(&self, data: &str) -> Result<ProcessedImage, PreprocessError> {
        let this = self.clone();
        let data = data.to_string();
        tokio::task::spawn_blocking(move || this.process_blocking(&data))
            .await
            .map_err(|e| PreprocessError::Task(e.to_string()))?
    }

    fn process_blocking(&self, data: &str) -> Result<ProcessedImage, PreprocessError> {
        let bytes = decode_payload(data)?;
        let source = image::load_from_memory(&bytes)?;
        let processed = self.transform(&source);
        debug!(
            width = processed.width(),
            height = processed.height(),
            "logo processed"
        );

        let mut png = Vec::new();
        DynamicImage::ImageLuma8(processed).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let millis = chrono::Utc::now().timestamp_millis();
        let mut file = tempfile::Builder::new()
            .prefix(&format!("logo_{}_", millis))
            .suffix(".png")
            .tempfile_in(&self.work_dir)?;
        file.write_all(&png)?;
        file.flush()?;

        Ok(ProcessedImage {
            file,
            data_uri: format!("data:image/png;base64,{}", STANDARD.encode(&png)),
        })
    }

    /// White background, grayscale, contrast, posterize, then resize
    fn transform(&self, source: &DynamicImage) -> GrayImage {
        let rgba = source.to_rgba8();
        let factor = (self.contrast + 1.0) / (1.0 - self.contrast);
        let steps = f64::from(self.levels.max(2) - 1);

        let mut gray = GrayImage::new(rgba.width(), rgba.height());
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = f64::from(a) / 255.0;
            let over_white = |c: u8| f64::from(c) * alpha + 255.0 * (1.0 - alpha);

            let luma = (0.2126 * over_white(r) + 0.7152 * over_white(g) + 0.0722 * over_white(b))
                .floor();
            let contrasted = (factor * (luma - 127.0) + 127.0).floor().clamp(0.0, 255.0);
            let level = ((contrasted / 255.0 * steps).floor() / steps * 255.0).round();

            gray.put_pixel(x, y, Luma([level as u8]));
        }

        let (w, h) = gray.dimensions();
        if w <= self.max_width {
            return gray;
        }
        let new_h = ((f64::from(h) * f64::from(self.max_width) / f64::from(w)).round() as u32).max(1);
        image::imageops::resize(&gray, self.max_width, new_h, FilterType::Nearest)
    }
}

/// Strip an optional `data:` URI header and decode
fn decode_payload(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let encoded = match data.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        _ => data,
    };
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    LENIENT_BASE64.decode(cleaned)
}
