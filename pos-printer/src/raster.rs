//! 1-bit raster images
//!
//! Thermal heads print dots, not pixels: every pixel ends up either black or
//! white. Transparent pixels count as white.

use crate::error::{PrintError, PrintResult};
use image::{DynamicImage, GenericImageView};
use std::path::Path;
use tracing::{debug, instrument};

/// Packed raster, MSB first, one row after another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterImage {
    /// Threshold an image to one bit per dot
    ///
    /// Images wider than `max_width` dots are scaled down first.
    pub fn from_image(img: &DynamicImage, max_width: u32) -> Self {
        let (w, h) = img.dimensions();

        let (new_w, new_h) = if w > max_width {
            let ratio = max_width as f64 / w as f64;
            (max_width, ((h as f64 * ratio) as u32).max(1))
        } else {
            (w, h)
        };

        let resized;
        let img = if (new_w, new_h) != (w, h) {
            resized = img.resize_exact(new_w, new_h, image::imageops::FilterType::Nearest);
            &resized
        } else {
            img
        };

        let x_bytes = new_w.div_ceil(8);
        let rgba = img.to_rgba8();
        let mut data = Vec::with_capacity((x_bytes * new_h) as usize);

        for y in 0..new_h {
            for x_byte in 0..x_bytes {
                let mut byte = 0u8;
                for bit in 0..8 {
                    let x = x_byte * 8 + bit;
                    if x < new_w {
                        let pixel = rgba.get_pixel(x, y);

                        // Transparent = white (0)
                        if pixel[3] >= 128 {
                            let luma = (0.299 * pixel[0] as f32
                                + 0.587 * pixel[1] as f32
                                + 0.114 * pixel[2] as f32)
                                as u8;

                            if luma < 128 {
                                byte |= 1 << (7 - bit);
                            }
                        }
                    }
                }
                data.push(byte);
            }
        }

        Self {
            width: new_w,
            height: new_h,
            data,
        }
    }

    /// Load an image file and threshold it
    #[instrument(skip(max_width))]
    pub async fn load(path: &Path, max_width: u32) -> PrintResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| PrintError::Image(format!("{}: {}", path.display(), e)))?;
        debug!(dimensions = ?img.dimensions(), "raster source loaded");
        Ok(Self::from_image(&img, max_width))
    }

    /// Width in dots
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn width_bytes(&self) -> u32 {
        self.width.div_ceil(8)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
