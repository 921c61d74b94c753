//! Image normalization ahead of recognition.
//!
//! Grayscale, resize to a fixed width with the aspect ratio kept, then an
//! unsharp mask. Low-resolution phone photos gain the most.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use notescan_core::MAX_PREPROCESS_PIXELS;

use crate::VisionError;

/// Width every image is scaled to before recognition.
pub const DEFAULT_TARGET_WIDTH: u32 = 2000;

const DEFAULT_SHARPEN_SIGMA: f32 = 1.0;
const DEFAULT_SHARPEN_THRESHOLD: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePreprocessor {
    pub target_width: u32,
    pub sharpen_sigma: f32,
    pub sharpen_threshold: i32,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_WIDTH)
    }
}

impl ImagePreprocessor {
    pub fn new(target_width: u32) -> Self {
        Self {
            target_width: target_width.max(1),
            sharpen_sigma: DEFAULT_SHARPEN_SIGMA,
            sharpen_threshold: DEFAULT_SHARPEN_THRESHOLD,
        }
    }

    /// Normalized PNG bytes, or the untouched input when the image cannot be
    /// processed. Never fails.
    pub fn preprocess(&self, buffer: &[u8]) -> Vec<u8> {
        match self.try_preprocess(buffer) {
            Ok(processed) => processed,
            Err(e) => {
                tracing::warn!(error = %e, bytes = buffer.len(), "preprocessing failed, using original image");
                buffer.to_vec()
            },
        }
    }

    pub fn try_preprocess(&self, buffer: &[u8]) -> Result<Vec<u8>, VisionError> {
        let img = image::load_from_memory(buffer)?;
        let prepared = self.transform(&img)?;
        let mut out = Cursor::new(Vec::new());
        prepared.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Output dimensions for a `width` x `height` source, or `TooLarge` when
    /// they exceed [`MAX_PREPROCESS_PIXELS`].
    pub fn output_size(&self, width: u32, height: u32) -> Result<(u32, u32), VisionError> {
        let out_height = scaled_height(width, height, self.target_width);
        let pixels = u64::from(self.target_width).saturating_mul(u64::from(out_height));
        if pixels > MAX_PREPROCESS_PIXELS {
            return Err(VisionError::TooLarge {
                width: self.target_width,
                height: out_height,
                max: MAX_PREPROCESS_PIXELS,
            });
        }
        Ok((self.target_width, out_height))
    }

    fn transform(&self, img: &DynamicImage) -> Result<DynamicImage, VisionError> {
        let (width, height) = self.output_size(img.width(), img.height())?;
        Ok(img
            .grayscale()
            .resize_exact(width, height, FilterType::Lanczos3)
            .unsharpen(self.sharpen_sigma, self.sharpen_threshold))
    }
}

/// Height that keeps the aspect ratio at `target_width`, rounded, at least 1.
fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return height.max(1);
    }
    let w = u64::from(width);
    let scaled = u64::from(height)
        .saturating_mul(u64::from(target_width))
        .saturating_add(w / 2)
        / w;
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}
