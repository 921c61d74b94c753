//! Typed error enum for the vision crate.

use std::time::Duration;

use thiserror::Error;

/// Errors from preprocessing and recognition.
#[derive(Debug, Error)]
pub enum VisionError {
    /// The recognition capability could not be invoked at all.
    #[error("recognition unavailable: {0}")]
    Unavailable(String),
    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),
    /// The engine ran but exited unsuccessfully.
    #[error("recognition failed: {0}")]
    Failed(String),
    /// Preprocessing would produce an image above the pixel cap.
    #[error("preprocessed image would be {width}x{height} pixels, above the {max} pixel limit")]
    TooLarge { width: u32, height: u32, max: u64 },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
